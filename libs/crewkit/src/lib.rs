//! # Crewkit - Coordinated Background Workers
//!
//! Lifecycle and shutdown coordination for a crew of long-lived background
//! activities (tunnel upkeep, handshakes, status polling), each on its own
//! dedicated OS thread.
//!
//! ## Guarantees
//!
//! - **Acknowledged start**: `start()` blocks until the worker either
//!   published its started signal or exited without it
//! - **Composite stop**: every worker polls the OR of its own stop flag and
//!   a controller-owned one
//! - **Graceful rendezvous**: when every worker in a crew stops cleanly,
//!   they pass a two-barrier shutdown meet-up before exiting
//! - **Fast abort**: one unclean exit abandons the rendezvous for everyone
//!
//! ## Example
//!
//! ```rust,ignore
//! use crewkit::{Activity, Rendezvous, StopFlag, Worker};
//!
//! struct Poll;
//! impl Activity for Poll {
//!     fn tick(&mut self) -> anyhow::Result<bool> {
//!         // periodic work; Ok(false) leaves the loop
//!         Ok(true)
//!     }
//! }
//!
//! let stop = StopFlag::new();
//! let crew = Rendezvous::new();
//! let mut worker = Worker::new("poller", Poll);
//! worker.start(stop.clone(), Some(crew.clone()))?;
//! // ...
//! stop.raise();
//! worker.stop();
//! ```

pub mod contracts;
pub mod rendezvous;
pub mod signal;
pub mod worker;

pub use contracts::Activity;
pub use rendezvous::Rendezvous;
pub use signal::{Event, StopFlag, StopFlagSet};
pub use worker::{StartError, Worker, DEFAULT_TICK_INTERVAL};
