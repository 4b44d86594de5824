//! Implementer-facing contracts.

use anyhow::Result;

/// Hooks supplied by one background activity (tunnel upkeep, status polling,
/// and the like). The framework owns the thread and the loop; implementers
/// own what happens inside each hook.
///
/// Hooks run on the worker's dedicated thread. A returned error or a panic
/// is contained there and converted into an unclean exit; it never reaches
/// the controller.
pub trait Activity: Send + 'static {
    /// Runs once at thread entry, before the started signal is published.
    /// An error here means the worker never reports itself as started.
    fn setup(&mut self) -> Result<()> {
        Ok(())
    }

    /// One iteration of periodic work, invoked roughly every tick interval.
    /// Return `Ok(false)` to leave the loop without a graceful rendezvous.
    fn tick(&mut self) -> Result<bool>;

    /// Runs between the two shutdown barriers, once every peer in the crew
    /// has voted to stop cleanly.
    fn stop_imminent(&mut self) {}

    /// Runs on every exit path, exactly once per thread lifetime.
    fn teardown(&mut self) {}
}
