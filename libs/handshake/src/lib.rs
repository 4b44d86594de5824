//! Handshake response field extraction.
//!
//! The server answers a handshake with a newline-delimited text blob whose
//! lines carry `Prefix: value` pairs. This crate pulls the known fields out
//! of that blob; it performs no semantic validation, which stays with the
//! callers.

use serde::{Deserialize, Serialize};

/// Fields extracted from one handshake response.
///
/// Scalar fields keep the last occurrence; `homepages` and `servers` collect
/// every occurrence in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub upgrade_version: String,
    pub psk: String,
    pub ssh_port: String,
    pub ssh_username: String,
    pub ssh_password: String,
    pub ssh_host_key: String,
    pub homepages: Vec<String>,
    pub servers: Vec<String>,
}

impl ServerResponse {
    /// Extract the known fields from `text`. Never fails: unknown and blank
    /// lines are skipped, and every field starts cleared.
    ///
    /// Prefixes are case-exact and followed by a single space. Note the
    /// lowercase `k` in `SSHHostkey: `; that is the wire spelling.
    pub fn parse(text: &str) -> Self {
        let mut response = Self::default();
        for line in text.lines() {
            if let Some(value) = line.strip_prefix("Upgrade: ") {
                response.upgrade_version = value.to_owned();
            } else if let Some(value) = line.strip_prefix("PSK: ") {
                response.psk = value.to_owned();
            } else if let Some(value) = line.strip_prefix("SSHPort: ") {
                response.ssh_port = value.to_owned();
            } else if let Some(value) = line.strip_prefix("SSHUsername: ") {
                response.ssh_username = value.to_owned();
            } else if let Some(value) = line.strip_prefix("SSHPassword: ") {
                response.ssh_password = value.to_owned();
            } else if let Some(value) = line.strip_prefix("SSHHostkey: ") {
                response.ssh_host_key = value.to_owned();
            } else if let Some(value) = line.strip_prefix("Homepage: ") {
                response.homepages.push(value.to_owned());
            } else if let Some(value) = line.strip_prefix("Server: ") {
                response.servers.push(value.to_owned());
            }
        }
        response
    }
}
