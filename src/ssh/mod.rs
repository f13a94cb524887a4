// ABOUTME: SSH client module for the deployment target.
// ABOUTME: Supports key, password, and agent authentication with known_hosts verification.

mod client;
mod error;

pub use client::{CommandOutput, Session, SessionConfig};
pub use error::{Error, Result};
