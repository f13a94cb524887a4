// ABOUTME: Library root for tandem - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod remote;
pub mod ssh;
pub mod sync;
pub mod types;
