// ABOUTME: Command module aggregator for the tandem CLI.
// ABOUTME: Re-exports the deploy, verify, logs, push-file, exec, and status handlers.

mod connection;
mod deploy;
mod exec;
mod logs;
mod push_file;
mod status;
mod verify;

pub use deploy::deploy;
pub use exec::exec;
pub use logs::logs;
pub use push_file::{PushRequest, push_file};
pub use status::status;
pub use verify::verify;
