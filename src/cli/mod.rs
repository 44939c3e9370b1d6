pub mod args;
pub mod client;
pub mod fleet;

pub use args::{Cli, CliCommand};
pub use client::FleetClient;
pub use fleet::{handle_add_command, handle_adjust_command, handle_status_command};
