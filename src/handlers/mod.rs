//! Command handler modules
//!
//! One module per CLI command area; `main.rs` only parses arguments and
//! dispatches here.

pub mod check;
pub mod config;
pub mod operation;

pub use check::handle_check;
pub use config::handle_config;
pub use operation::{handle_poll, handle_token, TokenArgs};
