//! CLI commands.

pub mod config;
pub mod object;
pub mod preview;
pub mod session;
