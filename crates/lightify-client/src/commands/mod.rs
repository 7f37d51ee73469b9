//! Subcommand implementations.

pub mod config;
pub mod gateway;
pub mod watch;
