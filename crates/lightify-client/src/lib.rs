//! CLI, configuration, output rendering and commands
//!
//! This crate provides the `lightify` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use error::{ClientError, ClientResult};
