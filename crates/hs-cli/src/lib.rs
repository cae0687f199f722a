//! Heartsync CLI library.
//!
//! This crate provides the command implementations behind the `hs` binary.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands};
pub use config::Config;
