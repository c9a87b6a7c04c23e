//! Command-line interface support
//!
//! Argument handling and command handlers for the `semantic-loader` binary.

pub mod commands;
pub mod error;
pub mod logging;
