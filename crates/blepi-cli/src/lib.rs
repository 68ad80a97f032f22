//! blepi CLI library
//!
//! Flag parsing, layered configuration and the demo PiSugar service tree
//! behind the `blepi` binary.

pub mod app;
pub mod cli;
pub mod config;
pub mod demo;
pub mod error;
pub mod simulate;

pub use app::{run, RunOptions, RunSummary};
pub use cli::Cli;
pub use config::{AppConfig, ConfigError};
pub use error::{CliError, Result};
