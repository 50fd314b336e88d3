//! BlueMsg CLI library
//!
//! Terminal front end for the BlueMsg runtime: argument parsing, layered
//! configuration, the line-oriented chat interface and a simulated demo.

pub mod cli;
pub mod commands;
pub mod config;
pub mod demo;
pub mod error;
pub mod terminal_interface;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::{CliAppConfig, CliConfig, ConfigError};
pub use error::{CliError, Result};
pub use terminal_interface::{parse_input, TerminalInterfaceTask, UIState, UserInput};
