//! # CLI Module
//!
//! Command-line entry points of the `flagon` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Serve the bundled demo application:
//!
//! ```bash
//! flagon serve --addr 127.0.0.1:5000 --config flagon.yaml --debug
//! ```
//!
//! Options:
//! - `--addr <ADDR>` - Address to bind (default: `127.0.0.1:5000`)
//! - `--config <FILE>` - YAML configuration (also `FLAGON_CONFIG`)
//! - `--debug` - Force debug mode
//!
//! ### `routes`
//!
//! Print the demo application's URL rules:
//!
//! ```bash
//! flagon routes
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use flagon::cli::{execute, Cli};
//! use clap::Parser;
//!
//! execute(Cli::parse())?;
//! ```

mod commands;
mod demo;


pub use commands::{execute, load_config, run_cli, Cli, Commands};
pub use demo::demo_app;
