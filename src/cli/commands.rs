use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use super::demo::demo_app;
use crate::config::AppConfig;

/// Command-line interface for flagon
#[derive(Parser, Debug)]
#[command(name = "flagon")]
#[command(about = "flagon web microframework", version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the demo application
    Serve {
        /// Address and port to bind the server to
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: String,

        /// YAML configuration file
        #[arg(short, long, env = "FLAGON_CONFIG")]
        config: Option<PathBuf>,

        /// Enable debug mode (overrides the configuration)
        #[arg(long, default_value_t = false)]
        debug: bool,
    },
    /// Print the demo application's URL rules
    Routes {
        /// YAML configuration file
        #[arg(short, long, env = "FLAGON_CONFIG")]
        config: Option<PathBuf>,
    },
}

/// Load the configuration file (or defaults) and apply environment overrides.
///
/// # Errors
///
/// Unreadable or invalid file, or an invalid override.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_yaml_file(path)?,
        None => AppConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

/// Parse arguments and run the selected command.
///
/// # Errors
///
/// Whatever the command fails with.
pub fn run_cli() -> anyhow::Result<()> {
    execute(Cli::parse())
}

/// Run an already parsed command line.
///
/// # Errors
///
/// Configuration, setup or bind failures.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve {
            addr,
            config,
            debug,
        } => {
            let mut config = load_config(config.as_deref())?;
            if debug {
                config.debug = true;
            }
            let app = demo_app(config)?.into_shared();
            let handle = app
                .run(addr.as_str())
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(addr = %handle.addr(), debug = app.debug(), "Serving demo application");
            println!("flagon: listening on http://{}", handle.addr());
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("server coroutine panicked"))?;
        }
        Commands::Routes { config } => {
            let app = demo_app(load_config(config.as_deref())?)?;
            app.router().dump_routes();
        }
    }
    Ok(())
}
