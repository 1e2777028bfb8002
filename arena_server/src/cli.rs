//! Command-line arguments for the `arena-server` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigError, ServerConfig};

/// Arena server command-line arguments.
///
/// CLI values override settings loaded from the `--config` file.
#[derive(Parser, Debug, Default)]
#[command(name = "arena-server", about = "Tic-tac-toe matchmaking server")]
pub struct CliArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Interface to listen on.
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Scheduler tick in milliseconds.
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Maximum concurrent sessions (1 = one game at a time).
    #[arg(long)]
    pub max_sessions: Option<usize>,

    /// Fixed PRNG seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log filter (error, warn, info, debug, trace, or a full directive).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl CliArgs {
    /// Load the config file (if any), apply overrides, and validate.
    pub fn resolve(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        config.apply_cli_overrides(self);
        config.validate()?;
        Ok(config)
    }
}

impl ServerConfig {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref host) = args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(tick_ms) = args.tick_ms {
            self.tick_ms = tick_ms;
        }
        if let Some(max_sessions) = args.max_sessions {
            self.max_sessions = max_sessions;
        }
        if args.seed.is_some() {
            self.seed = args.seed;
        }
        if let Some(ref level) = args.log_level {
            self.log_level = level.clone();
        }
    }
}
