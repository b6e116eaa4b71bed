//! CLI argument definitions for the Wayfarer server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::Parser;
use wayfarer_core::config::WayfarerConfig;

/// Wayfarer: a travel assistant backend that routes questions to weather,
/// exchange, flight and booking-form capabilities.
#[derive(Parser, Debug)]
#[command(name = "wayfarer", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Address to bind the API server to.
    #[arg(long = "host")]
    pub host: Option<String>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// JSON file defining the booking form fields.
    #[arg(long = "form-schema")]
    pub form_schema: Option<PathBuf>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > WAYFARER_CONFIG env var > ~/.wayfarer/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("WAYFARER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Apply the flags that were given on top of `config`.
    pub fn apply_to(&self, config: &mut WayfarerConfig) {
        if let Some(ref host) = self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref level) = self.log_level {
            config.logging.level = level.clone();
        }
        if let Some(ref schema) = self.form_schema {
            config.form.schema_path = Some(schema.to_string_lossy().to_string());
        }
    }
}

fn default_config_path() -> PathBuf {
    wayfarer_core::config::expand_home("~/.wayfarer/config.toml")
}
