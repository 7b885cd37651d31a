//! Server configuration
//!
//! Sources, later ones winning: built-in defaults, a JSON config file,
//! environment variables, command-line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use cadence_runtime::EngineConfig;
use cadence_transport::DEFAULT_CONNECT_TIMEOUT;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Config file read when `--config` is not given, if present
pub const DEFAULT_CONFIG_FILE: &str = "cadence.json";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[command(name = "cadence-server", about = "Per-client event processing server", version)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[arg(long, env = "CADENCE_LISTEN", help = "Address to accept client connections on.")]
    pub listen: Option<SocketAddr>,

    #[arg(long = "config", env = "CADENCE_CONFIG", help = "Path to the JSON configuration file.")]
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    #[arg(
        long,
        env = "CADENCE_MAX_WAIT_TIME",
        help = "Initial QoS bound of every engine, in seconds."
    )]
    pub max_wait_time: Option<f64>,

    #[arg(
        long,
        env = "CADENCE_BUFFER_TIME_MS",
        help = "Re-sort cadence of the pending queues, in milliseconds."
    )]
    pub buffer_time_ms: Option<u64>,

    #[arg(
        long,
        env = "CADENCE_LOG_LEVEL",
        help = "Log level or filter directive; RUST_LOG overrides it."
    )]
    pub log_level: Option<String>,

    #[arg(long, env = "CADENCE_LOG_JSON", help = "Emit logs as JSON lines (true/false).")]
    pub log_json: Option<bool>,

    #[arg(
        long,
        env = "CADENCE_ACTUATOR_TIMEOUT_MS",
        help = "Connect timeout for actuator control, in milliseconds."
    )]
    pub actuator_timeout_ms: Option<u64>,
}

impl Config {
    /// Built-in defaults
    pub fn defaults() -> Self {
        let engine = EngineConfig::default();
        Config {
            listen: Some(SocketAddr::from(([0, 0, 0, 0], 7400))),
            config_path: None,
            max_wait_time: Some(engine.max_wait_time),
            buffer_time_ms: Some(engine.buffer_time.as_millis() as u64),
            log_level: Some("info".to_string()),
            log_json: Some(false),
            actuator_timeout_ms: Some(DEFAULT_CONNECT_TIMEOUT.as_millis() as u64),
        }
    }

    /// `other` overrides `self` wherever it is set
    pub fn merge(self, other: Config) -> Config {
        Config {
            listen: other.listen.or(self.listen),
            config_path: other.config_path.or(self.config_path),
            max_wait_time: other.max_wait_time.or(self.max_wait_time),
            buffer_time_ms: other.buffer_time_ms.or(self.buffer_time_ms),
            log_level: other.log_level.or(self.log_level),
            log_json: other.log_json.or(self.log_json),
            actuator_timeout_ms: other.actuator_timeout_ms.or(self.actuator_timeout_ms),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub listen: SocketAddr,
    pub engine: EngineConfig,
    pub log_level: String,
    pub log_json: bool,
    pub actuator_timeout: Duration,
}

impl Settings {
    pub fn resolve(config: Config) -> Result<Self> {
        let config = Config::defaults().merge(config);

        let max_wait_time = config.max_wait_time.unwrap_or_default();
        ensure!(
            max_wait_time.is_finite() && max_wait_time >= 0.0,
            "max wait time must be a finite, non-negative number of seconds: {max_wait_time}"
        );

        let engine = EngineConfig {
            max_wait_time,
            buffer_time: Duration::from_millis(config.buffer_time_ms.unwrap_or_default()),
            ..EngineConfig::default()
        };

        Ok(Settings {
            listen: config
                .listen
                .context("no listen address configured")?,
            engine,
            log_level: config.log_level.unwrap_or_else(|| "info".to_string()),
            log_json: config.log_json.unwrap_or(false),
            actuator_timeout: Duration::from_millis(config.actuator_timeout_ms.unwrap_or_default()),
        })
    }
}

/// Merge defaults, the config file and `cli` (which already carries env vars)
pub fn load(cli: Config) -> Result<Settings> {
    let file = match &cli.config_path {
        Some(path) => Some(Config::from_file(path)?),
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                Some(Config::from_file(path)?)
            } else {
                None
            }
        }
    };

    let merged = Config::defaults().merge(file.unwrap_or_default()).merge(cli);
    Settings::resolve(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let settings = Settings::resolve(Config::default()).unwrap();
        assert_eq!(settings.listen.port(), 7400);
        assert_eq!(settings.engine, EngineConfig::default());
        assert_eq!(settings.log_level, "info");
        assert!(!settings.log_json);
        assert_eq!(settings.actuator_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: Config = serde_json::from_str(
            r#"{"listen":"127.0.0.1:9000","max_wait_time":1.5,"log_json":true}"#,
        )
        .unwrap();
        let cli = Config::try_parse_from(["cadence-server", "--max-wait-time", "0.25"]).unwrap();

        let settings = Settings::resolve(Config::defaults().merge(file).merge(cli)).unwrap();
        assert_eq!(settings.listen, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.engine.max_wait_time, 0.25);
        assert!(settings.log_json);
    }

    #[test]
    fn test_negative_wait_time_rejected() {
        let cli = Config::try_parse_from(["cadence-server", "--max-wait-time=-1"]).unwrap();
        assert!(Settings::resolve(cli).is_err());
    }

    #[test]
    fn test_infinite_wait_time_rejected() {
        let cli = Config::try_parse_from(["cadence-server", "--max-wait-time", "inf"]).unwrap();
        assert_eq!(cli.max_wait_time, Some(f64::INFINITY));
        assert!(Settings::resolve(cli).is_err());
    }

    #[test]
    fn test_unknown_file_keys_rejected() {
        assert!(serde_json::from_str::<Config>(r#"{"max_wait":2}"#).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let cli = Config::try_parse_from([
            "cadence-server",
            "--config",
            "/nonexistent/cadence-test.json",
        ])
        .unwrap();
        assert!(load(cli).is_err());
    }
}
