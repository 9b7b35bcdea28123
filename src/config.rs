use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub collections: CollectionsConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct CollectionsConfig {
    /// Directory holding `collections.json` and
    /// `singularly_available_markets.json`.
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Price edges net of taker fees.
    pub fees: bool,
    /// Track per-edge volume depths.
    pub depth: bool,
    /// Yield only node-disjoint cycles.
    pub unique_paths: bool,
    /// Stagger between bulk-scan opportunity dispatches, milliseconds.
    pub opportunity_interval_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            fees: true,
            depth: false,
            unique_paths: true,
            opportunity_interval_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.collections.dir.as_os_str().is_empty() {
            return Err(Error::Config("collections.dir cannot be empty".into()));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(Error::Config(format!(
                "unknown logging format {:?} (expected \"pretty\" or \"json\")",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Install the global tracing subscriber according to
    /// `self.logging`. `RUST_LOG` overrides the configured level.
    pub fn init_logging(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.logging.level.clone()));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if self.logging.format == "json" {
            let _ = builder.json().try_init();
        } else {
            let _ = builder.try_init();
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collections: CollectionsConfig {
                dir: PathBuf::from("./collections"),
            },
            scan: ScanConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
