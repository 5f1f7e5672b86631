//! Process settings read from an optional `cellar.toml`, and the tracing
//! subscriber setup for embedders that want the crate's structured logs.

use config::{Config, File};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::{CellarError, Result};
use crate::schema::MIN_FAN_OUT;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default B-tree degree for range indexes when the schema descriptor
    /// does not carry one.
    pub range_fan_out: usize,
    /// Log filter directive, overridable by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            range_fan_out: 8,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads `cellar.toml` from the working directory, falling back to
    /// defaults when the file is absent.
    pub fn load() -> Result<Self> {
        Self::from_file("cellar")
    }

    pub fn from_file(basename: &str) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name(basename).required(false))
            .build()
            .map_err(|e| CellarError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CellarError::Config(e.to_string()))?;
        if settings.range_fan_out < MIN_FAN_OUT {
            return Err(CellarError::Config(format!(
                "range_fan_out {} is below the minimum {}",
                settings.range_fan_out, MIN_FAN_OUT
            )));
        }
        Ok(settings)
    }
}

/// Installs a fmt subscriber honouring `RUST_LOG`, falling back to the
/// configured filter. Safe to call once per process; embedders with their
/// own subscriber should skip it.
pub fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.clone()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
