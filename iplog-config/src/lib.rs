//! # iplog Configuration System
//!
//! Layered configuration for the packet extraction pipeline.
//!
//! ## Hierarchy
//! 1. Built-in defaults
//! 2. `iplog.yaml` in the working directory, or an explicit file
//! 3. `IPLOG_*` environment variables, nested with `__`
//!    (e.g. `IPLOG_EXTRACT__PARALLELISM=1`)
//!
//! Command-line flags are applied by the binary on top of the loaded value,
//! followed by [`IplogConfig::finish`] to re-run validation.

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod export;
mod extract;
mod telemetry;
mod validation;

pub use error::ConfigError;
pub use export::ExportConfig;
pub use extract::{ExtractConfig, Parallelism, SinkMode};
pub use telemetry::TelemetryConfig;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "iplog.yaml";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct IplogConfig {
    /// Extraction pipeline (parallelism, source, sink).
    #[validate(nested)]
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Columnar snapshot export.
    #[validate(nested)]
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl IplogConfig {
    /// Load configuration from defaults, a YAML file and the environment.
    ///
    /// With `path = None` the default file is merged only if it exists; an
    /// explicit path that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(IplogConfig::default()));

        match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::FileNotFound(PathBuf::from(path)));
            }
            Some(path) => figment = figment.merge(Yaml::file(path)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                figment = figment.merge(Yaml::file(DEFAULT_CONFIG_FILE));
            }
            None => {}
        }

        Self::extract(figment.merge(Env::prefixed("IPLOG_").split("__")))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        figment
            .extract()
            .map_err(ConfigError::from)
            .and_then(Self::finish)
    }

    /// Validates a configuration after programmatic overrides.
    pub fn finish(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}
