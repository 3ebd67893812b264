//! Columnar snapshot configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

/// Snapshot export parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ExportConfig {
    /// When set, a `<capture stem>.parquet` snapshot is written here after each capture.
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,

    /// Rows per Arrow record batch.
    #[validate(range(min = 1, max = 1048576))]
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Parquet codec (snappy, zstd, none).
    #[validate(custom(function = validation::validate_compression))]
    #[serde(default = "default_compression")]
    pub compression: String,
}

fn default_batch_size() -> usize {
    8192
}

fn default_compression() -> String {
    "snappy".into()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: None,
            batch_size: default_batch_size(),
            compression: default_compression(),
        }
    }
}
