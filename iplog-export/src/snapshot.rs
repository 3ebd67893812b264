//! Parquet snapshot writer and reader.

use std::fmt;
use std::fs::{self, File};
use std::path::Path;
use std::str::FromStr;

use iplog_config::ExportConfig;
use iplog_core::PacketRecord;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::{debug, info};

use crate::error::ExportError;
use crate::schema::{record_schema, records_from_batch, records_to_batch};

/// Parquet page compression.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    #[default]
    Snappy,
    Zstd,
    None,
}

impl FromStr for Codec {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snappy" => Ok(Codec::Snappy),
            "zstd" => Ok(Codec::Zstd),
            "none" => Ok(Codec::None),
            other => Err(ExportError::Codec(other.to_string())),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Snappy => f.write_str("snappy"),
            Codec::Zstd => f.write_str("zstd"),
            Codec::None => f.write_str("none"),
        }
    }
}

impl From<Codec> for Compression {
    fn from(codec: Codec) -> Self {
        match codec {
            Codec::Snappy => Compression::SNAPPY,
            Codec::Zstd => Compression::ZSTD(ZstdLevel::default()),
            Codec::None => Compression::UNCOMPRESSED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    /// Rows per record batch, and per row group flush.
    pub batch_size: usize,
    pub codec: Codec,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            codec: Codec::default(),
        }
    }
}

impl SnapshotOptions {
    pub fn from_config(config: &ExportConfig) -> Result<Self, ExportError> {
        Ok(Self {
            batch_size: config.batch_size.max(1),
            codec: config.compression.parse()?,
        })
    }
}

/// Writes `records` as a Parquet file at `path`, replacing any existing file.
/// Returns the number of rows written.
pub fn write_snapshot(
    records: &[PacketRecord],
    path: &Path,
    options: &SnapshotOptions,
) -> Result<usize, ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path).map_err(|source| ExportError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let props = WriterProperties::builder()
        .set_compression(options.codec.into())
        .build();
    let mut writer = ArrowWriter::try_new(file, record_schema(), Some(props))?;

    for chunk in records.chunks(options.batch_size.max(1)) {
        writer.write(&records_to_batch(chunk)?)?;
        debug!(rows = chunk.len(), "wrote record batch");
    }
    writer.close()?;

    info!(path = %path.display(), rows = records.len(), codec = %options.codec, "snapshot written");
    Ok(records.len())
}

/// Loads every row of a snapshot back into records.
pub fn read_snapshot(path: &Path) -> Result<Vec<PacketRecord>, ExportError> {
    let file = File::open(path).map_err(|source| ExportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        records.extend(records_from_batch(&batch?)?);
    }
    Ok(records)
}
