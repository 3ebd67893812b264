use std::path::PathBuf;

use iplog_capture::CaptureError;
use iplog_config::ConfigError;
use iplog_core::{PipelineError, SinkError};
use iplog_export::ExportError;
use iplog_telemetry::MetricsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Capture source {0} does not exist")]
    SourceNotFound(PathBuf),

    #[error("No capture files (*.pcap, *.pcapng, *.cap) in {0}")]
    NoCaptures(PathBuf),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Extraction failed for {capture}: {source}")]
    Pipeline {
        capture: PathBuf,
        #[source]
        source: PipelineError,
    },

    #[error("Record log error: {0}")]
    Sink(#[from] SinkError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
