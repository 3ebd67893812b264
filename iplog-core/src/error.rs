use std::io;

use iplog_capture::CaptureError;
use thiserror::Error;

use crate::sink::SinkError;

/// Resource-level failures. Any of these ends the run for the capture.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot open capture source: {0}")]
    SourceOpen(#[source] CaptureError),

    #[error("capture source failed mid-stream: {0}")]
    SourceRead(#[source] CaptureError),

    #[error("record sink failed: {0}")]
    SinkWrite(#[from] SinkError),

    #[error("worker thread {0} panicked")]
    WorkerPanicked(String),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}
