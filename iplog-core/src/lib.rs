//! # iplog-core
//!
//! Extraction pipeline: normalizes decoded IPv4 packets into
//! [`PacketRecord`]s, fans the work out over a worker pool and appends the
//! results to a shared newline-delimited JSON log.
//!
//! ### Key Submodules:
//! - `normalize`: pure field normalization and rejection reasons
//! - `dispatch`: single coordinator, bounded channel, scoped workers
//! - `sink`: append-only record log behind one critical section
//! - `summary`: run counters and the final report

pub mod dispatch;
pub mod error;
pub mod normalize;
pub mod record;
pub mod sink;
pub mod summary;

pub use dispatch::{Dispatcher, DEFAULT_QUEUE_DEPTH};
pub use error::PipelineError;
pub use normalize::{normalize, Rejection, RejectionKind};
pub use record::{PacketRecord, NO_PORT};
pub use sink::{JsonLinesSink, RecordSink, SinkError};
pub use summary::{RejectionTally, RunSummary};
