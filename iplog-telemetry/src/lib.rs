//! # iplog Telemetry
//!
//! Structured logging setup and Prometheus counters for extraction runs.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::{MetricsError, MetricsRecorder};
