//! Prometheus counters fed from run summaries.

use std::fs;
use std::io;
use std::path::Path;

use iplog_core::{RejectionKind, RunSummary};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics registry error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("failed to write metrics: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub packets_seen: IntCounter,
    pub packets_skipped: IntCounter,
    pub records_written: IntCounter,
    pub records_rejected: IntCounterVec,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let packets_seen = IntCounter::new(
            "iplog_packets_seen_total",
            "Packets pulled from capture sources",
        )?;
        let packets_skipped = IntCounter::new(
            "iplog_packets_skipped_total",
            "Packets without an IPv4 layer",
        )?;
        let records_written = IntCounter::new(
            "iplog_records_written_total",
            "Records appended to the record log",
        )?;
        let records_rejected = IntCounterVec::new(
            Opts::new("iplog_records_rejected_total", "Packets rejected by the normalizer"),
            &["reason"],
        )?;

        registry.register(Box::new(packets_seen.clone()))?;
        registry.register(Box::new(packets_skipped.clone()))?;
        registry.register(Box::new(records_written.clone()))?;
        registry.register(Box::new(records_rejected.clone()))?;

        // Both reasons show up in the exposition even when zero.
        for kind in [RejectionKind::MalformedField, RejectionKind::InvariantViolation] {
            records_rejected.with_label_values(&[kind.as_str()]);
        }

        Ok(Self {
            registry,
            packets_seen,
            packets_skipped,
            records_written,
            records_rejected,
        })
    }

    pub fn record_run(&self, summary: &RunSummary) {
        self.packets_seen.inc_by(summary.packets_seen);
        self.packets_skipped.inc_by(summary.packets_skipped);
        self.records_written.inc_by(summary.records_written);
        for (kind, count) in summary.rejections.iter() {
            self.records_rejected
                .with_label_values(&[kind.as_str()])
                .inc_by(count);
        }
    }

    pub fn gather_metrics(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Writes the text exposition to `path`, replacing previous content.
    pub fn write_to(&self, path: &Path) -> Result<(), MetricsError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.gather_metrics()?)?;
        debug!(path = %path.display(), "metrics written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> RunSummary {
        let mut summary = RunSummary {
            packets_seen: 12,
            packets_skipped: 3,
            records_written: 6,
            ..Default::default()
        };
        summary.record_rejection(RejectionKind::MalformedField);
        summary.record_rejection(RejectionKind::MalformedField);
        summary.record_rejection(RejectionKind::InvariantViolation);
        summary
    }

    #[test]
    fn counters_accumulate_runs() {
        let metrics = MetricsRecorder::new().unwrap();
        metrics.record_run(&summary());
        metrics.record_run(&summary());

        assert_eq!(metrics.packets_seen.get(), 24);
        assert_eq!(metrics.packets_skipped.get(), 6);
        assert_eq!(metrics.records_written.get(), 12);
        assert_eq!(
            metrics
                .records_rejected
                .with_label_values(&["malformed_field"])
                .get(),
            4
        );
    }

    #[test]
    fn exposition_names_every_counter() {
        let metrics = MetricsRecorder::new().unwrap();
        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("iplog_packets_seen_total 0"));
        assert!(text.contains("iplog_records_rejected_total{reason=\"invariant_violation\"} 0"));
    }

    #[test]
    fn writes_exposition_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("metrics.prom");
        let metrics = MetricsRecorder::new().unwrap();
        metrics.record_run(&summary());
        metrics.write_to(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("iplog_records_written_total 6"));
    }
}
