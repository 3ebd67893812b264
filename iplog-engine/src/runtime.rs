//! # Extraction runtime
//!
//! Ties the pipeline together for frontends: discovers captures, opens the
//! record log once, runs the dispatcher over every capture in order, writes
//! per-capture snapshots and feeds the metrics recorder.

use std::fmt;
use std::path::{Path, PathBuf};

use iplog_capture::PcapFileSource;
use iplog_config::IplogConfig;
use iplog_core::{Dispatcher, JsonLinesSink, PipelineError, RunSummary};
use iplog_export::{read_log, write_snapshot, SnapshotOptions};
use iplog_telemetry::MetricsRecorder;
use tracing::{info, info_span, instrument};

use crate::discover::discover_captures;
use crate::error::EngineError;

/// Outcome for one capture file.
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub capture: PathBuf,
    pub summary: RunSummary,
    pub snapshot: Option<PathBuf>,
}

impl fmt::Display for CaptureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.capture.display(), self.summary)?;
        if let Some(snapshot) = &self.snapshot {
            write!(f, " -> {}", snapshot.display())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub captures: Vec<CaptureReport>,
    pub total: RunSummary,
}

/// Runs the full extraction described by `config`.
///
/// Every capture is opened before the record log is touched, so a capture
/// that cannot be opened leaves an existing log as it was and creates none.
/// Captures are then processed one after another into the same record log.
/// The first fatal error stops the run; entries already appended stay on disk.
#[instrument(level = "info", name = "run_extraction", skip_all)]
pub fn run_extraction(
    config: &IplogConfig,
    metrics: &MetricsRecorder,
) -> Result<ExtractionReport, EngineError> {
    let extract = &config.extract;
    let captures = discover_captures(&extract.source_path)?;
    info!(
        source = %extract.source_path.display(),
        captures = captures.len(),
        parallelism = %extract.parallelism,
        "starting extraction"
    );

    let sources = captures
        .into_iter()
        .map(|capture| match PcapFileSource::open(&capture) {
            Ok(source) => Ok((capture, source)),
            Err(e) => Err(EngineError::Pipeline {
                capture,
                source: PipelineError::SourceOpen(e),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;
    let snapshots = match &config.export.snapshot_dir {
        Some(dir) => Some((dir.as_path(), SnapshotOptions::from_config(&config.export)?)),
        None => None,
    };
    let sink = JsonLinesSink::open(&extract.sink_path, extract.sink_mode)?;

    let mut report = ExtractionReport::default();
    for (capture, mut source) in sources {
        let _span = info_span!("capture", path = %capture.display()).entered();

        let summary = Dispatcher::new(&sink, extract.parallelism)
            .with_queue_depth(extract.queue_depth)
            .run(&mut source)
            .map_err(|source| EngineError::Pipeline {
                capture: capture.clone(),
                source,
            })?;
        metrics.record_run(&summary);

        let snapshot = match &snapshots {
            Some((dir, options)) => Some(snapshot_log(&extract.sink_path, dir, &capture, options)?),
            None => None,
        };

        report.total.merge(&summary);
        report.captures.push(CaptureReport {
            capture,
            summary,
            snapshot,
        });
    }

    if let Some(path) = &config.telemetry.metrics_path {
        metrics.write_to(path)?;
    }

    info!(total = %report.total, "extraction finished");
    Ok(report)
}

/// Snapshots the log as it stands after `capture` into `<dir>/<capture stem>.parquet`.
fn snapshot_log(
    log: &Path,
    dir: &Path,
    capture: &Path,
    options: &SnapshotOptions,
) -> Result<PathBuf, EngineError> {
    let stem = capture
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "capture".to_string());
    let out = dir.join(format!("{stem}.parquet"));

    let records = read_log(log)?;
    write_snapshot(&records, &out, options)?;
    Ok(out)
}
