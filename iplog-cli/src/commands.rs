use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use iplog_config::{IplogConfig, Parallelism, SinkMode};
use iplog_engine::{run_extraction, summarize_capture};
use iplog_export::{export_log, read_snapshot, SnapshotOptions};
use iplog_telemetry::{EventLogger, MetricsRecorder};

#[derive(Parser)]
#[command(name = "iplog", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract IP-layer records from a capture file or a directory of captures
    Extract(ExtractArgs),
    /// Convert a record log into a Parquet snapshot
    Export(ExportArgs),
    /// Summarize a capture file or a Parquet snapshot
    Info(InfoArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// Capture file or directory (defaults to the configured source_path)
    pub source: Option<PathBuf>,

    /// Record log destination
    #[arg(short, long)]
    pub sink: Option<PathBuf>,

    /// Worker count: a positive number, or -1/"auto" for every available CPU
    #[arg(short, long, value_parser = parse_jobs, allow_hyphen_values = true)]
    pub jobs: Option<Parallelism>,

    /// Truncate an existing record log
    #[arg(long, conflicts_with = "append")]
    pub overwrite: bool,

    /// Append to an existing record log
    #[arg(long)]
    pub append: bool,

    /// Write a Parquet snapshot per capture into this directory
    #[arg(long)]
    pub snapshot_dir: Option<PathBuf>,

    /// Write Prometheus counters to this file when done
    #[arg(long)]
    pub metrics: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Record log to convert
    pub log: PathBuf,

    /// Parquet output file
    pub out: PathBuf,

    /// snappy, zstd or none
    #[arg(long)]
    pub compression: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    /// Capture file, or a .parquet snapshot
    pub path: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Configuration file (defaults to ./iplog.yaml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long)]
    pub log_level: Option<String>,
}

impl CommonArgs {
    fn load(&self) -> anyhow::Result<IplogConfig> {
        let mut config = IplogConfig::load(self.config.as_deref())?;
        if let Some(level) = &self.log_level {
            config.telemetry.log_level = level.clone();
        }
        Ok(config)
    }
}

fn parse_jobs(raw: &str) -> Result<Parallelism, String> {
    if raw.eq_ignore_ascii_case("auto") {
        return Ok(Parallelism::Auto);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(Parallelism::from_jobs)
        .ok_or_else(|| format!("expected a positive number, -1 or \"auto\", got {raw:?}"))
}

pub fn extract(args: ExtractArgs) -> anyhow::Result<()> {
    let mut config = args.common.load()?;
    if let Some(source) = args.source {
        config.extract.source_path = source;
    }
    if let Some(sink) = args.sink {
        config.extract.sink_path = sink;
    }
    if let Some(jobs) = args.jobs {
        config.extract.parallelism = jobs;
    }
    if args.overwrite {
        config.extract.sink_mode = SinkMode::Truncate;
    } else if args.append {
        config.extract.sink_mode = SinkMode::Append;
    }
    if args.snapshot_dir.is_some() {
        config.export.snapshot_dir = args.snapshot_dir;
    }
    if args.metrics.is_some() {
        config.telemetry.metrics_path = args.metrics;
    }
    let config = config.finish()?;

    EventLogger::init(&config.telemetry.log_level);
    debug!(?config, "effective configuration");

    let metrics = MetricsRecorder::new()?;
    let report = run_extraction(&config, &metrics).with_context(|| {
        format!(
            "extraction from {} failed",
            config.extract.source_path.display()
        )
    })?;

    for capture in &report.captures {
        println!("{capture}");
    }
    if report.captures.len() > 1 {
        println!("total: {}", report.total);
    }
    Ok(())
}

pub fn export(args: ExportArgs) -> anyhow::Result<()> {
    let mut config = args.common.load()?;
    if let Some(compression) = args.compression {
        config.export.compression = compression;
    }
    let config = config.finish()?;
    EventLogger::init(&config.telemetry.log_level);

    let options = SnapshotOptions::from_config(&config.export)?;
    let rows = export_log(&args.log, &args.out, &options)
        .with_context(|| format!("failed to export {}", args.log.display()))?;
    println!("{rows} records -> {}", args.out.display());
    Ok(())
}

pub fn info(args: InfoArgs) -> anyhow::Result<()> {
    let config = args.common.load()?;
    EventLogger::init(&config.telemetry.log_level);

    let is_snapshot = args
        .path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    if is_snapshot {
        let records = read_snapshot(&args.path)?;
        let with_ports = records.iter().filter(|r| r.has_ports()).count();
        println!("snapshot:       {}", args.path.display());
        println!("records:        {}", records.len());
        println!("with ports:     {with_ports}");
        return Ok(());
    }

    let info = summarize_capture(&args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    println!("{info}");
    Ok(())
}
