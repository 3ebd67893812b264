//! Concurrent extraction dispatcher.
//!
//! The calling thread is the single coordinator: it pulls the packet source,
//! drops packets without an IP layer and hands the rest to a pool of scoped
//! worker threads over a bounded channel. Workers normalize and append to the
//! shared sink. With one worker everything runs inline, so append order equals
//! decode order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam::channel::{self, Sender};
use iplog_capture::{DecodedPacket, IpLayer, PacketSource, Transport};
use iplog_config::Parallelism;
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::error::PipelineError;
use crate::normalize::normalize;
use crate::sink::{RecordSink, SinkError};
use crate::summary::RunSummary;

pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// One IP-bearing packet on its way to a worker.
#[derive(Debug)]
struct WorkItem {
    timestamp: f64,
    ip: IpLayer,
    transport: Transport,
}

impl WorkItem {
    fn from_packet(packet: DecodedPacket) -> Option<Self> {
        let ip = packet.ip?;
        Some(Self {
            timestamp: packet.timestamp,
            ip,
            transport: packet.transport,
        })
    }
}

/// Drives one capture through normalizer and sink.
pub struct Dispatcher<'s, S: RecordSink + ?Sized> {
    sink: &'s S,
    parallelism: Parallelism,
    queue_depth: usize,
}

impl<'s, S: RecordSink + ?Sized> Dispatcher<'s, S> {
    pub fn new(sink: &'s S, parallelism: Parallelism) -> Self {
        Self {
            sink,
            parallelism,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }

    pub fn with_queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }

    /// Drains `source` completely and returns once every worker has finished
    /// and the sink has been flushed.
    ///
    /// Per-packet rejections are counted in the summary. Source read errors,
    /// sink failures and worker panics abort the run.
    #[instrument(skip_all, fields(workers = self.parallelism.resolve()))]
    pub fn run<P: PacketSource + ?Sized>(
        &self,
        source: &mut P,
    ) -> Result<RunSummary, PipelineError> {
        let started = Instant::now();
        let workers = self.parallelism.resolve();

        let mut summary = if workers <= 1 {
            self.run_sequential(source)?
        } else {
            self.run_parallel(source, workers)?
        };

        self.sink.flush()?;
        summary.elapsed = started.elapsed();
        info!(%summary, "capture processed");
        Ok(summary)
    }

    fn run_sequential<P: PacketSource + ?Sized>(
        &self,
        source: &mut P,
    ) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();
        while let Some(next) = source.next_packet() {
            let packet = next.map_err(PipelineError::SourceRead)?;
            summary.packets_seen += 1;
            match WorkItem::from_packet(packet) {
                Some(item) => process(self.sink, &item, &mut summary)?,
                None => summary.packets_skipped += 1,
            }
        }
        Ok(summary)
    }

    fn run_parallel<P: PacketSource + ?Sized>(
        &self,
        source: &mut P,
        workers: usize,
    ) -> Result<RunSummary, PipelineError> {
        let abort = AtomicBool::new(false);
        let failure: Mutex<Option<SinkError>> = Mutex::new(None);

        thread::scope(|scope| -> Result<RunSummary, PipelineError> {
            // Created inside the scope so an early return disconnects the
            // workers before the scope joins them.
            let (tx, rx) = channel::bounded::<WorkItem>(self.queue_depth);

            let mut handles = Vec::with_capacity(workers);
            for id in 0..workers {
                let rx = rx.clone();
                let (abort, failure, sink) = (&abort, &failure, self.sink);
                let handle = thread::Builder::new()
                    .name(format!("iplog-worker-{id}"))
                    .spawn_scoped(scope, move || {
                        let mut local = RunSummary::default();
                        for item in rx.iter() {
                            if abort.load(Ordering::Acquire) {
                                break;
                            }
                            if let Err(e) = process(sink, &item, &mut local) {
                                error!(error = %e, "append failed, aborting run");
                                failure.lock().get_or_insert(e);
                                abort.store(true, Ordering::Release);
                                break;
                            }
                        }
                        local
                    })?;
                handles.push(handle);
            }
            drop(rx);

            let mut summary = RunSummary::default();
            let fed = feed(source, &tx, &abort, &mut summary);
            drop(tx);

            let mut panicked = None;
            for handle in handles {
                let name = handle.thread().name().unwrap_or("worker").to_string();
                match handle.join() {
                    Ok(local) => summary.merge(&local),
                    Err(_) => {
                        error!(worker = %name, "worker panicked");
                        panicked.get_or_insert(name);
                    }
                }
            }

            if let Some(e) = failure.lock().take() {
                return Err(PipelineError::SinkWrite(e));
            }
            fed?;
            if let Some(name) = panicked {
                return Err(PipelineError::WorkerPanicked(name));
            }
            debug!(workers, "all workers joined");
            Ok(summary)
        })
    }
}

/// Coordinator loop. Stops early when a worker aborted or every worker is gone.
fn feed<P: PacketSource + ?Sized>(
    source: &mut P,
    tx: &Sender<WorkItem>,
    abort: &AtomicBool,
    summary: &mut RunSummary,
) -> Result<(), PipelineError> {
    while !abort.load(Ordering::Acquire) {
        let Some(next) = source.next_packet() else {
            break;
        };
        let packet = next.map_err(PipelineError::SourceRead)?;
        summary.packets_seen += 1;

        let Some(item) = WorkItem::from_packet(packet) else {
            summary.packets_skipped += 1;
            continue;
        };
        if tx.send(item).is_err() {
            debug!("no worker left to receive, stopping feed");
            break;
        }
    }
    Ok(())
}

fn process<S: RecordSink + ?Sized>(
    sink: &S,
    item: &WorkItem,
    summary: &mut RunSummary,
) -> Result<(), SinkError> {
    match normalize(&item.ip, &item.transport, item.timestamp) {
        Ok(record) => {
            sink.append(&record)?;
            summary.records_written += 1;
        }
        Err(rejection) => {
            warn!(
                kind = %rejection.kind,
                field = rejection.field,
                timestamp = rejection.timestamp,
                src = %rejection.src,
                dst = %rejection.dst,
                detail = %rejection.detail,
                "packet rejected"
            );
            summary.record_rejection(rejection.kind);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::RejectionKind;
    use crate::record::PacketRecord;
    use crate::sink::JsonLinesSink;
    use iplog_capture::{CaptureError, PortPair, ReplaySource};
    use std::io;
    use tracing_test::traced_test;

    fn ip_packet(seq: u32, dsfield: &str, flags_rb: u8) -> DecodedPacket {
        DecodedPacket {
            timestamp: f64::from(seq),
            wire_len: 78,
            ip: Some(IpLayer {
                dsfield_dscp: 0,
                hdr_len: 20,
                dsfield: dsfield.to_string(),
                dsfield_ecn: 0,
                len: 64,
                proto: 17,
                flags_df: 0,
                flags_mf: 0,
                flags_rb,
                frag_offset: 0,
                ttl: 64,
                src: "172.16.0.1".into(),
                dst: "172.16.0.2".into(),
            }),
            transport: Transport {
                udp: Some(PortPair::new(1000, (seq % 65536) as u16)),
                tcp: None,
            },
        }
    }

    fn mixed_capture(n: u32) -> Vec<DecodedPacket> {
        (0..n)
            .map(|i| match i % 10 {
                0 => DecodedPacket::opaque(f64::from(i)),
                1 => ip_packet(i, "zz", 0),
                2 => ip_packet(i, "0x00", 1),
                _ => ip_packet(i, "0x10", 0),
            })
            .collect()
    }

    #[test]
    fn sequential_run_counts_everything() {
        let sink = JsonLinesSink::new(Vec::new());
        let mut source = ReplaySource::new(mixed_capture(100));
        let summary = Dispatcher::new(&sink, Parallelism::sequential())
            .run(&mut source)
            .unwrap();

        assert_eq!(summary.packets_seen, 100);
        assert_eq!(summary.packets_skipped, 10);
        assert_eq!(summary.rejected, 20);
        assert_eq!(summary.records_written, 70);
        assert_eq!(sink.appended(), 70);
    }

    #[test]
    fn sequential_run_keeps_decode_order() {
        let sink = JsonLinesSink::new(Vec::new());
        let mut source = ReplaySource::new(mixed_capture(50));
        Dispatcher::new(&sink, Parallelism::sequential())
            .run(&mut source)
            .unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let timestamps: Vec<f64> = out
            .lines()
            .map(|l| serde_json::from_str::<PacketRecord>(l).unwrap().sniff_timestamp)
            .collect();
        let mut sorted = timestamps.clone();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(timestamps, sorted);
    }

    #[test]
    fn parallel_run_matches_counts() {
        let sink = JsonLinesSink::new(Vec::new());
        let mut source = ReplaySource::new(mixed_capture(1000));
        let summary = Dispatcher::new(&sink, Parallelism::fixed(4).unwrap())
            .with_queue_depth(8)
            .run(&mut source)
            .unwrap();

        assert_eq!(summary.packets_seen, 1000);
        assert_eq!(summary.packets_skipped, 100);
        assert_eq!(summary.records_written, 700);
        assert_eq!(summary.rejected, 200);
        assert_eq!(sink.appended(), 700);
    }

    struct FailingSink;

    impl RecordSink for FailingSink {
        fn append(&self, _: &PacketRecord) -> Result<(), SinkError> {
            Err(SinkError::Write(io::Error::other("disk full")))
        }

        fn flush(&self) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[test]
    fn sink_failure_is_fatal() {
        for parallelism in [Parallelism::sequential(), Parallelism::fixed(3).unwrap()] {
            let mut source = ReplaySource::new(mixed_capture(500));
            let result = Dispatcher::new(&FailingSink, parallelism).run(&mut source);
            assert!(matches!(result, Err(PipelineError::SinkWrite(_))));
        }
    }

    struct BrokenSource {
        remaining: u32,
    }

    impl PacketSource for BrokenSource {
        fn next_packet(&mut self) -> Option<Result<DecodedPacket, CaptureError>> {
            if self.remaining == 0 {
                return Some(Err(CaptureError::Read {
                    path: "broken.pcap".into(),
                    source: pcap::Error::PcapError("truncated record".into()),
                }));
            }
            self.remaining -= 1;
            Some(Ok(ip_packet(self.remaining, "0x00", 0)))
        }
    }

    #[test]
    fn source_read_error_is_fatal() {
        for parallelism in [Parallelism::sequential(), Parallelism::fixed(2).unwrap()] {
            let sink = JsonLinesSink::new(Vec::new());
            let mut source = BrokenSource { remaining: 5 };
            let result = Dispatcher::new(&sink, parallelism).run(&mut source);
            assert!(matches!(result, Err(PipelineError::SourceRead(_))));
        }
    }

    #[traced_test]
    #[test]
    fn rejections_are_logged_with_packet_context() {
        let sink = JsonLinesSink::new(Vec::new());
        let mut source = ReplaySource::new(vec![ip_packet(7, "0x00", 1)]);
        let summary = Dispatcher::new(&sink, Parallelism::sequential())
            .run(&mut source)
            .unwrap();

        assert_eq!(summary.rejections.get(RejectionKind::InvariantViolation), 1);
        assert!(logs_contain("packet rejected"));
        assert!(logs_contain("invariant_violation"));
        assert!(logs_contain("172.16.0.1"));
    }

    #[test]
    fn empty_source() {
        let sink = JsonLinesSink::new(Vec::new());
        let summary = Dispatcher::new(&sink, Parallelism::Auto)
            .run(&mut ReplaySource::default())
            .unwrap();
        assert_eq!(summary.packets_seen, 0);
        assert!(sink.into_inner().is_empty());
    }
}
