//! Per-run counters and the final report.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::normalize::RejectionKind;

/// Rejection counts keyed by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionTally(BTreeMap<RejectionKind, u64>);

impl RejectionTally {
    pub fn add(&mut self, kind: RejectionKind) {
        *self.0.entry(kind).or_default() += 1;
    }

    pub fn get(&self, kind: RejectionKind) -> u64 {
        self.0.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RejectionKind, u64)> + '_ {
        self.0.iter().map(|(kind, count)| (*kind, *count))
    }

    pub fn merge(&mut self, other: &RejectionTally) {
        for (kind, count) in other.iter() {
            *self.0.entry(kind).or_default() += count;
        }
    }
}

impl fmt::Display for RejectionTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        let mut first = true;
        for (kind, count) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{kind}={count}")?;
            first = false;
        }
        Ok(())
    }
}

/// Outcome of one dispatcher run, or the merged total of several.
///
/// On a successful run `packets_seen == packets_skipped + records_written + rejected`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub packets_seen: u64,
    /// Packets without an IP layer.
    pub packets_skipped: u64,
    pub records_written: u64,
    pub rejected: u64,
    pub rejections: RejectionTally,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn record_rejection(&mut self, kind: RejectionKind) {
        self.rejected += 1;
        self.rejections.add(kind);
    }

    pub fn merge(&mut self, other: &RunSummary) {
        self.packets_seen += other.packets_seen;
        self.packets_skipped += other.packets_skipped;
        self.records_written += other.records_written;
        self.rejected += other.rejected;
        self.rejections.merge(&other.rejections);
        self.elapsed += other.elapsed;
    }

    /// Packets that reached the normalizer.
    pub fn ip_packets(&self) -> u64 {
        self.records_written + self.rejected
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} packets seen, {} without IP layer, {} IPv4 packets: \
             {} records written, {} rejected ({}) in {:.2?}",
            self.packets_seen,
            self.packets_skipped,
            self.ip_packets(),
            self.records_written,
            self.rejected,
            self.rejections,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_everything() {
        let mut a = RunSummary {
            packets_seen: 10,
            packets_skipped: 2,
            records_written: 7,
            elapsed: Duration::from_millis(5),
            ..Default::default()
        };
        a.record_rejection(RejectionKind::MalformedField);

        let mut b = RunSummary {
            packets_seen: 4,
            records_written: 2,
            elapsed: Duration::from_millis(3),
            ..Default::default()
        };
        b.record_rejection(RejectionKind::InvariantViolation);
        b.record_rejection(RejectionKind::MalformedField);

        a.merge(&b);
        assert_eq!(a.packets_seen, 14);
        assert_eq!(a.packets_skipped, 2);
        assert_eq!(a.records_written, 9);
        assert_eq!(a.rejected, 3);
        assert_eq!(a.rejections.get(RejectionKind::MalformedField), 2);
        assert_eq!(a.rejections.get(RejectionKind::InvariantViolation), 1);
        assert_eq!(a.rejections.total(), a.rejected);
        assert_eq!(a.elapsed, Duration::from_millis(8));
    }

    #[test]
    fn report_lists_reasons() {
        let mut summary = RunSummary::default();
        assert!(summary.to_string().contains("0 rejected (none)"));

        summary.record_rejection(RejectionKind::InvariantViolation);
        summary.record_rejection(RejectionKind::MalformedField);
        summary.records_written = 5;
        let report = summary.to_string();
        assert!(report.contains("7 IPv4 packets: 5 records written"));
        assert!(report.contains("2 rejected (malformed_field=1, invariant_violation=1)"));
    }
}
