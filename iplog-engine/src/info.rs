//! Capture summary for the `info` command.

use std::fmt;
use std::path::{Path, PathBuf};

use iplog_capture::{CaptureError, PacketSource, PcapFileSource};

/// Packet counts, volume and time range of one capture.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureInfo {
    pub path: PathBuf,
    pub packets: u64,
    pub ipv4_packets: u64,
    /// Sum of on-the-wire frame lengths.
    pub bytes: u64,
    /// Earliest packet timestamp, in epoch seconds.
    pub first: Option<f64>,
    /// Latest packet timestamp, in epoch seconds.
    pub last: Option<f64>,
}

impl CaptureInfo {
    pub fn duration(&self) -> f64 {
        match (self.first, self.last) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// Mean frame length in bytes, `None` for an empty capture.
    pub fn avg_packet_size(&self) -> Option<f64> {
        (self.packets > 0).then(|| self.bytes as f64 / self.packets as f64)
    }

    /// Mean data rate in bits per second, `None` when the capture spans no time.
    pub fn data_rate_bps(&self) -> Option<f64> {
        let duration = self.duration();
        (duration > 0.0).then(|| self.bytes as f64 * 8.0 / duration)
    }
}

impl fmt::Display for CaptureInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "capture:        {}", self.path.display())?;
        writeln!(f, "packets:        {}", self.packets)?;
        writeln!(f, "ipv4 packets:   {}", self.ipv4_packets)?;
        writeln!(f, "data size:      {} bytes", self.bytes)?;
        match (self.first, self.last) {
            (Some(first), Some(last)) => {
                writeln!(f, "first packet:   {first:.6}")?;
                writeln!(f, "last packet:    {last:.6}")?;
            }
            _ => writeln!(f, "first packet:   n/a")?,
        }
        writeln!(f, "duration:       {:.6}s", self.duration())?;
        match self.data_rate_bps() {
            Some(rate) => writeln!(f, "data rate:      {rate:.2} bits/s")?,
            None => writeln!(f, "data rate:      n/a")?,
        }
        match self.avg_packet_size() {
            Some(size) => write!(f, "avg packet:     {size:.2} bytes"),
            None => write!(f, "avg packet:     n/a"),
        }
    }
}

pub fn summarize_capture(path: &Path) -> Result<CaptureInfo, CaptureError> {
    let mut source = PcapFileSource::open(path)?;
    let mut info = summarize(&mut source)?;
    info.path = source.path().to_path_buf();
    Ok(info)
}

/// Drains `source`, counting packets and bytes and tracking the timestamp range.
pub fn summarize<P: PacketSource + ?Sized>(source: &mut P) -> Result<CaptureInfo, CaptureError> {
    let mut info = CaptureInfo::default();
    while let Some(next) = source.next_packet() {
        let packet = next?;
        info.packets += 1;
        info.bytes += u64::from(packet.wire_len);
        if packet.has_ip() {
            info.ipv4_packets += 1;
        }
        let ts = packet.timestamp;
        info.first = Some(info.first.map_or(ts, |first| first.min(ts)));
        info.last = Some(info.last.map_or(ts, |last| last.max(ts)));
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iplog_capture::{DecodedPacket, ReplaySource};

    #[test]
    fn counts_and_range() {
        let mut packets: Vec<_> = [12.5, 10.0, 11.0]
            .into_iter()
            .map(|ts| DecodedPacket::opaque(ts).with_wire_len(100))
            .collect();
        packets[2] = packets[2].clone().with_wire_len(300);
        packets[1].ip = Some(iplog_capture::IpLayer {
            dsfield_dscp: 0,
            hdr_len: 20,
            dsfield: "0x00".into(),
            dsfield_ecn: 0,
            len: 20,
            proto: 1,
            flags_df: 0,
            flags_mf: 0,
            flags_rb: 0,
            frag_offset: 0,
            ttl: 1,
            src: "1.1.1.1".into(),
            dst: "2.2.2.2".into(),
        });

        let info = summarize(&mut ReplaySource::new(packets)).unwrap();
        assert_eq!(info.packets, 3);
        assert_eq!(info.ipv4_packets, 1);
        assert_eq!(info.first, Some(10.0));
        assert_eq!(info.last, Some(12.5));
        assert_eq!(info.duration(), 2.5);
        assert_eq!(info.bytes, 500);
        assert_eq!(info.avg_packet_size(), Some(500.0 / 3.0));
        assert_eq!(info.data_rate_bps(), Some(1600.0));

        let report = info.to_string();
        assert!(report.contains("data size:      500 bytes"));
        assert!(report.contains("data rate:      1600.00 bits/s"));
    }

    #[test]
    fn single_packet_has_no_rate() {
        let packets = vec![DecodedPacket::opaque(5.0).with_wire_len(60)];
        let info = summarize(&mut ReplaySource::new(packets)).unwrap();
        assert_eq!(info.avg_packet_size(), Some(60.0));
        assert_eq!(info.data_rate_bps(), None);
    }

    #[test]
    fn empty_capture() {
        let info = summarize(&mut ReplaySource::default()).unwrap();
        assert_eq!(info.packets, 0);
        assert_eq!(info.duration(), 0.0);
        assert_eq!(info.avg_packet_size(), None);
        assert!(info.to_string().contains("avg packet:     n/a"));
    }
}
