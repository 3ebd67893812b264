use std::path::{Path, PathBuf};

use pcap::{Capture, Offline};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::decode::{decode, LinkType};
use crate::packet::DecodedPacket;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open capture {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: pcap::Error,
    },
    #[error("failed to read capture {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: pcap::Error,
    },
}

/// Sequential, single-consumer stream of decoded packets.
///
/// Implementations are pulled by exactly one coordinating thread.
pub trait PacketSource {
    /// Next packet, `None` once the stream is exhausted.
    fn next_packet(&mut self) -> Option<Result<DecodedPacket, CaptureError>>;
}

/// Offline capture file read through libpcap.
pub struct PcapFileSource {
    path: PathBuf,
    cap: Capture<Offline>,
    link: LinkType,
    done: bool,
}

impl PcapFileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let cap = Capture::from_file(&path).map_err(|source| CaptureError::Open {
            path: path.clone(),
            source,
        })?;

        let link = LinkType::from_dlt(cap.get_datalink().0);
        match link {
            LinkType::Unsupported(dlt) => {
                warn!(path = %path.display(), dlt, "unsupported link type, no IP layers")
            }
            _ => info!(path = %path.display(), ?link, "opened capture"),
        }

        Ok(Self {
            path,
            cap,
            link,
            done: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn link_type(&self) -> LinkType {
        self.link
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Option<Result<DecodedPacket, CaptureError>> {
        if self.done {
            return None;
        }

        match self.cap.next_packet() {
            Ok(packet) => {
                let ts = packet.header.ts;
                let timestamp = ts.tv_sec as f64 + ts.tv_usec as f64 / 1_000_000.0;
                let decoded = decode(self.link, timestamp, packet.data);
                Some(Ok(decoded.with_wire_len(packet.header.len)))
            }
            Err(pcap::Error::NoMorePackets) => {
                debug!(path = %self.path.display(), "end of capture");
                self.done = true;
                None
            }
            Err(source) => {
                self.done = true;
                Some(Err(CaptureError::Read {
                    path: self.path.clone(),
                    source,
                }))
            }
        }
    }
}

/// In-memory packet stream, replayed in order.
#[derive(Debug, Default, Clone)]
pub struct ReplaySource {
    packets: std::vec::IntoIter<DecodedPacket>,
}

impl ReplaySource {
    pub fn new(packets: Vec<DecodedPacket>) -> Self {
        Self {
            packets: packets.into_iter(),
        }
    }
}

impl PacketSource for ReplaySource {
    fn next_packet(&mut self) -> Option<Result<DecodedPacket, CaptureError>> {
        self.packets.next().map(Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PortPair;
    use etherparse::PacketBuilder;
    use std::io::Write;

    /// Classic little-endian pcap with microsecond timestamps.
    fn write_pcap(frames: &[(u32, u32, Vec<u8>)]) -> tempfile::NamedTempFile {
        let frames: Vec<_> = frames
            .iter()
            .map(|(sec, usec, frame)| (*sec, *usec, frame.len() as u32, frame.clone()))
            .collect();
        write_pcap_with_orig_len(&frames)
    }

    /// Frames as `(sec, usec, original length, captured bytes)`.
    fn write_pcap_with_orig_len(frames: &[(u32, u32, u32, Vec<u8>)]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut header = Vec::new();
        header.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        header.extend_from_slice(&2u16.to_le_bytes());
        header.extend_from_slice(&4u16.to_le_bytes());
        header.extend_from_slice(&0i32.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes());
        header.extend_from_slice(&65535u32.to_le_bytes());
        header.extend_from_slice(&1u32.to_le_bytes());
        file.write_all(&header).unwrap();

        for (sec, usec, orig_len, frame) in frames {
            let caplen = frame.len() as u32;
            file.write_all(&sec.to_le_bytes()).unwrap();
            file.write_all(&usec.to_le_bytes()).unwrap();
            file.write_all(&caplen.to_le_bytes()).unwrap();
            file.write_all(&orig_len.to_le_bytes()).unwrap();
            file.write_all(frame).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn tcp_frame() -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
            .ipv4([10, 1, 1, 1], [10, 1, 1, 2], 64)
            .tcp(40000, 80, 7, 512);
        let mut frame = Vec::new();
        builder.write(&mut frame, b"GET").unwrap();
        frame
    }

    #[test]
    fn reads_pcap_file() {
        let arp_like = vec![0u8; 42];
        let file = write_pcap(&[
            (1_700_000_000, 250_000, tcp_frame()),
            (1_700_000_001, 0, arp_like),
        ]);

        let mut source = PcapFileSource::open(file.path()).unwrap();
        assert_eq!(source.link_type(), LinkType::Ethernet);
        assert_eq!(source.path(), file.path());

        let first = source.next_packet().unwrap().unwrap();
        assert!((first.timestamp - 1_700_000_000.25).abs() < 1e-6);
        assert_eq!(first.transport.tcp, Some(PortPair::new(40000, 80)));
        assert_eq!(first.wire_len as usize, tcp_frame().len());

        let second = source.next_packet().unwrap().unwrap();
        assert!(!second.has_ip());

        assert!(source.next_packet().is_none());
        assert!(source.next_packet().is_none());
    }

    #[test]
    fn snaplen_limited_capture_keeps_ip_layer_and_wire_length() {
        let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
            .ipv4([10, 1, 1, 1], [10, 1, 1, 2], 64)
            .tcp(40000, 80, 7, 512);
        let mut frame = Vec::new();
        builder.write(&mut frame, &[0u8; 1200]).unwrap();
        let orig_len = frame.len() as u32;
        frame.truncate(96);
        let file = write_pcap_with_orig_len(&[(1_700_000_002, 0, orig_len, frame)]);

        let mut source = PcapFileSource::open(file.path()).unwrap();
        let packet = source.next_packet().unwrap().unwrap();
        assert!(packet.has_ip());
        assert_eq!(packet.transport.tcp, Some(PortPair::new(40000, 80)));
        assert_eq!(packet.wire_len, orig_len);
    }

    #[test]
    fn open_failure() {
        let result = PcapFileSource::open("/nonexistent/capture.pcap");
        assert!(matches!(result, Err(CaptureError::Open { .. })));
    }

    #[test]
    fn replay_preserves_order() {
        let packets: Vec<_> = (0..3).map(|i| DecodedPacket::opaque(i as f64)).collect();
        let mut source = ReplaySource::new(packets);
        let seen: Vec<f64> = std::iter::from_fn(|| source.next_packet())
            .map(|p| p.unwrap().timestamp)
            .collect();
        assert_eq!(seen, vec![0.0, 1.0, 2.0]);
    }
}
