//! Decoded packet as handed to the extraction pipeline.
//!
//! Attributes are kept in dissector form: the differentiated-services byte is
//! a hexadecimal string, header length and fragment offset are in bytes and
//! the flag bits are 0/1 integers. Turning these into a validated record is
//! the normalizer's job, not the decoder's.

/// One packet pulled from a capture.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPacket {
    /// Capture timestamp in fractional seconds since the epoch.
    pub timestamp: f64,
    /// Length of the frame on the wire, which may exceed the captured bytes.
    pub wire_len: u32,
    /// IPv4 layer, absent for non-IP frames, IPv6 and undecodable frames.
    pub ip: Option<IpLayer>,
    pub transport: Transport,
}

/// IPv4 header attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpLayer {
    pub dsfield_dscp: u8,
    /// Header length in bytes.
    pub hdr_len: u8,
    /// Differentiated-services byte as rendered by the dissector, e.g. `0x00`.
    pub dsfield: String,
    pub dsfield_ecn: u8,
    /// Total length including header.
    pub len: u16,
    pub proto: u8,
    pub flags_df: u8,
    pub flags_mf: u8,
    pub flags_rb: u8,
    /// Fragment offset in bytes.
    pub frag_offset: u16,
    pub ttl: u8,
    pub src: String,
    pub dst: String,
}

/// Transport layers visible in the packet, including one quoted by an ICMP error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transport {
    pub udp: Option<PortPair>,
    pub tcp: Option<PortPair>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPair {
    pub src: u16,
    pub dst: u16,
}

impl PortPair {
    pub fn new(src: u16, dst: u16) -> Self {
        Self { src, dst }
    }
}

impl DecodedPacket {
    /// A packet without an IP layer.
    pub fn opaque(timestamp: f64) -> Self {
        Self {
            timestamp,
            wire_len: 0,
            ip: None,
            transport: Transport::default(),
        }
    }

    pub fn with_wire_len(mut self, wire_len: u32) -> Self {
        self.wire_len = wire_len;
        self
    }

    pub fn has_ip(&self) -> bool {
        self.ip.is_some()
    }
}
