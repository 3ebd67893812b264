//! Field normalizer: decoded IPv4 attributes to a validated [`PacketRecord`].
//!
//! Pure and stateless; safe to call from any number of workers.

use std::fmt;

use iplog_capture::{IpLayer, PortPair, Transport};

use crate::record::{PacketRecord, NO_PORT};

/// Why a packet was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RejectionKind {
    /// A field could not be parsed.
    MalformedField,
    /// A populated record breaks a data-integrity rule.
    InvariantViolation,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::MalformedField => "malformed_field",
            RejectionKind::InvariantViolation => "invariant_violation",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A packet that did not produce a record, with enough context to find it again.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub field: &'static str,
    pub detail: String,
    pub timestamp: f64,
    pub src: String,
    pub dst: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {} ({}) for packet at {} {} -> {}",
            self.kind, self.field, self.detail, self.timestamp, self.src, self.dst
        )
    }
}

impl Rejection {
    fn new(
        kind: RejectionKind,
        field: &'static str,
        detail: String,
        ip: &IpLayer,
        timestamp: f64,
    ) -> Self {
        Self {
            kind,
            field,
            detail,
            timestamp,
            src: ip.src.clone(),
            dst: ip.dst.clone(),
        }
    }
}

/// Builds a record from an IPv4 layer and its transport ports.
///
/// The caller has already established that the packet carries an IP layer.
pub fn normalize(
    ip: &IpLayer,
    transport: &Transport,
    timestamp: f64,
) -> Result<PacketRecord, Rejection> {
    let dsfield = parse_dsfield(&ip.dsfield).ok_or_else(|| {
        Rejection::new(
            RejectionKind::MalformedField,
            "dsfield",
            format!("not a hexadecimal byte: {:?}", ip.dsfield),
            ip,
            timestamp,
        )
    })?;

    let (srcport, dstport) = select_ports(transport);

    let record = PacketRecord {
        dsfield_dscp: ip.dsfield_dscp,
        hdr_len: ip.hdr_len,
        dsfield,
        dsfield_ecn: ip.dsfield_ecn,
        len: ip.len,
        proto: ip.proto,
        flags_df: ip.flags_df,
        flags_mf: ip.flags_mf,
        flags_rb: ip.flags_rb,
        frag_offset: ip.frag_offset,
        ttl: ip.ttl,
        src: ip.src.clone(),
        dst: ip.dst.clone(),
        srcport,
        dstport,
        sniff_timestamp: timestamp,
    };

    if record.flags_rb != 0 {
        return Err(Rejection::new(
            RejectionKind::InvariantViolation,
            "flags_rb",
            format!("reserved flag must be 0, got {}", record.flags_rb),
            ip,
            timestamp,
        ));
    }

    Ok(record)
}

/// Parses `0x1a`, `0X1A` or `1a` into a byte.
pub fn parse_dsfield(raw: &str) -> Option<u8> {
    let raw = raw.trim();
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// UDP wins over TCP; neither gives [`NO_PORT`] for both.
fn select_ports(transport: &Transport) -> (i32, i32) {
    match transport.udp.or(transport.tcp) {
        Some(PortPair { src, dst }) => (i32::from(src), i32::from(dst)),
        None => (NO_PORT, NO_PORT),
    }
}
