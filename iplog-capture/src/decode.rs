//! Frame decoding into [`DecodedPacket`].
//!
//! Slicing is delegated to `etherparse` in lax mode, so a frame cut short by
//! the capture snap length still yields its IPv4 header and whatever
//! transport header made it into the capture. This module only picks the
//! IPv4 header attributes and transport ports the extraction pipeline
//! consumes.

use etherparse::{
    Icmpv4Slice, IpNumber, Ipv4HeaderSlice, LaxNetSlice, LaxSlicedPacket, TransportSlice,
};
use tracing::trace;

use crate::packet::{DecodedPacket, IpLayer, PortPair, Transport};

/// Linux cooked capture (v1) header length.
const LINUX_SLL_HEADER_LEN: usize = 16;
const ETHERTYPE_IPV4: u16 = 0x0800;

/// ICMP messages that quote the offending datagram's header.
const ICMP_DEST_UNREACHABLE: u8 = 3;
const ICMP_TIME_EXCEEDED: u8 = 11;
const ICMP_PARAMETER_PROBLEM: u8 = 12;

/// Link-layer framing of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    Ethernet,
    RawIp,
    LinuxSll,
    Unsupported(i32),
}

impl LinkType {
    pub fn from_dlt(dlt: i32) -> Self {
        match dlt {
            1 => LinkType::Ethernet,
            12 | 14 | 101 | 228 => LinkType::RawIp,
            113 => LinkType::LinuxSll,
            other => LinkType::Unsupported(other),
        }
    }
}

/// Decodes one captured frame. Frames whose captured bytes do not hold a
/// complete IPv4 header come back without an IP layer.
///
/// The wire length is taken from the captured bytes; sources that know the
/// original length override it.
pub fn decode(link: LinkType, timestamp: f64, data: &[u8]) -> DecodedPacket {
    let captured = u32::try_from(data.len()).unwrap_or(u32::MAX);
    decode_sliced(link, timestamp, data).with_wire_len(captured)
}

fn decode_sliced(link: LinkType, timestamp: f64, data: &[u8]) -> DecodedPacket {
    let sliced = match link {
        LinkType::Ethernet => LaxSlicedPacket::from_ethernet(data).ok(),
        LinkType::RawIp => LaxSlicedPacket::from_ip(data).ok(),
        LinkType::LinuxSll => {
            linux_sll_payload(data).and_then(|ip| LaxSlicedPacket::from_ip(ip).ok())
        }
        LinkType::Unsupported(_) => None,
    };

    let Some(sliced) = sliced else {
        trace!(timestamp, len = data.len(), "frame not decodable");
        return DecodedPacket::opaque(timestamp);
    };

    let ip = match &sliced.net {
        Some(LaxNetSlice::Ipv4(ipv4)) => ip_layer(&ipv4.header()),
        _ => return DecodedPacket::opaque(timestamp),
    };
    if let Some((err, layer)) = &sliced.stop_err {
        trace!(timestamp, ?layer, %err, "frame truncated after the IP header");
    }

    let transport = match &sliced.transport {
        Some(TransportSlice::Udp(udp)) => Transport {
            udp: Some(PortPair::new(udp.source_port(), udp.destination_port())),
            tcp: None,
        },
        Some(TransportSlice::Tcp(tcp)) => Transport {
            udp: None,
            tcp: Some(PortPair::new(tcp.source_port(), tcp.destination_port())),
        },
        Some(TransportSlice::Icmpv4(icmp)) => quoted_transport(icmp),
        _ => Transport::default(),
    };

    DecodedPacket {
        timestamp,
        wire_len: 0,
        ip: Some(ip),
        transport,
    }
}

fn linux_sll_payload(data: &[u8]) -> Option<&[u8]> {
    if data.len() < LINUX_SLL_HEADER_LEN {
        return None;
    }
    let protocol = u16::from_be_bytes([data[14], data[15]]);
    (protocol == ETHERTYPE_IPV4).then(|| &data[LINUX_SLL_HEADER_LEN..])
}

fn ip_layer(header: &Ipv4HeaderSlice<'_>) -> IpLayer {
    let dscp = header.dcp().value();
    let ecn = header.ecn().value();
    let flags = header.slice()[6];

    IpLayer {
        dsfield_dscp: dscp,
        hdr_len: header.ihl() * 4,
        dsfield: format!("0x{:02x}", (dscp << 2) | ecn),
        dsfield_ecn: ecn,
        len: header.total_len(),
        proto: header.protocol().0,
        flags_df: header.dont_fragment() as u8,
        flags_mf: header.more_fragments() as u8,
        flags_rb: (flags >> 7) & 1,
        frag_offset: header.fragments_offset().value().wrapping_mul(8),
        ttl: header.ttl(),
        src: header.source_addr().to_string(),
        dst: header.destination_addr().to_string(),
    }
}

/// Ports of the datagram quoted inside an ICMP error message.
fn quoted_transport(icmp: &Icmpv4Slice<'_>) -> Transport {
    let quoting = matches!(
        icmp.type_u8(),
        ICMP_DEST_UNREACHABLE | ICMP_TIME_EXCEEDED | ICMP_PARAMETER_PROBLEM
    );
    if !quoting {
        return Transport::default();
    }

    let quoted = icmp.payload();
    let Ok(inner) = Ipv4HeaderSlice::from_slice(quoted) else {
        return Transport::default();
    };

    let offset = inner.slice().len();
    let Some(ports) = quoted.get(offset..offset + 4) else {
        return Transport::default();
    };
    let pair = PortPair::new(
        u16::from_be_bytes([ports[0], ports[1]]),
        u16::from_be_bytes([ports[2], ports[3]]),
    );

    match inner.protocol() {
        IpNumber::UDP => Transport {
            udp: Some(pair),
            tcp: None,
        },
        IpNumber::TCP => Transport {
            udp: None,
            tcp: Some(pair),
        },
        _ => Transport::default(),
    }
}
