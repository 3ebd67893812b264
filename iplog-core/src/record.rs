use serde::{Deserialize, Serialize};

/// Port value used when the packet carries neither a UDP nor a TCP layer.
pub const NO_PORT: i32 = -1;

/// One validated, IP-layer record. Immutable once produced.
///
/// Field names and declaration order are the on-disk schema of the record
/// log and of the columnar snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketRecord {
    pub dsfield_dscp: u8,
    pub hdr_len: u8,
    /// Differentiated-services byte, already parsed from its hexadecimal form.
    pub dsfield: u8,
    pub dsfield_ecn: u8,
    pub len: u16,
    pub proto: u8,
    pub flags_df: u8,
    pub flags_mf: u8,
    /// Reserved flag bit, always 0 in a produced record.
    pub flags_rb: u8,
    pub frag_offset: u16,
    pub ttl: u8,
    pub src: String,
    pub dst: String,
    /// UDP source port, else TCP source port, else [`NO_PORT`].
    pub srcport: i32,
    /// UDP destination port, else TCP destination port, else [`NO_PORT`].
    pub dstport: i32,
    pub sniff_timestamp: f64,
}

impl PacketRecord {
    pub fn has_ports(&self) -> bool {
        self.srcport != NO_PORT
    }
}
