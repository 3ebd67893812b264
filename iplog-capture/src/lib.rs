//! iplog-capture
//!
//! Capture-file boundary of the extraction pipeline: a pull-based
//! [`PacketSource`] over offline captures (libpcap) and the decoding of each
//! frame into the IPv4 and transport attributes the pipeline consumes.

pub mod capture;
pub mod decode;
pub mod packet;

pub use capture::{CaptureError, PacketSource, PcapFileSource, ReplaySource};
pub use decode::{decode, LinkType};
pub use packet::{DecodedPacket, IpLayer, PortPair, Transport};
