//! # iplog-export
//!
//! Columnar snapshots of a completed record log. A snapshot holds one
//! non-nullable column per [`PacketRecord`](iplog_core::PacketRecord) field
//! and one row per log entry, stored as Parquet.

mod error;
pub mod log;
pub mod schema;
pub mod snapshot;

pub use error::ExportError;
pub use log::{export_log, read_log};
pub use schema::{record_schema, records_from_batch, records_to_batch};
pub use snapshot::{read_snapshot, write_snapshot, Codec, SnapshotOptions};
