//! Arrow schema of the record log and conversion in both directions.

use std::sync::{Arc, OnceLock};

use arrow::array::{
    Array, ArrayRef, AsArray, Float64Array, Int32Array, PrimitiveArray, StringArray, UInt16Array,
    UInt8Array,
};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Field, Float64Type, Int32Type, Schema, SchemaRef, UInt16Type,
    UInt8Type,
};
use arrow::record_batch::RecordBatch;
use iplog_core::PacketRecord;

use crate::error::ExportError;

/// One column per record field, in record declaration order.
pub fn record_schema() -> SchemaRef {
    static SCHEMA: OnceLock<SchemaRef> = OnceLock::new();
    SCHEMA
        .get_or_init(|| {
            Arc::new(Schema::new(vec![
                Field::new("dsfield_dscp", DataType::UInt8, false),
                Field::new("hdr_len", DataType::UInt8, false),
                Field::new("dsfield", DataType::UInt8, false),
                Field::new("dsfield_ecn", DataType::UInt8, false),
                Field::new("len", DataType::UInt16, false),
                Field::new("proto", DataType::UInt8, false),
                Field::new("flags_df", DataType::UInt8, false),
                Field::new("flags_mf", DataType::UInt8, false),
                Field::new("flags_rb", DataType::UInt8, false),
                Field::new("frag_offset", DataType::UInt16, false),
                Field::new("ttl", DataType::UInt8, false),
                Field::new("src", DataType::Utf8, false),
                Field::new("dst", DataType::Utf8, false),
                Field::new("srcport", DataType::Int32, false),
                Field::new("dstport", DataType::Int32, false),
                Field::new("sniff_timestamp", DataType::Float64, false),
            ]))
        })
        .clone()
}

pub fn records_to_batch(records: &[PacketRecord]) -> Result<RecordBatch, ExportError> {
    fn u8s(records: &[PacketRecord], f: impl Fn(&PacketRecord) -> u8) -> ArrayRef {
        Arc::new(UInt8Array::from_iter_values(records.iter().map(f)))
    }
    fn u16s(records: &[PacketRecord], f: impl Fn(&PacketRecord) -> u16) -> ArrayRef {
        Arc::new(UInt16Array::from_iter_values(records.iter().map(f)))
    }
    fn i32s(records: &[PacketRecord], f: impl Fn(&PacketRecord) -> i32) -> ArrayRef {
        Arc::new(Int32Array::from_iter_values(records.iter().map(f)))
    }
    fn strs<'a>(records: &'a [PacketRecord], f: impl Fn(&'a PacketRecord) -> &'a str) -> ArrayRef {
        Arc::new(StringArray::from_iter_values(records.iter().map(f)))
    }

    let columns: Vec<ArrayRef> = vec![
        u8s(records, |r| r.dsfield_dscp),
        u8s(records, |r| r.hdr_len),
        u8s(records, |r| r.dsfield),
        u8s(records, |r| r.dsfield_ecn),
        u16s(records, |r| r.len),
        u8s(records, |r| r.proto),
        u8s(records, |r| r.flags_df),
        u8s(records, |r| r.flags_mf),
        u8s(records, |r| r.flags_rb),
        u16s(records, |r| r.frag_offset),
        u8s(records, |r| r.ttl),
        strs(records, |r| r.src.as_str()),
        strs(records, |r| r.dst.as_str()),
        i32s(records, |r| r.srcport),
        i32s(records, |r| r.dstport),
        Arc::new(Float64Array::from_iter_values(
            records.iter().map(|r| r.sniff_timestamp),
        )),
    ];

    Ok(RecordBatch::try_new(record_schema(), columns)?)
}

fn primitive<'a, T: ArrowPrimitiveType>(
    batch: &'a RecordBatch,
    name: &'static str,
) -> Result<&'a PrimitiveArray<T>, ExportError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_primitive_opt::<T>())
        .filter(|c| c.null_count() == 0)
        .ok_or(ExportError::Column(name))
}

fn string<'a>(batch: &'a RecordBatch, name: &'static str) -> Result<&'a StringArray, ExportError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_string_opt::<i32>())
        .filter(|c| c.null_count() == 0)
        .ok_or(ExportError::Column(name))
}

/// Columns are looked up by name, so column order in the batch does not matter.
pub fn records_from_batch(batch: &RecordBatch) -> Result<Vec<PacketRecord>, ExportError> {
    let dsfield_dscp = primitive::<UInt8Type>(batch, "dsfield_dscp")?;
    let hdr_len = primitive::<UInt8Type>(batch, "hdr_len")?;
    let dsfield = primitive::<UInt8Type>(batch, "dsfield")?;
    let dsfield_ecn = primitive::<UInt8Type>(batch, "dsfield_ecn")?;
    let len = primitive::<UInt16Type>(batch, "len")?;
    let proto = primitive::<UInt8Type>(batch, "proto")?;
    let flags_df = primitive::<UInt8Type>(batch, "flags_df")?;
    let flags_mf = primitive::<UInt8Type>(batch, "flags_mf")?;
    let flags_rb = primitive::<UInt8Type>(batch, "flags_rb")?;
    let frag_offset = primitive::<UInt16Type>(batch, "frag_offset")?;
    let ttl = primitive::<UInt8Type>(batch, "ttl")?;
    let src = string(batch, "src")?;
    let dst = string(batch, "dst")?;
    let srcport = primitive::<Int32Type>(batch, "srcport")?;
    let dstport = primitive::<Int32Type>(batch, "dstport")?;
    let sniff_timestamp = primitive::<Float64Type>(batch, "sniff_timestamp")?;

    Ok((0..batch.num_rows())
        .map(|i| PacketRecord {
            dsfield_dscp: dsfield_dscp.value(i),
            hdr_len: hdr_len.value(i),
            dsfield: dsfield.value(i),
            dsfield_ecn: dsfield_ecn.value(i),
            len: len.value(i),
            proto: proto.value(i),
            flags_df: flags_df.value(i),
            flags_mf: flags_mf.value(i),
            flags_rb: flags_rb.value(i),
            frag_offset: frag_offset.value(i),
            ttl: ttl.value(i),
            src: src.value(i).to_owned(),
            dst: dst.value(i).to_owned(),
            srcport: srcport.value(i),
            dstport: dstport.value(i),
            sniff_timestamp: sniff_timestamp.value(i),
        })
        .collect())
}
