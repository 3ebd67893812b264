use iplog_capture::{DecodedPacket, IpLayer, PortPair, ReplaySource, Transport};
use iplog_config::{Parallelism, SinkMode};
use iplog_core::{Dispatcher, JsonLinesSink, PacketRecord};
use iplog_export::{export_log, read_log, read_snapshot, Codec, SnapshotOptions};

fn capture(n: u32) -> Vec<DecodedPacket> {
    (0..n)
        .map(|i| {
            if i % 5 == 0 {
                return DecodedPacket::opaque(f64::from(i));
            }
            let transport = match i % 3 {
                0 => Transport {
                    udp: Some(PortPair::new(53, (i % 65536) as u16)),
                    tcp: None,
                },
                1 => Transport {
                    udp: None,
                    tcp: Some(PortPair::new(443, (i % 65536) as u16)),
                },
                _ => Transport::default(),
            };
            DecodedPacket {
                timestamp: 1_650_000_000.0 + f64::from(i) * 0.001,
                wire_len: 54 + i % 1400,
                ip: Some(IpLayer {
                    dsfield_dscp: (i % 64) as u8,
                    hdr_len: 20,
                    dsfield: format!("0x{:02x}", (i % 64) << 2),
                    dsfield_ecn: 0,
                    len: 40 + (i % 1400) as u16,
                    proto: 6,
                    flags_df: 1,
                    flags_mf: 0,
                    flags_rb: 0,
                    frag_offset: 0,
                    ttl: (i % 255) as u8,
                    src: format!("192.168.{}.{}", (i / 256) % 256, i % 256),
                    dst: "8.8.8.8".into(),
                }),
                transport,
            }
        })
        .collect()
}

fn sort(mut records: Vec<PacketRecord>) -> Vec<PacketRecord> {
    records.sort_by(|a, b| a.sniff_timestamp.total_cmp(&b.sniff_timestamp));
    records
}

#[test]
fn snapshot_holds_exactly_the_logged_records() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("pcap.jsonl");
    let out = dir.path().join("snapshots").join("pcap.parquet");

    let sink = JsonLinesSink::open(&log, SinkMode::Create).unwrap();
    let summary = Dispatcher::new(&sink, Parallelism::fixed(4).unwrap())
        .run(&mut ReplaySource::new(capture(5000)))
        .unwrap();
    drop(sink);
    assert_eq!(summary.records_written, 4000);

    for codec in [Codec::Snappy, Codec::Zstd, Codec::None] {
        let options = SnapshotOptions {
            batch_size: 777,
            codec,
        };
        let rows = export_log(&log, &out, &options).unwrap();
        assert_eq!(rows, 4000);

        let logged = sort(read_log(&log).unwrap());
        let reloaded = sort(read_snapshot(&out).unwrap());
        assert_eq!(reloaded.len(), 4000);
        assert_eq!(reloaded, logged, "codec {codec}");
    }
}
