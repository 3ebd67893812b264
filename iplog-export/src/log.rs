//! Reading a completed record log.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use iplog_core::PacketRecord;
use tracing::{info, warn};

use crate::error::ExportError;
use crate::snapshot::{write_snapshot, SnapshotOptions};

/// Parses every entry of a newline-delimited JSON log. Blank lines are ignored.
///
/// An unterminated last line that does not parse is what a writer crashing
/// mid-entry leaves behind; it is dropped with a warning and every complete
/// entry before it is returned. A bad terminated line is an error.
pub fn read_log(path: &Path) -> Result<Vec<PacketRecord>, ExportError> {
    let file = File::open(path).map_err(|source| ExportError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let mut records = Vec::new();
    let mut line = String::new();
    let mut number = 0;
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        number += 1;
        let entry = line.trim();
        if entry.is_empty() {
            continue;
        }
        match serde_json::from_str(entry) {
            Ok(record) => records.push(record),
            Err(source) if !line.ends_with('\n') => {
                warn!(
                    log = %path.display(),
                    line = number,
                    %source,
                    "dropping partial trailing entry"
                );
            }
            Err(source) => {
                return Err(ExportError::Malformed {
                    line: number,
                    source,
                })
            }
        }
    }
    Ok(records)
}

/// Converts the log at `log` into a snapshot at `out`. Returns rows written.
pub fn export_log(log: &Path, out: &Path, options: &SnapshotOptions) -> Result<usize, ExportError> {
    let records = read_log(log)?;
    info!(log = %log.display(), records = records.len(), "record log loaded");
    write_snapshot(&records, out, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const ENTRY: &str = concat!(
        r#"{"dsfield_dscp":0,"hdr_len":20,"dsfield":0,"dsfield_ecn":0,"len":40,"proto":6,"#,
        r#""flags_df":1,"flags_mf":0,"flags_rb":0,"frag_offset":0,"ttl":64,"#,
        r#""src":"10.0.0.1","dst":"10.0.0.2","srcport":22,"dstport":50123,"#,
        r#""sniff_timestamp":1.25}"#
    );

    #[test]
    fn blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcap.jsonl");
        fs::write(&path, format!("{ENTRY}\n\n{ENTRY}\n")).unwrap();

        let records = read_log(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].srcport, 22);
        assert_eq!(records[0].sniff_timestamp, 1.25);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcap.jsonl");
        fs::write(&path, format!("{ENTRY}\n{{\"dsfield_dscp\":0,\n")).unwrap();

        match read_log(&path) {
            Err(ExportError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn partial_trailing_entry_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcap.jsonl");
        fs::write(&path, format!("{ENTRY}\n{{\"dsfield_dscp\":0,\"hdr_")).unwrap();

        let records = read_log(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].dstport, 50123);
    }

    #[test]
    fn complete_entry_without_newline_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pcap.jsonl");
        fs::write(&path, format!("{ENTRY}\n{ENTRY}")).unwrap();

        assert_eq!(read_log(&path).unwrap().len(), 2);
    }

    #[test]
    fn missing_log() {
        let result = read_log(Path::new("/nonexistent/pcap.jsonl"));
        assert!(matches!(result, Err(ExportError::Open { .. })));
    }
}
