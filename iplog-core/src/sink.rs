//! Append-only record sink.
//!
//! Every record becomes exactly one newline-terminated JSON object. The line
//! is serialized before the lock is taken and written as a whole inside it,
//! so concurrent appenders never interleave or truncate each other's entries.
//! Entry order across appenders is whatever order they win the lock in.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use iplog_config::SinkMode;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use crate::record::PacketRecord;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("record log {0} already exists (choose truncate or append)")]
    Exists(PathBuf),

    #[error("failed to open record log {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to append to record log: {0}")]
    Write(#[from] io::Error),
}

/// Destination shared by all extraction workers.
pub trait RecordSink: Send + Sync {
    /// Appends one record atomically with respect to other appends.
    fn append(&self, record: &PacketRecord) -> Result<(), SinkError>;

    /// Pushes buffered entries to the underlying storage.
    fn flush(&self) -> Result<(), SinkError>;
}

/// Newline-delimited JSON log behind a single critical section.
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
    appended: AtomicU64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            appended: AtomicU64::new(0),
        }
    }

    /// Entries appended through this sink.
    pub fn appended(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Opens the log at `path`, creating parent directories as needed.
    pub fn open<P: AsRef<Path>>(path: P, mode: SinkMode) -> Result<Self, SinkError> {
        let path = path.as_ref();
        let open_err = |source| SinkError::Open {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }

        let mut options = OpenOptions::new();
        match mode {
            SinkMode::Create => options.write(true).create_new(true),
            SinkMode::Truncate => options.write(true).create(true).truncate(true),
            SinkMode::Append => options.read(true).append(true).create(true),
        };

        let mut file = match options.open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SinkError::Exists(path.to_path_buf()));
            }
            Err(e) => return Err(open_err(e)),
        };

        if mode == SinkMode::Append {
            discard_partial_entry(&mut file).map_err(open_err)?;
        }

        info!(path = %path.display(), ?mode, "opened record log");
        Ok(Self::new(BufWriter::new(file)))
    }
}

/// A previous run that died mid-write may have left an unterminated entry;
/// cut the log back to the end of its last complete line.
fn discard_partial_entry(file: &mut File) -> io::Result<()> {
    const CHUNK: u64 = 8 * 1024;

    let len = file.metadata()?.len();
    let mut buf = vec![0u8; CHUNK as usize];
    let mut end = len;
    let mut keep = 0;
    while end > 0 {
        let start = end.saturating_sub(CHUNK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|&b| b == b'\n') {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    if keep < len {
        warn!(discarded = len - keep, "discarding partial trailing entry");
        file.set_len(keep)?;
    }
    Ok(())
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn append(&self, record: &PacketRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        self.writer.lock().write_all(&line)?;
        self.appended.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.writer.lock().flush()?;
        Ok(())
    }
}
