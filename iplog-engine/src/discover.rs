//! Capture discovery for file and directory sources.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::EngineError;

const CAPTURE_EXTENSIONS: [&str; 3] = ["pcap", "pcapng", "cap"];

fn is_capture(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| CAPTURE_EXTENSIONS.iter().any(|c| ext.eq_ignore_ascii_case(c)))
}

/// A file source is taken as is; a directory expands to its capture files,
/// sorted by name. Subdirectories are not descended into.
pub fn discover_captures(source: &Path) -> Result<Vec<PathBuf>, EngineError> {
    if !source.exists() {
        return Err(EngineError::SourceNotFound(source.to_path_buf()));
    }
    if !source.is_dir() {
        return Ok(vec![source.to_path_buf()]);
    }

    let mut captures = Vec::new();
    for entry in fs::read_dir(source)? {
        let path = entry?.path();
        if is_capture(&path) {
            captures.push(path);
        } else {
            debug!(path = %path.display(), "not a capture, ignored");
        }
    }

    if captures.is_empty() {
        return Err(EngineError::NoCaptures(source.to_path_buf()));
    }
    captures.sort();
    Ok(captures)
}
