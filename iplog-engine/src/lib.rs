//! # iplog-engine
//!
//! Runtime shared by frontends: capture discovery, the multi-capture
//! extraction run and the capture summary behind `info`.

pub mod discover;
pub mod error;
pub mod info;
pub mod runtime;

pub use discover::discover_captures;
pub use error::EngineError;
pub use info::{summarize, summarize_capture, CaptureInfo};
pub use runtime::{run_extraction, CaptureReport, ExtractionReport};
