//! Extraction pipeline configuration.
//!
//! Covers the three knobs the extraction core consumes:
//! - worker parallelism
//! - capture source location (single file or a directory of captures)
//! - append-log destination and how an existing log is treated

use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use validator::{self, Validate};

use crate::validation;

/// Extraction configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ExtractConfig {
    /// Worker count; `-1` or `"auto"` uses every available CPU.
    #[serde(default)]
    pub parallelism: Parallelism,

    /// Capture file, or a directory whose `*.pcap`/`*.pcapng` files are processed in order.
    #[validate(custom(function = validation::validate_path))]
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,

    /// Newline-delimited JSON record log.
    #[validate(custom(function = validation::validate_path))]
    #[serde(default = "default_sink_path")]
    pub sink_path: PathBuf,

    /// What to do when the record log already exists.
    #[serde(default)]
    pub sink_mode: SinkMode,

    /// Capacity of the coordinator-to-worker hand-off channel.
    #[validate(range(min = 1, max = 1048576))]
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_source_path() -> PathBuf {
    PathBuf::from("data")
}

fn default_sink_path() -> PathBuf {
    PathBuf::from("data/pcap.jsonl")
}

fn default_queue_depth() -> usize {
    1024
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            parallelism: Parallelism::default(),
            source_path: default_source_path(),
            sink_path: default_sink_path(),
            sink_mode: SinkMode::default(),
            queue_depth: default_queue_depth(),
        }
    }
}

/// Number of concurrent extraction workers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Parallelism {
    /// One worker per available execution unit.
    #[default]
    Auto,
    /// Exactly this many workers. `1` means fully sequential processing.
    Fixed(NonZeroUsize),
}

impl Parallelism {
    pub fn sequential() -> Self {
        Parallelism::Fixed(NonZeroUsize::MIN)
    }

    pub fn fixed(workers: usize) -> Option<Self> {
        NonZeroUsize::new(workers).map(Parallelism::Fixed)
    }

    /// Resolves to a concrete worker count.
    pub fn resolve(&self) -> usize {
        match self {
            Parallelism::Auto => num_cpus::get().max(1),
            Parallelism::Fixed(n) => n.get(),
        }
    }

    /// Interprets the command-line convention: `-1` means auto, positive means fixed.
    pub fn from_jobs(jobs: i64) -> Option<Self> {
        match jobs {
            -1 => Some(Parallelism::Auto),
            n if n > 0 => Self::fixed(n as usize),
            _ => None,
        }
    }
}

impl fmt::Display for Parallelism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parallelism::Auto => write!(f, "auto ({})", self.resolve()),
            Parallelism::Fixed(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for Parallelism {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Parallelism::Auto => serializer.serialize_i64(-1),
            Parallelism::Fixed(n) => serializer.serialize_u64(n.get() as u64),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ParallelismValue {
    Num(i64),
    Str(String),
}

impl<'de> Deserialize<'de> for Parallelism {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let invalid =
            || serde::de::Error::custom("parallelism must be -1, \"auto\" or a positive integer");

        match ParallelismValue::deserialize(deserializer)? {
            ParallelismValue::Num(n) => Parallelism::from_jobs(n).ok_or_else(invalid),
            ParallelismValue::Str(s) => match s.trim().to_lowercase().as_str() {
                "auto" => Ok(Parallelism::Auto),
                other => other
                    .parse::<i64>()
                    .ok()
                    .and_then(Parallelism::from_jobs)
                    .ok_or_else(invalid),
            },
        }
    }
}

/// Policy for a record log that already exists when a run starts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkMode {
    /// Refuse to start if the log exists.
    #[default]
    Create,
    /// Start from an empty log, discarding previous content.
    Truncate,
    /// Keep previous content and append after it.
    Append,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn default_extract_config_is_valid() {
        let config = ExtractConfig::default();
        config.validate().expect("Default config should be valid");
        assert_eq!(config.parallelism, Parallelism::Auto);
        assert_eq!(config.sink_mode, SinkMode::Create);
    }

    #[test]
    fn zero_queue_depth_is_rejected() {
        let config = ExtractConfig {
            queue_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_sink_path_is_rejected() {
        let config = ExtractConfig {
            sink_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn jobs_convention() {
        assert_eq!(Parallelism::from_jobs(-1), Some(Parallelism::Auto));
        assert_eq!(Parallelism::from_jobs(1), Some(Parallelism::sequential()));
        assert_eq!(Parallelism::from_jobs(0), None);
        assert_eq!(Parallelism::from_jobs(-2), None);
        assert_eq!(Parallelism::fixed(4).map(|p| p.resolve()), Some(4));
        assert!(Parallelism::Auto.resolve() >= 1);
    }
}
