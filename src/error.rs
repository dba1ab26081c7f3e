use crate::alert::AlertCategory;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to open queue `{name}` at {path:?}: {source}")]
    Open {
        name: String,
        path: Option<PathBuf>,
        #[source]
        source: io::Error,
    },
    #[error("queue `{name}` is full ({capacity} messages)")]
    Full { name: String, capacity: usize },
    #[error("queue `{name}` already has a live consumer")]
    ConsumerTaken { name: String },
    #[error("message of {len} bytes exceeds the {limit} byte frame limit")]
    PayloadTooLarge { len: usize, limit: usize },
    #[error("failed to flush queue `{name}`: {source}")]
    Flush {
        name: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to append alert to {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no alert log configured for category {0}")]
    NoRoute(AlertCategory),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read replay input: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("failed to spawn worker `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to create latency histogram: {0}")]
    Histogram(#[from] hdrhistogram::CreationError),
    #[error("{0} worker(s) panicked")]
    WorkerPanicked(usize),
}
