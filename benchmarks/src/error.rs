//! Error types for tractbench

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for benchmark runs
#[derive(Error, Debug)]
pub enum BenchError {
    /// Sampling interval was zero, negative or not finite
    #[error("Sampling interval must be a positive number of seconds, got {0}")]
    InvalidInterval(f64),

    /// Usage was requested before a single sample was recorded
    #[error("No memory samples were recorded")]
    NoSamples,

    /// Usage was requested before the monitor was stopped and joined
    #[error("Memory monitor is still running")]
    MonitorRunning,

    #[error("Memory monitor task failed: {0}")]
    MonitorJoin(String),

    /// Save was called with nothing to write
    #[error("No data to save")]
    EmptyTable,

    #[error("CSV header of {path} does not match run records: found [{found}], expected [{expected}]")]
    HeaderMismatch {
        path: PathBuf,
        found: String,
        expected: String,
    },

    #[error("Invalid chunk range: min_chunks {min} is greater than max_chunks {max}")]
    InvalidChunkRange { min: u32, max: u32 },

    #[error("Number of chunks must be at least 1")]
    ZeroChunks,

    #[error("Chunk exponent {0} is too large")]
    ChunkOverflow(u32),

    #[error("Invalid data shape: {0}")]
    InvalidShape(String),

    #[error("{stage} command is not configured")]
    MissingCommand { stage: &'static str },

    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{stage} command exited unsuccessfully: {status}")]
    CommandFailed { stage: &'static str, status: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Cloud error: {0}")]
    Cloud(#[from] tractbench_cloud::CloudError),
}

pub type Result<T> = std::result::Result<T, BenchError>;
