//! Run records and the CSV-backed run table

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{BenchError, Result};
use crate::utils::format;

/// CSV columns, in the order the fields of [`RunRecord`] are declared
pub const COLUMNS: [&str; 14] = [
    "timestamp",
    "mode",
    "engine",
    "model",
    "num_chunks",
    "vox_per_chunk",
    "num_vox",
    "data_shape",
    "params",
    "time",
    "cpu_count",
    "memory_size",
    "avg_mem",
    "mem_usage",
];

/// Which external computation a trial measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Fit,
    Streamlines,
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunMode::Fit => write!(f, "fit"),
            RunMode::Streamlines => write!(f, "streamlines"),
        }
    }
}

/// Result of one trial.
///
/// Both modes share this schema; columns that do not apply to a mode are
/// left empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub mode: RunMode,
    pub engine: Option<String>,
    pub model: Option<String>,
    pub num_chunks: Option<u64>,
    pub vox_per_chunk: Option<u64>,
    pub num_vox: Option<u64>,
    pub data_shape: Option<String>,
    /// Tracking parameters as JSON
    pub params: Option<String>,
    /// Elapsed seconds
    pub time: f64,
    pub cpu_count: usize,
    /// Total system memory in bytes
    pub memory_size: u64,
    /// Mean used memory in GB
    pub avg_mem: f64,
    #[serde(serialize_with = "serialize_samples")]
    pub mem_usage: Vec<f64>,
}

fn serialize_samples<S>(samples: &[f64], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format::samples_list(samples))
}

/// Records accumulated since the last save
#[derive(Debug, Default)]
pub struct RunTable {
    records: Vec<RunRecord>,
}

impl RunTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: RunRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }

    /// Append every record to `path` as CSV, then clear the table.
    ///
    /// A header is written only when the file is missing or empty. An
    /// existing header must match [`COLUMNS`]. Returns the number of rows
    /// written.
    pub fn save(&mut self, path: &Path) -> Result<usize> {
        if self.records.is_empty() {
            return Err(BenchError::EmptyTable);
        }

        let has_content = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        if has_content {
            check_header(path)?;
        }

        // Rows are appended with a single write
        let mut writer = csv::WriterBuilder::new()
            .has_headers(!has_content)
            .from_writer(Vec::new());
        for record in &self.records {
            writer.serialize(record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| BenchError::Io(e.into_error()))?;

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(&bytes)?;
        file.flush()?;

        let written = self.records.len();
        self.records.clear();

        info!("Saved {} run records to {}", written, path.display());
        Ok(written)
    }
}

fn check_header(path: &Path) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let header = reader.headers()?;

    if header.iter().eq(COLUMNS.iter().copied()) {
        debug!("Appending to existing results file {}", path.display());
        return Ok(());
    }

    Err(BenchError::HeaderMismatch {
        path: path.to_path_buf(),
        found: header.iter().collect::<Vec<_>>().join(","),
        expected: COLUMNS.join(","),
    })
}
