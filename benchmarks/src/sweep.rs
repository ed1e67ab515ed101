//! Repeated trials over a chunk schedule, publishing after every trial

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tractbench_cloud::ObjectUploader;

use crate::error::Result;
use crate::pipeline::{DataShape, Pipeline, TrackingParams};
use crate::record::RunTable;
use crate::runner::{BenchmarkRunner, FitTrial};
use crate::schedule::ChunkSchedule;

/// `<path without extension>_<uuid>.csv`, unique per call
pub fn unique_object_name(filename: &Path) -> String {
    let base = filename.with_extension("");
    format!("{}_{}.csv", base.to_string_lossy(), uuid::Uuid::new_v4().simple())
}

/// Saves the run table and uploads the results file
pub struct ResultPublisher<U> {
    filename: PathBuf,
    object_name: String,
    uploader: Option<U>,
}

impl<U: ObjectUploader> ResultPublisher<U> {
    /// The object name is fixed for the lifetime of the publisher, so every
    /// upload replaces the previous copy of the growing file.
    pub fn new(filename: impl Into<PathBuf>, uploader: Option<U>) -> Self {
        let filename = filename.into();
        let object_name = unique_object_name(&filename);
        Self {
            filename,
            object_name,
            uploader,
        }
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn uploader(&self) -> Option<&U> {
        self.uploader.as_ref()
    }

    /// Save `table` to the results file, then upload the file
    pub async fn publish(&self, table: &mut RunTable) -> Result<()> {
        table.save(&self.filename)?;

        match &self.uploader {
            Some(uploader) => {
                uploader
                    .upload(&self.filename, Some(&self.object_name))
                    .await?;
            }
            None => warn!(
                "No bucket configured, {} was not uploaded",
                self.filename.display()
            ),
        }

        Ok(())
    }
}

/// Streamline export trials
#[derive(Debug, Clone)]
pub struct StreamlineSweep {
    pub base_params: TrackingParams,
    pub schedule: ChunkSchedule,
    pub num_runs: u32,
}

/// Model fit trials, every engine at every chunk count
#[derive(Debug, Clone)]
pub struct FitSweep {
    pub engines: Vec<String>,
    pub model: String,
    pub num_vox: u64,
    pub data_shape: Option<DataShape>,
    pub schedule: ChunkSchedule,
    pub num_runs: u32,
}

/// Run every streamline trial, publishing after each. Returns elapsed seconds per trial.
pub async fn run_streamline_sweep<P, U>(
    runner: &mut BenchmarkRunner<P>,
    publisher: &ResultPublisher<U>,
    sweep: &StreamlineSweep,
) -> Result<Vec<f64>>
where
    P: Pipeline,
    U: ObjectUploader,
{
    let mut times = Vec::new();

    for run in 0..sweep.num_runs {
        info!("Run {}/{}", run + 1, sweep.num_runs);

        for &num_chunks in sweep.schedule.values() {
            let params = sweep.base_params.with_num_chunks(num_chunks);
            times.push(runner.generate_streamlines(&params, true).await?);
            publisher.publish(runner.table_mut()).await?;
        }
    }

    Ok(times)
}

/// Run every fit trial, publishing after each. Returns elapsed seconds per trial.
pub async fn run_fit_sweep<P, U>(
    runner: &mut BenchmarkRunner<P>,
    publisher: &ResultPublisher<U>,
    sweep: &FitSweep,
) -> Result<Vec<f64>>
where
    P: Pipeline,
    U: ObjectUploader,
{
    let mut times = Vec::new();

    for run in 0..sweep.num_runs {
        info!("Run {}/{}", run + 1, sweep.num_runs);

        for engine in &sweep.engines {
            for &num_chunks in sweep.schedule.values() {
                let trial = FitTrial {
                    engine: engine.clone(),
                    model: sweep.model.clone(),
                    num_chunks,
                    num_vox: sweep.num_vox,
                    data_shape: sweep.data_shape.clone(),
                };
                times.push(runner.run_fit(&trial, true).await?);
                publisher.publish(runner.table_mut()).await?;
            }
        }
    }

    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_object_name_keeps_base_path() {
        let name = unique_object_name(Path::new("results/data.csv"));
        assert!(name.starts_with("results/data_"));
        assert!(name.ends_with(".csv"));
        // 32 hex characters of uuid between the underscore and the extension
        let id = &name["results/data_".len()..name.len() - ".csv".len()];
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unique_object_names_differ() {
        let a = unique_object_name(Path::new("data.csv"));
        let b = unique_object_name(Path::new("data.csv"));
        assert_ne!(a, b);
    }
}
