//! Trial execution: run the pipeline under a memory monitor and record it

use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::Result;
use crate::monitoring::{self, MemoryMonitor, MemoryUsage};
use crate::pipeline::{vox_per_chunk, DataShape, FitRequest, Pipeline, TrackingParams};
use crate::record::{RunMode, RunRecord, RunTable};
use crate::utils::Timer;

/// Host facts recorded with every trial, sampled once per runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentFacts {
    pub cpu_count: usize,
    /// Total system memory in bytes
    pub memory_size: u64,
}

impl EnvironmentFacts {
    pub fn detect() -> Self {
        Self {
            cpu_count: num_cpus::get(),
            memory_size: monitoring::total_memory_bytes(),
        }
    }

    /// Replace the detected CPU count, e.g. when the pipeline is limited
    pub fn with_cpu_count(mut self, cpu_count: Option<usize>) -> Self {
        if let Some(count) = cpu_count {
            self.cpu_count = count;
        }
        self
    }
}

/// One model fit to measure
#[derive(Debug, Clone, PartialEq)]
pub struct FitTrial {
    pub engine: String,
    pub model: String,
    pub num_chunks: u64,
    /// Non-zero voxels in the brain mask
    pub num_vox: u64,
    pub data_shape: Option<DataShape>,
}

/// Wall-clock time and memory of one measured computation
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub elapsed: Duration,
    pub usage: MemoryUsage,
}

/// Runs trials against a pipeline and accumulates their records
pub struct BenchmarkRunner<P> {
    pipeline: P,
    facts: EnvironmentFacts,
    sample_interval: Duration,
    table: RunTable,
}

impl<P: Pipeline> BenchmarkRunner<P> {
    pub fn new(pipeline: P, facts: EnvironmentFacts, sample_interval: Duration) -> Self {
        Self {
            pipeline,
            facts,
            sample_interval,
            table: RunTable::new(),
        }
    }

    pub fn facts(&self) -> EnvironmentFacts {
        self.facts
    }

    pub fn table(&self) -> &RunTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut RunTable {
        &mut self.table
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    /// Save and clear the accumulated records
    pub fn save(&mut self, path: &Path) -> Result<usize> {
        self.table.save(path)
    }

    /// Measure one model fit. Returns the elapsed seconds.
    pub async fn run_fit(&mut self, trial: &FitTrial, save: bool) -> Result<f64> {
        let vox_per_chunk = vox_per_chunk(trial.num_vox, trial.num_chunks)?;

        info!(
            "Running fit with engine: {}, vox_per_chunk: {}, num_chunks: {}",
            trial.engine, vox_per_chunk, trial.num_chunks
        );

        let request = FitRequest {
            engine: trial.engine.clone(),
            model: trial.model.clone(),
            num_chunks: trial.num_chunks,
            vox_per_chunk,
        };

        let measurement = measure(self.sample_interval, self.pipeline.fit(&request)).await?;
        let time = measurement.elapsed.as_secs_f64();
        let peak_gb = measurement.usage.peak_gb();

        let record = RunRecord {
            timestamp: Utc::now(),
            mode: RunMode::Fit,
            engine: Some(trial.engine.clone()),
            model: Some(trial.model.clone()),
            num_chunks: Some(trial.num_chunks),
            vox_per_chunk: Some(vox_per_chunk),
            num_vox: Some(trial.num_vox),
            data_shape: trial.data_shape.as_ref().map(|s| s.to_string()),
            params: None,
            time,
            cpu_count: self.facts.cpu_count,
            memory_size: self.facts.memory_size,
            avg_mem: measurement.usage.average_gb,
            mem_usage: measurement.usage.samples_gb,
        };
        self.record(record, save);

        info!("time: {:.3}s, peak memory: {:.2} GB", time, peak_gb);
        Ok(time)
    }

    /// Measure one streamline export. Returns the elapsed seconds.
    pub async fn generate_streamlines(&mut self, params: &TrackingParams, save: bool) -> Result<f64> {
        let params_json = params.to_json()?;
        info!("Running generate_streamlines with params: {}", params_json);

        self.pipeline.prepare_streamlines(params).await?;

        let measurement = measure(self.sample_interval, self.pipeline.export_streamlines(params)).await?;
        let time = measurement.elapsed.as_secs_f64();
        let peak_gb = measurement.usage.peak_gb();

        let record = RunRecord {
            timestamp: Utc::now(),
            mode: RunMode::Streamlines,
            engine: None,
            model: None,
            num_chunks: params.num_chunks,
            vox_per_chunk: None,
            num_vox: None,
            data_shape: None,
            params: Some(params_json),
            time,
            cpu_count: self.facts.cpu_count,
            memory_size: self.facts.memory_size,
            avg_mem: measurement.usage.average_gb,
            mem_usage: measurement.usage.samples_gb,
        };
        self.record(record, save);

        info!("Elapsed time: {:.3} seconds, peak memory: {:.2} GB", time, peak_gb);
        Ok(time)
    }

    fn record(&mut self, record: RunRecord, save: bool) {
        if save {
            self.table.push(record);
        } else {
            info!("Recording disabled, trial result not saved");
        }
    }
}

/// Await `computation` under a fresh memory monitor.
///
/// The monitor is stopped and joined before any error from `computation`
/// is returned.
pub async fn measure<F>(interval: Duration, computation: F) -> Result<Measurement>
where
    F: std::future::Future<Output = Result<()>>,
{
    let monitor = MemoryMonitor::start(interval)?;

    let (outcome, usage) = monitor
        .observe(async move {
            let timer = Timer::start();
            computation.await.map(|()| timer.elapsed())
        })
        .await;

    let elapsed = outcome?;
    Ok(Measurement {
        elapsed,
        usage: usage?,
    })
}
