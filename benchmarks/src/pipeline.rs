//! The external tractography pipeline being benchmarked
//!
//! The pipeline is opaque to the harness. [`CommandPipeline`] launches the
//! configured commands and passes trial parameters through the environment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::PipelineSettings;
use crate::error::{BenchError, Result};

pub const ENV_ENGINE: &str = "TRACTBENCH_ENGINE";
pub const ENV_MODEL: &str = "TRACTBENCH_MODEL";
pub const ENV_NUM_CHUNKS: &str = "TRACTBENCH_NUM_CHUNKS";
pub const ENV_VOX_PER_CHUNK: &str = "TRACTBENCH_VOX_PER_CHUNK";
pub const ENV_TRACKING_PARAMS: &str = "TRACTBENCH_TRACKING_PARAMS";

/// Parameters of one model fit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitRequest {
    pub engine: String,
    pub model: String,
    pub num_chunks: u64,
    pub vox_per_chunk: u64,
}

/// Tracking parameters handed to the streamline export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingParams {
    pub n_seeds: u64,
    pub random_seeds: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seeds: Option<String>,
    pub trx: bool,
    pub num_chunks: Option<u64>,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            n_seeds: 1,
            random_seeds: false,
            rng_seeds: None,
            trx: true,
            num_chunks: None,
        }
    }
}

impl TrackingParams {
    pub fn with_num_chunks(&self, num_chunks: u64) -> Self {
        Self {
            num_chunks: Some(num_chunks),
            ..self.clone()
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Dimensions of the diffusion data, e.g. `(81, 106, 76, 160)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataShape(pub Vec<usize>);

impl fmt::Display for DataShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims = self
            .0
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({})", dims)
    }
}

impl FromStr for DataShape {
    type Err = BenchError;

    /// Accepts `81,106,76,160`, `81x106x76x160` or `(81, 106, 76, 160)`
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let dims = trimmed
            .split(|c: char| c == ',' || c == 'x')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(|d| {
                d.parse::<usize>()
                    .map_err(|_| BenchError::InvalidShape(s.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        if dims.is_empty() || dims.contains(&0) {
            return Err(BenchError::InvalidShape(s.to_string()));
        }
        Ok(Self(dims))
    }
}

/// Count the non-zero voxels of a raw `u8` brain mask
pub fn count_mask_voxels(path: &Path) -> Result<u64> {
    let bytes = std::fs::read(path)?;
    let count = bytes.iter().filter(|&&b| b != 0).count() as u64;
    debug!("Mask {} has {} non-zero voxels", path.display(), count);
    Ok(count)
}

/// Approximate voxels per chunk for a target chunk count
pub fn vox_per_chunk(num_vox: u64, num_chunks: u64) -> Result<u64> {
    if num_chunks == 0 {
        return Err(BenchError::ZeroChunks);
    }
    Ok(num_vox / num_chunks)
}

/// The computations a trial can measure
pub trait Pipeline {
    /// Fit the model over the masked data
    async fn fit(&self, request: &FitRequest) -> Result<()>;

    /// Run everything that precedes streamline export. Not measured.
    async fn prepare_streamlines(&self, params: &TrackingParams) -> Result<()>;

    /// Generate and export streamlines
    async fn export_streamlines(&self, params: &TrackingParams) -> Result<()>;
}

/// Pipeline that runs external commands
pub struct CommandPipeline {
    settings: PipelineSettings,
}

impl CommandPipeline {
    pub fn new(settings: PipelineSettings) -> Self {
        Self { settings }
    }

    async fn run(&self, stage: &'static str, argv: &[String], envs: &[(&str, String)]) -> Result<()> {
        let (program, args) = argv
            .split_first()
            .ok_or(BenchError::MissingCommand { stage })?;

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);
        for (key, value) in envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.settings.working_dir {
            command.current_dir(dir);
        }

        info!("Running {} command: {}", stage, argv.join(" "));
        let status = command.status().await.map_err(|source| BenchError::Spawn {
            program: program.clone(),
            source,
        })?;

        if !status.success() {
            return Err(BenchError::CommandFailed {
                stage,
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

impl Pipeline for CommandPipeline {
    async fn fit(&self, request: &FitRequest) -> Result<()> {
        let envs = [
            (ENV_ENGINE, request.engine.clone()),
            (ENV_MODEL, request.model.clone()),
            (ENV_NUM_CHUNKS, request.num_chunks.to_string()),
            (ENV_VOX_PER_CHUNK, request.vox_per_chunk.to_string()),
        ];
        self.run("fit", &self.settings.fit_command, &envs).await
    }

    async fn prepare_streamlines(&self, params: &TrackingParams) -> Result<()> {
        if self.settings.prepare_command.is_empty() {
            debug!("No prepare command configured, skipping");
            return Ok(());
        }
        let envs = [(ENV_TRACKING_PARAMS, params.to_json()?)];
        self.run("prepare", &self.settings.prepare_command, &envs).await
    }

    async fn export_streamlines(&self, params: &TrackingParams) -> Result<()> {
        let mut envs = vec![(ENV_TRACKING_PARAMS, params.to_json()?)];
        if let Some(num_chunks) = params.num_chunks {
            envs.push((ENV_NUM_CHUNKS, num_chunks.to_string()));
        }
        self.run("streamlines", &self.settings.streamlines_command, &envs)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vox_per_chunk_rounds_down() {
        assert_eq!(vox_per_chunk(1000, 3).unwrap(), 333);
        assert_eq!(vox_per_chunk(10, 1).unwrap(), 10);
        assert!(matches!(vox_per_chunk(10, 0), Err(BenchError::ZeroChunks)));
    }

    #[test]
    fn test_data_shape_parsing() {
        let shape: DataShape = "81,106,76,160".parse().unwrap();
        assert_eq!(shape, DataShape(vec![81, 106, 76, 160]));
        assert_eq!(shape.to_string(), "(81, 106, 76, 160)");

        let shape: DataShape = "(96, 96, 60)".parse().unwrap();
        assert_eq!(shape.0, vec![96, 96, 60]);

        let shape: DataShape = "4x4".parse().unwrap();
        assert_eq!(shape.0, vec![4, 4]);

        assert!("".parse::<DataShape>().is_err());
        assert!("1,0".parse::<DataShape>().is_err());
        assert!("a,b".parse::<DataShape>().is_err());
    }

    #[test]
    fn test_tracking_params_json() {
        let params = TrackingParams::default().with_num_chunks(8);
        let json = params.to_json().unwrap();
        assert_eq!(
            json,
            r#"{"n_seeds":1,"random_seeds":false,"trx":true,"num_chunks":8}"#
        );

        let params = TrackingParams {
            rng_seeds: Some("42".to_string()),
            ..TrackingParams::default()
        };
        assert!(params.to_json().unwrap().contains(r#""rng_seeds":"42""#));
    }

    #[test]
    fn test_count_mask_voxels() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mask.bin");
        std::fs::write(&path, [0u8, 1, 0, 255, 3, 0]).unwrap();
        assert_eq!(count_mask_voxels(&path).unwrap(), 3);
    }

    #[tokio::test]
    async fn test_missing_command_is_an_error() {
        let pipeline = CommandPipeline::new(PipelineSettings::default());
        let request = FitRequest {
            engine: "serial".to_string(),
            model: "CSD".to_string(),
            num_chunks: 1,
            vox_per_chunk: 10,
        };
        let err = pipeline.fit(&request).await.unwrap_err();
        assert!(matches!(err, BenchError::MissingCommand { stage: "fit" }));

        // An unset prepare command is skipped
        pipeline
            .prepare_streamlines(&TrackingParams::default())
            .await
            .unwrap();
    }
}
