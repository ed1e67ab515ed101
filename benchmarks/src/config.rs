//! Configuration management for tractbench

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{BenchError, Result};

/// Main benchmark configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitoring: MonitoringSettings,
    pub pipeline: PipelineSettings,
    pub output: OutputSettings,
    pub upload: UploadSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    /// Seconds between memory samples
    pub sample_interval_secs: f64,
}

/// Argument vectors for the external pipeline stages
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub fit_command: Vec<String>,
    /// Optional; runs before each streamline export, outside the measurement
    pub prepare_command: Vec<String>,
    pub streamlines_command: Vec<String>,
    pub working_dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub region: String,
    pub bucket: Option<String>,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            sample_interval_secs: 1.0,
        }
    }
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            filename: "data.csv".to_string(),
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            region: tractbench_cloud::upload::DEFAULT_REGION.to_string(),
            bucket: None,
        }
    }
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

impl Config {
    /// Example configuration written by `benchmark-runner config`
    pub fn sample() -> Self {
        Self {
            pipeline: PipelineSettings {
                fit_command: split_command("python pipeline.py fit"),
                prepare_command: split_command("python pipeline.py prepare"),
                streamlines_command: split_command("python pipeline.py streamlines"),
                working_dir: None,
            },
            ..Self::default()
        }
    }

    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `path` when it exists, otherwise defaults, then apply the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => Self::load_from_file(p)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override settings from `TRACTBENCH_*` variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(interval) = lookup("TRACTBENCH_SAMPLE_INTERVAL") {
            self.monitoring.sample_interval_secs = interval.parse().map_err(|_| {
                BenchError::Config(format!("TRACTBENCH_SAMPLE_INTERVAL is not a number: {}", interval))
            })?;
        }

        if let Some(filename) = lookup("TRACTBENCH_FILENAME") {
            self.output.filename = filename;
        }

        if let Some(bucket) = lookup("TRACTBENCH_S3_BUCKET") {
            self.upload.bucket = Some(bucket);
        }

        if let Some(region) = lookup("TRACTBENCH_S3_REGION") {
            self.upload.region = region;
        }

        if let Some(command) = lookup("TRACTBENCH_FIT_COMMAND") {
            self.pipeline.fit_command = split_command(&command);
        }

        if let Some(command) = lookup("TRACTBENCH_PREPARE_COMMAND") {
            self.pipeline.prepare_command = split_command(&command);
        }

        if let Some(command) = lookup("TRACTBENCH_STREAMLINES_COMMAND") {
            self.pipeline.streamlines_command = split_command(&command);
        }

        Ok(())
    }

    /// Sampling interval as a `Duration`
    pub fn sample_interval(&self) -> Result<Duration> {
        let secs = self.monitoring.sample_interval_secs;
        if !(secs > 0.0) {
            return Err(BenchError::InvalidInterval(secs));
        }
        Duration::try_from_secs_f64(secs).map_err(|_| BenchError::InvalidInterval(secs))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.sample_interval()?;

        if self.output.filename.trim().is_empty() {
            return Err(BenchError::Config("output filename must not be empty".to_string()));
        }

        if self.upload.region.trim().is_empty() {
            return Err(BenchError::Config("upload region must not be empty".to_string()));
        }

        if self.upload.bucket.as_deref().is_some_and(|b| b.trim().is_empty()) {
            return Err(BenchError::Config("upload bucket must not be empty when set".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.monitoring.sample_interval_secs, 1.0);
        assert_eq!(config.output.filename, "data.csv");
        assert_eq!(config.upload.region, "us-west-2");
        assert!(config.upload.bucket.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TRACTBENCH_SAMPLE_INTERVAL", "0.5"),
            ("TRACTBENCH_S3_BUCKET", "bench-results"),
            ("TRACTBENCH_STREAMLINES_COMMAND", "python  run.py streamlines"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.sample_interval().unwrap(), Duration::from_millis(500));
        assert_eq!(config.upload.bucket.as_deref(), Some("bench-results"));
        assert_eq!(
            config.pipeline.streamlines_command,
            vec!["python", "run.py", "streamlines"]
        );
        assert!(config.pipeline.fit_command.is_empty());
    }

    #[test]
    fn test_bad_env_interval() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| (key == "TRACTBENCH_SAMPLE_INTERVAL").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_non_positive_interval() {
        let mut config = Config::default();
        config.monitoring.sample_interval_secs = 0.0;
        assert!(matches!(config.validate(), Err(BenchError::InvalidInterval(_))));

        config.monitoring.sample_interval_secs = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tractbench.toml");

        Config::sample().save_to_file(&path).unwrap();
        let loaded = Config::load_from_file(&path).unwrap();

        assert_eq!(loaded.pipeline.fit_command, vec!["python", "pipeline.py", "fit"]);
        assert_eq!(loaded.output.filename, "data.csv");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[output]\nfilename = \"runs.csv\"\n").unwrap();
        assert_eq!(config.output.filename, "runs.csv");
        assert_eq!(config.monitoring.sample_interval_secs, 1.0);
    }
}
