//! Fakes shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tractbench::{BenchError, FitRequest, Pipeline, TrackingParams};
use tractbench_cloud::ObjectUploader;

/// Pipeline that sleeps for a fixed time and logs each call
#[derive(Default)]
pub struct FakePipeline {
    pub duration: Duration,
    pub fail: bool,
    pub calls: Mutex<Vec<String>>,
    pub fits: Mutex<Vec<FitRequest>>,
    pub exports: Mutex<Vec<TrackingParams>>,
}

impl FakePipeline {
    pub fn taking(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    pub fn failing(duration: Duration) -> Self {
        Self {
            duration,
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn exported_chunks(&self) -> Vec<Option<u64>> {
        self.exports
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.num_chunks)
            .collect()
    }

    async fn work(&self, stage: &'static str) -> tractbench::Result<()> {
        tokio::time::sleep(self.duration).await;
        if self.fail {
            return Err(BenchError::CommandFailed {
                stage,
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Pipeline for FakePipeline {
    async fn fit(&self, request: &FitRequest) -> tractbench::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("fit:{}:{}", request.engine, request.num_chunks));
        self.fits.lock().unwrap().push(request.clone());
        self.work("fit").await
    }

    async fn prepare_streamlines(&self, params: &TrackingParams) -> tractbench::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("prepare:{:?}", params.num_chunks));
        Ok(())
    }

    async fn export_streamlines(&self, params: &TrackingParams) -> tractbench::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("export:{:?}", params.num_chunks));
        self.exports.lock().unwrap().push(params.clone());
        self.work("streamlines").await
    }
}

/// Uploader that records what it was asked to upload
#[derive(Default)]
pub struct RecordingUploader {
    pub uploads: Mutex<Vec<(PathBuf, Option<String>)>>,
}

impl RecordingUploader {
    pub fn uploads(&self) -> Vec<(PathBuf, Option<String>)> {
        self.uploads.lock().unwrap().clone()
    }
}

impl ObjectUploader for RecordingUploader {
    async fn upload(&self, file_path: &Path, object_name: Option<&str>) -> tractbench_cloud::Result<bool> {
        assert!(file_path.exists(), "uploaded file must exist");
        self.uploads
            .lock()
            .unwrap()
            .push((file_path.to_path_buf(), object_name.map(str::to_string)));
        Ok(true)
    }
}

/// Data rows and header lines of a results file
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let text = std::fs::read_to_string(path).unwrap();
    let header_lines = text
        .lines()
        .filter(|l| l.starts_with("timestamp,"))
        .map(str::to_string)
        .collect();

    let mut reader = csv::Reader::from_path(path).unwrap();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();

    (header_lines, rows)
}
