//! Object storage upload for benchmark results
//!
//! Results files are handed to S3 as a single `put_object` call. There is no
//! multipart or retry logic; a failed upload is returned to the caller.

use aws_config::{meta::region::RegionProviderChain, BehaviorVersion};
use aws_sdk_s3::{error::DisplayErrorContext, primitives::ByteStream, Client as S3Client};
use aws_types::region::Region;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, UploadError};

/// Region used when none is configured
pub const DEFAULT_REGION: &str = "us-west-2";

/// Static access key pair for the destination bucket
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessKeys {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for AccessKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeys")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

impl AccessKeys {
    /// Builds a key pair when both halves are present
    pub fn from_parts(access_key_id: Option<String>, secret_access_key: Option<String>) -> Option<Self> {
        match (access_key_id, secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Self {
                access_key_id,
                secret_access_key,
            }),
            _ => None,
        }
    }
}

/// S3 upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3UploadConfig {
    pub bucket_name: String,
    pub region: String,
    pub credentials: Option<AccessKeys>,
}

impl S3UploadConfig {
    pub fn new(bucket_name: impl Into<String>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            region: DEFAULT_REGION.to_string(),
            credentials: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Option<AccessKeys>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// Narrow upload capability: put one local file under an object name
pub trait ObjectUploader {
    /// Uploads `file_path` as `object_name`, or as the file name when no
    /// object name is given. Returns `true` once the store accepted it.
    async fn upload(&self, file_path: &Path, object_name: Option<&str>) -> Result<bool>;
}

/// Uploader backed by an S3 client
pub struct S3Uploader {
    config: S3UploadConfig,
    client: S3Client,
}

impl S3Uploader {
    /// Create a new uploader, resolving region and credentials
    pub async fn new(config: S3UploadConfig) -> Result<Self> {
        if config.bucket_name.trim().is_empty() {
            return Err(UploadError::MissingBucket.into());
        }

        let client = create_s3_client(&config).await;
        info!("S3 client initialized for bucket: {}", config.bucket_name);

        Ok(Self { config, client })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket_name
    }
}

impl ObjectUploader for S3Uploader {
    async fn upload(&self, file_path: &Path, object_name: Option<&str>) -> Result<bool> {
        let key = resolve_object_name(file_path, object_name)?;

        if !file_path.is_file() {
            return Err(UploadError::FileNotFound {
                path: file_path.to_path_buf(),
            }
            .into());
        }

        let body = ByteStream::from_path(file_path)
            .await
            .map_err(|e| UploadError::ReadFailed {
                path: file_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        debug!(
            "Uploading {} to s3://{}/{}",
            file_path.display(),
            self.config.bucket_name,
            key
        );

        self.client
            .put_object()
            .bucket(&self.config.bucket_name)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::PutObject {
                bucket: self.config.bucket_name.clone(),
                key: key.clone(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;

        info!("Uploaded {} to s3://{}/{}", file_path.display(), self.config.bucket_name, key);
        Ok(true)
    }
}

async fn create_s3_client(config: &S3UploadConfig) -> S3Client {
    let region_provider =
        RegionProviderChain::first_try(Region::new(config.region.clone())).or_default_provider();

    let mut config_builder = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);

    // Explicit keys win over the default provider chain
    if let Some(keys) = &config.credentials {
        let credentials = aws_credential_types::Credentials::new(
            &keys.access_key_id,
            &keys.secret_access_key,
            None,
            None,
            "tractbench-upload",
        );
        config_builder = config_builder.credentials_provider(credentials);
    }

    let sdk_config = config_builder.load().await;
    S3Client::new(&sdk_config)
}

/// Object key for an upload: the explicit name, or the local file name
pub fn resolve_object_name(file_path: &Path, object_name: Option<&str>) -> Result<String> {
    if let Some(name) = object_name.filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }

    file_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| {
            UploadError::InvalidObjectName {
                path: file_path.to_path_buf(),
            }
            .into()
        })
}
