//! Error handling for tractbench cloud operations

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The main error type for uploads and credential files
#[derive(Error, Debug)]
pub enum CloudError {
    /// Upload related errors
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Credentials file errors
    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Upload specific errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Bucket name must not be empty")]
    MissingBucket,

    #[error("Local file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Cannot derive an object name from {path}")]
    InvalidObjectName { path: PathBuf },

    #[error("Failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("S3 put_object to {bucket}/{key} failed: {reason}")]
    PutObject {
        bucket: String,
        key: String,
        reason: String,
    },
}

/// Credentials file specific errors
#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("Profile name must not be empty")]
    EmptyProfile,

    #[error("Credential value for {field} must not be empty")]
    EmptyValue { field: &'static str },

    #[error("Credential value for {field} must be a single line")]
    InvalidValue { field: &'static str },

    #[error("Cannot locate a home directory for the default credentials file")]
    NoHomeDirectory,

    #[error("Malformed credentials file {path} at line {line}")]
    Malformed { path: PathBuf, line: usize },
}

/// Result type alias for cloud operations
pub type Result<T> = std::result::Result<T, CloudError>;
