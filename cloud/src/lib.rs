//! Cloud helpers for tractbench
//!
//! - Uploading result files to S3
//! - Writing access key profiles into the shared credentials file

pub mod credentials;
pub mod error;
pub mod upload;

pub use credentials::{default_credentials_path, write_profile};
pub use error::{CloudError, CredentialsError, Result, UploadError};
pub use upload::{AccessKeys, ObjectUploader, S3UploadConfig, S3Uploader};
