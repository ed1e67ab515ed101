//! Tests for writing profiles into a credentials file on disk

use std::fs;
use tempfile::TempDir;
use tractbench_cloud::{write_profile, CloudError, CredentialsError};

#[test]
fn test_creates_file_and_parent_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join(".aws").join("credentials");

    write_profile(&path, "hcp", "AKIAEXAMPLE", "secret").unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.starts_with("[hcp]\n"));
    assert!(contents.contains("aws_access_key_id = AKIAEXAMPLE"));
    assert!(contents.contains("aws_secret_access_key = secret"));
}

#[test]
fn test_preserves_other_profiles() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("credentials");
    fs::write(
        &path,
        "[default]\naws_access_key_id = DEFAULTKEY\naws_secret_access_key = DEFAULTSECRET\n",
    )
    .unwrap();

    write_profile(&path, "hcp", "HCPKEY", "HCPSECRET").unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("[default]\naws_access_key_id = DEFAULTKEY\naws_secret_access_key = DEFAULTSECRET\n"));
    assert!(contents.contains("[hcp]\naws_access_key_id = HCPKEY\naws_secret_access_key = HCPSECRET\n"));
}

#[test]
fn test_rewriting_a_profile_does_not_duplicate_it() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("credentials");

    write_profile(&path, "hcp", "FIRST", "FIRSTSECRET").unwrap();
    write_profile(&path, "default", "DEF", "DEFSECRET").unwrap();
    write_profile(&path, "hcp", "SECOND", "SECONDSECRET").unwrap();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents.matches("[hcp]").count(), 1);
    assert!(contents.contains("aws_access_key_id = SECOND"));
    assert!(!contents.contains("FIRST"));
    assert!(contents.contains("aws_access_key_id = DEF\n"));
}

#[test]
fn test_rejects_empty_values() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("credentials");

    let err = write_profile(&path, "", "a", "b").unwrap_err();
    assert!(matches!(err, CloudError::Credentials(CredentialsError::EmptyProfile)));

    let err = write_profile(&path, "hcp", "a", " ").unwrap_err();
    assert!(matches!(
        err,
        CloudError::Credentials(CredentialsError::EmptyValue { .. })
    ));

    assert!(!path.exists());
}

#[test]
fn test_rejects_multiline_values() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("credentials");

    let err = write_profile(&path, "hcp", "AKIA\n[default]", "secret").unwrap_err();
    assert!(matches!(
        err,
        CloudError::Credentials(CredentialsError::InvalidValue { .. })
    ));

    let err = write_profile(&path, "hcp]\n[default", "AKIA", "secret").unwrap_err();
    assert!(matches!(
        err,
        CloudError::Credentials(CredentialsError::InvalidValue { field: "profile" })
    ));

    assert!(!path.exists());
}

#[cfg(unix)]
#[test]
fn test_new_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join(".aws").join("credentials");

    write_profile(&path, "hcp", "AKIA", "topsecret").unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0, "credentials mode = {:o}", mode & 0o777);
    assert_eq!(mode & 0o600, 0o600);
}

#[cfg(unix)]
#[test]
fn test_existing_file_is_tightened() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("credentials");
    fs::write(&path, "[default]\naws_access_key_id = DEF\naws_secret_access_key = DEFSECRET\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

    write_profile(&path, "hcp", "AKIA", "topsecret").unwrap();

    let mode = fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0, "credentials mode = {:o}", mode & 0o777);
    assert!(fs::read_to_string(&path).unwrap().contains("aws_access_key_id = DEF\n"));
}
