//! Shared credentials file handling
//!
//! Writes a named profile into an INI-style credentials file such as
//! `~/.aws/credentials`. Sections other than the target profile are kept
//! byte-for-byte, and so are unrelated keys inside the target profile.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{CredentialsError, Result};

const ACCESS_KEY_FIELD: &str = "aws_access_key_id";
const SECRET_KEY_FIELD: &str = "aws_secret_access_key";

/// Owner read/write only; the file holds secret keys
#[cfg(unix)]
const CREDENTIALS_MODE: u32 = 0o600;

/// Location of the shared credentials file.
///
/// `AWS_SHARED_CREDENTIALS_FILE` wins when set, otherwise
/// `$HOME/.aws/credentials`.
pub fn default_credentials_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("AWS_SHARED_CREDENTIALS_FILE") {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p));
        }
    }

    let home = dirs::home_dir().ok_or(CredentialsError::NoHomeDirectory)?;
    Ok(home.join(".aws").join("credentials"))
}

/// One `[name]` block and the raw lines that follow it
#[derive(Debug, Clone, PartialEq)]
struct Section {
    name: Option<String>,
    lines: Vec<String>,
}

fn parse_sections(contents: &str, path: &Path) -> Result<Vec<Section>> {
    let mut sections = vec![Section {
        name: None,
        lines: Vec::new(),
    }];

    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(CredentialsError::Malformed {
                    path: path.to_path_buf(),
                    line: idx + 1,
                }
                .into());
            }
            let name = line[1..line.len() - 1].trim().to_string();
            sections.push(Section {
                name: Some(name),
                lines: Vec::new(),
            });
            continue;
        }

        if let Some(last) = sections.last_mut() {
            last.lines.push(raw.to_string());
        }
    }

    Ok(sections)
}

fn line_key(line: &str) -> Option<String> {
    let line = line.trim();
    if line.starts_with('#') || line.starts_with(';') {
        return None;
    }
    let eq = line.find('=')?;
    Some(line[..eq].trim().to_ascii_lowercase())
}

fn render(sections: &[Section]) -> String {
    let mut out = String::new();
    for section in sections {
        if let Some(name) = &section.name {
            out.push('[');
            out.push_str(name);
            out.push_str("]\n");
        }
        for line in &section.lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Merge one profile into existing credentials file contents
pub fn merge_profile(
    contents: &str,
    path: &Path,
    profile: &str,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<String> {
    let mut sections = parse_sections(contents, path)?;

    let new_lines = [
        format!("{} = {}", ACCESS_KEY_FIELD, access_key_id),
        format!("{} = {}", SECRET_KEY_FIELD, secret_access_key),
    ];

    match sections
        .iter_mut()
        .find(|s| s.name.as_deref() == Some(profile))
    {
        Some(section) => {
            section.lines.retain(|l| {
                !matches!(line_key(l).as_deref(), Some(ACCESS_KEY_FIELD) | Some(SECRET_KEY_FIELD))
            });
            // Keys go first, before any trailing blank separator lines
            let insert_at = section
                .lines
                .iter()
                .rposition(|l| !l.trim().is_empty())
                .map(|i| i + 1)
                .unwrap_or(0);
            for (offset, line) in new_lines.into_iter().enumerate() {
                section.lines.insert(insert_at + offset, line);
            }
        }
        None => {
            if let Some(last) = sections.last_mut() {
                if last.lines.last().is_some_and(|l| !l.trim().is_empty()) {
                    last.lines.push(String::new());
                }
            }
            sections.push(Section {
                name: Some(profile.to_string()),
                lines: new_lines.to_vec(),
            });
        }
    }

    Ok(render(&sections))
}

fn check_value(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CredentialsError::EmptyValue { field }.into());
    }
    if value.contains(['\n', '\r']) {
        return Err(CredentialsError::InvalidValue { field }.into());
    }
    Ok(())
}

/// Replace the file contents, leaving it readable by the owner only
fn write_private(path: &Path, contents: &str) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        options.mode(CREDENTIALS_MODE);
        let mut file = options.open(path)?;
        // `mode` only applies to newly created files
        file.set_permissions(fs::Permissions::from_mode(CREDENTIALS_MODE))?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }

    #[cfg(not(unix))]
    {
        let mut file = options.open(path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }

    Ok(())
}

/// Write `profile` into the credentials file at `path`.
///
/// Creates the file and its parent directory when absent. On unix the file
/// is left with mode `0600`.
pub fn write_profile(
    path: &Path,
    profile: &str,
    access_key_id: &str,
    secret_access_key: &str,
) -> Result<()> {
    if profile.trim().is_empty() {
        return Err(CredentialsError::EmptyProfile.into());
    }
    if profile.contains(['[', ']', '\n', '\r']) {
        return Err(CredentialsError::InvalidValue { field: "profile" }.into());
    }
    check_value(ACCESS_KEY_FIELD, access_key_id)?;
    check_value(SECRET_KEY_FIELD, secret_access_key)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let existing = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let merged = merge_profile(&existing, path, profile, access_key_id, secret_access_key)?;
    write_private(path, &merged)?;

    info!("Wrote credentials profile [{}] to {}", profile, path.display());
    Ok(())
}
