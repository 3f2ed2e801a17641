//! Reader for the shell-hook status file.
//!
//! The file is produced by a prompt hook outside this process. We only read
//! it, once per tick, and any failure degrades to an empty status.

use fs_err as fs;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PresenceError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub cwd: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub branch: String,
}

#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> SessionStatus {
        match read_status_file(&self.path) {
            Ok(status) => status,
            Err(err) => {
                if !err.is_not_found() {
                    debug!(error = %err, "Status file unreadable; using empty status");
                }
                SessionStatus::default()
            }
        }
    }
}

pub fn read_status_file(path: &Path) -> Result<SessionStatus> {
    let content = fs::read_to_string(path).map_err(|source| PresenceError::Io {
        context: format!("reading status file {}", path.display()),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| PresenceError::Json {
        context: format!("parsing status file {}", path.display()),
        source,
    })
}

/// Treats an explicit JSON `null` like a missing key.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_cwd_and_branch() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("status.json");
        std::fs::write(
            &path,
            r#"{"cwd":"/home/u/project","branch":"main","shell":"zsh"}"#,
        )
        .expect("write status");

        let status = StatusFile::new(&path).read();
        assert_eq!(status.cwd, "/home/u/project");
        assert_eq!(status.branch, "main");
    }

    #[test]
    fn missing_fields_and_nulls_default_to_empty() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("status.json");
        std::fs::write(&path, r#"{"cwd":null}"#).expect("write status");

        assert_eq!(StatusFile::new(&path).read(), SessionStatus::default());
    }

    #[test]
    fn missing_file_yields_empty_status() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let file = StatusFile::new(temp_dir.path().join("missing.json"));
        assert_eq!(file.read(), SessionStatus::default());
    }

    #[test]
    fn malformed_file_yields_empty_status() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("status.json");
        std::fs::write(&path, "{not json").expect("write status");

        assert!(matches!(
            read_status_file(&path),
            Err(PresenceError::Json { .. })
        ));
        assert_eq!(StatusFile::new(&path).read(), SessionStatus::default());
    }
}
