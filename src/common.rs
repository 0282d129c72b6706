//! Shared file and list helpers used across the toolkit.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the shared helpers.
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("cannot create directory '{0}': a file with that name exists")]
    DirectoryIsFile(PathBuf),
}

/// Read a whole file as a UTF-8 string.
pub fn read_file(path: impl AsRef<Path>) -> Result<String, CommonError> {
    Ok(std::fs::read_to_string(path)?)
}

/// Write a string to a file, creating or truncating it.
pub fn write_file(path: impl AsRef<Path>, text: &str) -> Result<(), CommonError> {
    Ok(std::fs::write(path, text)?)
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, CommonError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Serialize a value as pretty-printed JSON and write it to a file.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), CommonError> {
    let text = serde_json::to_string_pretty(value)?;
    Ok(std::fs::write(path, text)?)
}

/// Create a directory if it does not already exist.
///
/// Unlike `create_dir_all` this refuses to shadow an existing file of the
/// same name with a clear error instead of the raw OS one.
pub fn create_dir(path: impl AsRef<Path>) -> Result<(), CommonError> {
    let path = path.as_ref();
    if path.is_file() {
        return Err(CommonError::DirectoryIsFile(path.to_path_buf()));
    }
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Strip whitespace from every entry in a list.
pub fn strip_list_entries(list: &[String]) -> Vec<String> {
    list.iter().map(|s| s.trim().to_string()).collect()
}

/// Strip whitespace from every entry and drop any that end up empty.
pub fn trim_list(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// An append-only log file where every line carries a timestamp.
///
/// Upload runs produce one of these per outcome class so that failed or
/// warned files can be fed back into a later run.
pub struct LogFile {
    path: PathBuf,
    file: File,
}

impl LogFile {
    /// Open (or create) a log file inside `dir`.
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Result<Self, CommonError> {
        let path = dir.as_ref().join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    /// Append a raw line.
    pub fn write_line(&mut self, line: &str) -> Result<(), CommonError> {
        writeln!(self.file, "{}", line)?;
        Ok(())
    }

    /// Append a line prefixed with the current UTC timestamp.
    pub fn write_with_timestamp(&mut self, line: &str) -> Result<(), CommonError> {
        let stamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.file, "{} {}", stamp, line)?;
        Ok(())
    }

    /// Flush and return a human confirmation of where the log went.
    pub fn close_and_confirm(mut self) -> Result<String, CommonError> {
        self.file.flush()?;
        Ok(format!("Created {}", self.path.display()))
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
