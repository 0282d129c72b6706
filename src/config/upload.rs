//! Upload behaviour configuration

use serde::{Deserialize, Serialize};

/// How files reach the wiki and where they are sorted afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Chunk size for chunked uploads (MiB)
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u64,
    /// Use chunked uploading instead of a single request
    #[serde(default = "default_chunked")]
    pub chunked: bool,
    /// File extensions considered media files, with leading dot
    #[serde(default = "default_file_exts")]
    pub file_exts: Vec<String>,
    /// Directory name for successfully uploaded files
    #[serde(default = "default_done_dir")]
    pub done_dir: String,
}

fn default_chunk_size_mb() -> u64 {
    5
}

fn default_chunked() -> bool {
    true
}

fn default_file_exts() -> Vec<String> {
    [".tif", ".jpg", ".tiff", ".jpeg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_done_dir() -> String {
    "Uploaded".to_string()
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: default_chunk_size_mb(),
            chunked: default_chunked(),
            file_exts: default_file_exts(),
            done_dir: default_done_dir(),
        }
    }
}

impl UploadConfig {
    /// Chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> u64 {
        self.chunk_size_mb * 1024 * 1024
    }

    /// Directory for files whose upload failed, next to `done_dir`.
    pub fn error_dir(&self) -> String {
        format!("{}_errors", self.done_dir)
    }

    /// Directory for files uploaded with warnings overridden.
    pub fn warning_dir(&self) -> String {
        format!("{}_warnings", self.done_dir)
    }
}
