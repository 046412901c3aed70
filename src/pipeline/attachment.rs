//! Transient attachment files.
//!
//! A `TransientAttachment` owns one downloaded document on local disk.
//! The file lives under a unique name so no other pipeline run can see or
//! delete it, and it is removed when the value is released or dropped
//! (including during unwinding).

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, info, warn};

/// A locally downloaded document, deleted when released or dropped.
#[derive(Debug)]
pub struct TransientAttachment {
    path: TempPath,
    file_name: String,
}

impl TransientAttachment {
    /// Reserve a fresh, empty file in `dir` for the document `file_name`.
    ///
    /// Only the final path component of `file_name` is used for the local
    /// suffix; the full name is kept for the outgoing message.
    pub fn create_in(dir: &Path, file_name: &str) -> io::Result<Self> {
        let suffix = Path::new(file_name)
            .file_name()
            .map(|n| format!("-{}", n.to_string_lossy()))
            .unwrap_or_default();

        let path = tempfile::Builder::new()
            .prefix("attachment-")
            .suffix(&suffix)
            .tempfile_in(dir)?
            .into_temp_path();

        debug!(path = %path.display(), file = %file_name, "Reserved transient attachment");
        Ok(Self {
            path,
            file_name: file_name.to_string(),
        })
    }

    /// Local path of the downloaded bytes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Document name as configured upstream.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Read the whole document.
    pub async fn read(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path()).await
    }

    /// Delete the local file. A file that is already gone is not an error.
    pub fn remove(self) {
        let shown: PathBuf = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => info!(path = %shown.display(), "Transient attachment removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %shown.display(), "Transient attachment already absent");
            }
            Err(e) => warn!(
                path = %shown.display(),
                error = %e,
                "Failed to remove transient attachment"
            ),
        }
    }
}
