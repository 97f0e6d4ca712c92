use super::{sanitize_filename, FileStorage};
use crate::error::StorageError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Stores files in a local directory served under `/<dir name>/`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    upload_dir: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// `base_url` may be empty, in which case public URLs are root-relative.
    pub fn new(upload_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// URL prefix stored paths start with, e.g. `/uploads`.
    pub fn url_prefix(&self) -> String {
        let name = self
            .upload_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "uploads".to_string());
        format!("/{name}")
    }

    fn ensure_dir(&self) -> Result<(), StorageError> {
        if self.upload_dir.is_dir() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o750);
        }
        builder.create(&self.upload_dir)?;
        Ok(())
    }
}

impl FileStorage for LocalStorage {
    fn store(&self, bytes: &[u8], filename: &str) -> Result<String, StorageError> {
        let filename = sanitize_filename(filename)?;
        self.ensure_dir()?;

        let target = self.upload_dir.join(filename);
        fs::write(&target, bytes)?;
        debug!(path = %target.display(), size = bytes.len(), "Stored file");

        Ok(format!("{}/{}", self.url_prefix(), filename))
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        // Stored paths are `/<dir>/<file>`; only the file name is trusted.
        let name = path.rsplit('/').next().unwrap_or_default();
        let name = sanitize_filename(name)?;

        match fs::remove_file(self.upload_dir.join(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                warn!(path, error = %err, "Failed to delete stored file");
                Err(err.into())
            }
        }
    }

    fn public_url(&self, path: &str) -> String {
        if self.base_url.is_empty() {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}
