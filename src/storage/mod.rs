//! Uploaded-file storage.
//!
//! Handlers hand a fully-built filename to a [`FileStorage`] backend. Names
//! are checked with [`sanitize_filename`] before they touch the filesystem.

mod local;

pub use local::LocalStorage;

use crate::error::StorageError;

/// Where uploaded files live and how clients reach them.
pub trait FileStorage: Send + Sync {
    /// Writes `bytes` under `filename` and returns the stored path.
    fn store(&self, bytes: &[u8], filename: &str) -> Result<String, StorageError>;

    /// Removes a previously stored path. Missing files are not an error.
    fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Absolute URL (or root-relative path) for a stored path.
    fn public_url(&self, path: &str) -> String;
}

/// Rejects names that could escape the upload directory.
pub fn sanitize_filename(filename: &str) -> Result<&str, StorageError> {
    if filename.is_empty()
        || filename == "."
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
        || filename.contains('\0')
    {
        return Err(StorageError::InvalidFilename);
    }
    Ok(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert!(sanitize_filename("a1b2_1700000000.png").is_ok());

        for bad in ["", ".", "..", "../etc/passwd", "a/b.png", "a\\b.png", "x..png"] {
            assert!(
                matches!(sanitize_filename(bad), Err(StorageError::InvalidFilename)),
                "{bad:?} should be rejected"
            );
        }
    }
}
