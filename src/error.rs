//! Error types for the library layers.
//!
//! HTTP-facing errors live in [`crate::api::ApiError`]; these are the errors
//! the limiter, auth, store and file-storage components report to it.

use std::time::Duration;
use thiserror::Error;

/// Errors from constructing or shutting down a [`RateLimiter`](crate::RateLimiter).
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("invalid rate limiter configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("cleanup task did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("failed to spawn cleanup thread: {0}")]
    SpawnFailed(String),
}

/// Errors from token handling and password hashing.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT secret must not be empty")]
    MissingSecret,

    #[error("invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Errors from a [`UserStore`](crate::store::UserStore).
///
/// `NotFound` is kept apart from backend failures so callers can map it to a
/// 404 instead of a 500.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("{0}")]
    Conflict(&'static str),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors from a [`FileStorage`](crate::storage::FileStorage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid filename")]
    InvalidFilename,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
