//! # HTTP API
//!
//! axum handlers, routing and the shared application state.
//!
//! ```text
//!     api/
//!     ├── mod.rs          (AppState)
//!     ├── error.rs        (ApiError → JSON error envelope)
//!     ├── routes.rs       (Router, limiter layers, static uploads)
//!     ├── health.rs       (/, /v1/healthz, /v1/readiness)
//!     ├── auth.rs         (signup, login)
//!     ├── users.rs        (profile CRUD, listing, leaderboard, upload)
//!     └── validation.rs   (email, pagination and image checks)
//! ```

mod auth;
mod error;
mod health;
mod routes;
mod users;
mod validation;

pub use error::ApiError;
pub use routes::router;
pub use validation::{is_valid_email, sniff_image, ImageKind, PageParams, MAX_UPLOAD_SIZE};

use crate::auth::JwtManager;
use crate::rate_limiter::RateLimiter;
use crate::storage::FileStorage;
use crate::store::UserStore;
use axum::extract::FromRef;
use std::sync::Arc;

/// Everything handlers need, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn UserStore>,
    pub storage: Arc<dyn FileStorage>,
    pub jwt: Arc<JwtManager>,
    /// Strict limiter in front of signup and login.
    pub auth_limiter: Arc<RateLimiter>,
    /// Limiter in front of every other `/v1` route.
    pub generic_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// Resolves a stored picture path to the URL clients should fetch.
    pub(crate) fn picture_url(&self, path: &str) -> String {
        self.storage.public_url(path)
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("jwt", &self.jwt)
            .field("auth_limiter", &self.auth_limiter)
            .field("generic_limiter", &self.generic_limiter)
            .finish_non_exhaustive()
    }
}
