use super::jwt::{Claims, JwtManager};
use crate::api::ApiError;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;
use tracing::debug;

pub const MISSING_HEADER: &str = "Missing authorization header";
pub const INVALID_FORMAT: &str = "Invalid authorization format";
pub const INVALID_TOKEN: &str = "Invalid or expired token";

/// The authenticated caller, resolved from `Authorization: Bearer <token>`.
///
/// Stricter than rate-limit identification: anything other than exactly
/// `Bearer <token>` is rejected with 401.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn claims(&self) -> &Claims {
        &self.0
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(|| ApiError::unauthorized(MISSING_HEADER))?;
        let value = header
            .to_str()
            .map_err(|_| ApiError::unauthorized(INVALID_FORMAT))?;

        let token = match value.split(' ').collect::<Vec<_>>()[..] {
            ["Bearer", token] => token,
            _ => return Err(ApiError::unauthorized(INVALID_FORMAT)),
        };

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.verify(token).map_err(|err| {
            debug!(uri = %parts.uri, error = %err, "Authentication failed");
            ApiError::unauthorized(INVALID_TOKEN)
        })?;

        Ok(AuthUser(claims))
    }
}
