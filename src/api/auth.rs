use super::validation::{is_valid_email, MAX_BIO_LEN, MIN_PASSWORD_LEN, MIN_USERNAME_LEN};
use super::{ApiError, AppState};
use crate::auth::{hash_password_blocking, verify_password_blocking};
use crate::error::StoreError;
use crate::models::{
    ApiResponse, AuthPayload, LoginRequest, NewUser, SignupRequest, User, UserResponse,
};
use crate::store::{EMAIL_REGISTERED, USERNAME_TAKEN};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub(crate) async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AuthPayload>>), ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::bad_request("Invalid request format"))?;

    if req.email.is_empty() || req.password.is_empty() || req.username.is_empty() {
        return Err(ApiError::bad_request(
            "Email, password, and username are required",
        ));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }
    if req.username.chars().count() < MIN_USERNAME_LEN {
        return Err(ApiError::bad_request("Username must be at least 3 characters"));
    }
    let bio = req.bio.filter(|bio| !bio.is_empty());
    if bio.as_ref().is_some_and(|bio| bio.chars().count() > MAX_BIO_LEN) {
        return Err(ApiError::bad_request("Bio cannot exceed 200 characters"));
    }

    ensure_free(state.store.get_by_email(&req.email), EMAIL_REGISTERED)?;
    ensure_free(state.store.get_by_username(&req.username), USERNAME_TAKEN)?;

    let password_hash = hash_password_blocking(req.password)
        .await
        .map_err(|err| ApiError::internal("Error processing password", err))?;

    let user = state.store.create(NewUser {
        email: req.email,
        username: req.username,
        password_hash,
        bio,
    })?;
    let token = state.jwt.issue(&user)?;

    info!(user_id = %user.id, username = %user.username, "User signed up");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(auth_payload(&state, &user, token))),
    ))
}

pub(crate) async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<AuthPayload>>, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::bad_request("Invalid request format"))?;

    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = match state.store.get_by_email(&req.email) {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(ApiError::unauthorized(INVALID_CREDENTIALS)),
        Err(err) => return Err(err.into()),
    };

    if !verify_password_blocking(req.password, user.password_hash.clone()).await {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let token = state.jwt.issue(&user)?;
    info!(user_id = %user.id, "User logged in");
    Ok(Json(ApiResponse::new(auth_payload(&state, &user, token))))
}

/// Turns a lookup that found someone into a 409 with `conflict`.
pub(crate) fn ensure_free(
    lookup: Result<User, StoreError>,
    conflict: &'static str,
) -> Result<(), ApiError> {
    match lookup {
        Ok(_) => Err(StoreError::Conflict(conflict).into()),
        Err(StoreError::NotFound) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn auth_payload(state: &AppState, user: &User, token: String) -> AuthPayload {
    AuthPayload {
        user: UserResponse::from_user(user, |path| state.picture_url(path)),
        token,
    }
}
