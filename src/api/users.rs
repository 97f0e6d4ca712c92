use super::auth::ensure_free;
use super::validation::{
    has_image_extension, is_valid_email, sniff_image, PageParams, MAX_BIO_LEN, MAX_UPLOAD_SIZE,
    MIN_PASSWORD_LEN, MIN_USERNAME_LEN,
};
use super::{ApiError, AppState};
use crate::auth::{hash_password_blocking, AuthUser};
use crate::error::StoreError;
use crate::models::{
    ApiResponse, LeaderboardEntry, PaginatedResponse, UpdateUserRequest, User, UserResponse,
};
use crate::store::{EMAIL_IN_USE, USERNAME_IN_USE};
use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

const PICTURE_FIELD: &str = "profile_picture";
const FILE_TOO_LARGE: &str = "File too large (max 5MB)";
const NO_FILE: &str = "No file provided or invalid form";

#[derive(Debug, Serialize)]
pub(crate) struct Message {
    message: &'static str,
}

pub(crate) async fn me(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.store.get_by_id(auth.claims().user_id)?;
    Ok(Json(ApiResponse::new(user_response(&state, &user))))
}

pub(crate) async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.store.get_by_id(parse_id(&id)?)?;
    Ok(Json(ApiResponse::new(user_response(&state, &user))))
}

pub(crate) async fn get_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state.store.get_by_username(&username)?;
    Ok(Json(ApiResponse::new(user_response(&state, &user))))
}

pub(crate) async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let (page, per_page) = (params.page(), params.per_page());

    let users = state
        .store
        .list(per_page, params.offset())
        .map_err(|err| store_failure(err, "Error fetching users"))?;
    let total = state
        .store
        .count()
        .map_err(|err| store_failure(err, "Error counting users"))?;

    let data = users
        .iter()
        .map(|user| user_response(&state, user))
        .collect();
    Ok(Json(PaginatedResponse::new(data, total, per_page, page)))
}

pub(crate) async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<PaginatedResponse<LeaderboardEntry>>, ApiError> {
    let (page, per_page) = (params.page(), params.per_page());

    let users = state
        .store
        .leaderboard(per_page, params.offset())
        .map_err(|err| store_failure(err, "Error fetching leaderboard"))?;
    let total = state
        .store
        .count()
        .map_err(|err| store_failure(err, "Error counting users"))?;

    let data = users
        .into_iter()
        .map(|user| LeaderboardEntry {
            id: user.id,
            profile_picture: user
                .profile_picture
                .as_deref()
                .map(|path| state.picture_url(path)),
            username: user.username,
            last_place_count: user.last_place_count,
            bio: user.bio,
        })
        .collect();
    Ok(Json(PaginatedResponse::new(data, total, per_page, page)))
}

pub(crate) async fn update_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let id = parse_id(&id)?;
    if auth.claims().user_id != id {
        return Err(ApiError::forbidden("Cannot update another user's profile"));
    }
    let Json(req) = payload.map_err(|_| ApiError::bad_request("Invalid request format"))?;

    let mut user = state.store.get_by_id(id)?;

    if let Some(email) = non_empty(req.email) {
        if email != user.email {
            if !is_valid_email(&email) {
                return Err(ApiError::bad_request("Invalid email format"));
            }
            ensure_free(state.store.get_by_email(&email), EMAIL_IN_USE)?;
            user.email = email;
        }
    }

    if let Some(username) = non_empty(req.username) {
        if username != user.username {
            if username.chars().count() < MIN_USERNAME_LEN {
                return Err(ApiError::bad_request("Username must be at least 3 characters"));
            }
            ensure_free(state.store.get_by_username(&username), USERNAME_IN_USE)?;
            user.username = username;
        }
    }

    if let Some(password) = non_empty(req.password) {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::bad_request("Password must be at least 6 characters"));
        }
        user.password_hash = hash_password_blocking(password)
            .await
            .map_err(|err| ApiError::internal("Error processing password", err))?;
    }

    if let Some(bio) = non_empty(req.bio) {
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(ApiError::bad_request("Bio cannot exceed 200 characters"));
        }
        user.bio = Some(bio);
    }

    let updated = state
        .store
        .update(user)
        .map_err(|err| store_failure(err, "Error updating user"))?;

    info!(user_id = %updated.id, "User profile updated");
    Ok(Json(ApiResponse::new(user_response(&state, &updated))))
}

pub(crate) async fn delete_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Message>>, ApiError> {
    let id = parse_id(&id)?;
    if auth.claims().user_id != id {
        return Err(ApiError::forbidden("Cannot delete another user's account"));
    }

    state
        .store
        .delete(id)
        .map_err(|err| store_failure(err, "Error deleting user"))?;

    info!(user_id = %id, "User deleted");
    Ok(Json(ApiResponse::new(Message {
        message: "User deleted successfully",
    })))
}

pub(crate) async fn upload_profile_picture(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let id = parse_id(&id)?;
    if auth.claims().user_id != id {
        return Err(ApiError::forbidden(
            "Cannot upload picture to another user's profile",
        ));
    }

    let mut user = state.store.get_by_id(id)?;

    let mut multipart = multipart.map_err(|_| ApiError::bad_request(NO_FILE))?;
    let (original_name, bytes) = read_picture(&mut multipart).await?;

    if bytes.len() > MAX_UPLOAD_SIZE {
        return Err(ApiError::bad_request(FILE_TOO_LARGE));
    }
    if !has_image_extension(&original_name) {
        return Err(ApiError::bad_request(
            "Invalid file type. Only JPG, JPEG, PNG, and GIF are allowed",
        ));
    }
    let kind = sniff_image(&bytes).ok_or_else(|| {
        ApiError::bad_request("File type not allowed. Please upload JPG, PNG or GIF")
    })?;

    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let filename = format!("{id}_{nanos}{}", kind.extension());

    let storage = state.storage.clone();
    let stored = tokio::task::spawn_blocking(move || storage.store(&bytes, &filename))
        .await
        .map_err(|err| ApiError::internal("Error saving file", err))??;

    let previous = user.profile_picture.replace(stored.clone());
    let updated = match state.store.update(user) {
        Ok(updated) => updated,
        Err(err) => {
            discard_picture(&state, id, stored).await;
            return Err(store_failure(err, "Error updating profile picture"));
        }
    };

    // The old file goes only once the new one is recorded.
    if let Some(old) = previous {
        discard_picture(&state, id, old).await;
    }

    info!(user_id = %id, picture = ?updated.profile_picture, "Profile picture uploaded");
    Ok(Json(ApiResponse::new(user_response(&state, &updated))))
}

/// Best-effort removal of a stored picture.
async fn discard_picture(state: &AppState, user_id: Uuid, path: String) {
    let storage = state.storage.clone();
    match tokio::task::spawn_blocking(move || storage.delete(&path)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(%user_id, error = %err, "Failed to delete profile picture"),
        Err(err) => warn!(%user_id, error = %err, "Picture cleanup task failed"),
    }
}

/// Pulls the `profile_picture` file part out of the form.
async fn read_picture(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Err(ApiError::bad_request(NO_FILE)),
            Err(err) => return Err(multipart_error(err)),
        };
        if field.name() != Some(PICTURE_FIELD) {
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_owned) else {
            return Err(ApiError::bad_request(NO_FILE));
        };
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok((filename, bytes));
    }
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(FILE_TOO_LARGE.to_string())
    } else {
        ApiError::bad_request(NO_FILE)
    }
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid user ID format"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Backend failures get an operation-specific 500 message; lookups and
/// conflicts keep their usual mapping.
fn store_failure(err: StoreError, message: &'static str) -> ApiError {
    match err {
        StoreError::Backend(cause) => ApiError::internal(message, cause),
        other => other.into(),
    }
}

fn user_response(state: &AppState, user: &User) -> UserResponse {
    UserResponse::from_user(user, |path| state.picture_url(path))
}
