use super::validation::MAX_UPLOAD_SIZE;
use super::{auth, health, users, AppState};
use crate::rate_limiter::{metrics_handler, rate_limit};
use crate::storage::LocalStorage;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Room for multipart boundaries and headers around a maximum-size file.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_SIZE + 64 * 1024;

/// Builds the full application router.
///
/// Signup and login sit behind the strict auth limiter, every other `/v1`
/// user route behind the generic limiter. Health, metrics and uploaded
/// files are not limited.
pub fn router(state: AppState, uploads: &LocalStorage) -> Router {
    let auth_routes = Router::new()
        .route("/v1/auth/signup", post(auth::signup))
        .route("/v1/auth/login", post(auth::login))
        .route_layer(from_fn_with_state(state.auth_limiter.clone(), rate_limit));

    let user_routes = Router::new()
        .route("/v1/me", get(users::me))
        .route("/v1/users", get(users::list_users))
        .route("/v1/users/leaderboard", get(users::leaderboard))
        .route("/v1/users/username/{username}", get(users::get_user_by_username))
        .route(
            "/v1/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/v1/users/{id}/profile-picture",
            post(users::upload_profile_picture).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route_layer(from_fn_with_state(state.generic_limiter.clone(), rate_limit));

    Router::new()
        .route("/", get(health::root))
        .route("/v1/healthz", get(health::status_ok))
        .route("/v1/readiness", get(health::status_ok))
        .route(
            "/v1/metrics",
            get(metrics_handler).with_state(state.generic_limiter.clone()),
        )
        .route(
            "/v1/metrics/auth",
            get(metrics_handler).with_state(state.auth_limiter.clone()),
        )
        .merge(auth_routes)
        .merge(user_routes)
        .nest_service(&uploads.url_prefix(), ServeDir::new(uploads.upload_dir()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
