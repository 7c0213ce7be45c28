pub mod auth;
pub mod comments;
pub mod error;
pub mod guard;
pub mod middleware;
pub mod posts;
pub mod upload;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;
use tracing::warn;

use crate::error::ApiError;
use scribe_db::Database;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub upload_dir: PathBuf,
}

/// Assembles the full REST surface. Transport-level layers (CORS, request
/// tracing) are added by the server binary on top of this.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/comments", get(comments::list_comments))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}", put(posts::update_post))
        .route("/posts/{id}", delete(posts::delete_post))
        .route("/comments", post(comments::create_comment))
        .route("/comments/{id}", put(comments::update_comment))
        .route("/comments/{id}", delete(comments::delete_comment))
        .route("/users", get(users::list_users))
        .route("/users/profile/me", get(users::get_profile))
        .route("/users/profile", put(users::update_profile))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}", put(users::update_user))
        .route("/users/{id}", delete(users::delete_user))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state.clone());

    Router::new()
        .merge(public)
        .merge(protected)
        .nest_service("/uploads", ServeDir::new(&state.upload_dir))
        // Above the 5 MB image cap so oversized uploads reach the
        // validator and get the distinguishing FileTooLarge response.
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
}

/// Run blocking rusqlite work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {}", e)))?
        .map_err(ApiError::Internal)
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC and convert, falling back to the epoch on corrupt
/// rows rather than failing the whole response.
pub(crate) fn parse_created_at(raw: &str) -> chrono::DateTime<chrono::Utc> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}': {}", raw, e);
            chrono::DateTime::default()
        })
}
