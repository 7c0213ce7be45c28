use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    AppState, blocking,
    error::ApiError,
    guard::{check_owner, resolve_author},
    parse_created_at,
    upload::{collect_form, store_image},
};
use scribe_db::models::PostRow;
use scribe_types::api::{AuthorBody, Claims, MessageResponse, Page, Post};

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    10
}

fn post_response(row: PostRow) -> Post {
    Post {
        id: row.id,
        title: row.title,
        content: row.content,
        author_username: row.author_username,
        image_url: row.image_url,
        created_at: parse_created_at(&row.created_at),
    }
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Post>>, ApiError> {
    let db = state.clone();
    let (offset, limit) = (query.offset, query.limit);
    let (rows, total) = blocking(move || db.db.list_posts(offset, limit)).await?;

    Ok(Json(Page {
        items: rows.into_iter().map(post_response).collect(),
        total,
        offset,
        limit,
    }))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Post>, ApiError> {
    let db = state.clone();
    let row = blocking(move || db.db.get_post(id))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    Ok(Json(post_response(row)))
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = collect_form(multipart, "image").await?;

    let title = form
        .take("title")
        .ok_or_else(|| ApiError::Validation("title is required".into()))?;
    let content = form
        .take("content")
        .ok_or_else(|| ApiError::Validation("content is required".into()))?;
    let author = resolve_author(&claims, form.take("authorUsername"));

    // Image validation happens before the insert; a rejected upload
    // leaves neither a file nor a row behind.
    let image_url = match &form.image {
        Some(image) => Some(store_image(&state.upload_dir, "", image).await?),
        None => None,
    };

    let db = state.clone();
    let row = blocking(move || {
        db.db
            .create_post(&title, &content, author.as_deref(), image_url.as_deref())
    })
    .await?;

    info!(
        "Post {} created by {}",
        row.id,
        row.author_username.as_deref().unwrap_or("<anonymous>")
    );

    Ok((StatusCode::CREATED, Json(post_response(row))))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<Json<Post>, ApiError> {
    let mut form = collect_form(multipart, "image").await?;

    let db = state.clone();
    let existing = blocking(move || db.db.get_post(id))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    let caller = resolve_author(&claims, form.take("authorUsername"));
    check_owner(existing.author_username.as_deref(), caller.as_deref(), "post")?;

    let title = form
        .take("title")
        .ok_or_else(|| ApiError::Validation("title is required".into()))?;
    let content = form
        .take("content")
        .ok_or_else(|| ApiError::Validation("content is required".into()))?;

    // A fresh upload replaces the stored reference; an explicit imageUrl
    // field keeps a previous one; otherwise the existing reference stays.
    let image_url = match &form.image {
        Some(image) => Some(store_image(&state.upload_dir, "", image).await?),
        None => form.take("imageUrl").or(existing.image_url),
    };

    let db = state.clone();
    let row = blocking(move || db.db.update_post(id, &title, &content, image_url.as_deref()))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    Ok(Json(post_response(row)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    body: Option<Json<AuthorBody>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.clone();
    let existing = blocking(move || db.db.get_post(id))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    let requested = body.and_then(|Json(b)| b.author_username);
    let caller = resolve_author(&claims, requested);
    check_owner(existing.author_username.as_deref(), caller.as_deref(), "post")?;

    // Comments go with the post (ON DELETE CASCADE).
    let db = state.clone();
    blocking(move || db.db.delete_post(id)).await?;

    info!("Post {} deleted by {}", id, caller.as_deref().unwrap_or("?"));

    Ok(Json(MessageResponse {
        message: "Post deleted".into(),
    }))
}
