use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState, blocking,
    error::ApiError,
    guard::{check_owner, resolve_author},
    parse_created_at,
};
use scribe_db::models::CommentRow;
use scribe_types::api::{
    AuthorBody, Claims, Comment, CreateCommentRequest, MessageResponse, Page,
    UpdateCommentRequest,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuery {
    pub post_id: i64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_limit() -> u64 {
    10
}

fn comment_response(row: CommentRow) -> Comment {
    Comment {
        id: row.id,
        post_id: row.post_id,
        content: row.content,
        author_username: row.author_username,
        created_at: parse_created_at(&row.created_at),
    }
}

pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentQuery>,
) -> Result<Json<Page<Comment>>, ApiError> {
    let db = state.clone();
    let (post_id, offset, limit) = (query.post_id, query.offset, query.limit);
    let (rows, total) = blocking(move || db.db.list_comments(post_id, offset, limit)).await?;

    Ok(Json(Page {
        items: rows.into_iter().map(comment_response).collect(),
        total,
        offset,
        limit,
    }))
}

pub async fn create_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content is required".into()));
    }

    let author = resolve_author(&claims, req.author_username);

    let db = state.clone();
    let row = blocking(move || {
        if db.db.get_post(req.post_id)?.is_none() {
            return Ok(Err(ApiError::NotFound("Post")));
        }
        Ok(Ok(db
            .db
            .create_comment(req.post_id, &req.content, author.as_deref())?))
    })
    .await??;

    Ok((StatusCode::CREATED, Json(comment_response(row))))
}

pub async fn update_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::Validation("content is required".into()));
    }

    let db = state.clone();
    let existing = blocking(move || db.db.get_comment(id))
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;

    let caller = resolve_author(&claims, req.author_username);
    check_owner(
        existing.author_username.as_deref(),
        caller.as_deref(),
        "comment",
    )?;

    let db = state.clone();
    let row = blocking(move || db.db.update_comment(id, &req.content))
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;

    Ok(Json(comment_response(row)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(claims): Extension<Claims>,
    body: Option<Json<AuthorBody>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.clone();
    let existing = blocking(move || db.db.get_comment(id))
        .await?
        .ok_or(ApiError::NotFound("Comment"))?;

    let requested = body.and_then(|Json(b)| b.author_username);
    let caller = resolve_author(&claims, requested);
    check_owner(
        existing.author_username.as_deref(),
        caller.as_deref(),
        "comment",
    )?;

    let db = state.clone();
    blocking(move || db.db.delete_comment(id)).await?;

    Ok(Json(MessageResponse {
        message: "Comment deleted".into(),
    }))
}
