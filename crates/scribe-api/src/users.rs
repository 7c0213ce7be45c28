use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
};
use tracing::info;

use crate::{
    AppState,
    auth::{hash_password, verify_password},
    blocking,
    error::ApiError,
    parse_created_at,
    posts::PageQuery,
    upload::{collect_form, store_image},
};
use scribe_db::models::UserRow;
use scribe_types::api::{Claims, MessageResponse, Page, UpdateUserRequest, User};

/// The password hash stays behind in the row type; [`User`] has no field
/// for it, so no serialization path can leak it.
fn user_response(row: UserRow) -> User {
    User {
        id: row.id,
        username: row.username,
        email: row.email,
        profile_picture_url: row.profile_picture_url,
        created_at: parse_created_at(&row.created_at),
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<User>>, ApiError> {
    let db = state.clone();
    let (offset, limit) = (query.offset, query.limit);
    let (rows, total) = blocking(move || db.db.list_users(offset, limit)).await?;

    Ok(Json(Page {
        items: rows.into_iter().map(user_response).collect(),
        total,
        offset,
        limit,
    }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let db = state.clone();
    let row = blocking(move || db.db.get_user_by_id(id))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(user_response(row)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let db = state.clone();
    let row = blocking(move || db.db.get_user_by_id(claims.sub))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    Ok(Json(user_response(row)))
}

/// Profile self-service: every field optional and independently applied.
/// Only a password change demands proof of the current password.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<Json<User>, ApiError> {
    let mut form = collect_form(multipart, "profilePicture").await?;

    let db = state.clone();
    let existing = blocking(move || db.db.get_user_by_id(claims.sub))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    let username = form.take("username");
    let email = form.take("email");
    let password = form.take("password");
    let current_password = form.take("currentPassword");

    let password_hash = match password {
        Some(new_password) => {
            let current = current_password.ok_or(ApiError::InvalidCurrentPassword)?;
            if !verify_password(&current, &existing.password_hash) {
                return Err(ApiError::InvalidCurrentPassword);
            }
            hash_password(&new_password)?
        }
        None => existing.password_hash.clone(),
    };

    let picture_url = match &form.image {
        Some(image) => Some(store_image(&state.upload_dir, "profile_", image).await?),
        None => existing.profile_picture_url.clone(),
    };

    let new_username = username.or(existing.username.clone());
    let new_email = email.unwrap_or_else(|| existing.email.clone());

    let db = state.clone();
    let row = blocking(move || {
        // Re-check uniqueness when the identifying fields change, so the
        // caller sees the duplicate error rather than a constraint 500.
        if let Some(ref name) = new_username {
            if existing.username.as_deref() != Some(name.as_str())
                && db.db.get_user_by_username(name)?.is_some()
            {
                return Ok(Err(ApiError::DuplicateUsername));
            }
        }
        if new_email != existing.email && db.db.get_user_by_email(&new_email)?.is_some() {
            return Ok(Err(ApiError::DuplicateEmail));
        }

        let row = db.db.update_user(
            claims.sub,
            new_username.as_deref(),
            &new_email,
            &password_hash,
            picture_url.as_deref(),
        )?;
        Ok(row.ok_or(ApiError::NotFound("User")))
    })
    .await??;

    info!("Profile updated for user {}", row.id);

    Ok(Json(user_response(row)))
}

/// Administrative update path: fields applied directly, no current
/// password challenge.
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    let password_hash = req.password.as_deref().map(hash_password).transpose()?;

    let db = state.clone();
    let row = blocking(move || {
        let Some(existing) = db.db.get_user_by_id(id)? else {
            return Ok(Err(ApiError::NotFound("User")));
        };

        let username = req.username.or(existing.username);
        let email = req.email.unwrap_or(existing.email);
        let hash = password_hash.unwrap_or(existing.password_hash);

        let row = db.db.update_user(
            id,
            username.as_deref(),
            &email,
            &hash,
            existing.profile_picture_url.as_deref(),
        )?;
        Ok(row.ok_or(ApiError::NotFound("User")))
    })
    .await??;

    Ok(Json(user_response(row)))
}

/// Administrative removal path.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let db = state.clone();
    let deleted = blocking(move || db.db.delete_user(id)).await?;
    if !deleted {
        return Err(ApiError::NotFound("User"));
    }

    info!("User {} deleted", id);

    Ok(Json(MessageResponse {
        message: "User deleted".into(),
    }))
}
