use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use crate::{AppState, blocking, error::ApiError};
use scribe_db::queries::UserConflict;
use scribe_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

/// Hash a password with Argon2id and a fresh random salt. The original
/// deployment used bcrypt cost 10; Argon2id's defaults meet the same bar.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))
}

/// Constant outcome for both "no such hash format" and "wrong password";
/// callers turn `false` into InvalidCredentials.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn create_token(
    secret: &str,
    expiry_hours: i64,
    user_id: i64,
    email: &str,
    username: Option<&str>,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        username: username.map(String::from),
        exp: (chrono::Utc::now() + chrono::Duration::hours(expiry_hours)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token signing failed: {}", e)))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.trim().is_empty() {
        return Err(ApiError::Validation("username is required".into()));
    }
    if req.email.trim().is_empty() {
        return Err(ApiError::Validation("email is required".into()));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password is required".into()));
    }

    let password_hash = hash_password(&req.password)?;

    let db = state.clone();
    let user = blocking(move || {
        db.db
            .create_user(Some(&req.username), &req.email, &password_hash)
    })
    .await?
    .map_err(|conflict| match conflict {
        UserConflict::Email => ApiError::DuplicateEmail,
        UserConflict::Username => ApiError::DuplicateUsername,
    })?;

    info!("Registered user {} ({})", user.id, user.email);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: user.id,
            email: user.email,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user = blocking(move || db.db.get_user_by_email(&req.email))
        .await?
        // Same error for unknown email and wrong password, so a caller
        // can't probe which half was wrong.
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = create_token(
        &state.jwt_secret,
        state.jwt_expiry_hours,
        user.id,
        &user.email,
        user.username.as_deref(),
    )?;

    Ok(Json(LoginResponse {
        access_token: token,
        username: user.username,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let hash = hash_password("Secret123").unwrap();
        assert_ne!(hash, "Secret123");
        assert!(verify_password("Secret123", &hash));
        assert!(!verify_password("secret123", &hash));
        assert!(!verify_password("Secret123", "not-a-phc-string"));
    }

    #[test]
    fn test_token_roundtrip() {
        let token = create_token("test-secret", 1, 42, "alice@x.com", Some("alice")).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        )
        .unwrap();

        assert_eq!(data.claims.sub, 42);
        assert_eq!(data.claims.email, "alice@x.com");
        assert_eq!(data.claims.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_token("test-secret", -1, 42, "alice@x.com", None).unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"test-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token("test-secret", 1, 42, "alice@x.com", None).unwrap();

        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
