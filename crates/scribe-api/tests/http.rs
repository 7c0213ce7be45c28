//! End-to-end tests against the assembled router, backed by an in-memory
//! SQLite database and a temporary upload directory.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use scribe_api::AppStateInner;
use scribe_db::Database;

const BOUNDARY: &str = "scribe-test-boundary";

struct TestApp {
    app: Router,
    // Held so the upload directory outlives the test
    _upload_dir: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        jwt_expiry_hours: 1,
        upload_dir: upload_dir.path().to_path_buf(),
    });
    TestApp {
        app: scribe_api::router(state),
        _upload_dir: upload_dir,
    }
}

async fn send_json(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn multipart_body(
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((field, file_name, mime, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, field, file_name, mime
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn send_multipart(
    app: &Router,
    method: &str,
    path: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    file: Option<(&str, &str, &str, &[u8])>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = builder.body(Body::from(multipart_body(fields, file))).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Register a user and log in, returning the bearer token.
async fn register_and_login(app: &Router, username: &str, email: &str, password: &str) -> String {
    let (status, _) = send_json(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": username, "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().unwrap().to_string()
}

// -- Auth --

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let t = test_app();

    let (status, _) = send_json(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "email": "alice@x.com", "password": "Secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // same email, different username
    let (status, body) = send_json(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "alice2", "email": "alice@x.com", "password": "Secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email already registered");
    assert_eq!(body["statusCode"], 400);

    // same username, different email
    let (status, body) = send_json(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "email": "other@x.com", "password": "Secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username already taken");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let t = test_app();
    register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    let (wrong_pw_status, wrong_pw_body) = send_json(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alice@x.com", "password": "wrong" })),
    )
    .await;
    let (no_user_status, no_user_body) = send_json(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "ghost@x.com", "password": "Secret123" })),
    )
    .await;

    assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_pw_status, no_user_status);
    assert_eq!(wrong_pw_body["message"], no_user_body["message"]);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let t = test_app();

    let (status, _) =
        send_multipart(&t.app, "POST", "/posts", None, &[("title", "x")], None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_multipart(
        &t.app,
        "POST",
        "/posts",
        Some("garbage-token"),
        &[("title", "x")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&t.app, "GET", "/users/profile/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// -- Posts --

#[tokio::test]
async fn test_create_post_appears_first_in_listing() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    let (status, post) = send_multipart(
        &t.app,
        "POST",
        "/posts",
        Some(&token),
        &[("title", "Hi"), ("content", "World")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["authorUsername"], "alice");

    let (status, page) = send_json(&t.app, "GET", "/posts?offset=0&limit=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["title"], "Hi");
    assert_eq!(page["items"][0]["authorUsername"], "alice");
}

#[tokio::test]
async fn test_list_posts_tolerates_offset_past_end() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;
    for i in 0..3 {
        send_multipart(
            &t.app,
            "POST",
            "/posts",
            Some(&token),
            &[("title", &format!("t{}", i)), ("content", "body")],
            None,
        )
        .await;
    }

    let (status, page) = send_json(&t.app, "GET", "/posts?offset=50&limit=10", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_mutation_by_non_owner_is_forbidden() {
    let t = test_app();
    let alice = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;
    let bob = register_and_login(&t.app, "bob", "bob@x.com", "Hunter22").await;

    let (_, post) = send_multipart(
        &t.app,
        "POST",
        "/posts",
        Some(&alice),
        &[("title", "Hi"), ("content", "World")],
        None,
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();

    // bob holds a perfectly valid token and still may not touch it
    let (status, body) = send_json(
        &t.app,
        "DELETE",
        &format!("/posts/{}", post_id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["statusCode"], 403);

    let (status, _) = send_multipart(
        &t.app,
        "PUT",
        &format!("/posts/{}", post_id),
        Some(&bob),
        &[("title", "Hacked"), ("content", "oops")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // the owner can
    let (status, _) = send_json(
        &t.app,
        "DELETE",
        &format!("/posts/{}", post_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_missing_post_is_not_found() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    let (status, _) = send_multipart(
        &t.app,
        "PUT",
        "/posts/999",
        Some(&token),
        &[("title", "a"), ("content", "b")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_title_rejected() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    let (status, body) = send_multipart(
        &t.app,
        "POST",
        "/posts",
        Some(&token),
        &[("title", ""), ("content", "World")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "title is required");
}

// -- Uploads --

#[tokio::test]
async fn test_image_upload_round_trip() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    let (status, post) = send_multipart(
        &t.app,
        "POST",
        "/posts",
        Some(&token),
        &[("title", "Hi"), ("content", "World")],
        Some(("image", "pic.png", "image/png", b"png-bytes")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let image_url = post["imageUrl"].as_str().unwrap();
    assert!(image_url.starts_with("/uploads/"));
    assert!(image_url.ends_with(".png"));
    assert!(!image_url.contains("pic"));

    // the stored file is served back under the static prefix
    let request = Request::builder()
        .method("GET")
        .uri(image_url)
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"png-bytes");
}

#[tokio::test]
async fn test_invalid_file_type_rejected_without_partial_row() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    let (status, body) = send_multipart(
        &t.app,
        "POST",
        "/posts",
        Some(&token),
        &[("title", "Hi"), ("content", "World")],
        Some(("image", "x.exe", "application/octet-stream", b"MZ")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Invalid file type"));

    let (status, body) = send_multipart(
        &t.app,
        "POST",
        "/posts",
        Some(&token),
        &[("title", "Hi"), ("content", "World")],
        Some(("image", "big.png", "image/png", &vec![0u8; 5 * 1024 * 1024 + 1])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("File too large"));

    // neither attempt persisted a post
    let (_, page) = send_json(&t.app, "GET", "/posts", None, None).await;
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_update_post_preserves_image_unless_replaced() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    let (_, post) = send_multipart(
        &t.app,
        "POST",
        "/posts",
        Some(&token),
        &[("title", "Hi"), ("content", "World")],
        Some(("image", "pic.png", "image/png", b"v1")),
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();
    let original_url = post["imageUrl"].as_str().unwrap().to_string();

    // passthrough: client echoes the stored url, no new file
    let (status, updated) = send_multipart(
        &t.app,
        "PUT",
        &format!("/posts/{}", post_id),
        Some(&token),
        &[
            ("title", "Hi!"),
            ("content", "World!"),
            ("imageUrl", &original_url),
        ],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["imageUrl"], original_url.as_str());

    // a fresh upload replaces it
    let (status, updated) = send_multipart(
        &t.app,
        "PUT",
        &format!("/posts/{}", post_id),
        Some(&token),
        &[("title", "Hi!"), ("content", "World!")],
        Some(("image", "new.gif", "image/gif", b"v2")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_url = updated["imageUrl"].as_str().unwrap();
    assert_ne!(new_url, original_url);
    assert!(new_url.ends_with(".gif"));
}

// -- Comments --

#[tokio::test]
async fn test_comment_lifecycle_and_cascade() {
    let t = test_app();
    let alice = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;
    let bob = register_and_login(&t.app, "bob", "bob@x.com", "Hunter22").await;

    let (_, post) = send_multipart(
        &t.app,
        "POST",
        "/posts",
        Some(&alice),
        &[("title", "Hi"), ("content", "World")],
        None,
    )
    .await;
    let post_id = post["id"].as_i64().unwrap();

    // commenting on a missing post is 404
    let (status, _) = send_json(
        &t.app,
        "POST",
        "/comments",
        Some(&bob),
        Some(json!({ "content": "hello", "postId": 999 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, comment) = send_json(
        &t.app,
        "POST",
        "/comments",
        Some(&bob),
        Some(json!({ "content": "first!", "postId": post_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["authorUsername"], "bob");
    let comment_id = comment["id"].as_i64().unwrap();

    // alice may not edit bob's comment
    let (status, _) = send_json(
        &t.app,
        "PUT",
        &format!("/comments/{}", comment_id),
        Some(&alice),
        Some(json!({ "content": "edited" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // bob may
    let (status, updated) = send_json(
        &t.app,
        "PUT",
        &format!("/comments/{}", comment_id),
        Some(&bob),
        Some(json!({ "content": "edited" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["content"], "edited");

    // deleting the post takes its comments with it
    let (status, _) = send_json(
        &t.app,
        "DELETE",
        &format!("/posts/{}", post_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, page) = send_json(
        &t.app,
        "GET",
        &format!("/comments?postId={}", post_id),
        None,
        None,
    )
    .await;
    assert_eq!(page["total"], 0);
}

// -- Users & profile --

#[tokio::test]
async fn test_user_responses_never_contain_password_hash() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    for path in ["/users/profile/me", "/users?offset=0&limit=10", "/users/1"] {
        let (status, body) = send_json(&t.app, "GET", path, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK, "{}", path);
        let raw = body.to_string();
        assert!(!raw.contains("passwordHash"), "{} leaked a hash: {}", path, raw);
        assert!(!raw.contains("password_hash"), "{} leaked a hash: {}", path, raw);
        assert!(!raw.contains("Secret123"), "{} leaked a password: {}", path, raw);
    }
}

#[tokio::test]
async fn test_profile_password_change_requires_current_password() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    // no currentPassword at all
    let (status, _) = send_multipart(
        &t.app,
        "PUT",
        "/users/profile",
        Some(&token),
        &[("password", "NewSecret9")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // wrong currentPassword
    let (status, body) = send_multipart(
        &t.app,
        "PUT",
        "/users/profile",
        Some(&token),
        &[("password", "NewSecret9"), ("currentPassword", "nope")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Current password is incorrect");

    // correct currentPassword
    let (status, _) = send_multipart(
        &t.app,
        "PUT",
        "/users/profile",
        Some(&token),
        &[("password", "NewSecret9"), ("currentPassword", "Secret123")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // the new password works, the old one does not
    let (status, _) = send_json(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alice@x.com", "password": "NewSecret9" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({ "email": "alice@x.com", "password": "Secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_fields_apply_independently() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    // email change needs no password proof
    let (status, user) = send_multipart(
        &t.app,
        "PUT",
        "/users/profile",
        Some(&token),
        &[("email", "alice@new.com")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["email"], "alice@new.com");
    assert_eq!(user["username"], "alice");

    // profile picture upload, username untouched
    let (status, user) = send_multipart(
        &t.app,
        "PUT",
        "/users/profile",
        Some(&token),
        &[],
        Some(("profilePicture", "me.jpg", "image/jpeg", b"jpg-bytes")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let picture = user["profilePictureUrl"].as_str().unwrap();
    assert!(picture.starts_with("/uploads/profile_"));
    assert_eq!(user["username"], "alice");

    // taking another user's name is rejected
    register_and_login(&t.app, "bob", "bob@x.com", "Hunter22").await;
    let (status, body) = send_multipart(
        &t.app,
        "PUT",
        "/users/profile",
        Some(&token),
        &[("username", "bob")],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username already taken");
}

#[tokio::test]
async fn test_profile_picture_rejects_disallowed_file() {
    let t = test_app();
    let token = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;

    let (status, body) = send_multipart(
        &t.app,
        "PUT",
        "/users/profile",
        Some(&token),
        &[],
        Some(("profilePicture", "x.exe", "application/octet-stream", b"MZ")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Invalid file type"));

    let (status, body) = send_multipart(
        &t.app,
        "PUT",
        "/users/profile",
        Some(&token),
        &[],
        Some(("profilePicture", "big.png", "image/png", &vec![0u8; 5 * 1024 * 1024 + 1])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("File too large"));

    // the stored profile is untouched by either rejected attempt
    let (_, user) = send_json(&t.app, "GET", "/users/profile/me", Some(&token), None).await;
    assert!(user["profilePictureUrl"].is_null());
}

#[tokio::test]
async fn test_admin_user_removal() {
    let t = test_app();
    let alice = register_and_login(&t.app, "alice", "alice@x.com", "Secret123").await;
    register_and_login(&t.app, "bob", "bob@x.com", "Hunter22").await;

    let (status, body) = send_json(&t.app, "DELETE", "/users/2", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User deleted");

    let (status, _) = send_json(&t.app, "GET", "/users/2", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&t.app, "DELETE", "/users/2", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
