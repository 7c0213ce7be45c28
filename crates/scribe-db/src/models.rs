//! Database row types mapping directly to SQLite rows. Distinct from the
//! scribe-types API models to keep the DB layer independent; `created_at`
//! stays in SQLite's text format here.

pub struct UserRow {
    pub id: i64,
    pub username: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub profile_picture_url: Option<String>,
    pub created_at: String,
}

pub struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_username: Option<String>,
    pub image_url: Option<String>,
    pub created_at: String,
}

pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    pub author_username: Option<String>,
    pub created_at: String,
}
