use crate::Database;
use crate::models::{CommentRow, PostRow, UserRow};
use anyhow::Result;
use rusqlite::Connection;

/// Unique column a new user collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserConflict {
    Email,
    Username,
}

impl Database {
    // -- Users --

    /// Duplicate checks and the insert happen under one lock hold, so two
    /// concurrent registrations cannot both pass the pre-check; the loser
    /// gets a conflict value instead of a raw constraint failure.
    pub fn create_user(
        &self,
        username: Option<&str>,
        email: &str,
        password_hash: &str,
    ) -> Result<std::result::Result<UserRow, UserConflict>> {
        self.with_conn(|conn| {
            if query_user_where(conn, "email = ?1", rusqlite::params![email])?.is_some() {
                return Ok(Err(UserConflict::Email));
            }
            if let Some(name) = username {
                if query_user_where(conn, "username = ?1", rusqlite::params![name])?.is_some() {
                    return Ok(Err(UserConflict::Username));
                }
            }

            conn.execute(
                "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, ?3)",
                rusqlite::params![username, email, password_hash],
            )?;
            let id = conn.last_insert_rowid();
            let row = query_user_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("User {} vanished after insert", id))?;
            Ok(Ok(row))
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user_where(conn, "email = ?1", rusqlite::params![email])
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user_where(conn, "username = ?1", rusqlite::params![username])
        })
    }

    pub fn list_users(&self, offset: u64, limit: u64) -> Result<(Vec<UserRow>, u64)> {
        self.with_conn(|conn| {
            let total: u64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;

            let mut stmt = conn.prepare(
                "SELECT id, username, email, password_hash, profile_picture_url, created_at
                 FROM users
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![limit, offset], map_user_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    /// Writes the full new column set; field merging happens in the API
    /// layer, which has both the stored row and the requested changes.
    pub fn update_user(
        &self,
        id: i64,
        username: Option<&str>,
        email: &str,
        password_hash: &str,
        profile_picture_url: Option<&str>,
    ) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET username = ?1, email = ?2, password_hash = ?3, profile_picture_url = ?4
                 WHERE id = ?5",
                rusqlite::params![username, email, password_hash, profile_picture_url, id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user_by_id(conn, id)
        })
    }

    pub fn delete_user(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Posts --

    pub fn create_post(
        &self,
        title: &str,
        content: &str,
        author_username: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<PostRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (title, content, author_username, image_url)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![title, content, author_username, image_url],
            )?;
            let id = conn.last_insert_rowid();
            query_post_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Post {} vanished after insert", id))
        })
    }

    pub fn get_post(&self, id: i64) -> Result<Option<PostRow>> {
        self.with_conn(|conn| query_post_by_id(conn, id))
    }

    pub fn list_posts(&self, offset: u64, limit: u64) -> Result<(Vec<PostRow>, u64)> {
        self.with_conn(|conn| {
            let total: u64 = conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;

            // id DESC breaks ties between rows created within the same
            // second, keeping newest-first ordering stable.
            let mut stmt = conn.prepare(
                "SELECT id, title, content, author_username, image_url, created_at
                 FROM posts
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?1 OFFSET ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![limit, offset], map_post_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    /// The author snapshot is never rewritten on update; only title,
    /// content and image reference change.
    pub fn update_post(
        &self,
        id: i64,
        title: &str,
        content: &str,
        image_url: Option<&str>,
    ) -> Result<Option<PostRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE posts SET title = ?1, content = ?2, image_url = ?3 WHERE id = ?4",
                rusqlite::params![title, content, image_url, id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_post_by_id(conn, id)
        })
    }

    /// Comments go with the post via ON DELETE CASCADE.
    pub fn delete_post(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Comments --

    pub fn create_comment(
        &self,
        post_id: i64,
        content: &str,
        author_username: Option<&str>,
    ) -> Result<CommentRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (post_id, content, author_username) VALUES (?1, ?2, ?3)",
                rusqlite::params![post_id, content, author_username],
            )?;
            let id = conn.last_insert_rowid();
            query_comment_by_id(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Comment {} vanished after insert", id))
        })
    }

    pub fn get_comment(&self, id: i64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| query_comment_by_id(conn, id))
    }

    pub fn list_comments(
        &self,
        post_id: i64,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<CommentRow>, u64)> {
        self.with_conn(|conn| {
            let total: u64 = conn.query_row(
                "SELECT COUNT(*) FROM comments WHERE post_id = ?1",
                [post_id],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, post_id, content, author_username, created_at
                 FROM comments
                 WHERE post_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![post_id, limit, offset], map_comment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total))
        })
    }

    pub fn update_comment(&self, id: i64, content: &str) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE comments SET content = ?1 WHERE id = ?2",
                rusqlite::params![content, id],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_comment_by_id(conn, id)
        })
    }

    pub fn delete_comment(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM comments WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }
}

// -- Row mapping --

fn map_user_row(row: &rusqlite::Row) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        profile_picture_url: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_post_row(row: &rusqlite::Row) -> std::result::Result<PostRow, rusqlite::Error> {
    Ok(PostRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author_username: row.get(3)?,
        image_url: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn map_comment_row(row: &rusqlite::Row) -> std::result::Result<CommentRow, rusqlite::Error> {
    Ok(CommentRow {
        id: row.get(0)?,
        post_id: row.get(1)?,
        content: row.get(2)?,
        author_username: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    query_user_where(conn, "id = ?1", rusqlite::params![id])
}

fn query_user_where(
    conn: &Connection,
    predicate: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, password_hash, profile_picture_url, created_at
         FROM users WHERE {}",
        predicate
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row(params, map_user_row).optional()?;
    Ok(row)
}

fn query_post_by_id(conn: &Connection, id: i64) -> Result<Option<PostRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, content, author_username, image_url, created_at
         FROM posts WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], map_post_row).optional()?;
    Ok(row)
}

fn query_comment_by_id(conn: &Connection, id: i64) -> Result<Option<CommentRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, post_id, content, author_username, created_at
         FROM comments WHERE id = ?1",
    )?;
    let row = stmt.query_row([id], map_comment_row).optional()?;
    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
