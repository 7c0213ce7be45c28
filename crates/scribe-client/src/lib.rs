//! API client for the scribe blog service.
//!
//! All state lives in an explicit [`Session`] value: the bearer token and
//! cached username are fields, not ambient globals, and any 401 response
//! invalidates them before the error reaches the caller. The caller then
//! decides whether to log in again.

use reqwest::multipart::{Form, Part};
use scribe_types::api::{
    AuthorBody, Comment, CreateCommentRequest, ErrorBody, LoginRequest, LoginResponse,
    MessageResponse, Page, Post, RegisterRequest, RegisterResponse, UpdateCommentRequest,
    UpdateUserRequest, User,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message} ({status})")]
    Api { status: u16, message: String },
    #[error("not logged in")]
    NotLoggedIn,
}

/// Token and cached username from a successful login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub token: String,
    pub username: Option<String>,
}

/// A file to attach to a post or profile update.
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub current_password: Option<String>,
    pub picture: Option<ImageUpload>,
}

pub struct Session {
    base_url: String,
    http: reqwest::Client,
    credentials: Option<Credentials>,
}

impl Session {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            credentials: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .and_then(|c| c.username.as_deref())
    }

    /// Drop the stored credentials. Called automatically on any 401.
    pub fn invalidate(&mut self) {
        self.credentials = None;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Result<&str, ClientError> {
        self.credentials
            .as_ref()
            .map(|c| c.token.as_str())
            .ok_or(ClientError::NotLoggedIn)
    }

    /// Turn a response into a typed value, invalidating the session on
    /// 401 and surfacing the server's error body otherwise.
    async fn handle<T: serde::de::DeserializeOwned>(
        &mut self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        if status.as_u16() == 401 {
            self.invalidate();
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };

        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    // -- Auth --

    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<RegisterResponse, ClientError> {
        let response = self
            .http
            .post(self.url("/auth/register"))
            .json(&RegisterRequest {
                username: username.into(),
                email: email.into(),
                password: password.into(),
            })
            .send()
            .await?;
        self.handle(response).await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginRequest {
                email: email.into(),
                password: password.into(),
            })
            .send()
            .await?;

        let login: LoginResponse = self.handle(response).await?;
        self.credentials = Some(Credentials {
            token: login.access_token,
            username: login.username,
        });
        Ok(())
    }

    // -- Posts --

    pub async fn list_posts(&mut self, offset: u64, limit: u64) -> Result<Page<Post>, ClientError> {
        let url = format!("{}?offset={}&limit={}", self.url("/posts"), offset, limit);
        let response = self.http.get(url).send().await?;
        self.handle(response).await
    }

    pub async fn get_post(&mut self, id: i64) -> Result<Post, ClientError> {
        let response = self.http.get(self.url(&format!("/posts/{}", id))).send().await?;
        self.handle(response).await
    }

    pub async fn create_post(
        &mut self,
        title: &str,
        content: &str,
        image: Option<ImageUpload>,
    ) -> Result<Post, ClientError> {
        let form = self.post_form(title, content, None, image)?;
        let request = self
            .http
            .post(self.url("/posts"))
            .bearer_auth(self.bearer()?)
            .multipart(form);
        let response = request.send().await?;
        self.handle(response).await
    }

    pub async fn update_post(
        &mut self,
        id: i64,
        title: &str,
        content: &str,
        keep_image_url: Option<&str>,
        image: Option<ImageUpload>,
    ) -> Result<Post, ClientError> {
        let form = self.post_form(title, content, keep_image_url, image)?;
        let request = self
            .http
            .put(self.url(&format!("/posts/{}", id)))
            .bearer_auth(self.bearer()?)
            .multipart(form);
        let response = request.send().await?;
        self.handle(response).await
    }

    pub async fn delete_post(&mut self, id: i64) -> Result<MessageResponse, ClientError> {
        let request = self
            .http
            .delete(self.url(&format!("/posts/{}", id)))
            .bearer_auth(self.bearer()?)
            .json(&AuthorBody {
                author_username: self.username().map(String::from),
            });
        let response = request.send().await?;
        self.handle(response).await
    }

    fn post_form(
        &self,
        title: &str,
        content: &str,
        keep_image_url: Option<&str>,
        image: Option<ImageUpload>,
    ) -> Result<Form, ClientError> {
        let mut form = Form::new()
            .text("title", title.to_string())
            .text("content", content.to_string());

        if let Some(username) = self.username() {
            form = form.text("authorUsername", username.to_string());
        }
        if let Some(url) = keep_image_url {
            form = form.text("imageUrl", url.to_string());
        }
        if let Some(upload) = image {
            let part = Part::bytes(upload.bytes)
                .file_name(upload.file_name)
                .mime_str(&upload.mime)?;
            form = form.part("image", part);
        }

        Ok(form)
    }

    // -- Comments --

    pub async fn list_comments(
        &mut self,
        post_id: i64,
        offset: u64,
        limit: u64,
    ) -> Result<Page<Comment>, ClientError> {
        let url = format!(
            "{}?postId={}&offset={}&limit={}",
            self.url("/comments"),
            post_id,
            offset,
            limit
        );
        let response = self.http.get(url).send().await?;
        self.handle(response).await
    }

    pub async fn create_comment(
        &mut self,
        post_id: i64,
        content: &str,
    ) -> Result<Comment, ClientError> {
        let request = self
            .http
            .post(self.url("/comments"))
            .bearer_auth(self.bearer()?)
            .json(&CreateCommentRequest {
                content: content.into(),
                post_id,
                author_username: self.username().map(String::from),
            });
        let response = request.send().await?;
        self.handle(response).await
    }

    pub async fn update_comment(
        &mut self,
        id: i64,
        content: &str,
    ) -> Result<Comment, ClientError> {
        let request = self
            .http
            .put(self.url(&format!("/comments/{}", id)))
            .bearer_auth(self.bearer()?)
            .json(&UpdateCommentRequest {
                content: content.into(),
                author_username: self.username().map(String::from),
            });
        let response = request.send().await?;
        self.handle(response).await
    }

    pub async fn delete_comment(&mut self, id: i64) -> Result<MessageResponse, ClientError> {
        let request = self
            .http
            .delete(self.url(&format!("/comments/{}", id)))
            .bearer_auth(self.bearer()?)
            .json(&AuthorBody {
                author_username: self.username().map(String::from),
            });
        let response = request.send().await?;
        self.handle(response).await
    }

    // -- Users --

    pub async fn list_users(&mut self, offset: u64, limit: u64) -> Result<Page<User>, ClientError> {
        let url = format!("{}?offset={}&limit={}", self.url("/users"), offset, limit);
        let request = self.http.get(url).bearer_auth(self.bearer()?);
        let response = request.send().await?;
        self.handle(response).await
    }

    pub async fn get_user(&mut self, id: i64) -> Result<User, ClientError> {
        let request = self
            .http
            .get(self.url(&format!("/users/{}", id)))
            .bearer_auth(self.bearer()?);
        let response = request.send().await?;
        self.handle(response).await
    }

    /// Administrative update: fields applied directly, no current password
    /// challenge. Self-service changes go through [`Session::update_profile`].
    pub async fn update_user(
        &mut self,
        id: i64,
        update: UpdateUserRequest,
    ) -> Result<User, ClientError> {
        let request = self
            .http
            .put(self.url(&format!("/users/{}", id)))
            .bearer_auth(self.bearer()?)
            .json(&update);
        let response = request.send().await?;
        self.handle(response).await
    }

    pub async fn delete_user(&mut self, id: i64) -> Result<MessageResponse, ClientError> {
        let request = self
            .http
            .delete(self.url(&format!("/users/{}", id)))
            .bearer_auth(self.bearer()?);
        let response = request.send().await?;
        self.handle(response).await
    }

    // -- Profile --

    pub async fn profile(&mut self) -> Result<User, ClientError> {
        let request = self
            .http
            .get(self.url("/users/profile/me"))
            .bearer_auth(self.bearer()?);
        let response = request.send().await?;
        self.handle(response).await
    }

    pub async fn update_profile(&mut self, update: ProfileUpdate) -> Result<User, ClientError> {
        let mut form = Form::new();
        if let Some(username) = &update.username {
            form = form.text("username", username.clone());
        }
        if let Some(email) = &update.email {
            form = form.text("email", email.clone());
        }
        if let Some(password) = &update.password {
            form = form.text("password", password.clone());
        }
        if let Some(current) = &update.current_password {
            form = form.text("currentPassword", current.clone());
        }
        if let Some(picture) = update.picture {
            let part = Part::bytes(picture.bytes)
                .file_name(picture.file_name)
                .mime_str(&picture.mime)?;
            form = form.part("profilePicture", part);
        }

        let request = self
            .http
            .put(self.url("/users/profile"))
            .bearer_auth(self.bearer()?)
            .multipart(form);
        let response = request.send().await?;
        let user: User = self.handle(response).await?;

        // Keep the cached username in sync so later authorship fallbacks
        // use the new name.
        if let Some(credentials) = self.credentials.as_mut() {
            credentials.username = user.username.clone();
        }

        Ok(user)
    }
}
