use std::collections::HashMap;
use std::path::Path;

use axum::body::Bytes;
use axum::extract::Multipart;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;

/// 5 MB cap per uploaded image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

pub struct UploadedImage {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Collected multipart form: text fields plus at most one image part.
pub struct FormData {
    fields: HashMap<String, String>,
    pub image: Option<UploadedImage>,
}

impl FormData {
    /// Take a text field; empty/whitespace values count as absent, which
    /// matches how the frontend submits untouched form inputs.
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields
            .remove(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Drain a multipart request into a [`FormData`]. The part named
/// `file_field` that carries a filename is treated as the upload; every
/// other part is read as UTF-8 text.
pub async fn collect_form(
    mut multipart: Multipart,
    file_field: &str,
) -> Result<FormData, ApiError> {
    let mut fields = HashMap::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("malformed multipart body: {}", e)))?
    {
        let Some(name) = field.name().map(String::from) else {
            continue;
        };

        if name == file_field && field.file_name().is_some() {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(String::from);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("failed to read upload: {}", e)))?;

            // Browsers submit an empty filename part when no file was
            // chosen; treat that as no upload.
            if !file_name.is_empty() {
                image = Some(UploadedImage {
                    file_name,
                    content_type,
                    bytes,
                });
            }
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("malformed field '{}': {}", name, e)))?;
            fields.insert(name, text);
        }
    }

    Ok(FormData { fields, image })
}

/// Validate an upload against the image allow-list and size cap,
/// returning the normalized extension. Runs before anything touches disk
/// or the database, so a rejected upload leaves no partial state.
pub fn validate_image(
    file_name: &str,
    content_type: Option<&str>,
    len: usize,
) -> Result<String, ApiError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .ok_or(ApiError::InvalidFileType)?;

    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::InvalidFileType);
    }

    let mime = content_type.ok_or(ApiError::InvalidFileType)?;
    if !ALLOWED_MIME_TYPES.contains(&mime.to_ascii_lowercase().as_str()) {
        return Err(ApiError::InvalidFileType);
    }

    if len > MAX_IMAGE_BYTES {
        return Err(ApiError::FileTooLarge);
    }

    Ok(ext)
}

/// Validate and persist an image, returning its public `/uploads/...`
/// URL. The stored name is a server-generated token plus the original
/// extension; the client-supplied filename never reaches the filesystem.
pub async fn store_image(
    upload_dir: &Path,
    prefix: &str,
    image: &UploadedImage,
) -> Result<String, ApiError> {
    let ext = validate_image(
        &image.file_name,
        image.content_type.as_deref(),
        image.bytes.len(),
    )?;

    let file_name = format!("{}{}.{}", prefix, Uuid::new_v4().simple(), ext);

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to create upload dir: {}", e)))?;

    let path = upload_dir.join(&file_name);
    tokio::fs::write(&path, &image.bytes)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to write upload: {}", e)))?;

    info!("Stored upload {} ({} bytes)", file_name, image.bytes.len());

    Ok(format!("/uploads/{}", file_name))
}
