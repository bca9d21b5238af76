// src/services/uploads.rs
use std::path::{Path, PathBuf};

use actix_multipart::Multipart;
use futures::TryStreamExt;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

// Raster formats only: SVG can carry script and uploads are served same-origin.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const SERVICES_DIR: &str = "services";
const MAX_TEXT_FIELD: usize = 64 * 1024;

/// Text fields and stored image paths of a service form.
#[derive(Debug, Default)]
pub struct ServiceForm {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Public paths, e.g. `/uploads/services/<uuid>.png`.
    pub images: Vec<String>,
}

/// Lowercased extension if it is an accepted image type.
pub fn image_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

pub fn public_path(stored_name: &str) -> String {
    format!("/uploads/{}/{}", SERVICES_DIR, stored_name)
}

/// Maps a public path back onto the upload directory; `None` for foreign paths.
pub fn disk_path(upload_root: &str, public: &str) -> Option<PathBuf> {
    let name = public.strip_prefix(&format!("/uploads/{}/", SERVICES_DIR))?;
    if name.is_empty() || name.contains('/') || name.contains("..") {
        return None;
    }
    Some(PathBuf::from(upload_root).join(SERVICES_DIR).join(name))
}

/// Reads the form, writing each `images` file to disk as it streams in.
/// Files already written are removed if the form turns out to be invalid.
pub async fn read_service_form(
    payload: Multipart,
    upload_root: &str,
    max_file_size: usize,
) -> AppResult<ServiceForm> {
    let mut form = ServiceForm::default();
    match read_fields(payload, upload_root, max_file_size, &mut form).await {
        Ok(()) => Ok(form),
        Err(e) => {
            remove_images(upload_root, &form.images).await;
            Err(e)
        }
    }
}

async fn read_fields(
    mut payload: Multipart,
    upload_root: &str,
    max_file_size: usize,
    form: &mut ServiceForm,
) -> AppResult<()> {
    let dir = PathBuf::from(upload_root).join(SERVICES_DIR);
    fs::create_dir_all(&dir).await?;

    while let Some(mut field) = payload.try_next().await.map_err(multipart_error)? {
        let field_name = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("No field name".to_string()))?;

        match field_name.as_str() {
            "images" | "images[]" => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string)
                    .ok_or_else(|| AppError::BadRequest("No filename".to_string()))?;
                let ext = image_extension(&filename).ok_or_else(|| {
                    AppError::BadRequest(format!("Unsupported image type: {}", filename))
                })?;

                let stored = format!("{}.{}", Uuid::new_v4(), ext);
                let path = dir.join(&stored);
                form.images.push(public_path(&stored));

                let mut f = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(&path)
                    .await?;

                let mut written = 0usize;
                while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
                    written += chunk.len();
                    if written > max_file_size {
                        return Err(AppError::BadRequest(format!(
                            "{} exceeds the {} byte limit",
                            filename, max_file_size
                        )));
                    }
                    f.write_all(&chunk).await?;
                }
                f.sync_all().await?;
                log::debug!("Stored {} as {}", filename, path.display());
            }
            "title" => form.title = Some(read_text(&mut field).await?),
            "description" => form.description = Some(read_text(&mut field).await?),
            _ => {
                // Skip unknown fields
                while (field.try_next().await.map_err(multipart_error)?).is_some() {}
            }
        }
    }

    Ok(())
}

async fn read_text(field: &mut actix_multipart::Field) -> AppResult<String> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        bytes.extend_from_slice(&chunk);
        if bytes.len() > MAX_TEXT_FIELD {
            return Err(AppError::BadRequest("Text field too large".to_string()));
        }
    }
    String::from_utf8(bytes)
        .map(|s| s.trim().to_string())
        .map_err(|_| AppError::BadRequest("Text fields must be UTF-8".to_string()))
}

/// Best effort; failures are logged.
pub async fn remove_images(upload_root: &str, images: &[String]) {
    for image in images {
        let Some(path) = disk_path(upload_root, image) else {
            continue;
        };
        if let Err(e) = fs::remove_file(&path).await {
            log::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

fn multipart_error(e: actix_multipart::MultipartError) -> AppError {
    AppError::BadRequest(format!("Malformed multipart payload: {}", e))
}
