//! File upload gateway: pushes product images into object storage.
//!
//! A failed upload must never block an ad request. `upload_or_degrade` is the
//! entry point for submissions: every failure on that path becomes
//! [`UploadOutcome::Degraded`] and the caller continues without a media URL.
use crate::backend::{client_for, BackendService};
use crate::error::{StudioError, StudioResult};
use crate::model::AppSettings;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Where the bytes to upload come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// A file the user picked.
    File(PathBuf),
    /// A cached preview, `data:<mime>;base64,<payload>`.
    Preview(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { url: String },
    Degraded { reason: String },
}

impl UploadOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            UploadOutcome::Uploaded { url } => Some(url.as_str()),
            UploadOutcome::Degraded { .. } => None,
        }
    }
}

#[derive(Clone)]
pub struct UploadGateway {
    backend: Option<Arc<dyn BackendService>>,
    bucket: String,
}

impl UploadGateway {
    pub fn new(backend: Option<Arc<dyn BackendService>>, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
        }
    }

    pub fn from_settings(
        settings: &AppSettings,
        user_agent: &str,
        bucket: impl Into<String>,
    ) -> Self {
        let backend = client_for(settings, user_agent).map(|c| Arc::new(c) as Arc<dyn BackendService>);
        Self::new(backend, bucket)
    }

    /// Upload and resolve the public URL, failing with `Storage` on any error.
    #[instrument(skip_all, fields(bucket = %self.bucket, category = %category))]
    pub async fn upload(&self, source: &UploadSource, category: &str) -> StudioResult<String> {
        let backend = self.backend.as_deref().ok_or(StudioError::Unconfigured)?;
        let (bytes, ext) = read_source(source).await?;
        let key = storage_key(category, &ext, Utc::now().timestamp_millis());
        let size = bytes.len();
        backend
            .upload_object(&self.bucket, &key, bytes, content_type_for(&ext))
            .await
            .map_err(|failure| StudioError::Storage {
                message: failure.message,
            })?;
        let url = backend.public_url(&self.bucket, &key);
        info!(%key, size, "uploaded object");
        Ok(url)
    }

    /// Partial-failure policy for submissions: a missing bucket, a missing
    /// client or an unreadable source downgrades to "no media URL".
    pub async fn upload_or_degrade(&self, source: &UploadSource, category: &str) -> UploadOutcome {
        match self.upload(source, category).await {
            Ok(url) => UploadOutcome::Uploaded { url },
            Err(err) => {
                warn!(%err, "upload failed; continuing without media URL");
                UploadOutcome::Degraded {
                    reason: err.to_string(),
                }
            }
        }
    }
}

async fn read_source(source: &UploadSource) -> StudioResult<(Vec<u8>, String)> {
    match source {
        UploadSource::File(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|err| StudioError::Storage {
                message: format!("failed to read {}: {err}", path.display()),
            })?;
            Ok((bytes, extension_of(path)))
        }
        UploadSource::Preview(data_url) => {
            let (bytes, mime) = decode_data_url(data_url)?;
            Ok((bytes, extension_for_mime(&mime).to_string()))
        }
    }
}

/// `{category}/{unix_millis}.{ext}`.
pub fn storage_key(category: &str, ext: &str, unix_millis: i64) -> String {
    format!("{}/{}.{}", category.trim_matches('/'), unix_millis, ext)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "bin".into())
}

pub fn content_type_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => "bin",
    }
}

/// Turn a cached preview back into binary.
pub fn decode_data_url(data_url: &str) -> StudioResult<(Vec<u8>, String)> {
    let invalid = |why: &str| StudioError::Storage {
        message: format!("invalid preview data: {why}"),
    };
    let rest = data_url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| invalid("missing data: prefix"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| invalid("missing payload"))?;
    let mime = meta
        .strip_suffix(";base64")
        .ok_or_else(|| invalid("not base64 encoded"))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|err| invalid(&err.to_string()))?;
    let mime = if mime.is_empty() {
        "application/octet-stream"
    } else {
        mime
    };
    Ok((bytes, mime.to_ascii_lowercase()))
}

/// Cache a file's content as a preview data URL.
pub fn encode_data_url(bytes: &[u8], content_type: &str) -> String {
    format!("data:{};base64,{}", content_type, STANDARD.encode(bytes))
}

/// Preview data URL for a file on disk.
pub async fn preview_from_file(path: &Path) -> StudioResult<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(encode_data_url(&bytes, content_type_for(&extension_of(path))))
}
