//! Video feed repository and the in-memory feed the dashboard edits.
use crate::backend::{client_for, BackendService};
use crate::error::{BackendFailure, StudioError, StudioResult};
use crate::model::{AppSettings, EditableField, PostId, VideoPost};
use crate::webhook::{WebhookAction, WebhookDispatcher};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

static UNSAFE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// Explicit user confirmation for destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Confirmation given up front (e.g. `--yes`).
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Single-table access to generated posts.
#[derive(Clone)]
pub struct VideoFeedRepository {
    backend: Option<Arc<dyn BackendService>>,
    table: String,
}

impl VideoFeedRepository {
    pub fn new(backend: Option<Arc<dyn BackendService>>, table: impl Into<String>) -> Self {
        Self {
            backend,
            table: table.into(),
        }
    }

    /// Repository over a freshly built client; unconfigured settings yield a
    /// repository whose every operation fails with `Unconfigured`.
    pub fn from_settings(settings: &AppSettings, user_agent: &str) -> Self {
        let backend = client_for(settings, user_agent).map(|c| Arc::new(c) as Arc<dyn BackendService>);
        Self::new(backend, settings.table())
    }

    pub fn backend(&self) -> StudioResult<&dyn BackendService> {
        self.backend.as_deref().ok_or(StudioError::Unconfigured)
    }

    /// All posts, strictly newest id first. An empty table is not an error.
    #[instrument(skip_all, fields(table = %self.table))]
    pub async fn list(&self) -> StudioResult<Vec<VideoPost>> {
        let backend = self.backend()?;
        let rows = backend
            .select_all(&self.table)
            .await
            .map_err(|failure| self.list_error(&failure.message))?;

        let mut posts = rows
            .into_iter()
            .map(serde_json::from_value::<VideoPost>)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| self.list_error(&format!("unexpected row shape: {err}")))?;
        posts.sort_by(|a, b| b.id.cmp(&a.id));
        info!(count = posts.len(), "loaded feed");
        Ok(posts)
    }

    fn list_error(&self, detail: &str) -> StudioError {
        StudioError::Backend {
            message: format!(
                "failed to load posts from table '{}': {}. Check that the table exists and that its row-level access policy allows reads with this key.",
                self.table, detail
            ),
        }
    }

    #[instrument(skip_all, fields(table = %self.table, id = %id, field = field.column()))]
    pub async fn update_field(
        &self,
        id: &PostId,
        field: EditableField,
        value: &str,
    ) -> StudioResult<()> {
        let backend = self.backend()?;
        backend
            .update_column(&self.table, id, field.column(), value)
            .await
            .map_err(|failure| self.row_error("update", id, failure))
    }

    /// Delete a post after explicit confirmation. Returns `false` when the
    /// user declined, in which case nothing was sent.
    #[instrument(skip_all, fields(table = %self.table, id = %id))]
    pub async fn delete(&self, id: &PostId, confirm: &dyn Confirm) -> StudioResult<bool> {
        let backend = self.backend()?;
        let prompt = format!("Delete post {id} permanently? This cannot be undone.");
        if !confirm.confirm(&prompt) {
            info!("delete cancelled");
            return Ok(false);
        }
        backend
            .delete_row(&self.table, id)
            .await
            .map_err(|failure| self.row_error("delete", id, failure))?;
        Ok(true)
    }

    fn row_error(&self, action: &str, id: &PostId, failure: BackendFailure) -> StudioError {
        StudioError::Backend {
            message: format!(
                "failed to {action} post {id} in table '{}': {}",
                self.table, failure.message
            ),
        }
    }

    /// Save a post's media into `dest_dir` and return the written path.
    #[instrument(skip_all, fields(id = %post.id))]
    pub async fn download(&self, post: &VideoPost, dest_dir: &Path) -> StudioResult<PathBuf> {
        let backend = self.backend()?;
        let url = post
            .media_url()
            .ok_or_else(|| StudioError::Processing(post.id.to_string()))?;
        let bytes = backend
            .fetch_media(url)
            .await
            .map_err(|failure| StudioError::Backend {
                message: format!("failed to download media for post {}: {}", post.id, failure),
            })?;
        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(download_file_name(post, url));
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), size = bytes.len(), "downloaded media");
        Ok(path)
    }
}

/// `{title-slug}-{id}.{ext}`, with the extension taken from the media URL.
pub fn download_file_name(post: &VideoPost, url: &str) -> String {
    let slug = UNSAFE_NAME
        .replace_all(post.title.trim(), "-")
        .trim_matches('-')
        .to_ascii_lowercase();
    let slug: String = slug.chars().take(60).collect();
    let id = UNSAFE_NAME.replace_all(&post.id.to_string(), "_").to_string();

    let last_segment = reqwest::Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(str::to_string)
    });
    let ext = last_segment
        .as_deref()
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "mp4".into());

    if slug.is_empty() {
        format!("post-{id}.{ext}")
    } else {
        format!("{slug}-{id}.{ext}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Value equal to the current one; nothing was sent.
    Unchanged,
    Updated,
}

/// The dashboard's working copy of the feed.
///
/// Local entries only change after the backend accepted the change, so a
/// failed call always leaves the feed as it was.
pub struct FeedView {
    repo: VideoFeedRepository,
    posts: Vec<VideoPost>,
}

impl FeedView {
    pub fn new(repo: VideoFeedRepository) -> Self {
        Self {
            repo,
            posts: Vec::new(),
        }
    }

    pub fn posts(&self) -> &[VideoPost] {
        &self.posts
    }

    pub fn get(&self, id: &PostId) -> StudioResult<&VideoPost> {
        self.posts
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| StudioError::NotFound(id.to_string()))
    }

    pub async fn refresh(&mut self) -> StudioResult<&[VideoPost]> {
        self.posts = self.repo.list().await?;
        Ok(&self.posts)
    }

    /// Commit an edited field when it loses focus.
    pub async fn commit_edit(
        &mut self,
        id: &PostId,
        field: EditableField,
        value: &str,
    ) -> StudioResult<EditOutcome> {
        if self.get(id)?.field(field) == value {
            return Ok(EditOutcome::Unchanged);
        }
        if let Err(err) = self.repo.update_field(id, field, value).await {
            warn!(%id, field = field.column(), %err, "edit rejected");
            return Err(err);
        }
        if let Some(post) = self.posts.iter_mut().find(|p| &p.id == id) {
            post.set_field(field, value.to_string());
        }
        Ok(EditOutcome::Updated)
    }

    pub async fn delete(&mut self, id: &PostId, confirm: &dyn Confirm) -> StudioResult<bool> {
        self.get(id)?;
        let deleted = self.repo.delete(id, confirm).await?;
        if deleted {
            self.posts.retain(|p| &p.id != id);
        }
        Ok(deleted)
    }

    pub async fn download(&self, id: &PostId, dest_dir: &Path) -> StudioResult<PathBuf> {
        self.repo.download(self.get(id)?, dest_dir).await
    }

    /// Hand a post to the posting workflow.
    pub async fn publish(&self, id: &PostId, dispatcher: &WebhookDispatcher) -> StudioResult<Value> {
        let post = self.get(id)?;
        let payload = serde_json::to_value(post).map_err(|err| {
            StudioError::InvalidResponse(format!("cannot encode post {id}: {err}"))
        })?;
        dispatcher.send(WebhookAction::Publish, &payload).await
    }
}
