#![allow(dead_code)]

use adgen_studio::backend::BackendService;
use adgen_studio::error::BackendFailure;
use adgen_studio::model::PostId;
use adgen_studio::store::{self, Pool};
use adgen_studio::webhook::WebhookTransport;
use adgen_studio::StudioResult;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn setup_pool() -> Pool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    store::run_migrations(&pool).await.unwrap();
    pool
}

pub fn row(id: i64, title: &str, video_url: Option<&str>) -> Value {
    json!({
        "id": id,
        "video_url": video_url,
        "title": title,
        "caption": format!("caption {id}"),
        "hashtags": "#ad",
        "instagram_status": "pending",
        "tiktok_status": "posted",
        "youtube_status": null,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCall {
    pub table: String,
    pub id: PostId,
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadCall {
    pub bucket: String,
    pub path: String,
    pub size: usize,
    pub content_type: String,
}

/// Backend fake that records every call and replays queued results.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    pub rows: Arc<Mutex<Vec<Value>>>,
    pub select_error: Arc<Mutex<Option<BackendFailure>>>,
    pub write_results: Arc<Mutex<VecDeque<Result<(), BackendFailure>>>>,
    pub upload_results: Arc<Mutex<VecDeque<Result<(), BackendFailure>>>>,
    pub media: Arc<Mutex<Vec<u8>>>,
    pub selects: Arc<Mutex<Vec<String>>>,
    pub updates: Arc<Mutex<Vec<UpdateCall>>>,
    pub deletes: Arc<Mutex<Vec<PostId>>>,
    pub uploads: Arc<Mutex<Vec<UploadCall>>>,
    pub fetches: Arc<Mutex<Vec<String>>>,
}

impl RecordingBackend {
    pub fn with_rows(rows: Vec<Value>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
            ..Default::default()
        }
    }

    pub async fn fail_select(&self, failure: BackendFailure) {
        *self.select_error.lock().await = Some(failure);
    }

    pub async fn queue_write(&self, result: Result<(), BackendFailure>) {
        self.write_results.lock().await.push_back(result);
    }

    pub async fn queue_upload(&self, result: Result<(), BackendFailure>) {
        self.upload_results.lock().await.push_back(result);
    }

    async fn next_write(&self) -> Result<(), BackendFailure> {
        self.write_results.lock().await.pop_front().unwrap_or(Ok(()))
    }

    pub async fn network_calls(&self) -> usize {
        self.selects.lock().await.len()
            + self.updates.lock().await.len()
            + self.deletes.lock().await.len()
            + self.uploads.lock().await.len()
            + self.fetches.lock().await.len()
    }
}

#[async_trait::async_trait]
impl BackendService for RecordingBackend {
    async fn select_all(&self, table: &str) -> Result<Vec<Value>, BackendFailure> {
        self.selects.lock().await.push(table.to_string());
        if let Some(failure) = self.select_error.lock().await.clone() {
            return Err(failure);
        }
        Ok(self.rows.lock().await.clone())
    }

    async fn update_column(
        &self,
        table: &str,
        id: &PostId,
        column: &str,
        value: &str,
    ) -> Result<(), BackendFailure> {
        self.updates.lock().await.push(UpdateCall {
            table: table.to_string(),
            id: id.clone(),
            column: column.to_string(),
            value: value.to_string(),
        });
        self.next_write().await
    }

    async fn delete_row(&self, _table: &str, id: &PostId) -> Result<(), BackendFailure> {
        self.deletes.lock().await.push(id.clone());
        self.next_write().await
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendFailure> {
        self.uploads.lock().await.push(UploadCall {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size: bytes.len(),
            content_type: content_type.to_string(),
        });
        self.upload_results.lock().await.pop_front().unwrap_or(Ok(()))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://db.example/storage/v1/object/public/{bucket}/{path}")
    }

    async fn fetch_media(&self, url: &str) -> Result<Vec<u8>, BackendFailure> {
        self.fetches.lock().await.push(url.to_string());
        Ok(self.media.lock().await.clone())
    }
}

/// Webhook fake that records `(url, payload)` pairs.
#[derive(Clone, Default)]
pub struct RecordingWebhook {
    pub responses: Arc<Mutex<VecDeque<StudioResult<Value>>>>,
    pub calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl RecordingWebhook {
    pub fn with_responses(responses: Vec<StudioResult<Value>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    pub async fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl WebhookTransport for RecordingWebhook {
    async fn post_json(&self, url: &str, payload: &Value) -> StudioResult<Value> {
        self.calls
            .lock()
            .await
            .push((url.to_string(), payload.clone()));
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(json!({ "status": "queued" })))
    }
}
