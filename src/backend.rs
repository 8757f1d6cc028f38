use crate::error::BackendFailure;
use crate::model::{AppSettings, PostId};
use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;

/// Data and storage primitives of the hosted backend.
#[async_trait]
pub trait BackendService: Send + Sync {
    /// All rows of `table`, newest id first.
    async fn select_all(&self, table: &str) -> Result<Vec<Value>, BackendFailure>;

    /// Partial update of a single column on one row.
    async fn update_column(
        &self,
        table: &str,
        id: &PostId,
        column: &str,
        value: &str,
    ) -> Result<(), BackendFailure>;

    async fn delete_row(&self, table: &str, id: &PostId) -> Result<(), BackendFailure>;

    /// Store an object at `path`. Never overwrites an existing object.
    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendFailure>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn fetch_media(&self, url: &str) -> Result<Vec<u8>, BackendFailure>;
}

/// Build a backend handle from the current settings.
///
/// Returns `None` when the endpoint or key is blank. The handle is cheap and
/// stateless, so callers may rebuild it whenever settings change.
pub fn client_for(settings: &AppSettings, user_agent: &str) -> Option<BackendClient> {
    if !settings.is_configured() {
        return None;
    }
    Some(BackendClient::new(
        settings.backend_url.trim(),
        settings.backend_key.trim(),
        user_agent,
    ))
}

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    key: String,
}

impl fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    pub fn new(base_url: &str, key: &str, user_agent: &str) -> Self {
        let http = Client::builder()
            .user_agent(user_agent.to_string())
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        }
    }

    fn authorized(&self, method: Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub fn build_select_request(&self, table: &str) -> reqwest::Result<reqwest::Request> {
        self.authorized(Method::GET, self.table_url(table))
            .query(&[("select", "*"), ("order", "id.desc")])
            .build()
    }

    pub fn build_update_request(
        &self,
        table: &str,
        id: &PostId,
        column: &str,
        value: &str,
    ) -> reqwest::Result<reqwest::Request> {
        self.authorized(Method::PATCH, self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&json!({ column: value }))
            .build()
    }

    pub fn build_delete_request(&self, table: &str, id: &PostId) -> reqwest::Result<reqwest::Request> {
        self.authorized(Method::DELETE, self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .build()
    }

    pub fn build_upload_request(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> reqwest::Result<reqwest::Request> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path);
        self.authorized(Method::POST, url)
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .build()
    }

    async fn execute(&self, request: reqwest::Request) -> Result<Response, BackendFailure> {
        debug!(method = %request.method(), url = %request.url(), "sending backend request");
        let res = self
            .http
            .execute(request)
            .await
            .map_err(BackendFailure::transport)?;
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        Err(BackendFailure::new(Some(status), error_message(status, &body)))
    }
}

/// Prefer the `message`/`error` field of a JSON error body, else the raw text.
pub fn error_message(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["message", "error", "msg"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    });
    match from_json {
        Some(msg) => msg,
        None if body.trim().is_empty() => format!("HTTP {status}"),
        None => body.trim().to_string(),
    }
}

#[async_trait]
impl BackendService for BackendClient {
    async fn select_all(&self, table: &str) -> Result<Vec<Value>, BackendFailure> {
        let request = self
            .build_select_request(table)
            .map_err(BackendFailure::transport)?;
        let res = self.execute(request).await?;
        res.json::<Vec<Value>>()
            .await
            .map_err(|err| BackendFailure::new(None, format!("invalid rows payload: {err}")))
    }

    async fn update_column(
        &self,
        table: &str,
        id: &PostId,
        column: &str,
        value: &str,
    ) -> Result<(), BackendFailure> {
        let request = self
            .build_update_request(table, id, column, value)
            .map_err(BackendFailure::transport)?;
        self.execute(request).await.map(|_| ())
    }

    async fn delete_row(&self, table: &str, id: &PostId) -> Result<(), BackendFailure> {
        let request = self
            .build_delete_request(table, id)
            .map_err(BackendFailure::transport)?;
        self.execute(request).await.map(|_| ())
    }

    async fn upload_object(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendFailure> {
        let request = self
            .build_upload_request(bucket, path, bytes, content_type)
            .map_err(BackendFailure::transport)?;
        self.execute(request).await.map(|_| ())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, path
        )
    }

    async fn fetch_media(&self, url: &str) -> Result<Vec<u8>, BackendFailure> {
        let request = self
            .http
            .get(url)
            .build()
            .map_err(BackendFailure::transport)?;
        let res = self.execute(request).await?;
        let bytes = res.bytes().await.map_err(BackendFailure::transport)?;
        Ok(bytes.to_vec())
    }
}
