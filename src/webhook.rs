//! Webhook dispatcher for the external generation and posting workflows.
use crate::error::{StudioError, StudioResult};
use crate::model::AppSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    /// Submit an ad-creation request.
    Generate,
    /// Publish an existing post.
    Publish,
}

/// One of the two user-configured webhook URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSlot {
    Generate,
    Post,
}

impl WebhookAction {
    /// Endpoints to try, in order. The first configured one wins.
    pub fn preference(&self) -> &'static [EndpointSlot] {
        match self {
            WebhookAction::Generate => &[EndpointSlot::Generate, EndpointSlot::Post],
            WebhookAction::Publish => &[EndpointSlot::Post, EndpointSlot::Generate],
        }
    }
}

impl EndpointSlot {
    pub fn url<'a>(&self, settings: &'a AppSettings) -> &'a str {
        match self {
            EndpointSlot::Generate => settings.generate_webhook_url.trim(),
            EndpointSlot::Post => settings.post_webhook_url.trim(),
        }
    }
}

/// First configured endpoint in the action's preference list.
pub fn resolve_endpoint(settings: &AppSettings, action: WebhookAction) -> StudioResult<String> {
    action
        .preference()
        .iter()
        .map(|slot| slot.url(settings))
        .find(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or(StudioError::NoEndpointConfigured)
}

#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post_json(&self, url: &str, payload: &Value) -> StudioResult<Value>;
}

#[derive(Clone)]
pub struct HttpWebhookTransport {
    http: Client,
}

impl fmt::Debug for HttpWebhookTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpWebhookTransport").finish_non_exhaustive()
    }
}

impl HttpWebhookTransport {
    pub fn new(user_agent: &str) -> Self {
        let http = Client::builder()
            .user_agent(user_agent.to_string())
            .build()
            .unwrap_or_default();
        Self { http }
    }

    pub fn build_request(&self, url: &str, payload: &Value) -> reqwest::Result<reqwest::Request> {
        self.http
            .post(url)
            .header("Content-Type", "application/json")
            .json(payload)
            .build()
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn post_json(&self, url: &str, payload: &Value) -> StudioResult<Value> {
        let request = self.build_request(url, payload)?;
        let res = self.http.execute(request).await?;
        let status = res.status().as_u16();
        // A cut-off success body must not read as an empty reply.
        let body = if res.status().is_success() {
            res.text().await?
        } else {
            res.text().await.unwrap_or_default()
        };
        decode_response(status, &body)
    }
}

/// Map a webhook reply to its JSON body. Any non-2xx status is a hard failure.
pub fn decode_response(status: u16, body: &str) -> StudioResult<Value> {
    if !(200..300).contains(&status) {
        return Err(StudioError::Webhook {
            status,
            body: body.to_string(),
        });
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|err| StudioError::InvalidResponse(err.to_string()))
}

/// Sends payloads to whichever endpoint the action prefers.
#[derive(Clone)]
pub struct WebhookDispatcher {
    settings: AppSettings,
    transport: Arc<dyn WebhookTransport>,
}

impl WebhookDispatcher {
    pub fn new(settings: AppSettings, transport: Arc<dyn WebhookTransport>) -> Self {
        Self {
            settings,
            transport,
        }
    }

    pub fn endpoint(&self, action: WebhookAction) -> StudioResult<String> {
        resolve_endpoint(&self.settings, action)
    }

    /// One POST, no retry. Errors come back verbatim for the user.
    #[instrument(skip_all, fields(action = ?action))]
    pub async fn send(&self, action: WebhookAction, payload: &Value) -> StudioResult<Value> {
        let endpoint = self.endpoint(action)?;
        info!(%endpoint, "dispatching webhook");
        match self.transport.post_json(&endpoint, payload).await {
            Ok(reply) => Ok(reply),
            Err(err) => {
                warn!(%endpoint, %err, "webhook failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve one connection: read the full request, send `response`, hang up.
    fn serve_once(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            stream.write_all(response).unwrap();
        });
        format!("http://{addr}/webhook/abc")
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        body.len() >= length
    }

    #[tokio::test]
    async fn truncated_success_body_is_an_error() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"ok\":",
        );
        let transport = HttpWebhookTransport::new("test");
        let result = transport.post_json(&url, &json!({"type": "create_ad"})).await;
        assert!(matches!(result, Err(StudioError::Http(_))), "{result:?}");
    }

    #[tokio::test]
    async fn complete_success_body_is_decoded() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 11\r\nConnection: close\r\n\r\n{\"ok\":true}",
        );
        let transport = HttpWebhookTransport::new("test");
        let reply = transport
            .post_json(&url, &json!({"type": "create_ad"}))
            .await
            .unwrap();
        assert_eq!(reply, json!({"ok": true}));
    }

    fn settings(generate: &str, post: &str) -> AppSettings {
        AppSettings {
            generate_webhook_url: generate.into(),
            post_webhook_url: post.into(),
            ..Default::default()
        }
    }

    #[test]
    fn generate_prefers_generate_then_post() {
        let s = settings("https://hook/gen", "https://hook/post");
        assert_eq!(
            resolve_endpoint(&s, WebhookAction::Generate).unwrap(),
            "https://hook/gen"
        );
        let s = settings(" ", "https://hook/post");
        assert_eq!(
            resolve_endpoint(&s, WebhookAction::Generate).unwrap(),
            "https://hook/post"
        );
    }

    #[test]
    fn publish_prefers_post_then_generate() {
        let s = settings("https://hook/gen", "https://hook/post");
        assert_eq!(
            resolve_endpoint(&s, WebhookAction::Publish).unwrap(),
            "https://hook/post"
        );
        let s = settings("https://hook/gen", "");
        assert_eq!(
            resolve_endpoint(&s, WebhookAction::Publish).unwrap(),
            "https://hook/gen"
        );
    }

    #[test]
    fn no_endpoint_configured() {
        let s = settings("", "");
        assert!(matches!(
            resolve_endpoint(&s, WebhookAction::Generate),
            Err(StudioError::NoEndpointConfigured)
        ));
        assert!(matches!(
            resolve_endpoint(&s, WebhookAction::Publish),
            Err(StudioError::NoEndpointConfigured)
        ));
    }

    #[test]
    fn decode_response_statuses() {
        assert_eq!(decode_response(200, r#"{"ok":true}"#).unwrap(), json!({"ok": true}));
        assert_eq!(decode_response(204, "").unwrap(), Value::Null);
        match decode_response(500, "workflow error").unwrap_err() {
            StudioError::Webhook { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "workflow error");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            decode_response(200, "<html>"),
            Err(StudioError::InvalidResponse(_))
        ));
    }

    #[test]
    fn request_is_json_post() {
        let transport = HttpWebhookTransport::new("test");
        let request = transport
            .build_request("https://hook.example/webhook/abc", &json!({"type": "create_ad"}))
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().path(), "/webhook/abc");
        assert_eq!(
            request
                .headers()
                .get("Content-Type")
                .and_then(|h| h.to_str().ok())
                .unwrap(),
            "application/json"
        );
    }
}
