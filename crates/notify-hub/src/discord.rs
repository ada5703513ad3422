//! Discord webhook delivery.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use renew_core_types::{NotificationEvent, StatusLevel};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::cache::ArtifactCache;
use crate::errors::NotifyError;
use crate::notification::{Notification, NotificationSink};

const TITLE_LIMIT: usize = 256;
const DESCRIPTION_LIMIT: usize = 4096;
const FIELD_LIMIT: usize = 1024;
const CONTENT_LIMIT: usize = 2000;

pub fn level_colour(level: StatusLevel) -> u32 {
    match level {
        StatusLevel::Success => 0x2ecc71,
        StatusLevel::Failure => 0xe74c3c,
        StatusLevel::Warning => 0xf1c40f,
        StatusLevel::Info => 0x3498db,
    }
}

fn clip(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(limit.saturating_sub(1)).collect();
    clipped.push('…');
    clipped
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "artifact.png".to_string())
}

/// JSON body for a notification. `files` are the attachments actually uploaded.
pub fn build_payload(notification: &Notification, files: &[PathBuf]) -> Value {
    match notification {
        Notification::Text(text) => json!({ "content": clip(text, CONTENT_LIMIT) }),
        Notification::Event(event) => json!({ "embeds": [embed(event, files)] }),
    }
}

fn embed(event: &NotificationEvent, files: &[PathBuf]) -> Value {
    let mut fields = Vec::new();
    if let Some(url) = &event.url {
        fields.push(json!({ "name": "URL", "value": clip(url, FIELD_LIMIT), "inline": false }));
    }
    if let Some(amount) = &event.amount {
        fields.push(json!({ "name": "Amount", "value": amount.to_string(), "inline": true }));
    }
    if let Some(reason) = &event.reason {
        fields.push(json!({ "name": "Reason", "value": reason.code(), "inline": true }));
    }
    for field in &event.fields {
        fields.push(json!({
            "name": clip(&field.name, TITLE_LIMIT),
            "value": clip(if field.value.is_empty() { "-" } else { field.value.as_str() }, FIELD_LIMIT),
            "inline": false,
        }));
    }

    let mut embed = json!({
        "title": clip(&event.title, TITLE_LIMIT),
        "description": clip(&event.description, DESCRIPTION_LIMIT),
        "color": level_colour(event.level),
        "fields": fields,
        "timestamp": Utc::now().to_rfc3339(),
    });
    if let Some(run_id) = &event.run_id {
        embed["footer"] = json!({ "text": format!("renew-pilot · run {}", run_id) });
    }
    if let Some(first) = files.first() {
        embed["image"] = json!({ "url": format!("attachment://{}", file_name(first)) });
    }
    embed
}

/// Posts notifications to a Discord webhook, uploading screenshots once per TTL.
pub struct DiscordWebhookSink {
    client: reqwest::Client,
    url: String,
    cache: ArtifactCache,
}

impl DiscordWebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            cache: ArtifactCache::default(),
        })
    }

    pub fn with_cache(mut self, cache: ArtifactCache) -> Self {
        self.cache = cache;
        self
    }

    /// Attachments that exist on disk and were not uploaded recently.
    fn uploadable(&self, notification: &Notification) -> Vec<PathBuf> {
        let Notification::Event(event) = notification else {
            return Vec::new();
        };
        event
            .attachments
            .iter()
            .filter(|path| {
                if !path.is_file() {
                    debug!(path = %path.display(), "attachment missing; skipping");
                    return false;
                }
                if !self.cache.claim(path) {
                    debug!(path = %path.display(), "attachment sent recently; skipping");
                    return false;
                }
                true
            })
            .cloned()
            .collect()
    }

    async fn multipart(&self, payload: &Value, files: &[PathBuf]) -> Result<Form, NotifyError> {
        let mut form = Form::new().text("payload_json", payload.to_string());
        for (index, path) in files.iter().enumerate() {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|err| NotifyError::Attachment {
                    path: path.clone(),
                    reason: err.to_string(),
                })?;
            let part = Part::bytes(bytes)
                .file_name(file_name(path))
                .mime_str("image/png")?;
            form = form.part(format!("files[{}]", index), part);
        }
        Ok(form)
    }

    async fn post(&self, notification: &Notification, files: &[PathBuf]) -> Result<(), NotifyError> {
        let payload = build_payload(notification, files);

        let request = if files.is_empty() {
            self.client.post(&self.url).json(&payload)
        } else {
            self.client
                .post(&self.url)
                .multipart(self.multipart(&payload, files).await?)
        };

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "discord webhook rejected message");
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(status = status.as_u16(), files = files.len(), "discord webhook delivered");
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhookSink {
    fn name(&self) -> &'static str {
        "discord"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let files = self.uploadable(notification);
        let result = self.post(notification, &files).await;
        if result.is_err() && !files.is_empty() {
            // Not uploaded; a later event may carry the same screenshot.
            self.cache.release(&files);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renew_core_types::{AmountSource, MonetaryAmount, RunReason};
    use rust_decimal::Decimal;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn text_and_event_payloads_differ_by_variant() {
        let text = build_payload(&Notification::Text("hello".to_string()), &[]);
        assert_eq!(text["content"], "hello");
        assert!(text.get("embeds").is_none());

        let event = NotificationEvent::failure("Renewal aborted", "payment gate closed")
            .with_url("https://portal.example/invoice/3")
            .with_amount(Some(MonetaryAmount::new(
                "12,50 €",
                Decimal::new(1250, 2),
                Some("EUR".to_string()),
                AmountSource::LabelledRow,
            )))
            .with_reason(RunReason::PaymentRequired)
            .with_field("Steps", "renew, create_invoice")
            .with_run_id("abcd1234");
        let payload = build_payload(&Notification::Event(event), &[PathBuf::from("/tmp/x/shot.png")]);
        let embed = &payload["embeds"][0];
        assert_eq!(embed["color"], 0xe74c3c);
        assert_eq!(embed["fields"][0]["name"], "URL");
        assert_eq!(embed["fields"][1]["value"], "12.50 EUR");
        assert_eq!(embed["fields"][2]["value"], "payment_required");
        assert_eq!(embed["fields"][3]["name"], "Steps");
        assert_eq!(embed["footer"]["text"], "renew-pilot · run abcd1234");
        assert_eq!(embed["image"]["url"], "attachment://shot.png");
    }

    #[test]
    fn long_text_is_clipped() {
        let long = "x".repeat(3000);
        let payload = build_payload(&Notification::Text(long), &[]);
        assert_eq!(payload["content"].as_str().unwrap().chars().count(), CONTENT_LIMIT);
    }

    #[test]
    fn attachments_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let shot = dir.path().join("20260101-120000-renew.png");
        std::fs::write(&shot, b"png").unwrap();
        let sink = DiscordWebhookSink::new("http://127.0.0.1:9/webhook").unwrap();
        let event = NotificationEvent::info("Renew clicked", "")
            .with_attachment(Some(shot.clone()))
            .with_attachment(Some(dir.path().join("missing.png")));
        let notification = Notification::Event(event);

        assert_eq!(sink.uploadable(&notification), vec![shot]);
        assert!(sink.uploadable(&notification).is_empty());
    }

    /// Answers one request with `response` and closes.
    async fn one_shot_server(response: &'static [u8]) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(response).await;
            let _ = socket.shutdown().await;
        });
        addr
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let addr = one_shot_server(
            b"HTTP/1.1 400 Bad Request\r\nContent-Length: 11\r\nConnection: close\r\n\r\nbad payload",
        )
        .await;

        let sink = DiscordWebhookSink::new(format!("http://{}/webhook", addr)).unwrap();
        let err = sink
            .deliver(&Notification::Text("ping".to_string()))
            .await
            .unwrap_err();
        match err {
            NotifyError::Status { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad payload");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn rejected_upload_keeps_the_screenshot_for_the_next_event() {
        let addr = one_shot_server(
            b"HTTP/1.1 429 Too Many Requests\r\nContent-Length: 10\r\nConnection: close\r\n\r\nrate limit",
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let shot = dir.path().join("20260101-120000-create_invoice.png");
        std::fs::write(&shot, b"png").unwrap();

        let sink = DiscordWebhookSink::new(format!("http://{}/webhook", addr)).unwrap();
        let notification = Notification::Event(
            NotificationEvent::info("Create Invoice clicked", "").with_attachment(Some(shot.clone())),
        );
        assert!(sink.deliver(&notification).await.is_err());

        assert_eq!(sink.uploadable(&notification), vec![shot]);
    }
}
