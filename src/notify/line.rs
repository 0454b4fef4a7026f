use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use std::time::Duration;

use super::{message, NotificationEvent, Notifier};
use crate::config::LineConfig;

/// LINE caps a text message at 5000 characters
const MAX_TEXT_CHARS: usize = 5000;

/// Pushes a text message to a LINE user/group through the Messaging API
pub struct LineNotifier {
    client: reqwest::Client,
    api_base: String,
    channel_token: String,
    to: String,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage; 1],
}

#[derive(Serialize)]
struct TextMessage {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl LineNotifier {
    pub fn new(cfg: &LineConfig) -> Result<Self> {
        if cfg.channel_token.is_empty() || cfg.to.is_empty() {
            anyhow::bail!("notify.line requires channel_token and to");
        }
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("outreach-reservations/0.2"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            channel_token: cfg.channel_token.clone(),
            to: cfg.to.clone(),
        })
    }
}

#[async_trait]
impl Notifier for LineNotifier {
    fn name(&self) -> &'static str {
        "line"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let text: String = message::render_text(event).chars().take(MAX_TEXT_CHARS).collect();
        let body = PushRequest {
            to: &self.to,
            messages: [TextMessage { kind: "text", text }],
        };

        let resp = self
            .client
            .post(format!("{}/v2/bot/message/push", self.api_base))
            .bearer_auth(&self.channel_token)
            .json(&body)
            .send()
            .await
            .context("LINE push failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("LINE API error: HTTP {status}: {body}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_credentials() {
        let cfg = LineConfig {
            enabled: true,
            api_base: "https://api.line.me".into(),
            channel_token: String::new(),
            to: "U123".into(),
        };
        assert!(LineNotifier::new(&cfg).is_err());
    }

    #[test]
    fn test_push_body_shape() {
        let body = PushRequest {
            to: "U123",
            messages: [TextMessage { kind: "text", text: "hi".into() }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"], "U123");
        assert_eq!(json["messages"][0]["type"], "text");
        assert_eq!(json["messages"][0]["text"], "hi");
    }
}
