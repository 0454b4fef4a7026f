use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use std::time::Duration;

use super::{message, NotificationEvent, Notifier};
use crate::config::EmailConfig;

/// Sends mail through an HTTP mail relay accepting
/// `{from, to[], subject, text}` with a bearer API key.
pub struct EmailNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
    admin_recipients: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

impl EmailNotifier {
    pub fn new(cfg: &EmailConfig) -> Result<Self> {
        if cfg.api_url.is_empty() || cfg.from.is_empty() {
            anyhow::bail!("notify.email requires api_url and from");
        }
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("outreach-reservations/0.2"));
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            from: cfg.from.clone(),
            admin_recipients: cfg.admin_recipients.clone(),
        })
    }

    /// Mails produced for one event.
    ///
    /// Staff hear about new bookings; the school contact hears about every
    /// event concerning their reservation.
    pub fn compose(&self, event: &NotificationEvent) -> Vec<OutgoingMail> {
        let subject = message::headline(event);
        let text = message::render_text(event);
        let contact = event.reservation().contact.email.clone();

        let mut mails = Vec::new();
        if let NotificationEvent::ReservationCreated { .. } = event {
            if !self.admin_recipients.is_empty() {
                mails.push(OutgoingMail {
                    from: self.from.clone(),
                    to: self.admin_recipients.clone(),
                    subject: subject.clone(),
                    text: text.clone(),
                });
            }
        }
        mails.push(OutgoingMail {
            from: self.from.clone(),
            to: vec![contact],
            subject,
            text,
        });
        mails
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let mut req = self.client.post(&self.api_url).json(mail);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req.send().await.context("mail relay request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("mail relay error: HTTP {status}: {body}");
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        for mail in self.compose(event) {
            self.send(&mail)
                .await
                .with_context(|| format!("sending to {}", mail.to.join(", ")))?;
        }
        Ok(())
    }
}
