//! Appends one spreadsheet row per new reservation through the Google
//! Sheets API, authenticating as a service account.

use anyhow::{Context, Result};
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::{message, NotificationEvent, Notifier};
use crate::config::SheetsConfig;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the cached token expires
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fixed bearer token, for pre-provisioned credentials and tests
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// OAuth2 JWT-bearer grant for a Google service account
pub struct ServiceAccountTokens {
    client: reqwest::Client,
    token_uri: String,
    client_email: String,
    key: EncodingKey,
    cached: RwLock<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(token_uri: String, client_email: String, private_key_pem: &str) -> Result<Self> {
        // Keys passed through env vars usually carry escaped newlines
        let pem = private_key_pem.replace("\\n", "\n");
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .context("notify.sheets.private_key is not a valid RSA PEM key")?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            token_uri,
            client_email,
            key,
            cached: RwLock::new(None),
        })
    }

    fn assertion(&self) -> Result<String> {
        let iat = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SHEETS_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.key)?)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String> {
        {
            let c = self.cached.read().await;
            if let Some(t) = &*c {
                if Instant::now() + REFRESH_MARGIN < t.expires_at {
                    return Ok(t.token.clone());
                }
            }
        }

        let assertion = self.assertion()?;
        let resp = self
            .client
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("token request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("token endpoint error: HTTP {status}: {body}");
        }
        let token: TokenResponse = resp.json().await.context("token response parse failed")?;

        let mut c = self.cached.write().await;
        *c = Some(CachedToken {
            token: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }
}

pub struct SheetsNotifier {
    client: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    range: String,
    tokens: Arc<dyn TokenSource>,
}

#[derive(Serialize)]
struct AppendBody {
    values: Vec<Vec<String>>,
}

impl SheetsNotifier {
    pub fn from_config(cfg: &SheetsConfig) -> Result<Self> {
        if cfg.client_email.is_empty() {
            anyhow::bail!("notify.sheets requires client_email");
        }
        let tokens = ServiceAccountTokens::new(
            cfg.token_uri.clone(),
            cfg.client_email.clone(),
            &cfg.private_key,
        )?;
        Self::with_token_source(
            cfg.api_base.clone(),
            cfg.spreadsheet_id.clone(),
            cfg.range.clone(),
            Arc::new(tokens),
        )
    }

    pub fn with_token_source(
        api_base: String,
        spreadsheet_id: String,
        range: String,
        tokens: Arc<dyn TokenSource>,
    ) -> Result<Self> {
        if spreadsheet_id.is_empty() {
            anyhow::bail!("notify.sheets requires spreadsheet_id");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id,
            range,
            tokens,
        })
    }

    /// Range and id go in as path segments, so `#`, `?`, `/` and spaces are escaped
    fn append_url(&self) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .with_context(|| format!("invalid notify.sheets.api_base {:?}", self.api_base))?;
        let range = format!("{}:append", self.range);
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("notify.sheets.api_base cannot hold a path"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range.as_str()]);
        Ok(url)
    }
}

#[async_trait]
impl Notifier for SheetsNotifier {
    fn name(&self) -> &'static str {
        "sheets"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        // The sheet is an intake log; status changes are tracked in the dashboard
        if !matches!(event, NotificationEvent::ReservationCreated { .. }) {
            return Ok(());
        }

        let token = self.tokens.access_token().await?;
        let body = AppendBody {
            values: vec![message::sheet_row(event)],
        };
        let resp = self
            .client
            .post(self.append_url()?)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .context("sheets append failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Sheets API error: HTTP {status}: {body}");
        }
        Ok(())
    }
}
