use anyhow::{Context, Result};
use chrono_tz::Tz;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub booking: BookingConfig,
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub enable_cors: bool,
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}
impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: i64,
    #[serde(default)]
    pub cookie_secure: bool,
    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

impl AuthConfig {
    pub fn secret_is_placeholder(&self) -> bool {
        self.jwt_secret.trim().is_empty() || self.jwt_secret.starts_with("__SET_VIA_ENV")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// IANA zone used to decide what "today" means for the booking window.
    pub timezone: String,
}

impl BookingConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("invalid booking.timezone {:?}: {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadsConfig {
    pub dir: PathBuf,
    #[serde(default = "default_max_upload")]
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbConfig {
    /// Empty means the in-memory store.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub line: LineConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_notify_timeout(),
            line: LineConfig::default(),
            email: EmailConfig::default(),
            sheets: SheetsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_line_base")]
    pub api_base: String,
    #[serde(default)]
    pub channel_token: String,
    /// User, group or room id receiving the push message.
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub admin_recipients: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sheets_base")]
    pub api_base: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_range")]
    pub range: String,
    #[serde(default)]
    pub client_email: String,
    /// PEM encoded RSA key of the service account.
    #[serde(default)]
    pub private_key: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_line_base(),
            channel_token: String::new(),
            to: String::new(),
        }
    }
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: default_sheets_base(),
            token_uri: default_token_uri(),
            spreadsheet_id: String::new(),
            range: default_sheet_range(),
            client_email: String::new(),
            private_key: String::new(),
        }
    }
}

fn default_cors_origin() -> String { "http://localhost:5173".into() }
fn default_request_timeout() -> u64 { 30 }
fn default_token_ttl() -> i64 { 24 }
fn default_max_upload() -> usize { 5 * 1024 * 1024 }
fn default_max_connections() -> u32 { 10 }
fn default_notify_timeout() -> u64 { 10 }
fn default_line_base() -> String { "https://api.line.me".into() }
fn default_sheets_base() -> String { "https://sheets.googleapis.com".into() }
fn default_token_uri() -> String { "https://oauth2.googleapis.com/token".into() }
fn default_sheet_range() -> String { "Reservations!A1".into() }

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("OUTREACH__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Self = figment.extract().context("invalid configuration")?;
        cfg.booking.tz()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        host = "127.0.0.1"
        port = 8080

        [auth]
        jwt_secret = "__SET_VIA_ENV__"

        [booking]
        timezone = "Asia/Bangkok"

        [uploads]
        dir = "uploads"
    "#;

    #[test]
    fn test_minimal_config_fills_defaults() {
        let cfg = Config::from_figment(Figment::new().merge(Toml::string(MINIMAL))).unwrap();
        assert_eq!(cfg.server.request_timeout_secs, 30);
        assert_eq!(cfg.auth.token_ttl_hours, 24);
        assert!(cfg.auth.secret_is_placeholder());
        assert!(cfg.db.url.is_empty());
        assert!(!cfg.notify.line.enabled);
        assert_eq!(cfg.notify.sheets.range, "Reservations!A1");
        assert_eq!(cfg.uploads.max_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let toml = MINIMAL.replace("Asia/Bangkok", "Mars/Olympus");
        assert!(Config::from_figment(Figment::new().merge(Toml::string(&toml))).is_err());
    }

    #[test]
    fn test_socket_addr() {
        let cfg = Config::from_figment(Figment::new().merge(Toml::string(MINIMAL))).unwrap();
        assert_eq!(cfg.server.socket_addr().unwrap().port(), 8080);
    }
}
