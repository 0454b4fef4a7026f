pub mod booking;

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{hash_password, JwtKeys};
use crate::config::{AuthConfig, Config};
use crate::domain::{Role, User};
use crate::notify::NotificationHub;
use crate::repo::Repositories;

pub use booking::BookingController;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub repos: Arc<Repositories>,
    pub jwt: Arc<JwtKeys>,
    pub notifier: Arc<NotificationHub>,
    pub booking: Arc<BookingController>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let repos = Arc::new(Repositories::new(&cfg).await?);
        let notifier = Arc::new(NotificationHub::from_config(&cfg.notify)?);
        let state = Self::with_parts(cfg, repos, notifier)?;
        bootstrap_admin(&state.repos, &state.cfg.auth).await?;
        Ok(state)
    }

    /// Assemble state around existing storage and notification backends
    pub fn with_parts(
        cfg: Config,
        repos: Arc<Repositories>,
        notifier: Arc<NotificationHub>,
    ) -> Result<Self> {
        let tz = cfg.booking.tz()?;
        let jwt = Arc::new(JwtKeys::from_config(&cfg.auth));
        let booking = Arc::new(BookingController::new(repos.clone(), notifier.clone(), tz));
        info!(
            storage = repos.backend,
            notifiers = ?notifier.channels(),
            timezone = %tz,
            "application state ready"
        );
        Ok(Self {
            cfg,
            repos,
            jwt,
            notifier,
            booking,
        })
    }
}

/// Create the first admin from config when no user exists yet
pub async fn bootstrap_admin(repos: &Repositories, cfg: &AuthConfig) -> Result<Option<User>> {
    let (Some(email), Some(password)) = (
        cfg.bootstrap_admin_email.as_deref(),
        cfg.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(None);
    };
    if !repos.users.list().await?.is_empty() {
        return Ok(None);
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: User::normalize_email(email),
        name: "Administrator".into(),
        password_hash: hash_password(password)?,
        role: Role::Admin,
        active: true,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    repos.users.insert(&user).await?;
    warn!(email = %user.email, "bootstrap admin created; change its password");
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_cfg(email: Option<&str>, password: Option<&str>) -> AuthConfig {
        AuthConfig {
            jwt_secret: "test".into(),
            token_ttl_hours: 1,
            cookie_secure: false,
            bootstrap_admin_email: email.map(Into::into),
            bootstrap_admin_password: password.map(Into::into),
        }
    }

    #[tokio::test]
    async fn test_bootstrap_only_when_empty() {
        let repos = Repositories::in_memory();
        let cfg = auth_cfg(Some("Admin@Uni.example"), Some("bootstrap-pass"));

        let created = bootstrap_admin(&repos, &cfg).await.unwrap().unwrap();
        assert_eq!(created.email, "admin@uni.example");
        assert_eq!(created.role, Role::Admin);

        assert!(bootstrap_admin(&repos, &cfg).await.unwrap().is_none());
        assert_eq!(repos.users.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_skipped_without_credentials() {
        let repos = Repositories::in_memory();
        assert!(bootstrap_admin(&repos, &auth_cfg(Some("a@b.c"), None))
            .await
            .unwrap()
            .is_none());
    }
}
