//! Dashboard authentication.
//!
//! Sessions are HS256 JWTs carried in the `token` cookie or an
//! `Authorization: Bearer` header. The token only identifies the user: the
//! account is re-loaded on every request and its stored role and active flag
//! decide access.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::config::AuthConfig;
use crate::controller::AppState;
use crate::domain::{Role, User};
use crate::repo::RepoError;

pub const TOKEN_COOKIE: &str = "token";
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication required")]
    MissingToken,

    #[error("invalid or expired session")]
    InvalidToken,

    /// Same message whether the email or the password was wrong
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is disabled or no longer exists")]
    InactiveUser,

    #[error("requires the {0} role")]
    Forbidden(Role),

    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error(transparent)]
    Repo(#[from] RepoError),
}

// ============================================================================
// Passwords
// ============================================================================

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// Hash compared against when the account is unknown or disabled, so a
/// failed login costs one Argon2 verification either way
fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(b"no-such-account", &salt)
            .map(|h| h.to_string())
            .unwrap_or_default()
    })
}

/// Checks a login attempt. Runs Argon2 even when there is no usable account.
pub fn verify_login(password: &str, user: Option<&User>) -> bool {
    match user {
        Some(u) if u.active => verify_password(password, &u.password_hash),
        _ => {
            verify_password(password, decoy_hash());
            false
        }
    }
}

pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

// ============================================================================
// Session tokens
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours.max(1)),
        }
    }

    pub fn from_config(cfg: &AuthConfig) -> Self {
        Self::new(&cfg.jwt_secret, cfg.token_ttl_hours)
    }

    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| AuthError::InvalidToken)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "rejected session token");
                AuthError::InvalidToken
            })
    }
}

pub fn session_cookie(token: String, cfg: &AuthConfig) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .http_only(true)
        .secure(cfg.cookie_secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(TOKEN_COOKIE).path("/"))
}

// ============================================================================
// Extractors
// ============================================================================

fn cookie_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    jar.get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

async fn bearer_token(parts: &mut Parts, state: &AppState) -> Option<String> {
    TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
        .await
        .ok()
        .map(|TypedHeader(Authorization(b))| b.token().to_string())
}

/// Cookie first, then the bearer header. A cookie that fails verification
/// does not hide a valid header.
async fn session_claims(parts: &mut Parts, state: &AppState) -> Result<Claims, AuthError> {
    let cookie = cookie_token(parts);
    let bearer = bearer_token(parts, state).await;
    let mut result = Err(AuthError::MissingToken);
    for token in [cookie, bearer].into_iter().flatten() {
        result = state.jwt.verify(&token);
        if result.is_ok() {
            break;
        }
    }
    result
}

async fn authenticate(parts: &mut Parts, state: &AppState) -> Result<User, AuthError> {
    let claims = session_claims(parts, state).await?;
    let user = state
        .repos
        .users
        .get(claims.sub)
        .await?
        .ok_or(AuthError::InactiveUser)?;
    if !user.active {
        return Err(AuthError::InactiveUser);
    }
    Ok(user)
}

/// Any signed-in, active account
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

/// Staff or admin
#[derive(Debug, Clone)]
pub struct StaffUser(pub User);

#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(authenticate(parts, state).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for StaffUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.role.satisfies(Role::Staff) {
            return Err(AuthError::Forbidden(Role::Staff).into());
        }
        Ok(Self(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        if !user.role.satisfies(Role::Admin) {
            return Err(AuthError::Forbidden(Role::Admin).into());
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "staff@uni.example".into(),
            name: "Staff".into(),
            password_hash: String::new(),
            role,
            active: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_password_roundtrip() {
        let phc = hash_password("correct horse").unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &phc));
        assert!(!verify_password("wrong horse", &phc));
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_login_check_without_account() {
        let mut u = user(Role::Staff);
        u.password_hash = hash_password("correct horse").unwrap();
        assert!(verify_login("correct horse", Some(&u)));
        assert!(!verify_login("wrong horse", Some(&u)));
        assert!(!verify_login("correct horse", None));
        assert!(decoy_hash().starts_with("$argon2id$"));

        u.active = false;
        assert!(!verify_login("correct horse", Some(&u)));
    }

    #[test]
    fn test_short_password_rejected() {
        assert!(matches!(hash_password("short"), Err(AuthError::WeakPassword)));
    }

    #[test]
    fn test_token_roundtrip() {
        let keys = JwtKeys::new("test-secret-test-secret-test-secret", 1);
        let u = user(Role::Admin);
        let claims = keys.verify(&keys.issue(&u).unwrap()).unwrap();
        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let a = JwtKeys::new("secret-a-secret-a-secret-a", 1);
        let b = JwtKeys::new("secret-b-secret-b-secret-b", 1);
        let token = a.issue(&user(Role::Staff)).unwrap();
        assert!(matches!(b.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = JwtKeys::new("test-secret-test-secret-test-secret", 1);
        let claims = Claims {
            sub: Uuid::new_v4(),
            role: Role::Staff,
            iat: 0,
            exp: 1,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cfg = AuthConfig {
            jwt_secret: "x".into(),
            token_ttl_hours: 24,
            cookie_secure: true,
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
        };
        let c = session_cookie("abc".into(), &cfg);
        assert_eq!(c.name(), "token");
        assert_eq!(c.http_only(), Some(true));
        assert_eq!(c.secure(), Some(true));
        assert_eq!(c.same_site(), Some(SameSite::Lax));
        assert_eq!(c.path(), Some("/"));
    }
}
