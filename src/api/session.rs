use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    api::{error::ApiError, extract::ValidJson, response::ApiResponse},
    auth::{self, AuthError, AuthUser},
    controller::AppState,
    domain::UserProfile,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/password", put(change_password))
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 320))]
    pub email: String,
    #[validate(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserProfile,
    /// Same value as the cookie, for clients that send a bearer header
    pub token: String,
}

/// POST /api/auth/login - Sets the session cookie
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), ApiError> {
    let user = state.repos.find_user_by_email(&req.email).await?;
    let verified = auth::verify_login(&req.password, user.as_ref());
    let Some(mut user) = user.filter(|_| verified) else {
        tracing::info!(email = %req.email.trim(), "login failed");
        return Err(AuthError::InvalidCredentials.into());
    };

    let now = Utc::now();
    user.last_login_at = Some(now);
    user.updated_at = now;
    state.repos.users.update(&user).await?;

    let token = state.jwt.issue(&user)?;
    tracing::info!(user_id = %user.id, role = %user.role, "login succeeded");
    let jar = jar.add(auth::session_cookie(token.clone(), &state.cfg.auth));
    Ok((
        jar,
        Json(ApiResponse::success(LoginResponse {
            user: user.profile(),
            token,
        })),
    ))
}

/// POST /api/auth/logout - Clears the session cookie
pub async fn logout(jar: CookieJar) -> (CookieJar, Json<ApiResponse<bool>>) {
    (auth::clear_session(jar), Json(ApiResponse::success(true)))
}

/// GET /api/auth/me
pub async fn me(AuthUser(user): AuthUser) -> Json<ApiResponse<UserProfile>> {
    Json(ApiResponse::success(user.profile()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 256))]
    pub new_password: String,
}

/// PUT /api/auth/password
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    ValidJson(req): ValidJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    if !auth::verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::BadRequest("current password is incorrect".into()));
    }
    user.password_hash = auth::hash_password(&req.new_password)?;
    user.updated_at = Utc::now();
    state.repos.users.update(&user).await?;
    tracing::info!(user_id = %user.id, "password changed");
    Ok(Json(ApiResponse::success(user.profile())))
}
