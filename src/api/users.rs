use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{error::ApiError, extract::ValidJson, response::ApiResponse},
    auth::{hash_password, AdminUser},
    controller::AppState,
    domain::{Role, User, UserProfile},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", put(update_user).delete(delete_user))
        .route("/users/:id/role", put(change_role))
        .route("/users/:id/password", put(reset_password))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 8, max = 256))]
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, max = 256))]
    pub new_password: String,
}

/// Refuse a change that would leave no active admin
fn ensure_other_admin(users: &[User], target: &User) -> Result<(), ApiError> {
    if target.role != Role::Admin || !target.active {
        return Ok(());
    }
    let others = users
        .iter()
        .filter(|u| u.id != target.id && u.role == Role::Admin && u.active)
        .count();
    if others == 0 {
        return Err(ApiError::Conflict("the last active admin must stay an active admin".into()));
    }
    Ok(())
}

async fn find(state: &AppState, id: Uuid) -> Result<User, ApiError> {
    state
        .repos
        .users
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("user {id}")))
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>, ApiError> {
    let mut users = state.repos.users.list().await?;
    users.sort_by(|a, b| a.email.cmp(&b.email));
    let profiles: Vec<UserProfile> = users.iter().map(User::profile).collect();
    let count = profiles.len();
    Ok(Json(ApiResponse::success(profiles).with_count(count)))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidJson(req): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), ApiError> {
    let email = User::normalize_email(&req.email);
    if state.repos.find_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict(format!("{email} already has an account")));
    }
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email,
        name: req.name.trim().to_string(),
        password_hash: hash_password(&req.password)?,
        role: req.role,
        active: true,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    state.repos.users.insert(&user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, by = %admin.id, "user created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user.profile()))))
}

/// PUT /api/users/:id - Name and active flag
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let mut user = find(&state, id).await?;
    if req.active == Some(false) {
        ensure_other_admin(&state.repos.users.list().await?, &user)?;
    }
    if let Some(name) = req.name {
        user.name = name.trim().to_string();
    }
    if let Some(active) = req.active {
        user.active = active;
    }
    user.updated_at = Utc::now();
    state.repos.users.update(&user).await?;
    Ok(Json(ApiResponse::success(user.profile())))
}

/// PUT /api/users/:id/role
pub async fn change_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<RoleRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let mut user = find(&state, id).await?;
    if req.role != Role::Admin {
        ensure_other_admin(&state.repos.users.list().await?, &user)?;
    }
    user.role = req.role;
    user.updated_at = Utc::now();
    state.repos.users.update(&user).await?;
    tracing::info!(user_id = %user.id, role = %user.role, by = %admin.id, "role changed");
    Ok(Json(ApiResponse::success(user.profile())))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if id == admin.id {
        return Err(ApiError::Conflict("you cannot delete your own account".into()));
    }
    let user = find(&state, id).await?;
    ensure_other_admin(&state.repos.users.list().await?, &user)?;
    state.repos.users.delete(id).await?;
    tracing::info!(user_id = %id, by = %admin.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/users/:id/password - Admin reset
pub async fn reset_password(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let mut user = find(&state, id).await?;
    user.password_hash = hash_password(&req.new_password)?;
    user.updated_at = Utc::now();
    state.repos.users.update(&user).await?;
    tracing::info!(user_id = %id, by = %admin.id, "password reset");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, active: bool) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: format!("{}@uni.example", Uuid::new_v4()),
            name: "U".into(),
            password_hash: String::new(),
            role,
            active,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_last_active_admin_protected() {
        let admin = user(Role::Admin, true);
        let inactive_admin = user(Role::Admin, false);
        let staff = user(Role::Staff, true);
        let users = vec![admin.clone(), inactive_admin, staff.clone()];
        assert!(ensure_other_admin(&users, &admin).is_err());
        assert!(ensure_other_admin(&users, &staff).is_ok());

        let second = user(Role::Admin, true);
        let users = vec![admin.clone(), second];
        assert!(ensure_other_admin(&users, &admin).is_ok());
    }
}
