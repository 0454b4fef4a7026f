use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;

use crate::{
    api::{error::ApiError, extract::ValidJson, response::ApiResponse},
    auth::AdminUser,
    controller::AppState,
    domain::Settings,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(update_settings))
}

/// GET /api/settings - Public booking settings
pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Settings>>, ApiError> {
    Ok(Json(ApiResponse::success(state.repos.current_settings().await?)))
}

/// PUT /api/settings - Replace the settings document
pub async fn update_settings(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    ValidJson(mut settings): ValidJson<Settings>,
) -> Result<Json<ApiResponse<Settings>>, ApiError> {
    settings.updated_at = Utc::now();
    state.repos.settings.put(&settings).await?;
    tracing::info!(
        user_id = %user.id,
        booking_open = settings.booking_open,
        min_lead_days = settings.min_lead_days,
        max_lead_days = settings.max_lead_days,
        "settings updated"
    );
    Ok(Json(ApiResponse::success(settings)))
}
