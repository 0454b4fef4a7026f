use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{error::ApiError, extract::ValidJson, response::ApiResponse},
    auth::StaffUser,
    controller::AppState,
    domain::Category,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    pub position: i32,
}

/// GET /api/categories - Categories by position
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Category>>>, ApiError> {
    let mut categories = state.repos.categories.list().await?;
    categories.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
    let count = categories.len();
    Ok(Json(ApiResponse::success(categories).with_count(count)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let category = find(&state, id).await?;
    Ok(Json(ApiResponse::success(category)))
}

/// POST /api/categories
pub async fn create_category(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    ValidJson(input): ValidJson<CategoryInput>,
) -> Result<(StatusCode, Json<ApiResponse<Category>>), ApiError> {
    let now = Utc::now();
    let category = Category {
        id: Uuid::new_v4(),
        name: input.name.trim().to_string(),
        description: input.description,
        position: input.position,
        created_at: now,
        updated_at: now,
    };
    state.repos.categories.insert(&category).await?;
    tracing::info!(category_id = %category.id, user_id = %user.id, "category created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(category))))
}

/// PUT /api/categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<CategoryInput>,
) -> Result<Json<ApiResponse<Category>>, ApiError> {
    let mut category = find(&state, id).await?;
    category.name = input.name.trim().to_string();
    category.description = input.description;
    category.position = input.position;
    category.updated_at = Utc::now();
    state.repos.categories.update(&category).await?;
    Ok(Json(ApiResponse::success(category)))
}

/// DELETE /api/categories/:id - Refused while subcategories or subjects use it
pub async fn delete_category(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    find(&state, id).await?;

    let subcategories = state
        .repos
        .subcategories
        .list()
        .await?
        .into_iter()
        .filter(|s| s.category_id == id)
        .count();
    let subjects = state
        .repos
        .subjects
        .list()
        .await?
        .into_iter()
        .filter(|s| s.category_id == id)
        .count();
    if subcategories > 0 || subjects > 0 {
        return Err(ApiError::Conflict(format!(
            "category is used by {subcategories} subcategories and {subjects} subjects"
        )));
    }

    state.repos.categories.delete(id).await?;
    tracing::info!(category_id = %id, user_id = %user.id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn find(state: &AppState, id: Uuid) -> Result<Category, ApiError> {
    state
        .repos
        .categories
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("category {id}")))
}
