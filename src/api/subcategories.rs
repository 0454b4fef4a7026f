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
    api::{
        error::ApiError,
        extract::{ApiQuery, ValidJson},
        response::ApiResponse,
    },
    auth::StaffUser,
    controller::AppState,
    domain::Subcategory,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subcategories", get(list_subcategories).post(create_subcategory))
        .route(
            "/subcategories/:id",
            put(update_subcategory).delete(delete_subcategory),
        )
}

#[derive(Debug, Deserialize)]
pub struct SubcategoryFilter {
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubcategoryInput {
    pub category_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub position: i32,
}

/// GET /api/subcategories?category_id=
pub async fn list_subcategories(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SubcategoryFilter>,
) -> Result<Json<ApiResponse<Vec<Subcategory>>>, ApiError> {
    let mut items: Vec<Subcategory> = state
        .repos
        .subcategories
        .list()
        .await?
        .into_iter()
        .filter(|s| filter.category_id.map_or(true, |c| s.category_id == c))
        .collect();
    items.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.name.cmp(&b.name)));
    let count = items.len();
    Ok(Json(ApiResponse::success(items).with_count(count)))
}

async fn ensure_category(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    if state.repos.categories.get(id).await?.is_none() {
        return Err(ApiError::ValidationError(format!("category {id} does not exist")));
    }
    Ok(())
}

pub async fn create_subcategory(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    ValidJson(input): ValidJson<SubcategoryInput>,
) -> Result<(StatusCode, Json<ApiResponse<Subcategory>>), ApiError> {
    ensure_category(&state, input.category_id).await?;
    let now = Utc::now();
    let sub = Subcategory {
        id: Uuid::new_v4(),
        category_id: input.category_id,
        name: input.name.trim().to_string(),
        position: input.position,
        created_at: now,
        updated_at: now,
    };
    state.repos.subcategories.insert(&sub).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(sub))))
}

/// PUT /api/subcategories/:id - Moving to another category is refused while
/// subjects use the subcategory
pub async fn update_subcategory(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<SubcategoryInput>,
) -> Result<Json<ApiResponse<Subcategory>>, ApiError> {
    let mut sub = find(&state, id).await?;
    if sub.category_id != input.category_id {
        ensure_category(&state, input.category_id).await?;
        if subjects_using(&state, id).await? > 0 {
            return Err(ApiError::Conflict(
                "subjects use this subcategory; move them first".into(),
            ));
        }
    }
    sub.category_id = input.category_id;
    sub.name = input.name.trim().to_string();
    sub.position = input.position;
    sub.updated_at = Utc::now();
    state.repos.subcategories.update(&sub).await?;
    Ok(Json(ApiResponse::success(sub)))
}

pub async fn delete_subcategory(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    find(&state, id).await?;
    let used = subjects_using(&state, id).await?;
    if used > 0 {
        return Err(ApiError::Conflict(format!("subcategory is used by {used} subjects")));
    }
    state.repos.subcategories.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn subjects_using(state: &AppState, id: Uuid) -> Result<usize, ApiError> {
    Ok(state
        .repos
        .subjects
        .list()
        .await?
        .iter()
        .filter(|s| s.subcategory_id == Some(id))
        .count())
}

async fn find(state: &AppState, id: Uuid) -> Result<Subcategory, ApiError> {
    state
        .repos
        .subcategories
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("subcategory {id}")))
}
