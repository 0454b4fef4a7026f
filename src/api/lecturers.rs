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
    domain::Lecturer,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/lecturers", get(list_lecturers).post(create_lecturer))
        .route(
            "/lecturers/:id",
            get(get_lecturer).put(update_lecturer).delete(delete_lecturer),
        )
}

#[derive(Debug, Deserialize, Validate)]
pub struct LecturerInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub title: Option<String>,
    #[validate(length(max = 200))]
    pub department: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(max = 5000))]
    pub bio: Option<String>,
}

impl LecturerInput {
    fn apply(self, l: &mut Lecturer) {
        l.name = self.name.trim().to_string();
        l.title = self.title;
        l.department = self.department;
        l.email = self.email;
        l.phone = self.phone;
        l.bio = self.bio;
    }
}

/// GET /api/lecturers - Lecturers by name
pub async fn list_lecturers(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Lecturer>>>, ApiError> {
    let mut lecturers = state.repos.lecturers.list().await?;
    lecturers.sort_by(|a, b| a.name.cmp(&b.name));
    let count = lecturers.len();
    Ok(Json(ApiResponse::success(lecturers).with_count(count)))
}

pub async fn get_lecturer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Lecturer>>, ApiError> {
    Ok(Json(ApiResponse::success(find(&state, id).await?)))
}

pub async fn create_lecturer(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    ValidJson(input): ValidJson<LecturerInput>,
) -> Result<(StatusCode, Json<ApiResponse<Lecturer>>), ApiError> {
    let now = Utc::now();
    let mut lecturer = Lecturer {
        id: Uuid::new_v4(),
        name: String::new(),
        title: None,
        department: None,
        email: None,
        phone: None,
        bio: None,
        created_at: now,
        updated_at: now,
    };
    input.apply(&mut lecturer);
    state.repos.lecturers.insert(&lecturer).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(lecturer))))
}

pub async fn update_lecturer(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<LecturerInput>,
) -> Result<Json<ApiResponse<Lecturer>>, ApiError> {
    let mut lecturer = find(&state, id).await?;
    input.apply(&mut lecturer);
    lecturer.updated_at = Utc::now();
    state.repos.lecturers.update(&lecturer).await?;
    Ok(Json(ApiResponse::success(lecturer)))
}

/// DELETE /api/lecturers/:id - Refused while a subject lists the lecturer
pub async fn delete_lecturer(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    find(&state, id).await?;
    let teaching: Vec<String> = state
        .repos
        .subjects
        .list()
        .await?
        .into_iter()
        .filter(|s| s.lecturer_ids.contains(&id))
        .map(|s| s.name)
        .collect();
    if !teaching.is_empty() {
        return Err(ApiError::Conflict(format!(
            "lecturer teaches {}",
            teaching.join(", ")
        )));
    }
    state.repos.lecturers.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn find(state: &AppState, id: Uuid) -> Result<Lecturer, ApiError> {
    state
        .repos
        .lecturers
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("lecturer {id}")))
}
