use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{
        error::ApiError,
        extract::{ApiQuery, ValidJson},
        response::ApiResponse,
        uploads,
    },
    auth::StaffUser,
    controller::AppState,
    domain::{Slot, Subject},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subjects", get(list_subjects).post(create_subject))
        .route(
            "/subjects/:id",
            get(get_subject).put(update_subject).delete(delete_subject),
        )
        .route("/subjects/:id/image", post(upload_image))
        .route("/admin/subjects", get(list_all_subjects))
}

#[derive(Debug, Deserialize)]
pub struct SubjectFilter {
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubjectInput {
    #[validate(length(min = 1, max = 50))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub category_id: Uuid,
    pub subcategory_id: Option<Uuid>,
    #[serde(default)]
    pub lecturer_ids: Vec<Uuid>,
    #[validate(length(min = 1, max = 2))]
    pub slots: Vec<Slot>,
    #[validate(range(min = 1, max = 1000))]
    pub total_classrooms: u32,
    #[validate(range(min = 1, max = 500))]
    pub students_per_classroom: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl SubjectInput {
    fn apply(self, s: &mut Subject) {
        s.code = self.code.trim().to_string();
        s.name = self.name.trim().to_string();
        s.description = self.description;
        s.category_id = self.category_id;
        s.subcategory_id = self.subcategory_id;
        s.lecturer_ids = self.lecturer_ids;
        s.slots = Subject::normalized_slots(&self.slots);
        s.total_classrooms = self.total_classrooms;
        s.students_per_classroom = self.students_per_classroom;
        s.active = self.active;
    }
}

/// Cross-document checks `validator` cannot express
async fn check_references(
    state: &AppState,
    input: &SubjectInput,
    editing: Option<Uuid>,
) -> Result<(), ApiError> {
    if Subject::normalized_slots(&input.slots).len() != input.slots.len() {
        return Err(ApiError::ValidationError("slots must not repeat".into()));
    }

    if state.repos.categories.get(input.category_id).await?.is_none() {
        return Err(ApiError::ValidationError(format!(
            "category {} does not exist",
            input.category_id
        )));
    }
    if let Some(sub_id) = input.subcategory_id {
        match state.repos.subcategories.get(sub_id).await? {
            None => {
                return Err(ApiError::ValidationError(format!(
                    "subcategory {sub_id} does not exist"
                )))
            }
            Some(sub) if sub.category_id != input.category_id => {
                return Err(ApiError::ValidationError(format!(
                    "subcategory {sub_id} belongs to another category"
                )))
            }
            Some(_) => {}
        }
    }

    let lecturers: HashSet<Uuid> = state
        .repos
        .lecturers
        .list()
        .await?
        .into_iter()
        .map(|l| l.id)
        .collect();
    if let Some(missing) = input.lecturer_ids.iter().find(|id| !lecturers.contains(id)) {
        return Err(ApiError::ValidationError(format!(
            "lecturer {missing} does not exist"
        )));
    }

    let code = input.code.trim();
    let clash = state
        .repos
        .subjects
        .list()
        .await?
        .into_iter()
        .any(|s| Some(s.id) != editing && s.code.eq_ignore_ascii_case(code));
    if clash {
        return Err(ApiError::Conflict(format!("subject code {code} is already used")));
    }
    Ok(())
}

/// GET /api/subjects - Active subjects, optionally by category
pub async fn list_subjects(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SubjectFilter>,
) -> Result<Json<ApiResponse<Vec<Subject>>>, ApiError> {
    let mut subjects: Vec<Subject> = state
        .repos
        .subjects
        .list()
        .await?
        .into_iter()
        .filter(|s| s.active)
        .filter(|s| filter.category_id.map_or(true, |c| s.category_id == c))
        .filter(|s| filter.subcategory_id.map_or(true, |c| s.subcategory_id == Some(c)))
        .collect();
    subjects.sort_by(|a, b| a.name.cmp(&b.name));
    let count = subjects.len();
    Ok(Json(ApiResponse::success(subjects).with_count(count)))
}

/// GET /api/admin/subjects - Every subject including inactive ones
pub async fn list_all_subjects(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
) -> Result<Json<ApiResponse<Vec<Subject>>>, ApiError> {
    let mut subjects = state.repos.subjects.list().await?;
    subjects.sort_by(|a, b| a.name.cmp(&b.name));
    let count = subjects.len();
    Ok(Json(ApiResponse::success(subjects).with_count(count)))
}

/// GET /api/subjects/:id - Inactive subjects are hidden from the public
pub async fn get_subject(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Subject>>, ApiError> {
    let subject = find(&state, id).await?;
    if !subject.active {
        return Err(ApiError::NotFound(format!("subject {id}")));
    }
    Ok(Json(ApiResponse::success(subject)))
}

pub async fn create_subject(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    ValidJson(input): ValidJson<SubjectInput>,
) -> Result<(StatusCode, Json<ApiResponse<Subject>>), ApiError> {
    check_references(&state, &input, None).await?;
    let now = Utc::now();
    let mut subject = Subject {
        id: Uuid::new_v4(),
        code: String::new(),
        name: String::new(),
        description: None,
        category_id: input.category_id,
        subcategory_id: None,
        lecturer_ids: Vec::new(),
        slots: Vec::new(),
        total_classrooms: 1,
        students_per_classroom: 1,
        image: None,
        active: true,
        created_at: now,
        updated_at: now,
    };
    input.apply(&mut subject);
    state.repos.subjects.insert(&subject).await?;
    tracing::info!(subject_id = %subject.id, code = %subject.code, user_id = %user.id, "subject created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(subject))))
}

/// PUT /api/subjects/:id
///
/// Capacity changes apply to future bookings only; existing reservations
/// are left untouched even if they now exceed the new capacity.
pub async fn update_subject(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<SubjectInput>,
) -> Result<Json<ApiResponse<Subject>>, ApiError> {
    let mut subject = find(&state, id).await?;
    check_references(&state, &input, Some(id)).await?;
    input.apply(&mut subject);
    subject.updated_at = Utc::now();
    state.repos.subjects.update(&subject).await?;
    Ok(Json(ApiResponse::success(subject)))
}

/// DELETE /api/subjects/:id - Refused once any reservation references it
pub async fn delete_subject(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let subject = state.booking.delete_subject(id).await?;
    if let Some(image) = &subject.image {
        uploads::remove(&state.cfg.uploads.dir, image).await;
    }
    tracing::info!(subject_id = %id, user_id = %user.id, "subject deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/subjects/:id/image - multipart with an `image` part
pub async fn upload_image(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<Subject>>, ApiError> {
    let mut subject = find(&state, id).await?;
    let form = uploads::read_form(multipart, &state.cfg.uploads).await?;
    let image = form
        .image
        .ok_or_else(|| ApiError::ValidationError("image is required".into()))?;

    let path = uploads::store(&state.cfg.uploads.dir, &image).await?;
    let previous = subject.image.replace(path);
    subject.updated_at = Utc::now();
    state.repos.subjects.update(&subject).await?;
    if let Some(old) = previous {
        uploads::remove(&state.cfg.uploads.dir, &old).await;
    }
    Ok(Json(ApiResponse::success(subject)))
}

async fn find(state: &AppState, id: Uuid) -> Result<Subject, ApiError> {
    state
        .repos
        .subjects
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("subject {id}")))
}
