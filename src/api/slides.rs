use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    api::{
        error::ApiError,
        response::ApiResponse,
        uploads::{self, ImageForm},
    },
    auth::StaffUser,
    controller::AppState,
    domain::Slide,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/slides", get(list_slides).post(create_slide))
        .route("/slides/:id", put(update_slide).delete(delete_slide))
        .route("/admin/slides", get(list_all_slides))
}

fn by_position(slides: &mut [Slide]) {
    slides.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

/// Text fields shared by create and update
struct SlideFields {
    title: Option<String>,
    link_url: Option<Option<String>>,
    position: Option<i32>,
    active: Option<bool>,
}

impl SlideFields {
    fn from_form(form: &ImageForm) -> Result<Self, ApiError> {
        let title = form.text("title").map(|t| t.trim().to_string());
        if title.as_ref().is_some_and(|t| t.chars().count() > 200) {
            return Err(ApiError::ValidationError("title is too long".into()));
        }
        // A present but blank link clears it
        let link_url = form
            .fields
            .get("link_url")
            .map(|v| Some(v.trim().to_string()).filter(|v| !v.is_empty()));
        Ok(Self {
            title,
            link_url,
            position: form.parsed("position")?,
            active: form.parsed("active")?,
        })
    }
}

/// GET /api/slides - Active slides for the home page
pub async fn list_slides(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Slide>>>, ApiError> {
    let mut slides: Vec<Slide> = state
        .repos
        .slides
        .list()
        .await?
        .into_iter()
        .filter(|s| s.active)
        .collect();
    by_position(&mut slides);
    Ok(Json(ApiResponse::success(slides)))
}

/// GET /api/admin/slides
pub async fn list_all_slides(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
) -> Result<Json<ApiResponse<Vec<Slide>>>, ApiError> {
    let mut slides = state.repos.slides.list().await?;
    by_position(&mut slides);
    let count = slides.len();
    Ok(Json(ApiResponse::success(slides).with_count(count)))
}

/// POST /api/slides - multipart: `image`, `title`, optional `link_url`,
/// `position`, `active`
pub async fn create_slide(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Slide>>), ApiError> {
    let form = uploads::read_form(multipart, &state.cfg.uploads).await?;
    let fields = SlideFields::from_form(&form)?;
    let title = fields
        .title
        .ok_or_else(|| ApiError::ValidationError("title is required".into()))?;
    let image = form
        .image
        .as_ref()
        .ok_or_else(|| ApiError::ValidationError("image is required".into()))?;

    let path = uploads::store(&state.cfg.uploads.dir, image).await?;
    let now = Utc::now();
    let slide = Slide {
        id: Uuid::new_v4(),
        title,
        image: path,
        link_url: fields.link_url.flatten(),
        position: fields.position.unwrap_or(0),
        active: fields.active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    if let Err(e) = state.repos.slides.insert(&slide).await {
        uploads::remove(&state.cfg.uploads.dir, &slide.image).await;
        return Err(e.into());
    }
    tracing::info!(slide_id = %slide.id, user_id = %user.id, "slide created");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(slide))))
}

/// PUT /api/slides/:id - multipart; every part is optional
pub async fn update_slide(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<ApiResponse<Slide>>, ApiError> {
    let mut slide = find(&state, id).await?;
    let form = uploads::read_form(multipart, &state.cfg.uploads).await?;
    let fields = SlideFields::from_form(&form)?;

    if let Some(title) = fields.title {
        slide.title = title;
    }
    if let Some(link) = fields.link_url {
        slide.link_url = link;
    }
    if let Some(position) = fields.position {
        slide.position = position;
    }
    if let Some(active) = fields.active {
        slide.active = active;
    }
    let replaced = match &form.image {
        Some(image) => {
            let path = uploads::store(&state.cfg.uploads.dir, image).await?;
            Some(std::mem::replace(&mut slide.image, path))
        }
        None => None,
    };
    slide.updated_at = Utc::now();
    state.repos.slides.update(&slide).await?;

    if let Some(old) = replaced {
        uploads::remove(&state.cfg.uploads.dir, &old).await;
    }
    Ok(Json(ApiResponse::success(slide)))
}

/// DELETE /api/slides/:id - Also removes the image file
pub async fn delete_slide(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let slide = find(&state, id).await?;
    state.repos.slides.delete(id).await?;
    uploads::remove(&state.cfg.uploads.dir, &slide.image).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn find(state: &AppState, id: Uuid) -> Result<Slide, ApiError> {
    state
        .repos
        .slides
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("slide {id}")))
}
