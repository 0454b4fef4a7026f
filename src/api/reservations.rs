use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{
        error::ApiError,
        extract::{ApiQuery, ValidJson},
        response::{ApiResponse, Page},
    },
    auth::{AdminUser, StaffUser},
    controller::AppState,
    domain::{NewReservation, Reservation, ReservationStatus},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reservations", get(list_reservations).post(create_reservation))
        .route("/reservations/lookup", get(lookup_reservation))
        .route(
            "/reservations/:id",
            get(get_reservation).delete(delete_reservation),
        )
        .route("/reservations/:id/status", put(change_status))
        .route("/reservations/:id/note", put(set_note))
}

/// POST /api/reservations - Public booking form
pub async fn create_reservation(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<NewReservation>,
) -> Result<(StatusCode, Json<ApiResponse<Reservation>>), ApiError> {
    let reservation = state.booking.create_reservation(req).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(reservation))))
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub code: String,
    pub email: String,
}

/// GET /api/reservations/lookup?code=&email=
pub async fn lookup_reservation(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<LookupQuery>,
) -> Result<Json<ApiResponse<Reservation>>, ApiError> {
    let reservation = state.booking.lookup(&q.code, &q.email).await?;
    Ok(Json(ApiResponse::success(reservation)))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Case-insensitive match on school, code or contact name
    pub q: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl ReservationFilter {
    pub fn matches(&self, r: &Reservation) -> bool {
        if self.status.is_some_and(|s| s != r.status) {
            return false;
        }
        if (self.from.is_some() || self.to.is_some()) && !r.overlaps(self.from, self.to) {
            return false;
        }
        match self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => {
                let q = q.to_lowercase();
                r.school.name.to_lowercase().contains(&q)
                    || r.code.to_lowercase().contains(&q)
                    || r.contact.name.to_lowercase().contains(&q)
            }
            None => true,
        }
    }
}

/// GET /api/reservations - Filtered, newest first, paginated
pub async fn list_reservations(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    ApiQuery(filter): ApiQuery<ReservationFilter>,
) -> Result<Json<ApiResponse<Vec<Reservation>>>, ApiError> {
    let page = Page::new(filter.page, filter.page_size);
    let mut matching: Vec<Reservation> = state
        .repos
        .reservations
        .list()
        .await?
        .into_iter()
        .filter(|r| filter.matches(r))
        .collect();
    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.code.cmp(&a.code)));
    let total = matching.len();
    Ok(Json(
        ApiResponse::success(page.slice(matching)).with_pagination(&page, total),
    ))
}

pub async fn get_reservation(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Reservation>>, ApiError> {
    Ok(Json(ApiResponse::success(state.booking.get(id).await?)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusChangeRequest {
    pub status: ReservationStatus,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}

/// PUT /api/reservations/:id/status
pub async fn change_status(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<StatusChangeRequest>,
) -> Result<Json<ApiResponse<Reservation>>, ApiError> {
    let reason = req.reason.filter(|r| !r.trim().is_empty());
    let reservation = state
        .booking
        .change_status(id, req.status, Some(user.id), reason)
        .await?;
    Ok(Json(ApiResponse::success(reservation)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct NoteRequest {
    #[validate(length(max = 5000))]
    pub admin_note: Option<String>,
}

/// PUT /api/reservations/:id/note - Internal note, never shown to schools
pub async fn set_note(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<NoteRequest>,
) -> Result<Json<ApiResponse<Reservation>>, ApiError> {
    let reservation = state.booking.set_admin_note(id, req.admin_note).await?;
    Ok(Json(ApiResponse::success(reservation)))
}

/// DELETE /api/reservations/:id
pub async fn delete_reservation(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let removed = state.booking.delete(id).await?;
    tracing::info!(reservation_code = %removed.code, user_id = %user.id, "reservation removed by admin");
    Ok(StatusCode::NO_CONTENT)
}
