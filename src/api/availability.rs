use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::{error::ApiError, extract::ApiQuery, response::ApiResponse},
    booking::AvailabilityCell,
    controller::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/availability", get(get_availability))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityParams {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub subject_id: Option<Uuid>,
}

/// GET /api/availability?from=&to=&subject_id=
///
/// One entry per date, active subject and offered slot.
pub async fn get_availability(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<AvailabilityParams>,
) -> Result<Json<ApiResponse<Vec<AvailabilityCell>>>, ApiError> {
    let cells = state
        .booking
        .availability(params.from, params.to, params.subject_id)
        .await?;
    let count = cells.len();
    Ok(Json(ApiResponse::success(cells).with_count(count)))
}
