use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use strum::IntoEnumIterator;
use uuid::Uuid;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    auth::StaffUser,
    controller::AppState,
    domain::{Reservation, ReservationStatus, Slot, Subject},
};

/// How far back "recent" and how far ahead "upcoming" reach
pub const DASHBOARD_DAYS: i64 = 30;

pub fn routes() -> Router<AppState> {
    Router::new().route("/admin/dashboard", get(get_dashboard))
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UpcomingSession {
    pub date: NaiveDate,
    pub slot: Slot,
    pub subject_id: Uuid,
    pub subject_name: String,
    pub school: String,
    pub classrooms: u32,
    pub reservation_id: Uuid,
    pub reservation_code: String,
    pub status: ReservationStatus,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub totals: BTreeMap<String, usize>,
    pub created_last_30_days: usize,
    pub upcoming: Vec<UpcomingSession>,
}

pub fn summarize(
    reservations: &[Reservation],
    subjects: &HashMap<Uuid, Subject>,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Dashboard {
    let mut totals: BTreeMap<String, usize> =
        ReservationStatus::iter().map(|s| (s.to_string(), 0)).collect();
    for r in reservations {
        *totals.entry(r.status.to_string()).or_default() += 1;
    }

    let since = now - Duration::days(DASHBOARD_DAYS);
    let created_last_30_days = reservations.iter().filter(|r| r.created_at >= since).count();

    let until = today + Duration::days(DASHBOARD_DAYS);
    let mut upcoming: Vec<UpcomingSession> = reservations
        .iter()
        .filter(|r| r.status.is_occupying())
        .flat_map(|r| {
            r.sessions()
                .filter(|(date, _)| *date >= today && *date <= until)
                .map(move |(date, s)| UpcomingSession {
                    date,
                    slot: s.slot,
                    subject_id: s.subject_id,
                    subject_name: subjects
                        .get(&s.subject_id)
                        .map(|sub| sub.name.clone())
                        .unwrap_or_else(|| "(deleted subject)".into()),
                    school: r.school.name.clone(),
                    classrooms: s.classrooms,
                    reservation_id: r.id,
                    reservation_code: r.code.clone(),
                    status: r.status,
                })
        })
        .collect();
    upcoming.sort_by(|a, b| {
        (a.date, a.slot, &a.subject_name, &a.reservation_code)
            .cmp(&(b.date, b.slot, &b.subject_name, &b.reservation_code))
    });

    Dashboard {
        totals,
        created_last_30_days,
        upcoming,
    }
}

/// GET /api/admin/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
) -> Result<Json<ApiResponse<Dashboard>>, ApiError> {
    let reservations = state.repos.reservations.list().await?;
    let subjects: HashMap<Uuid, Subject> = state
        .repos
        .subjects
        .list()
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect();
    let dashboard = summarize(&reservations, &subjects, state.booking.today(), Utc::now());
    Ok(Json(ApiResponse::success(dashboard)))
}
