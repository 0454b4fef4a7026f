use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    api::{error::ApiError, extract::ValidJson, response::ApiResponse},
    auth::StaffUser,
    controller::AppState,
    domain::{ReservationRule, Slot, Subject},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/:id", put(update_rule).delete(delete_rule))
}

/// Closed period. Empty `subject_ids` closes every subject, empty `slots`
/// closes both slots.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_rule_dates"))]
pub struct RuleInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub subject_ids: Vec<Uuid>,
    #[serde(default)]
    pub slots: Vec<Slot>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

fn validate_rule_dates(input: &RuleInput) -> Result<(), ValidationError> {
    if input.end_date < input.start_date {
        return Err(ValidationError::new("end_date_before_start_date"));
    }
    Ok(())
}

impl RuleInput {
    fn apply(self, rule: &mut ReservationRule) {
        let mut subject_ids = self.subject_ids;
        subject_ids.sort();
        subject_ids.dedup();
        rule.title = self.title.trim().to_string();
        rule.start_date = self.start_date;
        rule.end_date = self.end_date;
        rule.subject_ids = subject_ids;
        rule.slots = Subject::normalized_slots(&self.slots);
        rule.active = self.active;
    }
}

async fn check_subjects(state: &AppState, ids: &[Uuid]) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Ok(());
    }
    let known: HashSet<Uuid> = state
        .repos
        .subjects
        .list()
        .await?
        .into_iter()
        .map(|s| s.id)
        .collect();
    match ids.iter().find(|id| !known.contains(id)) {
        Some(missing) => Err(ApiError::ValidationError(format!(
            "subject {missing} does not exist"
        ))),
        None => Ok(()),
    }
}

/// GET /api/rules - Closed rules, latest period first
pub async fn list_rules(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
) -> Result<Json<ApiResponse<Vec<ReservationRule>>>, ApiError> {
    let mut rules = state.repos.rules.list().await?;
    rules.sort_by(|a, b| b.start_date.cmp(&a.start_date));
    let count = rules.len();
    Ok(Json(ApiResponse::success(rules).with_count(count)))
}

pub async fn create_rule(
    State(state): State<AppState>,
    StaffUser(user): StaffUser,
    ValidJson(input): ValidJson<RuleInput>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationRule>>), ApiError> {
    check_subjects(&state, &input.subject_ids).await?;
    let now = Utc::now();
    let mut rule = ReservationRule {
        id: Uuid::new_v4(),
        title: String::new(),
        start_date: input.start_date,
        end_date: input.end_date,
        subject_ids: Vec::new(),
        slots: Vec::new(),
        active: true,
        created_at: now,
        updated_at: now,
    };
    input.apply(&mut rule);
    state.repos.rules.insert(&rule).await?;
    tracing::info!(
        rule_id = %rule.id,
        start = %rule.start_date,
        end = %rule.end_date,
        user_id = %user.id,
        "closed rule created"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(rule))))
}

pub async fn update_rule(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
    ValidJson(input): ValidJson<RuleInput>,
) -> Result<Json<ApiResponse<ReservationRule>>, ApiError> {
    let mut rule = state
        .repos
        .rules
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("rule {id}")))?;
    check_subjects(&state, &input.subject_ids).await?;
    input.apply(&mut rule);
    rule.updated_at = Utc::now();
    state.repos.rules.update(&rule).await?;
    Ok(Json(ApiResponse::success(rule)))
}

pub async fn delete_rule(
    State(state): State<AppState>,
    StaffUser(_): StaffUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.repos.rules.delete(id).await? {
        return Err(ApiError::NotFound(format!("rule {id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}
