use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{EducationLevel, ReservationStatus, Slot};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct SchoolInfo {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub province: String,
    #[validate(length(max = 100))]
    pub district: Option<String>,
    pub level: EducationLevel,
    #[validate(range(min = 1, max = 10000))]
    pub student_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct ContactInfo {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 100))]
    pub position: Option<String>,
    #[validate(length(min = 6, max = 30))]
    pub phone: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 100))]
    pub line_id: Option<String>,
}

/// One subject taught in one slot, using `classrooms` of its capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct Session {
    pub subject_id: Uuid,
    pub slot: Slot,
    #[validate(range(max = 1000))]
    pub classrooms: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct TrainingDay {
    pub date: NaiveDate,
    #[validate(nested)]
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub from: ReservationStatus,
    pub to: ReservationStatus,
    pub by: Option<Uuid>,
    pub at: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Booking submitted from the public form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewReservation {
    #[validate(nested)]
    pub school: SchoolInfo,
    #[validate(nested)]
    pub contact: ContactInfo,
    #[validate(nested)]
    pub training_days: Vec<TrainingDay>,
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reservation {
    pub id: Uuid,
    pub code: String,
    pub school: SchoolInfo,
    pub contact: ContactInfo,
    pub training_days: Vec<TrainingDay>,
    pub note: Option<String>,
    pub status: ReservationStatus,
    pub admin_note: Option<String>,
    pub history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(code: String, input: NewReservation, now: DateTime<Utc>) -> Self {
        let mut training_days = input.training_days;
        training_days.sort_by_key(|d| d.date);
        Self {
            id: Uuid::new_v4(),
            code,
            school: input.school,
            contact: input.contact,
            training_days,
            note: input.note,
            status: ReservationStatus::Pending,
            admin_note: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Every (date, session) pair of this reservation
    pub fn sessions(&self) -> impl Iterator<Item = (NaiveDate, &Session)> {
        self.training_days
            .iter()
            .flat_map(|d| d.sessions.iter().map(move |s| (d.date, s)))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.training_days.iter().map(|d| d.date).min()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.training_days.iter().map(|d| d.date).max()
    }

    /// Whether any training day falls inside `[from, to]`
    pub fn overlaps(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> bool {
        self.training_days.iter().any(|d| {
            from.map_or(true, |f| d.date >= f) && to.map_or(true, |t| d.date <= t)
        })
    }

    pub fn references_subject(&self, subject_id: Uuid) -> bool {
        self.sessions().any(|(_, s)| s.subject_id == subject_id)
    }

    /// Apply a lifecycle transition and record it in the history
    pub fn transition(
        &mut self,
        to: ReservationStatus,
        by: Option<Uuid>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.status.can_transition_to(to) {
            return false;
        }
        self.history.push(StatusChange {
            from: self.status,
            to,
            by,
            at: now,
            reason,
        });
        self.status = to;
        self.updated_at = now;
        true
    }
}
