use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

use super::ledger::{CapacityLedger, Cell};
use super::window::{is_weekend, BookingWindow};
use crate::domain::{NewReservation, ReservationRule, Settings, Slot, Subject};

/// A single reason a booking request cannot be accepted
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingViolation {
    #[error("bookings are currently closed")]
    BookingClosed,

    #[error("at least one training day is required")]
    NoTrainingDays,

    #[error("{requested} training days requested, at most {max} allowed")]
    TooManyTrainingDays { requested: usize, max: u32 },

    #[error("{date} is listed more than once")]
    DuplicateDate { date: NaiveDate },

    #[error("{date} is outside the booking window {earliest}..={latest}")]
    OutsideBookingWindow {
        date: NaiveDate,
        earliest: NaiveDate,
        latest: NaiveDate,
    },

    #[error("{date} falls on a weekend")]
    WeekendNotAllowed { date: NaiveDate },

    #[error("{date} has no sessions")]
    NoSessions { date: NaiveDate },

    #[error("{date} has {requested} sessions, at most {max} allowed")]
    TooManySessions {
        date: NaiveDate,
        requested: usize,
        max: u32,
    },

    #[error("subject {subject_id} is booked twice in the {slot} slot on {date}")]
    DuplicateSession {
        date: NaiveDate,
        subject_id: Uuid,
        slot: Slot,
    },

    #[error("subject {subject_id} does not exist")]
    UnknownSubject { subject_id: Uuid },

    #[error("subject {subject_id} is not open for booking")]
    SubjectInactive { subject_id: Uuid },

    #[error("subject {subject_id} is not taught in the {slot} slot")]
    SlotNotOffered {
        date: NaiveDate,
        subject_id: Uuid,
        slot: Slot,
    },

    #[error("at least one classroom is required for subject {subject_id} on {date}")]
    ZeroClassrooms {
        date: NaiveDate,
        subject_id: Uuid,
        slot: Slot,
    },

    #[error("subject {subject_id} is closed on {date} ({slot}): {reason}")]
    Closed {
        date: NaiveDate,
        subject_id: Uuid,
        slot: Slot,
        reason: String,
    },

    #[error("{requested} classrooms requested for subject {subject_id} on {date} ({slot}), {remaining} left")]
    CapacityExceeded {
        date: NaiveDate,
        subject_id: Uuid,
        slot: Slot,
        requested: u32,
        remaining: u32,
    },
}

/// Everything a booking decision depends on, loaded by the caller.
pub struct BookingContext<'a> {
    pub today: NaiveDate,
    pub settings: &'a Settings,
    pub subjects: &'a HashMap<Uuid, Subject>,
    pub rules: &'a [ReservationRule],
    pub ledger: &'a CapacityLedger,
}

impl BookingContext<'_> {
    /// First active rule closing `cell`
    pub fn closed_by(&self, cell: &Cell) -> Option<&ReservationRule> {
        closed_by(self.rules, cell)
    }
}

pub fn closed_by<'r>(rules: &'r [ReservationRule], cell: &Cell) -> Option<&'r ReservationRule> {
    rules
        .iter()
        .find(|r| r.covers(cell.date, cell.subject_id, cell.slot))
}

/// Check a booking request against settings, the catalog, closed rules and
/// current usage. Returns every violation found, not just the first.
pub fn validate_request(
    req: &NewReservation,
    ctx: &BookingContext<'_>,
) -> Result<(), Vec<BookingViolation>> {
    let settings = ctx.settings;
    let window = BookingWindow::from_settings(ctx.today, settings);
    let mut violations = Vec::new();

    if !settings.booking_open {
        violations.push(BookingViolation::BookingClosed);
    }
    if req.training_days.is_empty() {
        violations.push(BookingViolation::NoTrainingDays);
    }
    if req.training_days.len() > settings.max_training_days as usize {
        violations.push(BookingViolation::TooManyTrainingDays {
            requested: req.training_days.len(),
            max: settings.max_training_days,
        });
    }

    let mut seen_dates = HashSet::new();
    let mut requested: BTreeMap<Cell, u32> = BTreeMap::new();

    for day in &req.training_days {
        let date = day.date;
        if !seen_dates.insert(date) {
            violations.push(BookingViolation::DuplicateDate { date });
        }
        if !window.contains(date) {
            violations.push(BookingViolation::OutsideBookingWindow {
                date,
                earliest: window.earliest,
                latest: window.latest,
            });
        }
        if !settings.allow_weekends && is_weekend(date) {
            violations.push(BookingViolation::WeekendNotAllowed { date });
        }
        if day.sessions.is_empty() {
            violations.push(BookingViolation::NoSessions { date });
        }
        if day.sessions.len() > settings.max_sessions_per_day as usize {
            violations.push(BookingViolation::TooManySessions {
                date,
                requested: day.sessions.len(),
                max: settings.max_sessions_per_day,
            });
        }

        let mut seen_sessions = HashSet::new();
        for session in &day.sessions {
            let subject_id = session.subject_id;
            let slot = session.slot;
            if !seen_sessions.insert((subject_id, slot)) {
                violations.push(BookingViolation::DuplicateSession { date, subject_id, slot });
            }
            if session.classrooms == 0 {
                violations.push(BookingViolation::ZeroClassrooms { date, subject_id, slot });
            }

            let Some(subject) = ctx.subjects.get(&subject_id) else {
                violations.push(BookingViolation::UnknownSubject { subject_id });
                continue;
            };
            if !subject.active {
                violations.push(BookingViolation::SubjectInactive { subject_id });
                continue;
            }
            if !subject.offers(slot) {
                violations.push(BookingViolation::SlotNotOffered { date, subject_id, slot });
                continue;
            }

            let cell = Cell::new(date, subject_id, slot);
            if let Some(rule) = ctx.closed_by(&cell) {
                violations.push(BookingViolation::Closed {
                    date,
                    subject_id,
                    slot,
                    reason: rule.title.clone(),
                });
                continue;
            }
            let total = requested.entry(cell).or_insert(0);
            *total = total.saturating_add(session.classrooms);
        }
    }

    for (cell, want) in requested {
        let Some(subject) = ctx.subjects.get(&cell.subject_id) else {
            continue;
        };
        let remaining = ctx.ledger.remaining(subject, cell.date, cell.slot);
        if want > remaining {
            violations.push(BookingViolation::CapacityExceeded {
                date: cell.date,
                subject_id: cell.subject_id,
                slot: cell.slot,
                requested: want,
                remaining,
            });
        }
    }

    // Unknown/inactive subjects referenced on several days are reported once
    dedup_preserving_order(&mut violations);

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn dedup_preserving_order(violations: &mut Vec<BookingViolation>) {
    let mut seen = Vec::with_capacity(violations.len());
    violations.retain(|v| {
        if seen.contains(v) {
            false
        } else {
            seen.push(v.clone());
            true
        }
    });
}
