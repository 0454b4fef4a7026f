use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::ledger::{CapacityLedger, Cell};
use super::validate::closed_by;
use super::window::{is_weekend, BookingWindow};
use super::BookingError;
use crate::domain::{ReservationRule, Settings, Slot, Subject};

/// Longest range a single availability query may span
pub const MAX_AVAILABILITY_DAYS: i64 = 93;

/// How far from today, either way, an availability query may reach
pub const AVAILABILITY_HORIZON_DAYS: i64 = 730;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AvailabilityCell {
    pub date: NaiveDate,
    pub subject_id: Uuid,
    pub slot: Slot,
    pub capacity: u32,
    pub used: u32,
    pub remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_reason: Option<String>,
    pub bookable: bool,
}

/// Inputs for an availability grid
pub struct AvailabilityQuery<'a> {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub today: NaiveDate,
    pub settings: &'a Settings,
    pub subjects: &'a [Subject],
    pub rules: &'a [ReservationRule],
    pub ledger: &'a CapacityLedger,
}

/// Validate a requested date range
pub fn check_range(from: NaiveDate, to: NaiveDate, today: NaiveDate) -> Result<(), BookingError> {
    for date in [from, to] {
        if (date - today).num_days().abs() > AVAILABILITY_HORIZON_DAYS {
            return Err(BookingError::InvalidRange(format!(
                "{date} is more than {AVAILABILITY_HORIZON_DAYS} days from today"
            )));
        }
    }
    if to < from {
        return Err(BookingError::InvalidRange(format!(
            "`to` ({to}) is before `from` ({from})"
        )));
    }
    if (to - from).num_days() >= MAX_AVAILABILITY_DAYS {
        return Err(BookingError::InvalidRange(format!(
            "range may span at most {MAX_AVAILABILITY_DAYS} days"
        )));
    }
    Ok(())
}

/// Per date × active subject × offered slot capacity grid.
///
/// Sorted by date, then subject name, then slot.
pub fn availability(q: &AvailabilityQuery<'_>) -> Result<Vec<AvailabilityCell>, BookingError> {
    check_range(q.from, q.to, q.today)?;
    let window = BookingWindow::from_settings(q.today, q.settings);

    let mut subjects: Vec<&Subject> = q.subjects.iter().filter(|s| s.active).collect();
    subjects.sort_by(|a, b| a.name.cmp(&b.name));

    let mut cells = Vec::new();
    for date in q.from.iter_days().take_while(|d| *d <= q.to) {
        let day_open = q.settings.booking_open
            && window.contains(date)
            && (q.settings.allow_weekends || !is_weekend(date));

        for subject in &subjects {
            for &slot in &Subject::normalized_slots(&subject.slots) {
                let cell = Cell::new(date, subject.id, slot);
                let used = q.ledger.used(&cell);
                let remaining = subject.total_classrooms.saturating_sub(used);
                let closed_reason = closed_by(q.rules, &cell).map(|r| r.title.clone());
                cells.push(AvailabilityCell {
                    date,
                    subject_id: subject.id,
                    slot,
                    capacity: subject.total_classrooms,
                    used,
                    remaining,
                    bookable: day_open && closed_reason.is_none() && remaining > 0,
                    closed_reason,
                });
            }
        }
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::subject_fixtures::subject;
    use crate::domain::rule::rule_fixtures::closed;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    #[test]
    fn test_range_checks() {
        let today = d(10, 19);
        assert!(check_range(d(11, 2), d(11, 1), today).is_err());
        assert!(check_range(d(11, 1), d(11, 1), today).is_ok());
        assert!(check_range(d(1, 1), d(4, 2), today).is_ok());
        assert!(check_range(d(1, 1), d(4, 4), today).is_err());
    }

    #[test]
    fn test_range_far_from_today_rejected() {
        let today = d(10, 19);
        assert!(check_range(NaiveDate::MAX, NaiveDate::MAX, today).is_err());
        assert!(check_range(NaiveDate::MIN, NaiveDate::MIN, today).is_err());
        let far = today + chrono::Duration::days(AVAILABILITY_HORIZON_DAYS + 1);
        assert!(check_range(far, far, today).is_err());
    }

    #[test]
    fn test_grid_stops_at_last_representable_date() {
        let s = subject("art", 1, &[Slot::Morning]);
        let settings = Settings::default();
        let ledger = CapacityLedger::default();
        let subjects = vec![s];
        let q = AvailabilityQuery {
            from: NaiveDate::MAX,
            to: NaiveDate::MAX,
            today: NaiveDate::MAX,
            settings: &settings,
            subjects: &subjects,
            rules: &[],
            ledger: &ledger,
        };
        let grid = availability(&q).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].date, NaiveDate::MAX);
    }

    #[test]
    fn test_grid_shape_and_flags() {
        let full = subject("astronomy", 1, &[Slot::Morning]);
        let open = subject("biology", 2, &[Slot::Afternoon, Slot::Morning]);
        let mut hidden = subject("zoology", 2, &[Slot::Morning]);
        hidden.active = false;

        let mut ledger = CapacityLedger::default();
        ledger.add(Cell::new(d(11, 2), full.id, Slot::Morning), 1);
        let rules = vec![closed(d(11, 3), d(11, 3), vec![open.id], vec![Slot::Afternoon])];
        let settings = Settings::default();
        let subjects = vec![open.clone(), hidden, full.clone()];

        // Mon 2 .. Tue 3 November, today well before the window opens
        let q = AvailabilityQuery {
            from: d(11, 2),
            to: d(11, 3),
            today: d(10, 19),
            settings: &settings,
            subjects: &subjects,
            rules: &rules,
            ledger: &ledger,
        };
        let grid = availability(&q).unwrap();

        // 2 days × (astronomy morning + biology morning + biology afternoon)
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0].subject_id, full.id);
        assert_eq!(grid[1].slot, Slot::Morning);
        assert_eq!(grid[2].slot, Slot::Afternoon);

        assert_eq!(grid[0].remaining, 0);
        assert!(!grid[0].bookable);
        assert!(grid[1].bookable);

        let closed_cell = &grid[5];
        assert_eq!(closed_cell.date, d(11, 3));
        assert_eq!(closed_cell.closed_reason.as_deref(), Some("Closed"));
        assert!(!closed_cell.bookable);
    }

    #[test]
    fn test_outside_window_not_bookable() {
        let s = subject("art", 2, &[Slot::Morning]);
        let settings = Settings::default();
        let ledger = CapacityLedger::default();
        let subjects = vec![s];
        let q = AvailabilityQuery {
            from: d(10, 20),
            to: d(10, 20),
            today: d(10, 19),
            settings: &settings,
            subjects: &subjects,
            rules: &[],
            ledger: &ledger,
        };
        let grid = availability(&q).unwrap();
        assert_eq!(grid.len(), 1);
        assert_eq!(grid[0].remaining, 2);
        assert!(!grid[0].bookable);
    }
}
