use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Slot;

/// Date range during which bookings are closed.
///
/// Empty `subject_ids` closes every subject; empty `slots` closes every slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReservationRule {
    pub id: Uuid,
    pub title: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub subject_ids: Vec<Uuid>,
    pub slots: Vec<Slot>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationRule {
    pub fn covers(&self, date: NaiveDate, subject_id: Uuid, slot: Slot) -> bool {
        self.active
            && date >= self.start_date
            && date <= self.end_date
            && (self.subject_ids.is_empty() || self.subject_ids.contains(&subject_id))
            && (self.slots.is_empty() || self.slots.contains(&slot))
    }
}

#[cfg(test)]
pub(crate) mod rule_fixtures {
    use super::*;

    pub fn closed(
        start: NaiveDate,
        end: NaiveDate,
        subject_ids: Vec<Uuid>,
        slots: Vec<Slot>,
    ) -> ReservationRule {
        let now = Utc::now();
        ReservationRule {
            id: Uuid::new_v4(),
            title: "Closed".into(),
            start_date: start,
            end_date: end,
            subject_ids,
            slots,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
