use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{Reservation, Slot, Subject};

/// One bookable unit of capacity: a subject taught in a slot on a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Cell {
    pub date: NaiveDate,
    pub subject_id: Uuid,
    pub slot: Slot,
}

impl Cell {
    pub fn new(date: NaiveDate, subject_id: Uuid, slot: Slot) -> Self {
        Self { date, subject_id, slot }
    }
}

/// Classrooms already held per cell by occupying reservations.
#[derive(Debug, Clone, Default)]
pub struct CapacityLedger {
    used: HashMap<Cell, u32>,
}

impl CapacityLedger {
    /// Aggregate usage from `reservations`.
    ///
    /// Only pending and confirmed reservations count. Sessions outside
    /// `range` are skipped, as is the reservation with id `exclude`.
    pub fn from_reservations<'a, I>(
        reservations: I,
        range: Option<(NaiveDate, NaiveDate)>,
        exclude: Option<Uuid>,
    ) -> Self
    where
        I: IntoIterator<Item = &'a Reservation>,
    {
        let mut ledger = Self::default();
        for r in reservations {
            if !r.status.is_occupying() || Some(r.id) == exclude {
                continue;
            }
            for (date, session) in r.sessions() {
                if let Some((from, to)) = range {
                    if date < from || date > to {
                        continue;
                    }
                }
                ledger.add(Cell::new(date, session.subject_id, session.slot), session.classrooms);
            }
        }
        ledger
    }

    pub fn add(&mut self, cell: Cell, classrooms: u32) {
        let entry = self.used.entry(cell).or_insert(0);
        *entry = entry.saturating_add(classrooms);
    }

    pub fn used(&self, cell: &Cell) -> u32 {
        self.used.get(cell).copied().unwrap_or(0)
    }

    /// Classrooms still free for `subject` in `slot` on `date`
    pub fn remaining(&self, subject: &Subject, date: NaiveDate, slot: Slot) -> u32 {
        subject
            .total_classrooms
            .saturating_sub(self.used(&Cell::new(date, subject.id, slot)))
    }

    pub fn cells(&self) -> impl Iterator<Item = (&Cell, &u32)> {
        self.used.iter()
    }
}
