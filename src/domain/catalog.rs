//! Course catalog: categories, subcategories, lecturers and the subjects
//! schools can book.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Slot;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subcategory {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub position: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lecturer {
    pub id: Uuid,
    pub name: String,
    pub title: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A bookable course.
///
/// `total_classrooms` is the capacity of every (date, slot) cell the subject
/// is offered in, not a total across the day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subject {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub subcategory_id: Option<Uuid>,
    pub lecturer_ids: Vec<Uuid>,
    pub slots: Vec<Slot>,
    pub total_classrooms: u32,
    pub students_per_classroom: u32,
    pub image: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subject {
    pub fn offers(&self, slot: Slot) -> bool {
        self.slots.contains(&slot)
    }

    /// Slots in canonical order without duplicates
    pub fn normalized_slots(slots: &[Slot]) -> Vec<Slot> {
        let mut out = slots.to_vec();
        out.sort();
        out.dedup();
        out
    }
}

#[cfg(test)]
pub(crate) mod subject_fixtures {
    use super::*;

    pub fn subject(name: &str, total_classrooms: u32, slots: &[Slot]) -> Subject {
        let now = Utc::now();
        Subject {
            id: Uuid::new_v4(),
            code: name.to_uppercase(),
            name: name.to_string(),
            description: None,
            category_id: Uuid::new_v4(),
            subcategory_id: None,
            lecturer_ids: vec![],
            slots: slots.to_vec(),
            total_classrooms,
            students_per_classroom: 40,
            image: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
