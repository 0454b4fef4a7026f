use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Site-wide booking settings, stored as a single document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[validate(schema(function = "validate_lead_window"))]
pub struct Settings {
    pub booking_open: bool,
    #[validate(range(max = 365))]
    pub min_lead_days: u32,
    #[validate(range(min = 1, max = 730))]
    pub max_lead_days: u32,
    #[validate(range(min = 1, max = 31))]
    pub max_training_days: u32,
    #[validate(range(min = 1, max = 20))]
    pub max_sessions_per_day: u32,
    pub allow_weekends: bool,
    #[validate(length(max = 2000))]
    pub announcement: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 30))]
    pub contact_phone: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    /// Fixed id of the singleton document
    pub const ID: Uuid = Uuid::nil();
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            booking_open: true,
            min_lead_days: 7,
            max_lead_days: 180,
            max_training_days: 5,
            max_sessions_per_day: 4,
            allow_weekends: false,
            announcement: None,
            contact_email: None,
            contact_phone: None,
            updated_at: Utc::now(),
        }
    }
}

fn validate_lead_window(s: &Settings) -> Result<(), ValidationError> {
    if s.min_lead_days > s.max_lead_days {
        return Err(ValidationError::new("min_lead_days_exceeds_max_lead_days"));
    }
    Ok(())
}
