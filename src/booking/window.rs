use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

use crate::domain::Settings;

/// Current calendar date in the booking timezone
pub fn today_in(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Inclusive range of dates a new booking may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingWindow {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

impl BookingWindow {
    pub fn from_settings(today: NaiveDate, settings: &Settings) -> Self {
        Self {
            earliest: add_days(today, settings.min_lead_days),
            latest: add_days(today, settings.max_lead_days),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.earliest && date <= self.latest
    }
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}
