//! Capacity accounting for subject bookings.
//!
//! Each subject offers `total_classrooms` per (date, slot) cell. Pending and
//! confirmed reservations hold capacity; closed rules block cells outright.

pub mod availability;
pub mod code;
pub mod ledger;
pub mod validate;
pub mod window;

use thiserror::Error;

use crate::domain::ReservationStatus;
use crate::repo::RepoError;

pub use availability::{
    availability, check_range, AvailabilityCell, AvailabilityQuery, AVAILABILITY_HORIZON_DAYS,
    MAX_AVAILABILITY_DAYS,
};
pub use code::reservation_code;
pub use ledger::{CapacityLedger, Cell};
pub use validate::{closed_by, validate_request, BookingContext, BookingViolation};
pub use window::{is_weekend, today_in, BookingWindow};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("booking request rejected ({} problem(s))", .0.len())]
    Rejected(Vec<BookingViolation>),

    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    #[error("{0}")]
    InUse(String),

    #[error(transparent)]
    Repo(#[from] RepoError),
}
