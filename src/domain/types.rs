use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

// ============================================================================
// Booking enums
// ============================================================================

/// Half-day block a subject can be taught in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
    Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Slot {
    Morning,
    Afternoon,
}

impl Slot {
    /// Human label used in notification text
    pub fn label(&self) -> &'static str {
        match self {
            Slot::Morning => "Morning (09:00-12:00)",
            Slot::Afternoon => "Afternoon (13:00-16:00)",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EducationLevel {
    Primary,
    LowerSecondary,
    UpperSecondary,
    Vocational,
    Other,
}

/// Reservation lifecycle.
///
/// ```text
/// pending ──► confirmed ──► completed
///    │            │
///    ├──► rejected └──► cancelled
///    └──► cancelled
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    Rejected,
}

impl ReservationStatus {
    /// Whether a reservation in this status holds classroom capacity
    pub fn is_occupying(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Rejected)
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }
}

// ============================================================================
// Access control
// ============================================================================

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    fn rank(&self) -> u8 {
        match self {
            Role::Admin => 2,
            Role::Staff => 1,
        }
    }

    /// Whether this role grants everything `required` grants
    pub fn satisfies(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use strum::IntoEnumIterator;

    #[rstest]
    #[case(ReservationStatus::Pending, ReservationStatus::Confirmed, true)]
    #[case(ReservationStatus::Pending, ReservationStatus::Rejected, true)]
    #[case(ReservationStatus::Pending, ReservationStatus::Cancelled, true)]
    #[case(ReservationStatus::Pending, ReservationStatus::Completed, false)]
    #[case(ReservationStatus::Confirmed, ReservationStatus::Completed, true)]
    #[case(ReservationStatus::Confirmed, ReservationStatus::Cancelled, true)]
    #[case(ReservationStatus::Confirmed, ReservationStatus::Pending, false)]
    #[case(ReservationStatus::Cancelled, ReservationStatus::Pending, false)]
    #[case(ReservationStatus::Rejected, ReservationStatus::Confirmed, false)]
    #[case(ReservationStatus::Completed, ReservationStatus::Cancelled, false)]
    fn test_status_transitions(
        #[case] from: ReservationStatus,
        #[case] to: ReservationStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_terminal_statuses_have_no_exit() {
        for from in ReservationStatus::iter().filter(|s| s.is_terminal()) {
            for to in ReservationStatus::iter() {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn test_only_live_statuses_occupy_capacity() {
        let occupying: Vec<_> = ReservationStatus::iter().filter(|s| s.is_occupying()).collect();
        assert_eq!(
            occupying,
            vec![ReservationStatus::Pending, ReservationStatus::Confirmed]
        );
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!(Slot::Morning.to_string(), "morning");
        assert_eq!("AFTERNOON".parse::<Slot>().unwrap(), Slot::Afternoon);
        assert_eq!(EducationLevel::UpperSecondary.to_string(), "upper_secondary");
        assert_eq!(
            serde_json::to_string(&ReservationStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Admin.satisfies(Role::Staff));
        assert!(Role::Admin.satisfies(Role::Admin));
        assert!(Role::Staff.satisfies(Role::Staff));
        assert!(!Role::Staff.satisfies(Role::Admin));
    }
}
