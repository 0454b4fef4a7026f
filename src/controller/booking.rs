use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::booking::{
    self, reservation_code, today_in, validate_request, AvailabilityCell, AvailabilityQuery,
    BookingContext, BookingError, CapacityLedger,
};
use crate::domain::{NewReservation, Reservation, ReservationStatus, Subject};
use crate::notify::{NotificationEvent, NotificationHub};
use crate::repo::Repositories;

/// Owns every operation that reads and then changes classroom usage.
///
/// Creation, status changes, deletion and subject removal run one at a time
/// so that a check and the write that depends on it cannot interleave with
/// another booking. The lock is process-local.
pub struct BookingController {
    repos: Arc<Repositories>,
    notifier: Arc<NotificationHub>,
    tz: Tz,
    lock: Mutex<()>,
}

impl BookingController {
    pub fn new(repos: Arc<Repositories>, notifier: Arc<NotificationHub>, tz: Tz) -> Self {
        Self {
            repos,
            notifier,
            tz,
            lock: Mutex::new(()),
        }
    }

    pub fn today(&self) -> NaiveDate {
        today_in(self.tz)
    }

    async fn subjects_by_id(&self) -> Result<HashMap<Uuid, Subject>, BookingError> {
        Ok(self
            .repos
            .subjects
            .list()
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect())
    }

    fn names_for(reservation: &Reservation, subjects: &HashMap<Uuid, Subject>) -> HashMap<Uuid, String> {
        reservation
            .sessions()
            .filter_map(|(_, s)| subjects.get(&s.subject_id).map(|sub| (sub.id, sub.name.clone())))
            .collect()
    }

    /// Validate and store a new booking as `pending`.
    ///
    /// Notifications go out in the background once the reservation is
    /// stored.
    pub async fn create_reservation(&self, req: NewReservation) -> Result<Reservation, BookingError> {
        let today = self.today();

        let (reservation, subjects) = {
            let _guard = self.lock.lock().await;

            let settings = self.repos.current_settings().await?;
            let subjects = self.subjects_by_id().await?;
            let rules = self.repos.rules.list().await?;
            let existing = self.repos.reservations.list().await?;

            let range = req
                .training_days
                .iter()
                .map(|d| d.date)
                .min()
                .zip(req.training_days.iter().map(|d| d.date).max());
            let ledger = CapacityLedger::from_reservations(&existing, range, None);

            let ctx = BookingContext {
                today,
                settings: &settings,
                subjects: &subjects,
                rules: &rules,
                ledger: &ledger,
            };
            validate_request(&req, &ctx).map_err(BookingError::Rejected)?;

            let taken: HashSet<&str> = existing.iter().map(|r| r.code.as_str()).collect();
            let code = {
                let mut rng = rand::thread_rng();
                loop {
                    let candidate = reservation_code(today, &mut rng);
                    if !taken.contains(candidate.as_str()) {
                        break candidate;
                    }
                }
            };

            let reservation = Reservation::new(code, req, Utc::now());
            self.repos.reservations.insert(&reservation).await?;
            (reservation, subjects)
        };

        info!(
            reservation_code = %reservation.code,
            school = %reservation.school.name,
            days = reservation.training_days.len(),
            "reservation created"
        );

        self.notifier.dispatch(NotificationEvent::ReservationCreated {
            subject_names: Self::names_for(&reservation, &subjects),
            reservation: reservation.clone(),
        });
        Ok(reservation)
    }

    /// Move a reservation along its lifecycle. Leaving an occupying status
    /// frees its classrooms for the next booking.
    pub async fn change_status(
        &self,
        id: Uuid,
        to: ReservationStatus,
        by: Option<Uuid>,
        reason: Option<String>,
    ) -> Result<Reservation, BookingError> {
        let (reservation, from, subjects) = {
            let _guard = self.lock.lock().await;
            let mut reservation = self.get(id).await?;
            let from = reservation.status;
            if !reservation.transition(to, by, reason, Utc::now()) {
                return Err(BookingError::InvalidTransition { from, to });
            }
            // Resolved before the write so a stored transition always returns Ok
            let subjects = self.subjects_by_id().await?;
            self.repos.reservations.update(&reservation).await?;
            (reservation, from, subjects)
        };

        info!(
            reservation_code = %reservation.code,
            from = %from,
            to = %to,
            user_id = ?by,
            "reservation status changed"
        );

        self.notifier.dispatch(NotificationEvent::StatusChanged {
            subject_names: Self::names_for(&reservation, &subjects),
            reservation: reservation.clone(),
            from,
        });
        Ok(reservation)
    }

    pub async fn set_admin_note(&self, id: Uuid, note: Option<String>) -> Result<Reservation, BookingError> {
        let _guard = self.lock.lock().await;
        let mut reservation = self.get(id).await?;
        reservation.admin_note = note.filter(|n| !n.trim().is_empty());
        reservation.updated_at = Utc::now();
        self.repos.reservations.update(&reservation).await?;
        Ok(reservation)
    }

    pub async fn delete(&self, id: Uuid) -> Result<Reservation, BookingError> {
        let _guard = self.lock.lock().await;
        let reservation = self.get(id).await?;
        self.repos.reservations.delete(id).await?;
        info!(reservation_code = %reservation.code, "reservation deleted");
        Ok(reservation)
    }

    /// Remove a subject no reservation refers to. Runs under the booking lock
    /// so a concurrent booking cannot reference it between check and delete.
    pub async fn delete_subject(&self, id: Uuid) -> Result<Subject, BookingError> {
        let _guard = self.lock.lock().await;
        let subject = self
            .repos
            .subjects
            .get(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("subject {id}")))?;
        let referenced = self
            .repos
            .reservations
            .list()
            .await?
            .iter()
            .any(|r| r.references_subject(id));
        if referenced {
            return Err(BookingError::InUse(
                "subject has reservations; deactivate it instead".into(),
            ));
        }
        self.repos.subjects.delete(id).await?;
        Ok(subject)
    }

    pub async fn get(&self, id: Uuid) -> Result<Reservation, BookingError> {
        self.repos
            .reservations
            .get(id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("reservation {id}")))
    }

    /// Public lookup; both the code and the contact e-mail must match
    pub async fn lookup(&self, code: &str, email: &str) -> Result<Reservation, BookingError> {
        self.repos
            .find_reservation_by_code(code)
            .await?
            .filter(|r| r.contact.email.trim().eq_ignore_ascii_case(email.trim()))
            .ok_or_else(|| BookingError::NotFound("reservation".into()))
    }

    /// Capacity grid for `[from, to]`, optionally for a single subject
    pub async fn availability(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        subject_id: Option<Uuid>,
    ) -> Result<Vec<AvailabilityCell>, BookingError> {
        booking::check_range(from, to, self.today())?;
        let settings = self.repos.current_settings().await?;
        let subjects: Vec<Subject> = self
            .repos
            .subjects
            .list()
            .await?
            .into_iter()
            .filter(|s| subject_id.map_or(true, |id| s.id == id))
            .collect();
        let rules = self.repos.rules.list().await?;
        let reservations = self.repos.reservations.list().await?;
        let ledger = CapacityLedger::from_reservations(&reservations, Some((from, to)), None);

        booking::availability(&AvailabilityQuery {
            from,
            to,
            today: self.today(),
            settings: &settings,
            subjects: &subjects,
            rules: &rules,
            ledger: &ledger,
        })
    }
}
