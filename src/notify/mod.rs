//! Notification fan-out for reservation events.
//!
//! Every enabled [`Notifier`] receives each event concurrently. A failing or
//! slow notifier is logged and never affects the request that produced the
//! event or the other notifiers.

pub mod email;
pub mod line;
pub mod message;
pub mod sheets;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::NotifyConfig;
use crate::domain::{Reservation, ReservationStatus};

pub use email::EmailNotifier;
pub use line::LineNotifier;
pub use sheets::{SheetsNotifier, StaticToken, TokenSource};

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    ReservationCreated {
        reservation: Reservation,
        subject_names: HashMap<Uuid, String>,
    },
    StatusChanged {
        reservation: Reservation,
        from: ReservationStatus,
        subject_names: HashMap<Uuid, String>,
    },
}

impl NotificationEvent {
    pub fn reservation(&self) -> &Reservation {
        match self {
            Self::ReservationCreated { reservation, .. } => reservation,
            Self::StatusChanged { reservation, .. } => reservation,
        }
    }

    pub fn subject_name(&self, id: Uuid) -> &str {
        let names = match self {
            Self::ReservationCreated { subject_names, .. } => subject_names,
            Self::StatusChanged { subject_names, .. } => subject_names,
        };
        names.get(&id).map(String::as_str).unwrap_or("(unknown subject)")
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReservationCreated { .. } => "reservation_created",
            Self::StatusChanged { .. } => "status_changed",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;
}

/// Outcome of one fan-out
#[derive(Debug, Default, PartialEq)]
pub struct DeliveryReport {
    pub delivered: Vec<&'static str>,
    pub failed: Vec<(&'static str, String)>,
}

pub struct NotificationHub {
    notifiers: Vec<Arc<dyn Notifier>>,
    timeout: Duration,
}

impl NotificationHub {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>, timeout: Duration) -> Self {
        Self { notifiers, timeout }
    }

    /// A hub that delivers nowhere
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Duration::from_secs(1))
    }

    pub fn from_config(cfg: &NotifyConfig) -> Result<Self> {
        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
        if cfg.line.enabled {
            notifiers.push(Arc::new(LineNotifier::new(&cfg.line)?));
        }
        if cfg.email.enabled {
            notifiers.push(Arc::new(EmailNotifier::new(&cfg.email)?));
        }
        if cfg.sheets.enabled {
            notifiers.push(Arc::new(SheetsNotifier::from_config(&cfg.sheets)?));
        }
        let names: Vec<_> = notifiers.iter().map(|n| n.name()).collect();
        info!(notifiers = ?names, "notification channels configured");
        Ok(Self::new(notifiers, Duration::from_secs(cfg.timeout_secs.max(1))))
    }

    pub fn channels(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    /// Deliver `event` to every notifier and wait for all of them
    pub async fn notify_all(&self, event: &NotificationEvent) -> DeliveryReport {
        let code = event.reservation().code.clone();
        let deliveries = self.notifiers.iter().map(|n| {
            let n = n.clone();
            async move {
                let outcome = match tokio::time::timeout(self.timeout, n.notify(event)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(format!("{e:#}")),
                    Err(_) => Err(format!("timed out after {:?}", self.timeout)),
                };
                (n.name(), outcome)
            }
        });

        let mut report = DeliveryReport::default();
        for (name, outcome) in join_all(deliveries).await {
            match outcome {
                Ok(()) => {
                    info!(notifier = name, event = event.kind(), reservation_code = %code, "notification delivered");
                    report.delivered.push(name);
                }
                Err(error) => {
                    warn!(notifier = name, event = event.kind(), reservation_code = %code, %error, "notification failed");
                    report.failed.push((name, error));
                }
            }
        }
        report
    }

    /// Fan out in the background
    pub fn dispatch(self: &Arc<Self>, event: NotificationEvent) {
        if self.notifiers.is_empty() {
            return;
        }
        let hub = self.clone();
        tokio::spawn(async move {
            hub.notify_all(&event).await;
        });
    }
}
