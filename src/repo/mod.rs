//! Document storage.
//!
//! Every entity is stored whole as a JSON document keyed by its id, in one
//! [`Collection`] per entity type. The in-memory backend is the default;
//! Postgres is available behind the `db` feature.

use crate::config::Config;
use crate::domain::{
    Category, Lecturer, Reservation, ReservationRule, Settings, Slide, Subcategory, Subject, User,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
#[cfg(feature = "db")]
pub mod pg;

pub use memory::MemoryCollection;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{collection} document {id} not found")]
    NotFound { collection: &'static str, id: Uuid },

    #[error("{collection} document {id} already exists")]
    Duplicate { collection: &'static str, id: Uuid },

    #[error("document serialization failed: {0}")]
    Serde(#[from] serde_json::Error),

    #[cfg(feature = "db")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// An entity that can be stored in a [`Collection`]
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    fn id(&self) -> Uuid;
    fn created_at(&self) -> DateTime<Utc>;
}

macro_rules! record {
    ($ty:ty, $name:literal) => {
        impl Record for $ty {
            const COLLECTION: &'static str = $name;
            fn id(&self) -> Uuid {
                self.id
            }
            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
        }
    };
}

record!(Category, "categories");
record!(Subcategory, "subcategories");
record!(Lecturer, "lecturers");
record!(Subject, "subjects");
record!(ReservationRule, "reservation_rules");
record!(Reservation, "reservations");
record!(Slide, "slides");
record!(User, "users");

impl Record for Settings {
    const COLLECTION: &'static str = "settings";
    fn id(&self) -> Uuid {
        Settings::ID
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[async_trait]
pub trait Collection<T: Record>: Send + Sync {
    /// All documents, oldest first
    async fn list(&self) -> RepoResult<Vec<T>>;
    async fn get(&self, id: Uuid) -> RepoResult<Option<T>>;
    /// Fails with [`RepoError::Duplicate`] if the id is taken
    async fn insert(&self, doc: &T) -> RepoResult<()>;
    /// Fails with [`RepoError::NotFound`] if the id is unknown
    async fn update(&self, doc: &T) -> RepoResult<()>;
    /// Insert or replace
    async fn put(&self, doc: &T) -> RepoResult<()>;
    /// Returns whether a document was removed
    async fn delete(&self, id: Uuid) -> RepoResult<bool>;
    async fn ping(&self) -> RepoResult<()> {
        Ok(())
    }
}

pub struct Repositories {
    pub categories: Arc<dyn Collection<Category>>,
    pub subcategories: Arc<dyn Collection<Subcategory>>,
    pub lecturers: Arc<dyn Collection<Lecturer>>,
    pub subjects: Arc<dyn Collection<Subject>>,
    pub rules: Arc<dyn Collection<ReservationRule>>,
    pub reservations: Arc<dyn Collection<Reservation>>,
    pub settings: Arc<dyn Collection<Settings>>,
    pub slides: Arc<dyn Collection<Slide>>,
    pub users: Arc<dyn Collection<User>>,
    pub backend: &'static str,
}

impl Repositories {
    pub async fn new(cfg: &Config) -> Result<Self> {
        #[cfg(feature = "db")]
        {
            if !cfg.db.url.is_empty() {
                let db = pg::PgRepo::connect(&cfg.db).await?;
                return Ok(db.repositories());
            }
        }

        #[cfg(not(feature = "db"))]
        {
            if !cfg.db.url.is_empty() {
                tracing::warn!("db.url is set but the `db` feature is disabled, using in-memory storage");
            }
        }

        Ok(Self::in_memory())
    }

    pub fn in_memory() -> Self {
        Self {
            categories: Arc::new(MemoryCollection::new()),
            subcategories: Arc::new(MemoryCollection::new()),
            lecturers: Arc::new(MemoryCollection::new()),
            subjects: Arc::new(MemoryCollection::new()),
            rules: Arc::new(MemoryCollection::new()),
            reservations: Arc::new(MemoryCollection::new()),
            settings: Arc::new(MemoryCollection::new()),
            slides: Arc::new(MemoryCollection::new()),
            users: Arc::new(MemoryCollection::new()),
            backend: "memory",
        }
    }

    /// Stored settings, or defaults when none were saved yet
    pub async fn current_settings(&self) -> RepoResult<Settings> {
        Ok(self.settings.get(Settings::ID).await?.unwrap_or_default())
    }

    pub async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let email = User::normalize_email(email);
        Ok(self.users.list().await?.into_iter().find(|u| u.email == email))
    }

    pub async fn find_reservation_by_code(&self, code: &str) -> RepoResult<Option<Reservation>> {
        let code = code.trim();
        Ok(self
            .reservations
            .list()
            .await?
            .into_iter()
            .find(|r| r.code.eq_ignore_ascii_case(code)))
    }

    pub async fn ping(&self) -> RepoResult<()> {
        self.settings.ping().await
    }
}
