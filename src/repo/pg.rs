#![cfg(feature = "db")]

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::{Collection, Record, RepoError, RepoResult, Repositories};
use crate::config::DbConfig;

const SCHEMA: &str = include_str!("../../migrations/0001_documents.sql");
const CONNECT_ATTEMPTS: usize = 5;

pub struct PgRepo {
    pub pool: PgPool,
}

impl PgRepo {
    pub async fn connect(cfg: &DbConfig) -> Result<Self> {
        info!("Initializing database connection pool");
        let pool = Self::connect_with_retry(cfg).await?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("Failed to apply document schema")?;

        info!("Database connection pool initialized successfully");
        Ok(Self { pool })
    }

    /// Connect with exponential backoff retry logic
    async fn connect_with_retry(cfg: &DbConfig) -> Result<PgPool> {
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            attempt += 1;
            let result = PgPoolOptions::new()
                .max_connections(cfg.max_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&cfg.url)
                .await;
            match result {
                Ok(pool) => return Ok(pool),
                Err(e) if attempt >= CONNECT_ATTEMPTS => {
                    return Err(e).context(format!(
                        "Failed to connect to database after {} attempts",
                        CONNECT_ATTEMPTS
                    ));
                }
                Err(e) => {
                    warn!(
                        "Database connection attempt {}/{} failed: {}. Retrying in {:?}",
                        attempt, CONNECT_ATTEMPTS, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    fn collection<T: Record>(&self) -> Arc<dyn Collection<T>> {
        Arc::new(PgCollection::<T>::new(self.pool.clone()))
    }

    pub fn repositories(&self) -> Repositories {
        Repositories {
            categories: self.collection(),
            subcategories: self.collection(),
            lecturers: self.collection(),
            subjects: self.collection(),
            rules: self.collection(),
            reservations: self.collection(),
            settings: self.collection(),
            slides: self.collection(),
            users: self.collection(),
            backend: "postgres",
        }
    }
}

/// A [`Collection`] backed by rows of the shared `documents` table
pub struct PgCollection<T> {
    pool: PgPool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PgCollection<T> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }
}

fn decode<T: Record>(body: serde_json::Value) -> RepoResult<T> {
    Ok(serde_json::from_value(body)?)
}

#[async_trait]
impl<T: Record> Collection<T> for PgCollection<T> {
    async fn list(&self) -> RepoResult<Vec<T>> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT body FROM documents
            WHERE collection = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(T::COLLECTION)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode).collect()
    }

    async fn get(&self, id: Uuid) -> RepoResult<Option<T>> {
        let row: Option<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(T::COLLECTION)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode).transpose()
    }

    async fn insert(&self, doc: &T) -> RepoResult<()> {
        let body = serde_json::to_value(doc)?;
        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(T::COLLECTION)
        .bind(doc.id())
        .bind(body)
        .bind(doc.created_at())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(RepoError::Duplicate {
                    collection: T::COLLECTION,
                    id: doc.id(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, doc: &T) -> RepoResult<()> {
        let body = serde_json::to_value(doc)?;
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET body = $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(T::COLLECTION)
        .bind(doc.id())
        .bind(body)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound {
                collection: T::COLLECTION,
                id: doc.id(),
            });
        }
        Ok(())
    }

    async fn put(&self, doc: &T) -> RepoResult<()> {
        let body = serde_json::to_value(doc)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (collection, id) DO UPDATE
            SET body = EXCLUDED.body, updated_at = NOW()
            "#,
        )
        .bind(T::COLLECTION)
        .bind(doc.id())
        .bind(body)
        .bind(doc.created_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(T::COLLECTION)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> RepoResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
