//! Persistence of the single admin credential.
//!
//! Flow Overview:
//! 1) `count` tells the login page whether setup mode is still open.
//! 2) `find_one` loads the credential for PIN verification.
//! 3) `create_if_absent` inserts the first credential atomically; a second
//!    insert reports `Conflict` instead of creating another row.

use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row};
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use super::error::StoreError;

pub const ADMIN_ROLE: &str = "admin";

/// The persisted admin credential.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminCredential {
    pub id: Uuid,
    pub pin_hash: String,
    pub role: String,
    pub created_at_unix: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(AdminCredential),
    /// Another credential already exists; nothing was written.
    Conflict,
}

/// Storage surface consumed by the login endpoint.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_one(&self) -> Result<Option<AdminCredential>, StoreError>;

    /// Insert the admin credential unless one already exists, atomically.
    async fn create_if_absent(&self, pin_hash: &str) -> Result<CreateOutcome, StoreError>;

    async fn count(&self) -> Result<i64, StoreError>;

    /// Liveness probe used by `/health`.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// PostgreSQL store. The `singleton` unique column caps the table at one row.
#[derive(Clone, Debug)]
pub struct PgCredentialStore {
    pool: PgPool,
}

pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the idempotent schema.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be applied.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "CREATE",
            db.statement = "sql/schema.sql"
        );
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}

fn credential_from_row(row: &sqlx::postgres::PgRow) -> AdminCredential {
    AdminCredential {
        id: row.get("id"),
        pin_hash: row.get("pin_hash"),
        role: row.get("role"),
        created_at_unix: row.get("created_at_unix"),
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_one(&self) -> Result<Option<AdminCredential>, StoreError> {
        let query = r"
            SELECT id, pin_hash, role, EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
            FROM admin_credentials
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.as_ref().map(credential_from_row))
    }

    async fn create_if_absent(&self, pin_hash: &str) -> Result<CreateOutcome, StoreError> {
        let query = r"
            INSERT INTO admin_credentials (id, pin_hash, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (singleton) DO NOTHING
            RETURNING id, pin_hash, role, EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(pin_hash)
            .bind(ADMIN_ROLE)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row
            .as_ref()
            .map_or(CreateOutcome::Conflict, |row| {
                CreateOutcome::Created(credential_from_row(row))
            }))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        let query = "SELECT COUNT(*) AS count FROM admin_credentials";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.get("count"))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span =
            tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}

/// In-process store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<AdminCredential>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_one(&self) -> Result<Option<AdminCredential>, StoreError> {
        Ok(self.credential.lock().await.clone())
    }

    async fn create_if_absent(&self, pin_hash: &str) -> Result<CreateOutcome, StoreError> {
        let mut slot = self.credential.lock().await;
        if slot.is_some() {
            return Ok(CreateOutcome::Conflict);
        }
        let credential = AdminCredential {
            id: Uuid::new_v4(),
            pin_hash: pin_hash.to_string(),
            role: ADMIN_ROLE.to_string(),
            created_at_unix: unix_now(),
        };
        *slot = Some(credential.clone());
        Ok(CreateOutcome::Created(credential))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(i64::from(self.credential.lock().await.is_some()))
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
}
