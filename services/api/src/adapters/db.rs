//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `FormStore` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pawforms_core::domain::{FormId, FormMeta, ShareId, SharedFormRecord, StoredFormRecord};
use pawforms_core::ports::{FormStore, StoreError, StoreResult};
use sqlx::{FromRow, SqlitePool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `FormStore` port.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a new `SqliteStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> StoreError {
    StoreError::Unexpected(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct FormRow {
    id: String,
    modification_key: String,
    encrypted: bool,
    password_hash: Option<String>,
    name: String,
    data: String,
    cloned_from: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FormRow {
    fn to_domain(self) -> StoreResult<StoredFormRecord> {
        Ok(StoredFormRecord {
            id: parse_id(&self.id)?,
            modification_key: parse_id(&self.modification_key)?,
            encrypted: self.encrypted,
            password_hash: self.password_hash,
            name: self.name,
            data: self.data,
            cloned_from: self.cloned_from.as_deref().map(parse_id).transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ShareRow {
    share_id: String,
    form_id: String,
    password_hash: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    view_count: i64,
    created_at: DateTime<Utc>,
}

impl ShareRow {
    fn to_domain(self) -> StoreResult<SharedFormRecord> {
        Ok(SharedFormRecord {
            share_id: parse_id(&self.share_id)?,
            form_id: parse_id(&self.form_id)?,
            password_hash: self.password_hash,
            expires_at: self.expires_at,
            view_count: self.view_count,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct MetaRow {
    id: String,
    name: String,
    date: DateTime<Utc>,
}

impl MetaRow {
    fn to_domain(self) -> StoreResult<FormMeta> {
        Ok(FormMeta {
            id: parse_id(&self.id)?,
            name: self.name,
            date: self.date,
        })
    }
}

/// A stored identifier that fails to parse means the row was corrupted
/// outside this application, so it surfaces as an unexpected error rather
/// than a not-found.
fn parse_id<T: std::str::FromStr<Err = pawforms_core::domain::IdParseError>>(
    s: &str,
) -> StoreResult<T> {
    s.parse().map_err(|e: pawforms_core::domain::IdParseError| {
        StoreError::Unexpected(e.to_string())
    })
}

//=========================================================================================
// `FormStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl FormStore for SqliteStore {
    async fn insert_form(&self, record: &StoredFormRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let insert = sqlx::query(
            "INSERT INTO forms (id, modification_key, encrypted, password_hash, name, data, cloned_from, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.modification_key.to_string())
        .bind(record.encrypted)
        .bind(&record.password_hash)
        .bind(&record.name)
        .bind(&record.data)
        .bind(record.cloned_from.map(|id| id.to_string()))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            if is_unique_violation(&e) {
                return Err(StoreError::Duplicate(record.id.to_string()));
            }
            return Err(unexpected(e));
        }

        sqlx::query("INSERT INTO form_meta (id, name, date) VALUES (?, ?, ?)")
            .bind(record.id.to_string())
            .bind(&record.name)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)
    }

    async fn get_form(&self, id: FormId) -> StoreResult<StoredFormRecord> {
        let row = sqlx::query_as::<_, FormRow>(
            "SELECT id, modification_key, encrypted, password_hash, name, data, cloned_from, created_at, updated_at
             FROM forms WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| StoreError::NotFound(format!("Form {} not found", id)))?;

        row.to_domain()
    }

    async fn delete_form(&self, id: FormId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        let id = id.to_string();

        sqlx::query("DELETE FROM shared_forms WHERE form_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("DELETE FROM form_meta WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        sqlx::query("DELETE FROM forms WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)
    }

    async fn recent_forms(&self, limit: i64) -> StoreResult<Vec<FormMeta>> {
        let rows = sqlx::query_as::<_, MetaRow>(
            "SELECT id, name, date FROM form_meta ORDER BY date DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter().map(MetaRow::to_domain).collect()
    }

    async fn clear_all(&self) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for table in ["shared_forms", "form_meta", "forms"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)
    }

    async fn insert_share(&self, record: &SharedFormRecord) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO shared_forms (share_id, form_id, password_hash, expires_at, view_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(record.share_id.to_string())
        .bind(record.form_id.to_string())
        .bind(&record.password_hash)
        .bind(record.expires_at)
        .bind(record.view_count)
        .bind(record.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(StoreError::Duplicate(record.share_id.to_string()))
            }
            Err(e) => Err(unexpected(e)),
        }
    }

    async fn get_share(&self, share_id: ShareId) -> StoreResult<SharedFormRecord> {
        let row = sqlx::query_as::<_, ShareRow>(
            "SELECT share_id, form_id, password_hash, expires_at, view_count, created_at
             FROM shared_forms WHERE share_id = ?",
        )
        .bind(share_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| StoreError::NotFound(format!("Share {} not found", share_id)))?;

        row.to_domain()
    }

    async fn shares_for_form(&self, form_id: FormId) -> StoreResult<Vec<SharedFormRecord>> {
        let rows = sqlx::query_as::<_, ShareRow>(
            "SELECT share_id, form_id, password_hash, expires_at, view_count, created_at
             FROM shared_forms WHERE form_id = ? ORDER BY created_at DESC",
        )
        .bind(form_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        rows.into_iter().map(ShareRow::to_domain).collect()
    }

    async fn increment_view_count(&self, share_id: ShareId) -> StoreResult<i64> {
        // The increment happens in SQL so concurrent viewers never lose updates.
        sqlx::query_scalar::<_, i64>(
            "UPDATE shared_forms SET view_count = view_count + 1 WHERE share_id = ? RETURNING view_count",
        )
        .bind(share_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| StoreError::NotFound(format!("Share {} not found", share_id)))
    }
}
