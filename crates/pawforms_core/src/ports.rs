//! crates/pawforms_core/src/ports.rs
//!
//! Defines the storage contract (trait) for the application's core logic.
//! This trait forms the boundary of the hexagonal architecture, allowing the
//! publish and share state machines to be independent of the relational
//! engine behind them.

use async_trait::async_trait;

use crate::domain::{FormId, FormMeta, ShareId, SharedFormRecord, StoredFormRecord};

//=========================================================================================
// Generic Store Error and Result Types
//=========================================================================================

/// A generic error type for all storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A unique-key constraint rejected an insert. This is the authoritative
    /// write-once guard for publishing.
    #[error("Duplicate key: {0}")]
    Duplicate(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

//=========================================================================================
// Storage Port (Trait)
//=========================================================================================

#[async_trait]
pub trait FormStore: Send + Sync {
    // --- Forms ---

    /// Inserts a new form record together with its meta projection, in one
    /// transaction: both rows or neither. Fails with [`StoreError::Duplicate`]
    /// when a record for the id already exists.
    async fn insert_form(&self, record: &StoredFormRecord) -> StoreResult<()>;

    async fn get_form(&self, id: FormId) -> StoreResult<StoredFormRecord>;

    /// Removes the form row, its meta projection, and every share pointing
    /// at it. Succeeds even when the id is already absent.
    async fn delete_form(&self, id: FormId) -> StoreResult<()>;

    /// The most recently published forms, newest first.
    async fn recent_forms(&self, limit: i64) -> StoreResult<Vec<FormMeta>>;

    /// Removes every form, meta row, and share.
    async fn clear_all(&self) -> StoreResult<()>;

    // --- Shares ---

    async fn insert_share(&self, record: &SharedFormRecord) -> StoreResult<()>;

    async fn get_share(&self, share_id: ShareId) -> StoreResult<SharedFormRecord>;

    async fn shares_for_form(&self, form_id: FormId) -> StoreResult<Vec<SharedFormRecord>>;

    /// Increments the view counter at the storage layer (`count = count + 1`,
    /// never read-modify-write) and returns the post-increment value.
    async fn increment_view_count(&self, share_id: ShareId) -> StoreResult<i64>;
}
