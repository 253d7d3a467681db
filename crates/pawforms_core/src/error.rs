//! crates/pawforms_core/src/error.rs
//!
//! The error taxonomy for publish and share operations. The transport layer
//! owns the status-code mapping; this crate only produces the typed outcome.

use crate::domain::FormId;
use crate::ports::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// Missing or malformed input. Rejected before any write happens.
    #[error("{0}")]
    Validation(String),

    /// Publishing is create-only: a second save to the same id is rejected,
    /// never merged or overwritten.
    #[error("Form '{0}' has already been published; published forms are immutable")]
    AlreadyPublished(FormId),

    #[error("{0}")]
    NotFound(String),

    /// Distinct from NotFound so the client can render a specific message.
    #[error("Shared form has expired")]
    Expired,

    #[error("Invalid password")]
    Unauthorized,

    /// Password verification was attempted on a plaintext form.
    #[error("Form is not password protected")]
    NotEncrypted,

    /// Storage-level failure, surfaced as a generic server error without
    /// leaking internals to the client.
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl From<StoreError> for FormError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => FormError::NotFound(what),
            StoreError::Duplicate(what) => {
                FormError::Unexpected(format!("Duplicate key: {}", what))
            }
            StoreError::Unexpected(what) => FormError::Unexpected(what),
        }
    }
}

pub type FormResult<T> = Result<T, FormError>;
