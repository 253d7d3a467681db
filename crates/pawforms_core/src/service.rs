//! crates/pawforms_core/src/service.rs
//!
//! The publish state machine and share-link lifecycle, expressed against the
//! `FormStore` port.
//!
//! A form moves Draft -> Published -> Deleted. Drafts exist only on the
//! client; publishing creates the one and only persisted record for an id,
//! and there is no update path afterwards. Share links are secondary,
//! independently-gated pointers at a published form.
//!
//! Time-sensitive operations come in pairs: the public method uses the wall
//! clock, and an `_at` variant takes an explicit `now` so tests can simulate
//! the clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::crypto::verify_password;
use crate::domain::{
    ClonedFormDraft, FormId, FormMeta, ModificationKey, ShareId, SharedFormRecord,
    StoredFormRecord,
};
use crate::error::{FormError, FormResult};
use crate::ports::{FormStore, StoreError};

/// How many forms the recent listing returns.
pub const RECENT_FORMS_LIMIT: i64 = 20;

//=========================================================================================
// Operation Inputs and Outputs
//=========================================================================================

/// Input to `publish`. The service never encrypts anything itself: when the
/// caller encrypted `data` client-side it sets `encrypted` and supplies the
/// gate hash, and the service only records them.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub name: String,
    pub data: serde_json::Value,
    pub encrypted: bool,
    pub password_hash: Option<String>,
}

/// Returned once, at publish time. The modification key is the caller's only
/// credential for deleting the form later.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishReceipt {
    pub id: FormId,
    pub modification_key: ModificationKey,
}

/// The outcome of passing the form-level password gate. `data` stays opaque:
/// decryption happens client-side with the same password.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedForm {
    pub name: String,
    pub data: String,
}

/// A successful pass through a share link's gates.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareAccess {
    pub form: StoredFormRecord,
    /// Reflects the post-increment view count.
    pub share: SharedFormRecord,
}

//=========================================================================================
// The Service
//=========================================================================================

#[derive(Clone)]
pub struct FormService {
    store: Arc<dyn FormStore>,
}

impl FormService {
    pub fn new(store: Arc<dyn FormStore>) -> Self {
        Self { store }
    }

    // --- Publish State Machine ---

    /// Publishes a draft as the immutable record for `id`.
    ///
    /// Create-only: a second publish to the same id fails with
    /// `AlreadyPublished` and leaves the stored record untouched. The
    /// existence pre-check is an optimization; the storage unique key is the
    /// authoritative guard against racing publishers.
    pub async fn publish(&self, id: FormId, request: PublishRequest) -> FormResult<PublishReceipt> {
        if request.name.trim().is_empty() {
            return Err(FormError::Validation("Name and data are required".to_string()));
        }
        if request.data.is_null() {
            return Err(FormError::Validation("Name and data are required".to_string()));
        }
        match (request.encrypted, &request.password_hash) {
            (true, None) => {
                return Err(FormError::Validation(
                    "Encrypted forms require a password hash".to_string(),
                ))
            }
            (false, Some(_)) => {
                return Err(FormError::Validation(
                    "Only encrypted forms carry a password hash".to_string(),
                ))
            }
            _ => {}
        }

        match self.store.get_form(id).await {
            Ok(_) => return Err(FormError::AlreadyPublished(id)),
            Err(StoreError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let now = Utc::now();
        let record = StoredFormRecord {
            id,
            modification_key: ModificationKey::generate(),
            encrypted: request.encrypted,
            password_hash: request.password_hash,
            name: request.name,
            data: serde_json::to_string(&request.data)
                .map_err(|e| FormError::Unexpected(e.to_string()))?,
            cloned_from: None,
            created_at: now,
            updated_at: now,
        };

        match self.store.insert_form(&record).await {
            Ok(()) => Ok(PublishReceipt {
                id,
                modification_key: record.modification_key,
            }),
            Err(StoreError::Duplicate(_)) => Err(FormError::AlreadyPublished(id)),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get(&self, id: FormId) -> FormResult<StoredFormRecord> {
        self.store.get_form(id).await.map_err(not_found_form)
    }

    pub async fn recent(&self) -> FormResult<Vec<FormMeta>> {
        Ok(self.store.recent_forms(RECENT_FORMS_LIMIT).await?)
    }

    /// Deletes a form and cascades to every share pointing at it.
    ///
    /// Idempotent for absent ids. When the record exists, the caller must
    /// present the modification key handed out at publish time.
    pub async fn delete(
        &self,
        id: FormId,
        modification_key: Option<ModificationKey>,
    ) -> FormResult<()> {
        let record = match self.store.get_form(id).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        if modification_key != Some(record.modification_key) {
            return Err(FormError::Unauthorized);
        }
        Ok(self.store.delete_form(id).await?)
    }

    /// Removes every stored form and share.
    pub async fn purge_all(&self) -> FormResult<()> {
        Ok(self.store.clear_all().await?)
    }

    /// Checks a password against the form-level gate and, on success,
    /// returns the still-opaque data blob. This gates access only; the
    /// caller decrypts client-side with the same password.
    pub async fn verify_access(&self, id: FormId, password: &str) -> FormResult<VerifiedForm> {
        if password.is_empty() {
            return Err(FormError::Validation("Password is required".to_string()));
        }
        let record = self.store.get_form(id).await.map_err(not_found_form)?;

        let Some(password_hash) = record.password_hash.as_deref().filter(|_| record.encrypted)
        else {
            return Err(FormError::NotEncrypted);
        };
        if !verify_password(password, password_hash) {
            return Err(FormError::Unauthorized);
        }
        Ok(VerifiedForm {
            name: record.name,
            data: record.data,
        })
    }

    // --- Share-Link Lifecycle ---

    /// Mints a new share link for a published form, optionally gated by an
    /// independent password and a relative expiry in days.
    pub async fn create_share(
        &self,
        form_id: FormId,
        password: Option<&str>,
        expires_in_days: Option<i64>,
    ) -> FormResult<SharedFormRecord> {
        self.create_share_at(form_id, password, expires_in_days, Utc::now())
            .await
    }

    pub async fn create_share_at(
        &self,
        form_id: FormId,
        password: Option<&str>,
        expires_in_days: Option<i64>,
        now: DateTime<Utc>,
    ) -> FormResult<SharedFormRecord> {
        self.store.get_form(form_id).await.map_err(not_found_form)?;

        let password_hash = password
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(crate::crypto::hash_password);
        // Callers hand us an arbitrary i64; an expiry past the representable
        // date range is a validation failure, not an overflow.
        let expires_at = expires_in_days
            .filter(|&days| days > 0)
            .map(|days| {
                Duration::try_days(days)
                    .and_then(|delta| now.checked_add_signed(delta))
                    .ok_or_else(|| {
                        FormError::Validation("expires_in_days is out of range".to_string())
                    })
            })
            .transpose()?;

        let record = SharedFormRecord {
            share_id: ShareId::generate(),
            form_id,
            password_hash,
            expires_at,
            view_count: 0,
            created_at: now,
        };
        self.store.insert_share(&record).await?;
        Ok(record)
    }

    pub async fn resolve_share(&self, share_id: ShareId) -> FormResult<SharedFormRecord> {
        self.store.get_share(share_id).await.map_err(not_found_share)
    }

    pub async fn shares_for_form(&self, form_id: FormId) -> FormResult<Vec<SharedFormRecord>> {
        self.store.get_form(form_id).await.map_err(not_found_form)?;
        Ok(self.store.shares_for_form(form_id).await?)
    }

    /// Accesses a share link: expiry is checked on every access, then the
    /// share's own password gate, and only a fully successful access counts
    /// as a view.
    ///
    /// When the underlying form is itself encrypted, passing this gate still
    /// only reveals the opaque ciphertext; the form-encryption password is an
    /// independent secret.
    pub async fn access_share(
        &self,
        share_id: ShareId,
        password: Option<&str>,
    ) -> FormResult<ShareAccess> {
        self.access_share_at(share_id, password, Utc::now()).await
    }

    pub async fn access_share_at(
        &self,
        share_id: ShareId,
        password: Option<&str>,
        now: DateTime<Utc>,
    ) -> FormResult<ShareAccess> {
        let mut share = self.gated_share(share_id, now).await?;

        if let Some(password_hash) = share.password_hash.as_deref() {
            let Some(password) = password.filter(|p| !p.is_empty()) else {
                return Err(FormError::Unauthorized);
            };
            if !verify_password(password, password_hash) {
                return Err(FormError::Unauthorized);
            }
        }

        let form = self.store.get_form(share.form_id).await.map_err(not_found_form)?;
        share.view_count = self.store.increment_view_count(share_id).await?;

        Ok(ShareAccess { form, share })
    }

    /// Produces a fresh draft from a shared form: new identity, provenance
    /// pointer, " (Copy)" name suffix. Reads through the same expiry check as
    /// access but does not count as a view, and nothing is persisted; cloned
    /// drafts always start unencrypted and unpublished, because cloning
    /// requires the source to already be decrypted client-side.
    pub async fn clone_from_share(&self, share_id: ShareId) -> FormResult<ClonedFormDraft> {
        self.clone_from_share_at(share_id, Utc::now()).await
    }

    pub async fn clone_from_share_at(
        &self,
        share_id: ShareId,
        now: DateTime<Utc>,
    ) -> FormResult<ClonedFormDraft> {
        let share = self.gated_share(share_id, now).await?;
        let original = self.store.get_form(share.form_id).await.map_err(not_found_form)?;

        Ok(ClonedFormDraft {
            id: FormId::generate(),
            modification_key: ModificationKey::generate(),
            name: format!("{} (Copy)", original.name),
            data: original.data,
            cloned_from: share.form_id,
            original_form_name: original.name,
        })
    }

    async fn gated_share(
        &self,
        share_id: ShareId,
        now: DateTime<Utc>,
    ) -> FormResult<SharedFormRecord> {
        let share = self.store.get_share(share_id).await.map_err(not_found_share)?;
        if share.is_expired(now) {
            return Err(FormError::Expired);
        }
        Ok(share)
    }
}

fn not_found_form(err: StoreError) -> FormError {
    match err {
        StoreError::NotFound(_) => FormError::NotFound("Form not found".to_string()),
        other => other.into(),
    }
}

fn not_found_share(err: StoreError) -> FormError {
    match err {
        StoreError::NotFound(_) => FormError::NotFound("Shared form not found".to_string()),
        other => other.into(),
    }
}
