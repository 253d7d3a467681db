//! services/api/tests/service_tests.rs
//!
//! Integration tests running the publish and share state machines against
//! the real SQLite adapter on an in-memory database.

use std::str::FromStr;
use std::sync::Arc;

use api_lib::adapters::SqliteStore;
use chrono::{Duration, Utc};
use pawforms_core::crypto::{self, EncryptedPayload};
use pawforms_core::domain::{Form, FormId, ModificationKey, ShareId, StoredFormRecord};
use pawforms_core::error::FormError;
use pawforms_core::ports::{FormStore, StoreError};
use pawforms_core::service::{FormService, PublishRequest};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

async fn store() -> SqliteStore {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    let store = SqliteStore::new(pool);
    store.run_migrations().await.unwrap();
    store
}

async fn service() -> FormService {
    FormService::new(Arc::new(store().await))
}

fn plain_request(name: &str) -> PublishRequest {
    PublishRequest {
        name: name.to_string(),
        data: serde_json::to_value(Form::example()).unwrap(),
        encrypted: false,
        password_hash: None,
    }
}

fn encrypted_request(name: &str, password: &str) -> (PublishRequest, serde_json::Value) {
    let plaintext = serde_json::to_value(Form::example()).unwrap();
    let payload = crypto::encrypt(&plaintext, password).unwrap();
    let request = PublishRequest {
        name: name.to_string(),
        data: serde_json::to_value(&payload).unwrap(),
        encrypted: true,
        password_hash: Some(crypto::hash_password(password)),
    };
    (request, plaintext)
}

//=========================================================================================
// Publish State Machine
//=========================================================================================

#[tokio::test]
async fn publish_then_get_returns_the_stored_record() {
    let service = service().await;
    let id = FormId::generate();

    let receipt = service.publish(id, plain_request("My Form")).await.unwrap();
    assert_eq!(receipt.id, id);

    let record = service.get(id).await.unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.name, "My Form");
    assert!(!record.encrypted);
    assert_eq!(record.password_hash, None);
    assert_eq!(record.cloned_from, None);
    assert_eq!(record.modification_key, receipt.modification_key);

    let stored: Form = serde_json::from_str(&record.data).unwrap();
    assert_eq!(stored.name(), "Test Form");
}

#[tokio::test]
async fn publishing_twice_is_rejected_and_leaves_the_record_unchanged() {
    let service = service().await;
    let id = FormId::generate();

    service.publish(id, plain_request("A")).await.unwrap();
    let err = service.publish(id, plain_request("B")).await.unwrap_err();
    assert!(matches!(err, FormError::AlreadyPublished(conflict) if conflict == id));

    assert_eq!(service.get(id).await.unwrap().name, "A");
}

#[tokio::test]
async fn the_storage_unique_key_rejects_a_second_insert() {
    let store = store().await;
    let now = Utc::now();
    let record = StoredFormRecord {
        id: FormId::generate(),
        modification_key: ModificationKey::generate(),
        encrypted: false,
        password_hash: None,
        name: "First".to_string(),
        data: "{}".to_string(),
        cloned_from: None,
        created_at: now,
        updated_at: now,
    };
    store.insert_form(&record).await.unwrap();

    // A writer that slipped past the service's existence pre-check still
    // loses at the unique key.
    let mut second = record.clone();
    second.modification_key = ModificationKey::generate();
    second.name = "Second".to_string();
    let err = store.insert_form(&second).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));

    // The losing insert wrote nothing, not even the meta projection.
    assert_eq!(store.get_form(record.id).await.unwrap().name, "First");
    assert_eq!(store.recent_forms(20).await.unwrap().len(), 1);
}

#[tokio::test]
async fn publish_validates_its_input() {
    let service = service().await;

    let err = service
        .publish(FormId::generate(), plain_request("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Validation(_)));

    let mut missing_hash = plain_request("A");
    missing_hash.encrypted = true;
    let err = service
        .publish(FormId::generate(), missing_hash)
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Validation(_)));

    let mut stray_hash = plain_request("A");
    stray_hash.password_hash = Some(crypto::hash_password("p"));
    let err = service
        .publish(FormId::generate(), stray_hash)
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Validation(_)));
}

#[tokio::test]
async fn getting_an_unknown_form_is_not_found() {
    let service = service().await;
    let err = service.get(FormId::generate()).await.unwrap_err();
    assert!(matches!(err, FormError::NotFound(_)));
}

#[tokio::test]
async fn verify_access_gates_encrypted_forms() {
    let service = service().await;
    let id = FormId::generate();
    let (request, plaintext) = encrypted_request("Secret Form", "hunter2");
    service.publish(id, request).await.unwrap();

    let err = service.verify_access(id, "wrong").await.unwrap_err();
    assert!(matches!(err, FormError::Unauthorized));

    let err = service.verify_access(id, "").await.unwrap_err();
    assert!(matches!(err, FormError::Validation(_)));

    let verified = service.verify_access(id, "hunter2").await.unwrap();
    assert_eq!(verified.name, "Secret Form");

    // The gate returns ciphertext; decryption is a separate, client-side step.
    let payload: EncryptedPayload = serde_json::from_str(&verified.data).unwrap();
    assert_eq!(crypto::decrypt(&payload, "hunter2").unwrap(), plaintext);
}

#[tokio::test]
async fn verify_access_rejects_plaintext_forms() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("Open Form")).await.unwrap();

    let err = service.verify_access(id, "anything").await.unwrap_err();
    assert!(matches!(err, FormError::NotEncrypted));
}

#[tokio::test]
async fn delete_requires_the_modification_key_and_is_idempotent() {
    let service = service().await;
    let id = FormId::generate();
    let receipt = service.publish(id, plain_request("A")).await.unwrap();

    let err = service.delete(id, None).await.unwrap_err();
    assert!(matches!(err, FormError::Unauthorized));
    let err = service
        .delete(id, Some(ModificationKey::generate()))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Unauthorized));
    assert!(service.get(id).await.is_ok());

    service.delete(id, Some(receipt.modification_key)).await.unwrap();
    assert!(matches!(service.get(id).await.unwrap_err(), FormError::NotFound(_)));

    // Absent ids delete successfully, with or without a key.
    service.delete(id, None).await.unwrap();
}

#[tokio::test]
async fn recent_forms_lists_at_most_twenty() {
    let service = service().await;
    for i in 0..25 {
        service
            .publish(FormId::generate(), plain_request(&format!("Form {}", i)))
            .await
            .unwrap();
    }

    let recent = service.recent().await.unwrap();
    assert_eq!(recent.len(), 20);
    for pair in recent.windows(2) {
        assert!(pair[0].date >= pair[1].date);
    }
}

#[tokio::test]
async fn purge_removes_everything() {
    let service = service().await;
    let id = FormId::generate();
    let receipt = service.publish(id, plain_request("A")).await.unwrap();
    assert_eq!(receipt.id, id);
    let share = service.create_share(id, None, None).await.unwrap();

    service.purge_all().await.unwrap();

    assert!(service.recent().await.unwrap().is_empty());
    assert!(matches!(service.get(id).await.unwrap_err(), FormError::NotFound(_)));
    assert!(matches!(
        service.resolve_share(share.share_id).await.unwrap_err(),
        FormError::NotFound(_)
    ));
}

//=========================================================================================
// Share-Link Lifecycle
//=========================================================================================

#[tokio::test]
async fn sharing_an_unknown_form_is_not_found() {
    let service = service().await;
    let err = service
        .create_share(FormId::generate(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::NotFound(_)));
}

#[tokio::test]
async fn accessing_an_unknown_share_is_not_found() {
    let service = service().await;
    let err = service
        .access_share(ShareId::generate(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::NotFound(_)));
}

#[tokio::test]
async fn public_links_count_views_on_every_access() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("A")).await.unwrap();
    let share = service.create_share(id, None, None).await.unwrap();
    assert!(!share.has_password());
    assert_eq!(share.view_count, 0);

    let access = service.access_share(share.share_id, None).await.unwrap();
    assert_eq!(access.share.view_count, 1);
    assert_eq!(access.form.id, id);

    let access = service.access_share(share.share_id, None).await.unwrap();
    assert_eq!(access.share.view_count, 2);
}

#[tokio::test]
async fn password_gated_links_reject_missing_or_wrong_passwords() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("A")).await.unwrap();
    let share = service.create_share(id, Some("abc"), None).await.unwrap();
    assert!(share.has_password());

    let err = service.access_share(share.share_id, None).await.unwrap_err();
    assert!(matches!(err, FormError::Unauthorized));
    let err = service
        .access_share(share.share_id, Some("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Unauthorized));

    // Failed attempts never count as views.
    assert_eq!(service.resolve_share(share.share_id).await.unwrap().view_count, 0);

    let access = service.access_share(share.share_id, Some("abc")).await.unwrap();
    assert_eq!(access.share.view_count, 1);
    let access = service.access_share(share.share_id, Some("abc")).await.unwrap();
    assert_eq!(access.share.view_count, 2);
}

#[tokio::test]
async fn a_blank_share_password_means_a_public_link() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("A")).await.unwrap();
    let share = service.create_share(id, Some("   "), None).await.unwrap();
    assert!(!share.has_password());
    assert!(service.access_share(share.share_id, None).await.is_ok());
}

#[tokio::test]
async fn links_expire_by_wall_clock_comparison_at_access_time() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("A")).await.unwrap();

    let created = Utc::now();
    let share = service
        .create_share_at(id, None, Some(1), created)
        .await
        .unwrap();
    assert_eq!(share.expires_at, Some(created + Duration::days(1)));

    // One hour in: fine.
    let access = service
        .access_share_at(share.share_id, None, created + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(access.share.view_count, 1);

    // Past the deadline: gone, and the failed access adds no view.
    let err = service
        .access_share_at(share.share_id, None, created + Duration::hours(25))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Expired));
    assert_eq!(service.resolve_share(share.share_id).await.unwrap().view_count, 1);
}

#[tokio::test]
async fn non_positive_expiry_means_the_link_never_expires() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("A")).await.unwrap();

    let created = Utc::now();
    for days in [None, Some(0), Some(-3)] {
        let share = service.create_share_at(id, None, days, created).await.unwrap();
        assert_eq!(share.expires_at, None);
        assert!(service
            .access_share_at(share.share_id, None, created + Duration::days(10_000))
            .await
            .is_ok());
    }
}

#[tokio::test]
async fn an_expiry_beyond_the_date_range_is_a_validation_error() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("A")).await.unwrap();

    for days in [100_000_000_000, i64::MAX] {
        let err = service.create_share(id, None, Some(days)).await.unwrap_err();
        assert!(matches!(err, FormError::Validation(_)));
    }

    // A century out is still comfortably representable.
    assert!(service.create_share(id, None, Some(36_500)).await.is_ok());
}

#[tokio::test]
async fn multiple_links_to_one_form_are_independent() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("A")).await.unwrap();

    let open = service.create_share(id, None, None).await.unwrap();
    let locked = service.create_share(id, Some("abc"), None).await.unwrap();

    service.access_share(open.share_id, None).await.unwrap();
    assert!(matches!(
        service.access_share(locked.share_id, None).await.unwrap_err(),
        FormError::Unauthorized
    ));

    let listed = service.shares_for_form(id).await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn deleting_a_form_cascades_to_its_shares() {
    let service = service().await;
    let id = FormId::generate();
    let receipt = service.publish(id, plain_request("A")).await.unwrap();
    let share = service.create_share(id, None, None).await.unwrap();

    service.delete(id, Some(receipt.modification_key)).await.unwrap();

    assert!(matches!(
        service.resolve_share(share.share_id).await.unwrap_err(),
        FormError::NotFound(_)
    ));
    assert!(matches!(
        service.access_share(share.share_id, None).await.unwrap_err(),
        FormError::NotFound(_)
    ));
}

#[tokio::test]
async fn share_gate_and_form_encryption_are_independent_secrets() {
    let service = service().await;
    let id = FormId::generate();
    let (request, plaintext) = encrypted_request("Secret Form", "P1");
    service.publish(id, request).await.unwrap();
    let share = service.create_share(id, Some("P2"), None).await.unwrap();

    // Passing the share gate only reveals the still-encrypted blob.
    let access = service.access_share(share.share_id, Some("P2")).await.unwrap();
    assert!(access.form.encrypted);

    let payload: EncryptedPayload = serde_json::from_str(&access.form.data).unwrap();
    assert!(crypto::decrypt(&payload, "P2").is_err());
    assert_eq!(crypto::decrypt(&payload, "P1").unwrap(), plaintext);
}

//=========================================================================================
// Cloning
//=========================================================================================

#[tokio::test]
async fn cloning_produces_a_fresh_unpublished_draft() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("Original")).await.unwrap();
    let share = service.create_share(id, None, None).await.unwrap();

    let draft = service.clone_from_share(share.share_id).await.unwrap();
    assert_ne!(draft.id, id);
    assert_eq!(draft.name, "Original (Copy)");
    assert_eq!(draft.cloned_from, id);
    assert_eq!(draft.original_form_name, "Original");
    assert_eq!(draft.data, service.get(id).await.unwrap().data);

    // Nothing was persisted, and the read did not count as a view.
    assert!(matches!(service.get(draft.id).await.unwrap_err(), FormError::NotFound(_)));
    assert_eq!(service.resolve_share(share.share_id).await.unwrap().view_count, 0);

    // The draft republishes under its own identity.
    let republished = service
        .publish(
            draft.id,
            PublishRequest {
                name: draft.name.clone(),
                data: serde_json::from_str(&draft.data).unwrap(),
                encrypted: false,
                password_hash: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(republished.id, draft.id);
}

#[tokio::test]
async fn cloning_respects_the_expiry_gate() {
    let service = service().await;
    let id = FormId::generate();
    service.publish(id, plain_request("A")).await.unwrap();

    let created = Utc::now();
    let share = service
        .create_share_at(id, None, Some(1), created)
        .await
        .unwrap();

    assert!(service
        .clone_from_share_at(share.share_id, created + Duration::hours(1))
        .await
        .is_ok());
    let err = service
        .clone_from_share_at(share.share_id, created + Duration::days(2))
        .await
        .unwrap_err();
    assert!(matches!(err, FormError::Expired));
}
