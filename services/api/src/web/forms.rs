//! services/api/src/web/forms.rs
//!
//! Axum handlers for the form endpoints: the recent listing, the write-once
//! publish operation, retrieval, deletion, and the form-level password gate.

use crate::web::state::AppState;
use crate::web::{parse_path_id, reject, ApiJson, ErrorBody, Rejection, SuccessBody};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use pawforms_core::domain::{FormMeta, ModificationKey, StoredFormRecord};
use pawforms_core::service::PublishRequest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The request body for publishing a form.
#[derive(Deserialize, ToSchema)]
pub struct PublishFormRequest {
    pub name: String,
    /// Either the raw Form JSON or an EncryptedPayload produced client-side.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub encrypted: bool,
    /// Required when `encrypted` is true; gates the verify endpoint.
    pub password_hash: Option<String>,
}

/// The response payload sent after successfully publishing a form.
#[derive(Serialize, ToSchema)]
pub struct PublishFormResponse {
    pub id: String,
    /// The credential for deleting this form later. Returned exactly once.
    pub modification_key: String,
}

/// The public view of a stored form. The modification key and password hash
/// never leave the server through this endpoint.
#[derive(Serialize, ToSchema)]
pub struct FormResponse {
    pub id: String,
    pub name: String,
    pub data: String,
    pub encrypted: bool,
    pub cloned_from: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredFormRecord> for FormResponse {
    fn from(record: StoredFormRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name,
            data: record.data,
            encrypted: record.encrypted,
            cloned_from: record.cloned_from.map(|id| id.to_string()),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// One entry of the recent-forms listing.
#[derive(Serialize, ToSchema)]
pub struct FormMetaResponse {
    pub id: String,
    pub name: String,
    pub date: DateTime<Utc>,
}

impl From<FormMeta> for FormMetaResponse {
    fn from(meta: FormMeta) -> Self {
        Self {
            id: meta.id.to_string(),
            name: meta.name,
            date: meta.date,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyFormRequest {
    pub password: String,
}

/// Returned after passing the form-level password gate. `data` is still the
/// opaque ciphertext; decryption happens client-side.
#[derive(Serialize, ToSchema)]
pub struct VerifyFormResponse {
    pub name: String,
    pub data: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the most recently published forms, newest first.
#[utoipa::path(
    get,
    path = "/forms",
    responses(
        (status = 200, description = "Recent form metadata", body = [FormMetaResponse]),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn list_forms_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Rejection> {
    let metas = state.service.recent().await.map_err(reject)?;
    let body: Vec<FormMetaResponse> = metas.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Delete every stored form and share.
#[utoipa::path(
    delete,
    path = "/forms",
    responses(
        (status = 200, description = "All forms removed", body = SuccessBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn purge_forms_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, Rejection> {
    state.service.purge_all().await.map_err(reject)?;
    Ok(SuccessBody::ok())
}

/// Publish a draft as the immutable record for the given id.
///
/// Publishing is create-only: a second publish to the same id is rejected
/// with a conflict, because published forms are immutable.
#[utoipa::path(
    post,
    path = "/forms/{id}",
    request_body = PublishFormRequest,
    responses(
        (status = 201, description = "Form published", body = PublishFormResponse),
        (status = 400, description = "Missing name or data", body = ErrorBody),
        (status = 409, description = "A form with this id was already published", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("id" = String, Path, description = "The caller-assigned form id, e.g. form_...")
    )
)]
pub async fn publish_form_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<PublishFormRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let id = parse_path_id(&id)?;
    let receipt = state
        .service
        .publish(
            id,
            PublishRequest {
                name: request.name,
                data: request.data,
                encrypted: request.encrypted,
                password_hash: request.password_hash,
            },
        )
        .await
        .map_err(reject)?;

    Ok((
        StatusCode::CREATED,
        Json(PublishFormResponse {
            id: receipt.id.to_string(),
            modification_key: receipt.modification_key.to_string(),
        }),
    ))
}

/// Fetch a published form by id.
#[utoipa::path(
    get,
    path = "/forms/{id}",
    responses(
        (status = 200, description = "The stored form", body = FormResponse),
        (status = 404, description = "No form with this id", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("id" = String, Path, description = "The form id")
    )
)]
pub async fn get_form_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    let id = parse_path_id(&id)?;
    let record = state.service.get(id).await.map_err(reject)?;
    Ok(Json(FormResponse::from(record)))
}

/// Delete a published form and every share pointing at it.
///
/// Idempotent: deleting an absent id succeeds. Deleting an existing form
/// requires the `x-modification-key` header handed out at publish time.
#[utoipa::path(
    delete,
    path = "/forms/{id}",
    responses(
        (status = 200, description = "Form removed (or already absent)", body = SuccessBody),
        (status = 401, description = "Missing or wrong modification key", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("id" = String, Path, description = "The form id"),
        ("x-modification-key" = Option<String>, Header, description = "The key returned at publish time")
    )
)]
pub async fn delete_form_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, Rejection> {
    let id = parse_path_id(&id)?;
    let modification_key: Option<ModificationKey> = headers
        .get("x-modification-key")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());

    state.service.delete(id, modification_key).await.map_err(reject)?;
    Ok(SuccessBody::ok())
}

/// Check a password against the form-level gate of an encrypted form.
///
/// On success the still-encrypted data blob is returned; the client runs
/// decryption locally with the same password.
#[utoipa::path(
    post,
    path = "/forms/{id}/verify",
    request_body = VerifyFormRequest,
    responses(
        (status = 200, description = "Password accepted; data is still ciphertext", body = VerifyFormResponse),
        (status = 400, description = "Form is not password protected", body = ErrorBody),
        (status = 401, description = "Wrong password", body = ErrorBody),
        (status = 404, description = "No form with this id", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("id" = String, Path, description = "The form id")
    )
)]
pub async fn verify_form_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<VerifyFormRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let id = parse_path_id(&id)?;
    let verified = state
        .service
        .verify_access(id, &request.password)
        .await
        .map_err(reject)?;
    Ok(Json(VerifyFormResponse {
        name: verified.name,
        data: verified.data,
    }))
}
