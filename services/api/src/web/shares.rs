//! services/api/src/web/shares.rs
//!
//! Axum handlers for the share-link lifecycle: minting links, resolving and
//! accessing them through their expiry and password gates, and cloning a
//! shared form into a fresh draft.

use crate::web::state::AppState;
use crate::web::{parse_path_id, reject, ApiJson, ErrorBody, Rejection};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use pawforms_core::domain::SharedFormRecord;
use pawforms_core::service::ShareAccess;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The request body for minting a share link.
#[derive(Deserialize, ToSchema)]
pub struct CreateShareRequest {
    /// Optional gate password, independent of the form's own password.
    pub password: Option<String>,
    /// Relative expiry; omitted or non-positive means the link never expires.
    pub expires_in_days: Option<i64>,
}

/// The response payload sent after successfully minting a share link.
#[derive(Serialize, ToSchema)]
pub struct ShareResponse {
    pub share_id: String,
    pub share_url: String,
    pub has_password: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
}

/// One entry of a form's share listing.
#[derive(Serialize, ToSchema)]
pub struct ShareSummary {
    pub share_id: String,
    pub has_password: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
}

impl From<SharedFormRecord> for ShareSummary {
    fn from(record: SharedFormRecord) -> Self {
        Self {
            share_id: record.share_id.to_string(),
            has_password: record.has_password(),
            expires_at: record.expires_at,
            view_count: record.view_count,
            created_at: record.created_at,
        }
    }
}

/// Share metadata without the underlying form. Lets a client decide whether
/// to prompt for the gate password before attempting access; fetching this
/// does not count as a view.
#[derive(Serialize, ToSchema)]
pub struct ShareInfoResponse {
    pub share_id: String,
    pub form_name: String,
    pub requires_password: bool,
    /// Whether the underlying form carries its own, separate encryption
    /// password on top of the share gate.
    pub is_encrypted: bool,
    pub view_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct UnlockShareRequest {
    pub password: String,
}

/// The public fields of the form behind a share link. When the form is
/// encrypted, `data` is still the opaque ciphertext.
#[derive(Serialize, ToSchema)]
pub struct SharedFormBody {
    pub id: String,
    pub name: String,
    pub data: String,
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct ShareInfoBody {
    pub share_id: String,
    /// Reflects the view this access just counted.
    pub view_count: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A successful pass through a share link's gates.
#[derive(Serialize, ToSchema)]
pub struct ShareAccessResponse {
    pub form: SharedFormBody,
    pub share_info: ShareInfoBody,
}

impl From<ShareAccess> for ShareAccessResponse {
    fn from(access: ShareAccess) -> Self {
        Self {
            form: SharedFormBody {
                id: access.form.id.to_string(),
                name: access.form.name,
                data: access.form.data,
                encrypted: access.form.encrypted,
                created_at: access.form.created_at,
                updated_at: access.form.updated_at,
            },
            share_info: ShareInfoBody {
                share_id: access.share.share_id.to_string(),
                view_count: access.share.view_count,
                expires_at: access.share.expires_at,
                created_at: access.share.created_at,
            },
        }
    }
}

/// The draft produced by cloning a shared form. Nothing is persisted; the
/// caller publishes the draft later under its new id.
#[derive(Serialize, ToSchema)]
pub struct CloneShareResponse {
    pub form_id: String,
    pub modification_key: String,
    pub name: String,
    pub data: String,
    pub cloned_from: String,
    pub original_form_name: String,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Mint a share link for a published form.
#[utoipa::path(
    post,
    path = "/forms/{id}/share",
    request_body = CreateShareRequest,
    responses(
        (status = 201, description = "Share link created", body = ShareResponse),
        (status = 404, description = "No form with this id", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("id" = String, Path, description = "The form id")
    )
)]
pub async fn create_share_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<CreateShareRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let form_id = parse_path_id(&id)?;
    let record = state
        .service
        .create_share(form_id, request.password.as_deref(), request.expires_in_days)
        .await
        .map_err(reject)?;

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost:3000");
    // Behind a TLS-terminating proxy the original scheme arrives in
    // x-forwarded-proto; direct connections are plain http.
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let share_url = format!("{}://{}/share/{}", scheme, host, record.share_id);

    Ok((
        StatusCode::CREATED,
        Json(ShareResponse {
            share_id: record.share_id.to_string(),
            share_url,
            has_password: record.has_password(),
            expires_at: record.expires_at,
            view_count: record.view_count,
            created_at: record.created_at,
        }),
    ))
}

/// List every share link minted for a form.
#[utoipa::path(
    get,
    path = "/forms/{id}/share",
    responses(
        (status = 200, description = "Share links for the form", body = [ShareSummary]),
        (status = 404, description = "No form with this id", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("id" = String, Path, description = "The form id")
    )
)]
pub async fn list_shares_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    let form_id = parse_path_id(&id)?;
    let shares = state.service.shares_for_form(form_id).await.map_err(reject)?;
    let body: Vec<ShareSummary> = shares.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Access a share link without a password.
///
/// Succeeds only for public links; password-gated links answer 401 and the
/// client retries through the unlock endpoint. Every successful access
/// counts as a view.
#[utoipa::path(
    get,
    path = "/share/{share_id}",
    responses(
        (status = 200, description = "The shared form", body = ShareAccessResponse),
        (status = 401, description = "This link requires a password", body = ErrorBody),
        (status = 404, description = "No share with this id", body = ErrorBody),
        (status = 410, description = "The link has expired", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("share_id" = String, Path, description = "The share id, e.g. share_...")
    )
)]
pub async fn access_share_handler(
    State(state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    let share_id = parse_path_id(&share_id)?;
    let access = state.service.access_share(share_id, None).await.map_err(reject)?;
    Ok(Json(ShareAccessResponse::from(access)))
}

/// Access a password-gated share link.
///
/// The gate password is independent of the form's own encryption password:
/// passing it only reveals the form record, whose data may still be
/// ciphertext requiring a second, separate password client-side.
#[utoipa::path(
    post,
    path = "/share/{share_id}",
    request_body = UnlockShareRequest,
    responses(
        (status = 200, description = "The shared form", body = ShareAccessResponse),
        (status = 401, description = "Wrong or missing password", body = ErrorBody),
        (status = 404, description = "No share with this id", body = ErrorBody),
        (status = 410, description = "The link has expired", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("share_id" = String, Path, description = "The share id")
    )
)]
pub async fn unlock_share_handler(
    State(state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
    ApiJson(request): ApiJson<UnlockShareRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let share_id = parse_path_id(&share_id)?;
    let access = state
        .service
        .access_share(share_id, Some(&request.password))
        .await
        .map_err(reject)?;
    Ok(Json(ShareAccessResponse::from(access)))
}

/// Fetch share metadata without touching the view counter.
#[utoipa::path(
    get,
    path = "/share/{share_id}/info",
    responses(
        (status = 200, description = "Share metadata", body = ShareInfoResponse),
        (status = 404, description = "No share with this id", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("share_id" = String, Path, description = "The share id")
    )
)]
pub async fn share_info_handler(
    State(state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    let share_id = parse_path_id(&share_id)?;
    let share = state.service.resolve_share(share_id).await.map_err(reject)?;
    let form = state.service.get(share.form_id).await.map_err(reject)?;

    Ok(Json(ShareInfoResponse {
        share_id: share.share_id.to_string(),
        form_name: form.name,
        requires_password: share.has_password(),
        is_encrypted: form.encrypted,
        view_count: share.view_count,
        expires_at: share.expires_at,
        created_at: share.created_at,
    }))
}

/// Clone a shared form into a fresh, unpublished draft.
///
/// Reads through the same expiry gate as access but does not count as a
/// view. The draft always starts unencrypted, with a new identity and a
/// provenance pointer back to the source form.
#[utoipa::path(
    post,
    path = "/share/{share_id}/clone",
    responses(
        (status = 200, description = "A fresh draft cloned from the shared form", body = CloneShareResponse),
        (status = 404, description = "No share with this id", body = ErrorBody),
        (status = 410, description = "The link has expired", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    params(
        ("share_id" = String, Path, description = "The share id")
    )
)]
pub async fn clone_share_handler(
    State(state): State<Arc<AppState>>,
    Path(share_id): Path<String>,
) -> Result<impl IntoResponse, Rejection> {
    let share_id = parse_path_id(&share_id)?;
    let draft = state.service.clone_from_share(share_id).await.map_err(reject)?;

    Ok(Json(CloneShareResponse {
        form_id: draft.id.to_string(),
        modification_key: draft.modification_key.to_string(),
        name: draft.name,
        data: draft.data,
        cloned_from: draft.cloned_from.to_string(),
        original_form_name: draft.original_form_name,
    }))
}
