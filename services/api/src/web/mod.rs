//! services/api/src/web/mod.rs
//!
//! The HTTP surface: Axum handlers for the form and share endpoints, the
//! typed-error-to-status-code mapping, and the master OpenAPI definition.

pub mod forms;
pub mod shares;
pub mod state;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::Json;
use pawforms_core::domain::{Id, IdKind};
use pawforms_core::error::FormError;
use serde::Serialize;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

pub use forms::{
    delete_form_handler, get_form_handler, list_forms_handler, publish_form_handler,
    purge_forms_handler, verify_form_handler,
};
pub use shares::{
    access_share_handler, clone_share_handler, create_share_handler, list_shares_handler,
    share_info_handler, unlock_share_handler,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        forms::list_forms_handler,
        forms::purge_forms_handler,
        forms::publish_form_handler,
        forms::get_form_handler,
        forms::delete_form_handler,
        forms::verify_form_handler,
        shares::create_share_handler,
        shares::list_shares_handler,
        shares::access_share_handler,
        shares::unlock_share_handler,
        shares::share_info_handler,
        shares::clone_share_handler,
    ),
    components(
        schemas(
            ErrorBody,
            SuccessBody,
            forms::PublishFormRequest,
            forms::PublishFormResponse,
            forms::FormResponse,
            forms::FormMetaResponse,
            forms::VerifyFormRequest,
            forms::VerifyFormResponse,
            shares::CreateShareRequest,
            shares::ShareResponse,
            shares::ShareSummary,
            shares::ShareInfoResponse,
            shares::UnlockShareRequest,
            shares::ShareAccessResponse,
            shares::SharedFormBody,
            shares::ShareInfoBody,
            shares::CloneShareResponse,
        )
    ),
    tags(
        (name = "pawforms API", description = "Publish, protect and share preference forms.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Mapping
//=========================================================================================

/// The JSON body returned for every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// The JSON body returned by operations with nothing else to report.
#[derive(Serialize, ToSchema)]
pub struct SuccessBody {
    pub success: bool,
}

impl SuccessBody {
    pub fn ok() -> Json<SuccessBody> {
        Json(SuccessBody { success: true })
    }
}

/// The rejection type shared by every handler.
pub type Rejection = (StatusCode, Json<ErrorBody>);

/// Maps the core error taxonomy onto HTTP status codes. Unexpected errors
/// are logged and surfaced as a generic 500 without leaking internals.
pub fn reject(err: FormError) -> Rejection {
    let status = match &err {
        FormError::Validation(_) | FormError::NotEncrypted => StatusCode::BAD_REQUEST,
        FormError::AlreadyPublished(_) => StatusCode::CONFLICT,
        FormError::NotFound(_) => StatusCode::NOT_FOUND,
        FormError::Expired => StatusCode::GONE,
        FormError::Unauthorized => StatusCode::UNAUTHORIZED,
        FormError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {err}");
        "Internal server error".to_string()
    } else {
        err.to_string()
    };
    (status, Json(ErrorBody { error: message }))
}

/// Parses a type-tagged identifier out of a path segment; a wrong or missing
/// prefix is a validation failure.
pub fn parse_path_id<K: IdKind>(raw: &str) -> Result<Id<K>, Rejection> {
    raw.parse()
        .map_err(|e: pawforms_core::domain::IdParseError| reject(FormError::Validation(e.to_string())))
}

/// `Json` extractor whose rejection carries the same `ErrorBody` shape as
/// every other failure: a malformed or incomplete request body answers 400
/// with `{"error": ...}` instead of axum's plain-text default.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = Rejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(reject(FormError::Validation(rejection.body_text()))),
        }
    }
}
