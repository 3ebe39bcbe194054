use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use storefront_core::DomainError;
use storefront_infra::{FulfillmentError, ReconcileError, StoreError};

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        // The rejected URL is the caller's input; it is not echoed back.
        DomainError::InvalidReference(_) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_reference",
            "sharing URL does not match a recognized shape",
        ),
        DomainError::InvalidTransition(msg) => json_error(StatusCode::CONFLICT, "invalid_transition", msg),
        DomainError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
        DomainError::TokenRevoked => json_error(StatusCode::GONE, "token_revoked", "access token was revoked"),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Rejected(e) => domain_error_to_response(e),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::SlugTaken(slug) => json_error(StatusCode::CONFLICT, "slug_taken", format!("slug '{slug}' is taken")),
        StoreError::DuplicateExternalId(id) => json_error(
            StatusCode::CONFLICT,
            "duplicate_external_id",
            format!("external id '{id}' is already tracked"),
        ),
        StoreError::Backend(msg) => {
            tracing::error!(error = %msg, "store backend error");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage backend error")
        }
    }
}

pub fn fulfillment_error_to_response(err: FulfillmentError) -> axum::response::Response {
    match err {
        FulfillmentError::Domain(e) => domain_error_to_response(e),
        FulfillmentError::Store(e) => store_error_to_response(e),
    }
}

pub fn reconcile_error_to_response(err: ReconcileError) -> axum::response::Response {
    match err {
        ReconcileError::ProviderUnavailable(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "provider_unavailable", msg)
        }
        ReconcileError::AlreadyRunning => json_error(
            StatusCode::CONFLICT,
            "sync_in_progress",
            "a sync run for this root is already in progress",
        ),
        ReconcileError::Cancelled { partial } => (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(json!({
                "error": "sync_cancelled",
                "message": "sync run cancelled",
                "partial": partial,
            })),
        )
            .into_response(),
        ReconcileError::Store(e) => store_error_to_response(e),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
