use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use storefront_auth::Permission;
use storefront_core::TokenId;

use crate::app::dto::ViewerResponse;
use crate::app::errors;
use crate::app::routes::common::require;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/:token_id", get(resolve))
}

/// Exchange an access token for a short-lived viewing URL.
///
/// Malformed and unknown tokens both answer 403 so token ids cannot be enumerated.
pub async fn resolve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(token_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::SOLUTION_ACCESS) {
        return resp;
    }
    let Ok(token_id) = token_id.parse::<TokenId>() else {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden");
    };

    match services
        .access
        .resolve(tenant.tenant_id(), token_id, principal.subject_id())
        .await
    {
        Ok(url) => (StatusCode::OK, Json(ViewerResponse::from(url))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}
