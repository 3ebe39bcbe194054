use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use storefront_auth::Permission;

use crate::app::errors;
use crate::app::routes::common::require;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/:root_folder_id", post(sync_root))
}

/// Run one reconciliation of the root and return its `SyncResult`.
pub async fn sync_root(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(root_folder_id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CATALOG_SYNC) {
        return resp;
    }

    let cancel = services.shutdown.child_token();
    match services
        .reconciler
        .reconcile(tenant.tenant_id(), &root_folder_id, &cancel)
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => errors::reconcile_error_to_response(e),
    }
}
