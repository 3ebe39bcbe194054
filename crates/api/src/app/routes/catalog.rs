use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::Utc;

use storefront_auth::Permission;
use storefront_catalog::{CatalogStatus, OperatorEdit};
use storefront_core::{CatalogItemId, DomainError};

use crate::app::dto::{CatalogListQuery, PublicCatalogItem, SetCatalogStatusRequest, SetTrackingRequest};
use crate::app::errors;
use crate::app::routes::common::{holds, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

// `:key` is a slug on GET and an item id on the mutating routes.
pub fn router() -> Router {
    Router::new()
        .route("/items", get(list_items))
        .route("/items/:key", get(get_item))
        .route("/items/:key/status", put(set_status))
        .route("/items/:key/tracking", put(set_tracking))
}

/// Every mirrored item under a root, removed ones included.
pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<CatalogListQuery>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CATALOG_WRITE) {
        return resp;
    }

    match services.catalog.list_root(tenant.tenant_id(), &query.root).await {
        Ok(mut items) => {
            items.sort_by(|a, b| a.slug.cmp(&b.slug));
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Operators see any item by slug; readers only published, still-listed ones.
pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CATALOG_READ) {
        return resp;
    }
    let operator = holds(&tenant, &principal, Permission::CATALOG_WRITE);

    match services.catalog.get_by_slug(tenant.tenant_id(), &slug).await {
        Ok(Some(item)) if operator => (StatusCode::OK, Json(item)).into_response(),
        Ok(Some(item)) if item.status == CatalogStatus::Published && !item.is_removed() => {
            (StatusCode::OK, Json(PublicCatalogItem::from(&item))).into_response()
        }
        Ok(_) => errors::domain_error_to_response(DomainError::NotFound),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<SetCatalogStatusRequest>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let item_id: CatalogItemId = match parse_id(&id, "catalog item") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    edit(&services, &tenant, item_id, OperatorEdit::Status(body.status)).await
}

/// Detach an item from reconciliation, or hand it back.
pub async fn set_tracking(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<SetTrackingRequest>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::CATALOG_WRITE) {
        return resp;
    }
    let item_id: CatalogItemId = match parse_id(&id, "catalog item") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    edit(&services, &tenant, item_id, OperatorEdit::Tracking { detached: body.detached }).await
}

/// Applied by the store against the current row, so a concurrent sync run
/// neither loses the edit nor has its own writes rolled back by it.
async fn edit(
    services: &AppServices,
    tenant: &TenantContext,
    item_id: CatalogItemId,
    edit: OperatorEdit,
) -> axum::response::Response {
    match services.catalog.apply_edit(tenant.tenant_id(), item_id, edit, Utc::now()).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
