use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use storefront_auth::Permission;
use storefront_core::OrderId;
use storefront_infra::NewOrder;
use storefront_orders::Order;

use crate::app::dto::{
    AccessTokenView, EnableSolutionRequest, OrderView, PlaceOrderRequest, SetOrderStatusRequest,
};
use crate::app::errors;
use crate::app::routes::common::{holds, parse_id, require};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(place_order))
        .route("/:id", get(get_order).delete(delete_order))
        .route("/:id/status", put(set_status))
        .route("/:id/solution/enable", put(enable_solution))
        .route("/:id/solution/disable", put(disable_solution))
        .route("/:id/solution/access", get(solution_access))
}

fn view(order: &Order, manager: bool) -> OrderView {
    if manager {
        OrderView::for_operator(order)
    } else {
        OrderView::for_purchaser(order)
    }
}

pub async fn place_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<PlaceOrderRequest>,
) -> axum::response::Response {
    let manager = holds(&tenant, &principal, Permission::ORDERS_MANAGE);
    let purchaser_id = match body.purchaser_id {
        Some(other) if other != principal.subject_id() => {
            if let Err(resp) = require(&tenant, &principal, Permission::ORDERS_MANAGE) {
                return resp;
            }
            other
        }
        _ => {
            if !manager {
                if let Err(resp) = require(&tenant, &principal, Permission::ORDERS_OWN) {
                    return resp;
                }
            }
            principal.subject_id()
        }
    };

    let new = NewOrder {
        purchaser_id,
        item_type: body.item_type,
        item_ref: body.item_ref,
    };
    match services.orders.place_order(tenant.tenant_id(), new).await {
        Ok(order) => (StatusCode::CREATED, Json(view(&order, manager))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

/// Managers see every live order; customers only their own.
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let manager = holds(&tenant, &principal, Permission::ORDERS_MANAGE);
    if !manager {
        if let Err(resp) = require(&tenant, &principal, Permission::ORDERS_OWN) {
            return resp;
        }
    }
    let purchaser = (!manager).then(|| principal.subject_id());

    match services.orders.list_orders(tenant.tenant_id(), purchaser).await {
        Ok(orders) => {
            let views: Vec<OrderView> = orders.iter().map(|o| view(o, manager)).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let manager = holds(&tenant, &principal, Permission::ORDERS_MANAGE);
    if !manager {
        if let Err(resp) = require(&tenant, &principal, Permission::ORDERS_OWN) {
            return resp;
        }
    }
    let order_id: OrderId = match parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.orders.get_order(tenant.tenant_id(), order_id).await {
        // Someone else's order reads as missing.
        Ok(order) if !manager && !order.is_purchaser(principal.subject_id()) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "not found")
        }
        Ok(order) => (StatusCode::OK, Json(view(&order, manager))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::ORDERS_MANAGE) {
        return resp;
    }
    let order_id: OrderId = match parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.orders.delete_order(tenant.tenant_id(), order_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn set_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<SetOrderStatusRequest>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::ORDERS_MANAGE) {
        return resp;
    }
    let order_id: OrderId = match parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .orders
        .set_status(tenant.tenant_id(), order_id, body.status)
        .await
    {
        Ok(order) => (StatusCode::OK, Json(OrderView::for_operator(&order))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn enable_solution(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<EnableSolutionRequest>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::ORDERS_MANAGE) {
        return resp;
    }
    let order_id: OrderId = match parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .orders
        .enable_solution(tenant.tenant_id(), order_id, &body.raw_url)
        .await
    {
        Ok(order) => (StatusCode::OK, Json(OrderView::for_operator(&order))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

pub async fn disable_solution(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::ORDERS_MANAGE) {
        return resp;
    }
    let order_id: OrderId = match parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .orders
        .disable_solution(tenant.tenant_id(), order_id)
        .await
    {
        Ok(order) => (StatusCode::OK, Json(OrderView::for_operator(&order))).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}

/// The purchaser's current access token for an enabled solution.
pub async fn solution_access(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = require(&tenant, &principal, Permission::SOLUTION_ACCESS) {
        return resp;
    }
    let order_id: OrderId = match parse_id(&id, "order") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services
        .access
        .access_token_for(tenant.tenant_id(), order_id, principal.subject_id())
        .await
    {
        Ok(token_id) => (StatusCode::OK, Json(AccessTokenView { token_id })).into_response(),
        Err(e) => errors::fulfillment_error_to_response(e),
    }
}
