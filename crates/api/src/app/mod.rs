//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/provider selection and infra service wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use storefront_auth::Hs256IdentityProvider;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build services from `config` and the full router over them.
pub async fn build_app(config: &AppConfig) -> anyhow::Result<(Router, Arc<AppServices>)> {
    let services = Arc::new(services::build_services(config).await?);
    Ok((router(config, services.clone()), services))
}

/// Router over already-built services.
pub fn router(config: &AppConfig, services: Arc<AppServices>) -> Router {
    let identity = Arc::new(Hs256IdentityProvider::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { identity };

    // Protected routes: require auth + tenant context.
    let protected = routes::router()
        .layer(Extension(services))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new())
}
