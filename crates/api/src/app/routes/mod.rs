use axum::{Router, routing::get};

pub mod catalog;
pub mod common;
pub mod orders;
pub mod solution;
pub mod sync;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/sync", sync::router())
        .nest("/orders", orders::router())
        .nest("/solution", solution::router())
        .nest("/catalog", catalog::router())
}
