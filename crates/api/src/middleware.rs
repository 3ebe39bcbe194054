use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use storefront_auth::{IdentityProvider, TokenValidationError};

use crate::app::errors::json_error;
use crate::context::{PrincipalContext, TenantContext};

/// Shared state for [`auth_middleware`].
#[derive(Clone)]
pub struct AuthState {
    pub identity: Arc<dyn IdentityProvider>,
}

/// Verify the bearer credential and attach the caller's tenant and principal.
///
/// Every route behind this layer sees exactly one tenant: the one in the token.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return unauthorized("missing bearer token");
    };

    let claims = match state.identity.verify(token, Utc::now()) {
        Ok(claims) => claims,
        Err(TokenValidationError::Expired) => return unauthorized("token has expired"),
        Err(e) => {
            tracing::debug!(error = %e, "authentication failed");
            return unauthorized("invalid bearer token");
        }
    };

    req.extensions_mut().insert(TenantContext::new(claims.tenant_id));
    req.extensions_mut()
        .insert(PrincipalContext::new(claims.sub, claims.roles));

    next.run(req).await
}

fn unauthorized(message: &'static str) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
