use axum::http::StatusCode;

use storefront_auth::{CommandAuthorization, Permission};

use crate::app::errors;
use crate::context::{PrincipalContext, TenantContext};

/// Permissions an operation requires, checked before it runs.
pub struct Requires {
    pub required: Vec<Permission>,
}

impl Requires {
    pub fn one(permission: Permission) -> Self {
        Self {
            required: vec![permission],
        }
    }
}

impl CommandAuthorization for Requires {
    fn required_permissions(&self) -> &[Permission] {
        &self.required
    }
}

/// `Err` carries a ready 403 response.
pub fn require(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: Permission,
) -> Result<(), axum::response::Response> {
    crate::authz::authorize_command(tenant, principal, &Requires::one(permission))
        .map_err(|e| errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()))
}

/// Whether the caller holds `permission`, without failing the request.
pub fn holds(tenant: &TenantContext, principal: &PrincipalContext, permission: Permission) -> bool {
    crate::authz::principal(tenant, principal).can(&permission)
}

/// Parse an id path segment, answering 400 on garbage.
pub fn parse_id<T>(raw: &str, what: &'static str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr,
{
    raw.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}
