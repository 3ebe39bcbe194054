//! API-side authorization guard.
//!
//! Checked at the handler boundary before any service call, keeping the
//! domain and infra crates auth-agnostic.

use storefront_auth::{AuthzError, CommandAuthorization, Permission, Principal, Role, TenantMembership, authorize};

use crate::context::{PrincipalContext, TenantContext};

/// Resolve the request principal against the role policy.
pub fn principal(tenant: &TenantContext, principal: &PrincipalContext) -> Principal {
    Principal {
        subject_id: principal.subject_id(),
        active_tenant_id: tenant.tenant_id(),
        membership: TenantMembership {
            tenant_id: tenant.tenant_id(),
            roles: principal.roles().to_vec(),
            permissions: permissions_from_roles(principal.roles()),
        },
    }
}

/// Check authorization for an operation in the current request context.
pub fn authorize_command<C: CommandAuthorization>(
    tenant: &TenantContext,
    principal_ctx: &PrincipalContext,
    command: &C,
) -> Result<(), AuthzError> {
    let principal = principal(tenant, principal_ctx);
    for perm in command.required_permissions() {
        authorize(&principal, perm)?;
    }
    Ok(())
}

/// Static role→permission policy.
pub fn permissions_from_roles(roles: &[Role]) -> Vec<Permission> {
    // Convention: "admin" grants all permissions in the current tenant.
    if roles.contains(&Role::ADMIN) {
        return vec![Permission::WILDCARD];
    }

    let mut perms = Vec::new();
    for role in roles {
        let granted = match role.as_str() {
            "operator" => vec![
                Permission::CATALOG_SYNC,
                Permission::CATALOG_READ,
                Permission::CATALOG_WRITE,
                Permission::ORDERS_MANAGE,
                Permission::SOLUTION_ACCESS,
            ],
            "customer" => vec![Permission::CATALOG_READ, Permission::ORDERS_OWN, Permission::SOLUTION_ACCESS],
            _ => Vec::new(),
        };
        for p in granted {
            if !perms.contains(&p) {
                perms.push(p);
            }
        }
    }
    perms
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::{SubjectId, TenantId};

    use crate::app::routes::common::Requires;

    fn ctx(roles: Vec<Role>) -> (TenantContext, PrincipalContext) {
        (
            TenantContext::new(TenantId::new()),
            PrincipalContext::new(SubjectId::new(), roles),
        )
    }

    #[test]
    fn admin_gets_everything() {
        let (t, p) = ctx(vec![Role::ADMIN]);
        assert!(authorize_command(&t, &p, &Requires::one(Permission::CATALOG_SYNC)).is_ok());
        assert!(authorize_command(&t, &p, &Requires::one(Permission::new("anything.else"))).is_ok());
    }

    #[test]
    fn customers_cannot_sync_or_manage_orders() {
        let (t, p) = ctx(vec![Role::CUSTOMER]);
        assert!(authorize_command(&t, &p, &Requires::one(Permission::ORDERS_OWN)).is_ok());
        assert!(authorize_command(&t, &p, &Requires::one(Permission::CATALOG_SYNC)).is_err());
        assert!(authorize_command(&t, &p, &Requires::one(Permission::ORDERS_MANAGE)).is_err());
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        assert!(permissions_from_roles(&[Role::new("guest")]).is_empty());
        let both = permissions_from_roles(&[Role::OPERATOR, Role::CUSTOMER]);
        assert_eq!(both.iter().filter(|p| **p == Permission::SOLUTION_ACCESS).count(), 1);
    }
}
