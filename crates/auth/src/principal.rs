use serde::{Deserialize, Serialize};

use storefront_core::TenantId;

/// A subject's membership in a tenant.
///
/// States *which tenant* the subject is acting within and which
/// roles/permissions are granted there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<crate::Role>,
    pub permissions: Vec<crate::Permission>,
}
