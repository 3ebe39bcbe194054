use storefront_auth::Role;
use storefront_core::{SubjectId, TenantId};

/// Tenant context for a request.
///
/// This is immutable and must be present for all domain routes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Principal context for a request (verified subject + roles).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    subject_id: SubjectId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(subject_id: SubjectId, roles: Vec<Role>) -> Self {
        Self { subject_id, roles }
    }

    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}
