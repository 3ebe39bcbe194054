use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use storefront_core::TenantId;

type RunKey = (TenantId, String);

/// Per-root in-flight marker: at most one reconciliation run per
/// `(tenant, root folder)` at a time.
#[derive(Debug, Clone, Default)]
pub struct SyncGuard {
    running: Arc<Mutex<HashSet<RunKey>>>,
}

impl SyncGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the root, or `None` when a run for it is already in flight.
    pub fn try_acquire(&self, tenant_id: TenantId, root_folder_id: &str) -> Option<SyncPermit> {
        let key = (tenant_id, root_folder_id.to_string());
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(key.clone()) {
            return None;
        }
        Some(SyncPermit {
            running: Arc::clone(&self.running),
            key,
        })
    }

    pub fn is_running(&self, tenant_id: TenantId, root_folder_id: &str) -> bool {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        running.contains(&(tenant_id, root_folder_id.to_string()))
    }
}

/// Releases the root when dropped, including on early return or panic.
#[derive(Debug)]
pub struct SyncPermit {
    running: Arc<Mutex<HashSet<RunKey>>>,
    key: RunKey,
}

impl Drop for SyncPermit {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        running.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_root_is_rejected_until_release() {
        let guard = SyncGuard::new();
        let tenant = TenantId::new();

        let permit = guard.try_acquire(tenant, "ROOT").unwrap();
        assert!(guard.try_acquire(tenant, "ROOT").is_none());
        assert!(guard.is_running(tenant, "ROOT"));

        // Other roots and other tenants are independent.
        assert!(guard.try_acquire(tenant, "OTHER").is_some());
        assert!(guard.try_acquire(TenantId::new(), "ROOT").is_some());

        drop(permit);
        assert!(!guard.is_running(tenant, "ROOT"));
        assert!(guard.try_acquire(tenant, "ROOT").is_some());
    }
}
