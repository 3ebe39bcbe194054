use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use storefront_core::TenantId;

use super::reconciler::{ReconcileError, Reconciler};

/// One `(tenant, root folder)` pair to keep in sync.
///
/// Parses from `<tenant-uuid>:<root-folder-id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRoot {
    pub tenant_id: TenantId,
    pub root_folder_id: String,
}

impl FromStr for SyncRoot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tenant, root) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected <tenant>:<root>, got '{s}'"))?;
        let tenant_id = tenant.parse::<TenantId>().map_err(|e| e.to_string())?;
        if root.is_empty() {
            return Err(format!("missing root folder id in '{s}'"));
        }
        Ok(SyncRoot {
            tenant_id,
            root_folder_id: root.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub roots: Vec<SyncRoot>,
}

/// Run `reconcile` for every configured root once per interval until `cancel`
/// fires. Roots already in flight (e.g. an operator-triggered run) are skipped
/// for that tick.
pub fn spawn_scheduler(
    reconciler: Arc<Reconciler>,
    config: SchedulerConfig,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = config.interval.as_secs(),
            roots = config.roots.len(),
            "sync scheduler started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            for root in &config.roots {
                match reconciler.reconcile(root.tenant_id, &root.root_folder_id, &cancel).await {
                    Ok(result) => tracing::debug!(
                        tenant_id = %root.tenant_id,
                        root_folder_id = %root.root_folder_id,
                        created = result.created,
                        updated = result.updated,
                        deleted = result.deleted,
                        "scheduled sync done"
                    ),
                    Err(ReconcileError::AlreadyRunning) => tracing::debug!(
                        root_folder_id = %root.root_folder_id,
                        "scheduled sync skipped, run in progress"
                    ),
                    Err(ReconcileError::Cancelled { .. }) => break,
                    Err(e) => tracing::warn!(
                        tenant_id = %root.tenant_id,
                        root_folder_id = %root.root_folder_id,
                        error = %e,
                        "scheduled sync failed"
                    ),
                }
            }
        }

        tracing::info!("sync scheduler stopped");
    })
}
