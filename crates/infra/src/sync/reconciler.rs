//! Catalog Reconciler.
//!
//! One run mirrors the direct children of a root folder into the catalog:
//!
//! ```text
//! 1. list the root to exhaustion (timeout per page)
//! 2. list every folder child, bounded concurrency, all must succeed
//! 3. load local items for the root and compute the plan
//! 4. create / update / delete, one isolated write per item
//! ```
//!
//! Nothing is written until steps 1 and 2 have fully succeeded. After that a
//! failing item write is recorded in the result and the run moves on.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use storefront_catalog::{
    CatalogItem, ListingEntry, ObservedEntry, SlugAllocator, SyncError, SyncErrorKind, SyncResult, Update, plan,
};
use storefront_core::TenantId;

use super::guard::SyncGuard;
use crate::fulfillment::AccessTokenService;
use crate::listing::{ListingProvider, ProviderError, list_all};
use crate::store::{CatalogStore, StoreError};

/// What happens to an item whose entry left the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Keep the row and stamp `removed_at`.
    #[default]
    Archive,
    /// Delete the row.
    Remove,
}

impl FromStr for DeleteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "archive" | "soft" => Ok(DeleteMode::Archive),
            "remove" | "hard" => Ok(DeleteMode::Remove),
            other => Err(format!("unknown delete mode '{other}' (expected archive|remove)")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// Folder listings in flight at once during one run.
    pub concurrency: usize,
    /// Upper bound for each provider page call.
    pub provider_timeout: Duration,
    pub delete_mode: DeleteMode,
    pub allocator: SlugAllocator,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            provider_timeout: Duration::from_secs(15),
            delete_mode: DeleteMode::Archive,
            allocator: SlugAllocator::default(),
        }
    }
}

impl ReconcilerConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    pub fn with_allocator(mut self, allocator: SlugAllocator) -> Self {
        self.allocator = allocator;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The listing could not be fetched in full. Nothing was written.
    #[error("listing provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("a sync run for this root is already in progress")]
    AlreadyRunning,

    /// Cancellation was observed. `partial` holds what was committed before.
    #[error("sync run cancelled")]
    Cancelled { partial: SyncResult },

    /// Loading local state failed before any write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProviderError> for ReconcileError {
    fn from(value: ProviderError) -> Self {
        ReconcileError::ProviderUnavailable(value.to_string())
    }
}

#[derive(Clone)]
pub struct Reconciler {
    catalog: Arc<dyn CatalogStore>,
    provider: Arc<dyn ListingProvider>,
    access: Arc<AccessTokenService>,
    guard: SyncGuard,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        provider: Arc<dyn ListingProvider>,
        access: Arc<AccessTokenService>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            catalog,
            provider,
            access,
            guard: SyncGuard::new(),
            config,
        }
    }

    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    /// Run one reconciliation of `root_folder_id` for the tenant.
    ///
    /// Rejected with `AlreadyRunning` while another run holds the same root.
    pub async fn reconcile(
        &self,
        tenant_id: TenantId,
        root_folder_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, ReconcileError> {
        let _permit = self
            .guard
            .try_acquire(tenant_id, root_folder_id)
            .ok_or(ReconcileError::AlreadyRunning)?;

        let span = tracing::info_span!("sync", tenant_id = %tenant_id, root_folder_id);
        self.run(tenant_id, root_folder_id, cancel).instrument(span).await
    }

    async fn run(
        &self,
        tenant_id: TenantId,
        root_folder_id: &str,
        cancel: &CancellationToken,
    ) -> Result<SyncResult, ReconcileError> {
        let observed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ReconcileError::Cancelled { partial: SyncResult::default() });
            }
            observed = self.observe(root_folder_id) => observed.inspect_err(|e| {
                tracing::warn!(error = %e, "listing failed, run aborted");
            })?,
        };

        let local = self.catalog.list_root(tenant_id, root_folder_id).await?;
        let plan = plan(&observed, &local);
        tracing::info!(
            observed = observed.len(),
            local = local.len(),
            to_create = plan.to_create.len(),
            to_update = plan.to_update.len(),
            to_delete = plan.to_delete.len(),
            "sync plan computed"
        );

        let mut result = SyncResult::default();
        for external_id in &plan.duplicates {
            result.record_error(SyncError::new(
                external_id.as_str(),
                SyncErrorKind::DuplicateExternalId,
                "listed more than once under the root",
            ));
        }

        let mut known_slugs = self.catalog.slugs(tenant_id).await?;
        let now = Utc::now();
        let cancelled = |partial: &SyncResult| {
            tracing::info!(
                created = partial.created,
                updated = partial.updated,
                deleted = partial.deleted,
                "sync cancelled"
            );
            ReconcileError::Cancelled {
                partial: partial.clone(),
            }
        };

        for entry in &plan.to_create {
            if cancel.is_cancelled() {
                return Err(cancelled(&result));
            }
            match self.create(tenant_id, root_folder_id, entry, &mut known_slugs, now).await {
                Ok(()) => result.created += 1,
                Err(e) => {
                    tracing::warn!(external_id = %e.external_id, kind = ?e.kind, reason = %e.reason, "item not created");
                    result.record_error(e);
                }
            }
        }

        for update in plan.to_update {
            if cancel.is_cancelled() {
                return Err(cancelled(&result));
            }
            match self.update(update, now).await {
                Ok(true) => result.updated += 1,
                Ok(false) => {}
                Err(e) => result.record_error(e),
            }
        }

        for item in plan.to_delete {
            if cancel.is_cancelled() {
                return Err(cancelled(&result));
            }
            match self.delete(tenant_id, item, now).await {
                Ok(Removal::Skipped) => {}
                Ok(Removal::Done) => result.deleted += 1,
                Ok(Removal::CascadeFailed(e)) => {
                    result.deleted += 1;
                    result.record_error(e);
                }
                Err(e) => result.record_error(e),
            }
        }

        tracing::info!(
            created = result.created,
            updated = result.updated,
            deleted = result.deleted,
            errors = result.errors.len(),
            "sync finished"
        );
        Ok(result)
    }

    /// Full listing of the root, with every folder child enriched from its
    /// own listing. Fails as a whole if any fetch fails.
    async fn observe(&self, root_folder_id: &str) -> Result<Vec<ObservedEntry>, ProviderError> {
        let timeout = self.config.provider_timeout;
        let children = list_all(self.provider.as_ref(), root_folder_id, timeout).await?;

        let permits = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut fetches: JoinSet<(usize, Result<Vec<ListingEntry>, ProviderError>)> = JoinSet::new();
        for (idx, child) in children.iter().enumerate().filter(|(_, c)| c.is_folder) {
            let provider = Arc::clone(&self.provider);
            let permits = Arc::clone(&permits);
            let folder_id = child.id.clone();
            fetches.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (idx, Err(ProviderError::Unavailable("worker pool closed".into())));
                };
                (idx, list_all(provider.as_ref(), &folder_id, timeout).await)
            });
        }

        let mut contents: Vec<Option<Vec<ListingEntry>>> = vec![None; children.len()];
        while let Some(joined) = fetches.join_next().await {
            let (idx, listed) = joined.map_err(|e| ProviderError::Unavailable(format!("listing task failed: {e}")))?;
            match listed {
                Ok(entries) => contents[idx] = Some(entries),
                Err(e) => {
                    fetches.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(children
            .iter()
            .zip(contents)
            .map(|(child, listed)| match listed {
                Some(inner) => ObservedEntry::folder(child, root_folder_id, &inner),
                None => ObservedEntry::leaf(child, root_folder_id),
            })
            .collect())
    }

    /// Insert a new item, walking slug candidates until the unique index
    /// accepts one or the budget runs out.
    async fn create(
        &self,
        tenant_id: TenantId,
        root_folder_id: &str,
        entry: &ObservedEntry,
        known_slugs: &mut HashSet<String>,
        now: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let allocator = self.config.allocator;
        let candidates = allocator.attempts(&entry.title(), &entry.external_id, known_slugs);

        for slug in candidates {
            let item = CatalogItem::from_observed(tenant_id, root_folder_id, entry, slug.clone(), now);
            match self.catalog.insert(&item).await {
                Ok(()) => {
                    tracing::debug!(external_id = %entry.external_id, slug = %slug, "item created");
                    known_slugs.insert(slug);
                    return Ok(());
                }
                Err(StoreError::SlugTaken(_)) => {
                    known_slugs.insert(slug);
                }
                Err(StoreError::DuplicateExternalId(_)) => {
                    return self.adopt(tenant_id, root_folder_id, entry, now).await;
                }
                Err(e) => {
                    return Err(SyncError::new(entry.external_id.as_str(), SyncErrorKind::Store, e.to_string()));
                }
            }
        }

        Err(SyncError::new(
            entry.external_id.as_str(),
            SyncErrorKind::SlugCollision,
            format!("no free slug within {} attempts", allocator.max_attempts),
        ))
    }

    /// Take over an archived item that left another root and showed up
    /// under this one. It keeps its id and slug. Anything else already
    /// holding the external id is a genuine duplicate.
    async fn adopt(
        &self,
        tenant_id: TenantId,
        root_folder_id: &str,
        entry: &ObservedEntry,
        now: DateTime<Utc>,
    ) -> Result<(), SyncError> {
        let store_error =
            |e: StoreError| SyncError::new(entry.external_id.as_str(), SyncErrorKind::Store, e.to_string());
        let duplicate = || {
            SyncError::new(
                entry.external_id.as_str(),
                SyncErrorKind::DuplicateExternalId,
                "external id is already tracked by another item",
            )
        };

        let existing = self
            .catalog
            .get_by_external_id(tenant_id, &entry.external_id)
            .await
            .map_err(store_error)?;
        let Some(mut item) = existing else {
            return Err(duplicate());
        };
        if item.detached || !item.is_removed() {
            return Err(duplicate());
        }

        let previous_root = std::mem::replace(&mut item.root_folder_id, root_folder_id.to_string());
        item.refresh_from(entry, now);
        if !self.catalog.refresh_source(&item).await.map_err(store_error)? {
            return Err(duplicate());
        }
        tracing::info!(
            external_id = %entry.external_id,
            slug = %item.slug,
            previous_root = %previous_root,
            "archived item adopted"
        );
        Ok(())
    }

    /// `Ok(false)` when an operator detached the item after it was listed.
    async fn update(&self, update: Update, now: DateTime<Utc>) -> Result<bool, SyncError> {
        let Update { current, observed } = update;
        let mut item = current;
        item.refresh_from(&observed, now);
        let written = self
            .catalog
            .refresh_source(&item)
            .await
            .map_err(|e| SyncError::new(item.external_id.as_str(), SyncErrorKind::Store, e.to_string()))?;
        if !written {
            tracing::debug!(external_id = %item.external_id, "item detached mid-run, refresh skipped");
        }
        Ok(written)
    }

    /// Remove or archive the item, then disable solutions pointing at it.
    async fn delete(&self, tenant_id: TenantId, item: CatalogItem, now: DateTime<Utc>) -> Result<Removal, SyncError> {
        let written = match self.config.delete_mode {
            DeleteMode::Archive => self.catalog.archive(tenant_id, item.id, now).await,
            DeleteMode::Remove => self.catalog.remove(tenant_id, item.id).await,
        };
        let written =
            written.map_err(|e| SyncError::new(item.external_id.as_str(), SyncErrorKind::Store, e.to_string()))?;
        if !written {
            tracing::debug!(external_id = %item.external_id, "item detached mid-run, left in place");
            return Ok(Removal::Skipped);
        }

        let reference = match item.storage_reference() {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(external_id = %item.external_id, error = %e, "no storage reference to invalidate");
                return Ok(Removal::Done);
            }
        };
        match self.access.invalidate_reference(tenant_id, &reference).await {
            Ok(_) => Ok(Removal::Done),
            Err(e) => {
                tracing::warn!(external_id = %item.external_id, error = %e, "solution invalidation failed");
                Ok(Removal::CascadeFailed(SyncError::new(
                    item.external_id.as_str(),
                    SyncErrorKind::Store,
                    format!("item removed but solutions were not invalidated: {e}"),
                )))
            }
        }
    }
}

/// What happened to an item that left the listing.
enum Removal {
    /// Detached by an operator after the listing was read.
    Skipped,
    Done,
    /// The item is gone but dependent solutions were not disabled.
    CascadeFailed(SyncError),
}
