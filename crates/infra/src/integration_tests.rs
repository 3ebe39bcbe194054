//! Integration tests for catalog sync and solution access.
//!
//! Tests: Listing → Reconciler → CatalogStore, and the delete cascade into
//! OrderStore → AccessTokenService.
//!
//! Verifies:
//! - Runs produce minimal, deterministic deltas and are idempotent
//! - Slugs stay unique under concurrent runs
//! - Provider failures abort the run before any write
//! - Removed items invalidate the solutions that pointed at them
//! - Operator edits landing mid-run are neither lost nor overridden

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use tokio_util::sync::CancellationToken;

    use storefront_catalog::{CatalogItem, CatalogStatus, ListingEntry, OperatorEdit, SlugAllocator, SyncErrorKind};
    use storefront_core::{CatalogItemId, DomainError, OrderId, SubjectId, TenantId};
    use storefront_orders::{ItemType, OrderStatus};

    use crate::fulfillment::{AccessConfig, AccessTokenService, FulfillmentError, NewOrder, OrderService};
    use crate::listing::InMemoryListingProvider;
    use crate::store::{CatalogStore, InMemoryCatalogStore, InMemoryOrderStore, OrderStore, StoreError};
    use crate::sync::{DeleteMode, ReconcileError, Reconciler, ReconcilerConfig};

    const ROOT: &str = "ROOT";

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, minute, 0).unwrap()
    }

    fn folder(id: &str, name: &str, minute: u32) -> ListingEntry {
        ListingEntry {
            id: id.into(),
            name: name.into(),
            modified_at: at(minute),
            is_folder: true,
        }
    }

    fn file(id: &str, name: &str, minute: u32) -> ListingEntry {
        ListingEntry {
            id: id.into(),
            name: name.into(),
            modified_at: at(minute),
            is_folder: false,
        }
    }

    struct Harness {
        tenant: TenantId,
        catalog: Arc<InMemoryCatalogStore>,
        provider: Arc<InMemoryListingProvider>,
        orders: OrderService,
        reconciler: Reconciler,
    }

    impl Harness {
        fn new(config: ReconcilerConfig) -> Self {
            Self::with_provider(config, InMemoryListingProvider::new())
        }

        fn with_provider(config: ReconcilerConfig, provider: InMemoryListingProvider) -> Self {
            let catalog = Arc::new(InMemoryCatalogStore::new());
            let provider = Arc::new(provider);
            let order_store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
            let access = Arc::new(AccessTokenService::new(order_store.clone(), AccessConfig::default()));
            let orders = OrderService::new(order_store, access.clone());
            let reconciler = Reconciler::new(catalog.clone(), provider.clone(), access, config);
            Self {
                tenant: TenantId::new(),
                catalog,
                provider,
                orders,
                reconciler,
            }
        }

        /// Publish `entries` as the root listing; folders get empty contents
        /// unless set separately.
        fn listing(&self, entries: Vec<ListingEntry>) {
            for e in entries.iter().filter(|e| e.is_folder) {
                self.provider.set_children(&e.id, vec![]);
            }
            self.provider.set_children(ROOT, entries);
        }

        async fn sync(&self) -> Result<storefront_catalog::SyncResult, ReconcileError> {
            self.sync_root(ROOT).await
        }

        async fn sync_root(&self, root: &str) -> Result<storefront_catalog::SyncResult, ReconcileError> {
            self.reconciler
                .reconcile(self.tenant, root, &CancellationToken::new())
                .await
        }

        async fn items(&self) -> Vec<CatalogItem> {
            self.catalog.list_root(self.tenant, ROOT).await.unwrap()
        }

        async fn item(&self, external_id: &str) -> CatalogItem {
            self.items()
                .await
                .into_iter()
                .find(|i| i.external_id == external_id)
                .unwrap()
        }
    }

    #[tokio::test]
    async fn three_new_one_modified_one_removed() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing((1..=5).map(|i| folder(&format!("L{i}"), &format!("Local {i}"), 0)).collect());
        let first = h.sync().await.unwrap();
        assert_eq!(first.created, 5);

        let mut next: Vec<_> = (1..=4).map(|i| folder(&format!("L{i}"), &format!("Local {i}"), 0)).collect();
        next[1].modified_at = at(30);
        next.extend((1..=3).map(|i| folder(&format!("N{i}"), &format!("New {i}"), 10)));
        h.listing(next);

        let result = h.sync().await.unwrap();
        assert_eq!((result.created, result.updated, result.deleted), (3, 1, 1));
        assert!(result.errors.is_empty());
        assert_eq!(h.item("L2").await.source_modified_at, at(30));
        assert!(h.item("L5").await.is_removed());
    }

    #[tokio::test]
    async fn second_run_without_changes_is_a_noop() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![folder("F1", "Alpha", 0), file("D1", "Notes.pdf", 1), folder("F2", "Beta", 2)]);
        h.provider.set_children("F1", vec![file("x", "a.pdf", 5), file("y", "b.pdf", 3)]);

        let first = h.sync().await.unwrap();
        assert_eq!(first.created, 3);
        let second = h.sync().await.unwrap();
        assert!(second.is_noop(), "{second:?}");

        let alpha = h.item("F1").await;
        assert_eq!(alpha.metadata.get("fileCount").map(String::as_str), Some("2"));
        assert_eq!(alpha.source_modified_at, at(5));
        assert_eq!(h.item("D1").await.title, "Notes");
    }

    #[tokio::test]
    async fn colliding_titles_get_numbered_slugs() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![folder("A1", "Intro To Design", 0), folder("A2", "Intro To Design", 0)]);

        h.sync().await.unwrap();
        assert_eq!(h.item("A1").await.slug, "intro-to-design");
        assert_eq!(h.item("A2").await.slug, "intro-to-design-2");
    }

    #[tokio::test]
    async fn updates_never_regenerate_slugs() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![folder("A1", "Old Name", 0)]);
        h.sync().await.unwrap();

        h.listing(vec![folder("A1", "New Name", 1)]);
        let result = h.sync().await.unwrap();
        assert_eq!(result.updated, 1);
        let item = h.item("A1").await;
        assert_eq!(item.slug, "old-name");
        assert_eq!(item.title, "New Name");
    }

    #[tokio::test]
    async fn unreachable_folder_aborts_the_run_without_writes() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![folder("F1", "One", 0), folder("F2", "Two", 0)]);
        h.provider.fail_on("F2");

        let err = h.sync().await.unwrap_err();
        assert!(matches!(err, ReconcileError::ProviderUnavailable(_)));
        assert!(h.items().await.is_empty());

        h.provider.recover("F2");
        assert_eq!(h.sync().await.unwrap().created, 2);
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_aborts() {
        let config = ReconcilerConfig::default().with_provider_timeout(Duration::from_millis(20));
        let h = Harness::with_provider(config, InMemoryListingProvider::new().with_delay(Duration::from_millis(200)));
        h.listing(vec![folder("F1", "One", 0)]);

        assert!(matches!(h.sync().await, Err(ReconcileError::ProviderUnavailable(_))));
        assert!(h.items().await.is_empty());
    }

    #[tokio::test]
    async fn paginated_listing_is_exhausted_before_diffing() {
        let h = Harness::with_provider(ReconcilerConfig::default(), InMemoryListingProvider::new().with_page_size(2));
        h.listing((0..7).map(|i| file(&format!("D{i}"), &format!("Doc {i}.pdf"), 0)).collect());

        let result = h.sync().await.unwrap();
        assert_eq!(result.created, 7);
        assert_eq!(result.deleted, 0);
    }

    #[tokio::test]
    async fn concurrent_run_for_the_same_root_is_rejected() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![]);
        let _held = h.reconciler.guard().try_acquire(h.tenant, ROOT).unwrap();

        assert_eq!(h.sync().await.unwrap_err(), ReconcileError::AlreadyRunning);
    }

    #[tokio::test]
    async fn cancelled_run_writes_nothing_further() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![folder("F1", "One", 0)]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = h.reconciler.reconcile(h.tenant, ROOT, &cancel).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled { .. }));
        assert!(h.items().await.is_empty());
        assert!(!h.reconciler.guard().is_running(h.tenant, ROOT));
    }

    #[tokio::test]
    async fn detached_items_are_neither_updated_nor_deleted() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![folder("A1", "Keep Me", 0), folder("A2", "Edit Me", 0)]);
        h.sync().await.unwrap();

        for id in ["A1", "A2"] {
            let item = h.item(id).await;
            h.catalog
                .apply_edit(h.tenant, item.id, OperatorEdit::Tracking { detached: true }, Utc::now())
                .await
                .unwrap();
        }
        h.listing(vec![folder("A2", "Edited", 9)]);

        assert!(h.sync().await.unwrap().is_noop());
        assert_eq!(h.item("A2").await.title, "Edit Me");
        assert!(!h.item("A1").await.is_removed());
    }

    #[tokio::test]
    async fn archived_items_are_restored_when_they_reappear() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![folder("A1", "Comeback", 0)]);
        h.sync().await.unwrap();

        h.listing(vec![]);
        assert_eq!(h.sync().await.unwrap().deleted, 1);
        assert!(h.sync().await.unwrap().is_noop());

        h.listing(vec![folder("A1", "Comeback", 0)]);
        let result = h.sync().await.unwrap();
        assert_eq!((result.created, result.updated), (0, 1));
        assert!(!h.item("A1").await.is_removed());
        assert_eq!(h.item("A1").await.slug, "comeback");
    }

    #[tokio::test]
    async fn remove_mode_deletes_the_row() {
        let h = Harness::new(ReconcilerConfig::default().with_delete_mode(DeleteMode::Remove));
        h.listing(vec![folder("A1", "Gone Soon", 0)]);
        h.sync().await.unwrap();

        h.listing(vec![]);
        assert_eq!(h.sync().await.unwrap().deleted, 1);
        assert!(h.items().await.is_empty());
        assert!(h.catalog.get_by_slug(h.tenant, "gone-soon").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn removed_item_revokes_solutions_that_point_at_it() {
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![folder("SOL1", "Solutions", 0)]);
        h.sync().await.unwrap();

        let purchaser = SubjectId::new();
        let order = h
            .orders
            .place_order(
                h.tenant,
                NewOrder {
                    purchaser_id: purchaser,
                    item_type: ItemType::Book,
                    item_ref: "book-1".into(),
                },
            )
            .await
            .unwrap();
        let enabled = h
            .orders
            .enable_solution(h.tenant, order.id_typed(), "https://drive.google.com/drive/folders/SOL1")
            .await
            .unwrap();
        let token = enabled.live_token().unwrap().token_id;

        h.listing(vec![]);
        let result = h.sync().await.unwrap();
        assert_eq!(result.deleted, 1);
        assert!(result.errors.is_empty());

        let after = h.orders.get_order(h.tenant, order.id_typed()).await.unwrap();
        assert!(!after.solution().is_enabled);
        assert_eq!(after.status(), OrderStatus::Pending);
        assert_eq!(
            h.orders.access().resolve(h.tenant, token, purchaser).await.unwrap_err(),
            FulfillmentError::Domain(DomainError::TokenRevoked)
        );
    }

    #[tokio::test]
    async fn entry_moved_to_another_root_is_adopted_with_its_slug() {
        const OTHER: &str = "ROOT_B";
        let h = Harness::new(ReconcilerConfig::default());
        h.listing(vec![folder("MOVER", "Moving Day", 0)]);
        h.sync().await.unwrap();
        let original = h.item("MOVER").await;

        h.listing(vec![]);
        h.provider.set_children(OTHER, vec![folder("MOVER", "Moving Day", 3)]);

        // Still live under the old root: a genuine duplicate for now.
        let early = h.sync_root(OTHER).await.unwrap();
        assert_eq!(early.created, 0);
        assert_eq!(early.errors[0].kind, SyncErrorKind::DuplicateExternalId);

        assert_eq!(h.sync().await.unwrap().deleted, 1);
        let moved = h.sync_root(OTHER).await.unwrap();
        assert_eq!(moved.created, 1);
        assert!(moved.errors.is_empty(), "{moved:?}");

        let adopted = h.catalog.get_by_external_id(h.tenant, "MOVER").await.unwrap().unwrap();
        assert_eq!(adopted.id, original.id);
        assert_eq!(adopted.slug, "moving-day");
        assert_eq!(adopted.root_folder_id, OTHER);
        assert!(!adopted.is_removed());
        assert!(h.items().await.is_empty());

        assert!(h.sync_root(OTHER).await.unwrap().is_noop());
        assert!(h.sync().await.unwrap().is_noop());
    }

    /// Stands in for other writers sharing the store. Slugs starting with
    /// `contested_prefix` are always taken, and queued operator edits land
    /// right after a run has read its root.
    struct InterferingCatalog {
        inner: InMemoryCatalogStore,
        contested_prefix: Option<&'static str>,
        edits_after_listing: Mutex<Vec<(&'static str, OperatorEdit)>>,
    }

    impl InterferingCatalog {
        fn new() -> Self {
            Self {
                inner: InMemoryCatalogStore::new(),
                contested_prefix: None,
                edits_after_listing: Mutex::new(Vec::new()),
            }
        }

        fn contesting(prefix: &'static str) -> Self {
            Self {
                contested_prefix: Some(prefix),
                ..Self::new()
            }
        }

        fn edit_after_listing(&self, external_id: &'static str, edit: OperatorEdit) {
            self.edits_after_listing.lock().unwrap().push((external_id, edit));
        }
    }

    #[async_trait]
    impl CatalogStore for InterferingCatalog {
        async fn insert(&self, item: &CatalogItem) -> Result<(), StoreError> {
            if self.contested_prefix.is_some_and(|p| item.slug.starts_with(p)) {
                return Err(StoreError::SlugTaken(item.slug.clone()));
            }
            self.inner.insert(item).await
        }
        async fn refresh_source(&self, item: &CatalogItem) -> Result<bool, StoreError> {
            self.inner.refresh_source(item).await
        }
        async fn archive(&self, t: TenantId, id: CatalogItemId, at: DateTime<Utc>) -> Result<bool, StoreError> {
            self.inner.archive(t, id, at).await
        }
        async fn remove(&self, t: TenantId, id: CatalogItemId) -> Result<bool, StoreError> {
            self.inner.remove(t, id).await
        }
        async fn apply_edit(
            &self,
            t: TenantId,
            id: CatalogItemId,
            edit: OperatorEdit,
            at: DateTime<Utc>,
        ) -> Result<CatalogItem, StoreError> {
            self.inner.apply_edit(t, id, edit, at).await
        }
        async fn get(&self, t: TenantId, id: CatalogItemId) -> Result<Option<CatalogItem>, StoreError> {
            self.inner.get(t, id).await
        }
        async fn get_by_slug(&self, t: TenantId, slug: &str) -> Result<Option<CatalogItem>, StoreError> {
            self.inner.get_by_slug(t, slug).await
        }
        async fn get_by_external_id(&self, t: TenantId, external_id: &str) -> Result<Option<CatalogItem>, StoreError> {
            self.inner.get_by_external_id(t, external_id).await
        }
        async fn list_root(&self, t: TenantId, root: &str) -> Result<Vec<CatalogItem>, StoreError> {
            let items = self.inner.list_root(t, root).await?;
            let edits = std::mem::take(&mut *self.edits_after_listing.lock().unwrap());
            for (external_id, edit) in edits {
                if let Some(item) = items.iter().find(|i| i.external_id == external_id) {
                    self.inner.apply_edit(t, item.id, edit, Utc::now()).await?;
                }
            }
            Ok(items)
        }
        async fn slugs(&self, t: TenantId) -> Result<HashSet<String>, StoreError> {
            self.inner.slugs(t).await
        }
    }

    fn reconciler_over(
        catalog: Arc<InterferingCatalog>,
        config: ReconcilerConfig,
    ) -> (Reconciler, Arc<InMemoryListingProvider>) {
        let provider = Arc::new(InMemoryListingProvider::new());
        let order_store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
        let access = Arc::new(AccessTokenService::new(order_store, AccessConfig::default()));
        (Reconciler::new(catalog, provider.clone(), access, config), provider)
    }

    #[tokio::test]
    async fn operator_edits_made_during_a_run_survive_it() {
        for mode in [DeleteMode::Archive, DeleteMode::Remove] {
            let catalog = Arc::new(InterferingCatalog::new());
            let config = ReconcilerConfig::default().with_delete_mode(mode);
            let (reconciler, provider) = reconciler_over(catalog.clone(), config);
            let tenant = TenantId::new();
            let cancel = CancellationToken::new();

            provider.set_children(ROOT, vec![file("KEEP", "Keep.pdf", 0), file("GONE", "Gone.pdf", 0)]);
            assert_eq!(reconciler.reconcile(tenant, ROOT, &cancel).await.unwrap().created, 2);

            // The run reads both as tracked drafts; the operator acts before it writes.
            catalog.edit_after_listing("GONE", OperatorEdit::Tracking { detached: true });
            catalog.edit_after_listing("KEEP", OperatorEdit::Status(CatalogStatus::Published));
            provider.set_children(ROOT, vec![file("KEEP", "Keep Revised.pdf", 5)]);

            let result = reconciler.reconcile(tenant, ROOT, &cancel).await.unwrap();
            assert_eq!((result.updated, result.deleted), (1, 0), "{mode:?}");
            assert!(result.errors.is_empty());

            let keep = catalog.get_by_external_id(tenant, "KEEP").await.unwrap().unwrap();
            assert_eq!(keep.title, "Keep Revised");
            assert_eq!(keep.status, CatalogStatus::Published);

            let gone = catalog.get_by_external_id(tenant, "GONE").await.unwrap().unwrap();
            assert!(gone.detached);
            assert!(!gone.is_removed());
        }
    }

    #[tokio::test]
    async fn exhausted_slug_budget_is_isolated_to_the_item() {
        let catalog = Arc::new(InterferingCatalog::contesting("report"));
        let config = ReconcilerConfig::default().with_allocator(SlugAllocator::default().with_max_attempts(3));
        let (reconciler, provider) = reconciler_over(catalog, config);

        provider.set_children(ROOT, vec![file("D1", "Report.pdf", 0), file("D2", "Summary.pdf", 0)]);
        let tenant = TenantId::new();
        let result = reconciler.reconcile(tenant, ROOT, &CancellationToken::new()).await.unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].external_id, "D1");
        assert_eq!(result.errors[0].kind, SyncErrorKind::SlugCollision);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_runs_never_share_a_slug() {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let provider = Arc::new(InMemoryListingProvider::new());
        let order_store: Arc<dyn OrderStore> = Arc::new(InMemoryOrderStore::new());
        let access = Arc::new(AccessTokenService::new(order_store, AccessConfig::default()));
        let reconciler = Arc::new(Reconciler::new(
            catalog.clone(),
            provider.clone(),
            access,
            ReconcilerConfig::default(),
        ));

        let roots: Vec<String> = (0..4).map(|r| format!("ROOT{r}")).collect();
        for root in &roots {
            let entries = (0..5).map(|i| file(&format!("{root}-{i}"), "Report.pdf", 0)).collect();
            provider.set_children(root, entries);
        }

        let tenant = TenantId::new();
        let mut runs = tokio::task::JoinSet::new();
        for root in roots.clone() {
            let reconciler = reconciler.clone();
            runs.spawn(async move { reconciler.reconcile(tenant, &root, &CancellationToken::new()).await });
        }
        let mut created = 0;
        while let Some(run) = runs.join_next().await {
            let result = run.unwrap().unwrap();
            assert!(result.errors.is_empty(), "{result:?}");
            created += result.created;
        }

        assert_eq!(created, 20);
        let slugs = catalog.slugs(tenant).await.unwrap();
        assert_eq!(slugs.len(), 20);
        assert!(slugs.contains("report"));
        assert!(slugs.contains("report-20"));
    }

    #[tokio::test]
    async fn tenants_do_not_see_each_others_orders() {
        let h = Harness::new(ReconcilerConfig::default());
        let order = h
            .orders
            .place_order(
                h.tenant,
                NewOrder {
                    purchaser_id: SubjectId::new(),
                    item_type: ItemType::Product,
                    item_ref: "sku-1".into(),
                },
            )
            .await
            .unwrap();

        let other = TenantId::new();
        assert_eq!(
            h.orders.get_order(other, order.id_typed()).await.unwrap_err(),
            FulfillmentError::Domain(DomainError::NotFound)
        );
        assert!(h.orders.get_order(h.tenant, OrderId::new()).await.is_err());
    }
}
