//! Load → decide → compare-and-swap save, for the order aggregate.
//!
//! ```text
//! OrderCommand
//!   ↓
//! 1. Load the order document (tenant-scoped; absent = not yet placed)
//!   ↓
//! 2. Handle + apply (pure, produces events)
//!   ↓
//! 3. Save with ExpectedVersion::Exact(loaded version)
//!   ↓  conflict? reload and go again, up to `max_retries`
//! ```
//!
//! Status flips and token grant/revoke are events of the same command, so they
//! land in the one document write.

use std::sync::Arc;

use storefront_core::{Aggregate, AggregateRoot, ExpectedVersion};
use storefront_orders::{Order, OrderCommand, OrderEvent};

use super::FulfillmentError;
use crate::store::{OrderStore, StoreError};

/// The order after a command, plus what the command did.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub order: Order,
    pub events: Vec<OrderEvent>,
}

#[derive(Clone)]
pub struct OrderDispatcher {
    store: Arc<dyn OrderStore>,
    max_retries: usize,
}

impl OrderDispatcher {
    pub fn new(store: Arc<dyn OrderStore>, max_retries: usize) -> Self {
        Self { store, max_retries }
    }

    /// Execute `command` against the stored order.
    ///
    /// A command that decides nothing (idempotent disable, same status) is not
    /// written and returns the current order with no events.
    pub async fn dispatch(&self, command: &OrderCommand) -> Result<Dispatched, FulfillmentError> {
        let tenant_id = command.tenant_id();
        let order_id = command.order_id();

        let mut attempt = 0;
        loop {
            let mut order = self
                .store
                .get(tenant_id, order_id)
                .await?
                .unwrap_or_else(|| Order::empty(order_id));
            let loaded_version = order.version();

            let events = order.execute(command)?;
            if events.is_empty() {
                return Ok(Dispatched { order, events });
            }

            match self
                .store
                .save(&order, ExpectedVersion::Exact(loaded_version))
                .await
            {
                Ok(()) => {
                    for event in &events {
                        tracing::info!(
                            tenant_id = %tenant_id,
                            order_id = %order_id,
                            event_type = event.event_type(),
                            version = order.version(),
                            "order event committed"
                        );
                    }
                    return Ok(Dispatched { order, events });
                }
                Err(StoreError::Conflict(msg)) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(order_id = %order_id, attempt, %msg, "order write conflicted, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storefront_core::{DomainError, OrderId, SubjectId, TenantId, TokenId};
    use storefront_orders::{DisableSolution, ItemType, PlaceOrder};
    use storefront_storage::StorageReference;

    use crate::store::{InMemoryOrderStore, TokenOwner};

    fn place(tenant: TenantId, order_id: OrderId) -> OrderCommand {
        OrderCommand::PlaceOrder(PlaceOrder {
            tenant_id: tenant,
            order_id,
            purchaser_id: SubjectId::new(),
            item_type: ItemType::Book,
            item_ref: "book-1".into(),
            occurred_at: Utc::now(),
        })
    }

    #[tokio::test]
    async fn place_is_saved_and_noop_commands_are_not_written() {
        let store = Arc::new(InMemoryOrderStore::new());
        let dispatcher = OrderDispatcher::new(store.clone(), 3);
        let tenant = TenantId::new();
        let order_id = OrderId::new();

        let placed = dispatcher.dispatch(&place(tenant, order_id)).await.unwrap();
        assert_eq!(placed.events.len(), 1);
        assert_eq!(store.get(tenant, order_id).await.unwrap().unwrap().version(), 1);

        let disable = OrderCommand::DisableSolution(DisableSolution {
            tenant_id: tenant,
            order_id,
            occurred_at: Utc::now(),
        });
        let out = dispatcher.dispatch(&disable).await.unwrap();
        assert!(out.events.is_empty());
        assert_eq!(store.get(tenant, order_id).await.unwrap().unwrap().version(), 1);
    }

    #[tokio::test]
    async fn other_tenants_cannot_see_the_order() {
        let store = Arc::new(InMemoryOrderStore::new());
        let dispatcher = OrderDispatcher::new(store, 3);
        let order_id = OrderId::new();
        dispatcher.dispatch(&place(TenantId::new(), order_id)).await.unwrap();

        let disable = OrderCommand::DisableSolution(DisableSolution {
            tenant_id: TenantId::new(),
            order_id,
            occurred_at: Utc::now(),
        });
        assert_eq!(
            dispatcher.dispatch(&disable).await.unwrap_err(),
            FulfillmentError::Domain(DomainError::NotFound)
        );
    }

    /// Fails the first `conflicts` saves with a version conflict.
    struct FlakyStore {
        inner: InMemoryOrderStore,
        conflicts: AtomicUsize,
    }

    #[async_trait]
    impl OrderStore for FlakyStore {
        async fn get(&self, t: TenantId, id: OrderId) -> Result<Option<Order>, StoreError> {
            self.inner.get(t, id).await
        }
        async fn save(&self, order: &Order, expected: ExpectedVersion) -> Result<(), StoreError> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::Conflict("raced".into()));
            }
            self.inner.save(order, expected).await
        }
        async fn list(&self, t: TenantId) -> Result<Vec<Order>, StoreError> {
            self.inner.list(t).await
        }
        async fn list_by_reference(&self, t: TenantId, r: &StorageReference) -> Result<Vec<Order>, StoreError> {
            self.inner.list_by_reference(t, r).await
        }
        async fn token_owner(&self, id: TokenId) -> Result<Option<TokenOwner>, StoreError> {
            self.inner.token_owner(id).await
        }
    }

    #[tokio::test]
    async fn conflicts_are_retried_then_reported() {
        let flaky = Arc::new(FlakyStore {
            inner: InMemoryOrderStore::new(),
            conflicts: AtomicUsize::new(2),
        });
        let dispatcher = OrderDispatcher::new(flaky.clone(), 2);
        dispatcher.dispatch(&place(TenantId::new(), OrderId::new())).await.unwrap();

        flaky.conflicts.store(5, Ordering::SeqCst);
        let err = dispatcher
            .dispatch(&place(TenantId::new(), OrderId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Store(StoreError::Conflict(_))));
    }
}
