use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use storefront_catalog::{CatalogItem, OperatorEdit};
use storefront_core::{
    AggregateRoot, CatalogItemId, Entity, ExpectedVersion, OrderId, TenantId, TenantScoped, TokenId,
};
use storefront_orders::Order;
use storefront_storage::StorageReference;

use super::{CatalogStore, OrderStore, StoreError, TokenOwner};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory catalog store for tests/dev.
///
/// A single lock guards the items together with the unique check, so an
/// insert either claims its slug or fails with `SlugTaken`.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    inner: RwLock<HashMap<(TenantId, CatalogItemId), CatalogItem>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn insert(&self, item: &CatalogItem) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        for existing in map.values().filter(|i| i.belongs_to(item.tenant_id)) {
            if existing.slug == item.slug {
                return Err(StoreError::SlugTaken(item.slug.clone()));
            }
            if existing.external_id == item.external_id {
                return Err(StoreError::DuplicateExternalId(item.external_id.clone()));
            }
        }
        map.insert((item.tenant_id(), *item.id()), item.clone());
        Ok(())
    }

    async fn refresh_source(&self, item: &CatalogItem) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let slot = map
            .get_mut(&(item.tenant_id(), *item.id()))
            .ok_or(StoreError::NotFound)?;
        if slot.detached {
            return Ok(false);
        }
        slot.root_folder_id = item.root_folder_id.clone();
        slot.title = item.title.clone();
        slot.metadata = item.metadata.clone();
        slot.source_modified_at = item.source_modified_at;
        slot.removed_at = item.removed_at;
        slot.updated_at = item.updated_at;
        Ok(true)
    }

    async fn archive(&self, tenant_id: TenantId, id: CatalogItemId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let slot = map.get_mut(&(tenant_id, id)).ok_or(StoreError::NotFound)?;
        if slot.detached {
            return Ok(false);
        }
        slot.mark_removed(at);
        Ok(true)
    }

    async fn remove(&self, tenant_id: TenantId, id: CatalogItemId) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let detached = map.get(&(tenant_id, id)).ok_or(StoreError::NotFound)?.detached;
        if detached {
            return Ok(false);
        }
        map.remove(&(tenant_id, id));
        Ok(true)
    }

    async fn apply_edit(
        &self,
        tenant_id: TenantId,
        id: CatalogItemId,
        edit: OperatorEdit,
        at: DateTime<Utc>,
    ) -> Result<CatalogItem, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let slot = map.get_mut(&(tenant_id, id)).ok_or(StoreError::NotFound)?;
        let mut edited = slot.clone();
        edited.apply_edit(edit, at)?;
        *slot = edited.clone();
        Ok(edited)
    }

    async fn get(&self, tenant_id: TenantId, id: CatalogItemId) -> Result<Option<CatalogItem>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&(tenant_id, id)).cloned())
    }

    async fn get_by_slug(&self, tenant_id: TenantId, slug: &str) -> Result<Option<CatalogItem>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .values()
            .find(|i| i.belongs_to(tenant_id) && i.slug == slug)
            .cloned())
    }

    async fn get_by_external_id(
        &self,
        tenant_id: TenantId,
        external_id: &str,
    ) -> Result<Option<CatalogItem>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .values()
            .find(|i| i.belongs_to(tenant_id) && i.external_id == external_id)
            .cloned())
    }

    async fn list_root(&self, tenant_id: TenantId, root_folder_id: &str) -> Result<Vec<CatalogItem>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut items: Vec<_> = map
            .values()
            .filter(|i| i.belongs_to(tenant_id) && i.root_folder_id == root_folder_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(items)
    }

    async fn slugs(&self, tenant_id: TenantId) -> Result<HashSet<String>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .values()
            .filter(|i| i.belongs_to(tenant_id))
            .map(|i| i.slug.clone())
            .collect())
    }
}

#[derive(Debug, Default)]
struct OrderTables {
    orders: HashMap<(TenantId, OrderId), Order>,
    tokens: HashMap<TokenId, TokenOwner>,
}

/// In-memory order store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: RwLock<OrderTables>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let tables = self.inner.read().map_err(|_| poisoned())?;
        Ok(tables.orders.get(&(tenant_id, order_id)).cloned())
    }

    async fn save(&self, order: &Order, expected: ExpectedVersion) -> Result<(), StoreError> {
        let tenant_id = order
            .tenant_id()
            .ok_or_else(|| StoreError::Backend("order has no tenant".to_string()))?;
        let order_id = order.id_typed();

        if order.tokens().iter().filter(|t| t.is_live()).count() > 1 {
            return Err(StoreError::Conflict(format!(
                "order {order_id} would hold more than one live token"
            )));
        }

        let mut tables = self.inner.write().map_err(|_| poisoned())?;
        let current = tables
            .orders
            .get(&(tenant_id, order_id))
            .map(|o| o.version())
            .unwrap_or(0);
        if !expected.matches(current) {
            return Err(StoreError::Conflict(format!(
                "expected {expected:?}, found {current}"
            )));
        }

        for token in order.tokens() {
            tables.tokens.entry(token.token_id).or_insert(TokenOwner {
                tenant_id,
                order_id,
            });
        }
        tables.orders.insert((tenant_id, order_id), order.clone());
        Ok(())
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Order>, StoreError> {
        let tables = self.inner.read().map_err(|_| poisoned())?;
        let mut orders: Vec<_> = tables
            .orders
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, o)| o.clone())
            .collect();
        orders.sort_by_key(|o| o.id_typed());
        Ok(orders)
    }

    async fn list_by_reference(
        &self,
        tenant_id: TenantId,
        reference: &StorageReference,
    ) -> Result<Vec<Order>, StoreError> {
        let tables = self.inner.read().map_err(|_| poisoned())?;
        Ok(tables
            .orders
            .iter()
            .filter(|((t, _), o)| {
                *t == tenant_id
                    && o.solution().is_enabled
                    && o.solution().reference.as_ref() == Some(reference)
            })
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn token_owner(&self, token_id: TokenId) -> Result<Option<TokenOwner>, StoreError> {
        let tables = self.inner.read().map_err(|_| poisoned())?;
        Ok(tables.tokens.get(&token_id).copied())
    }
}
