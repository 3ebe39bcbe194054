//! Document stores for catalog items and orders.
//!
//! Both stores are tenant-isolated: every read and write is keyed by
//! `(tenant_id, id)`. Uniqueness that the domain relies on is enforced here, at
//! write time:
//!
//! - catalog: one `slug` and one `external_id` per tenant
//! - orders: version compare-and-swap, and at most one live access token
//!
//! Catalog rows have two writers. Reconciliation owns the source fields and
//! operators own `status` and `detached`. Neither writer replaces the whole
//! row, so an edit landing between a sync's read and its write survives.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use storefront_catalog::{CatalogItem, OperatorEdit};
use storefront_core::{CatalogItemId, DomainError, ExpectedVersion, OrderId, TenantId, TokenId};
use storefront_orders::Order;
use storefront_storage::StorageReference;

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryCatalogStore, InMemoryOrderStore};
pub use postgres::{PostgresCatalogStore, PostgresOrderStore, ensure_schema};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("slug '{0}' is already taken")]
    SlugTaken(String),

    #[error("external id '{0}' is already tracked")]
    DuplicateExternalId(String),

    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Where an issued token lives. Written once, when the token is issued.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TokenOwner {
    pub tenant_id: TenantId,
    pub order_id: OrderId,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a new item. Fails with `SlugTaken` / `DuplicateExternalId` when
    /// the unique index rejects it; nothing is written in that case.
    async fn insert(&self, item: &CatalogItem) -> Result<(), StoreError>;

    /// Write the source-owned fields of `item` (root, title, metadata, source
    /// time, removal marker). Slug, status and `detached` are left as stored.
    ///
    /// Returns `false` without writing when the stored item is detached.
    async fn refresh_source(&self, item: &CatalogItem) -> Result<bool, StoreError>;

    /// Mark a tracked item as gone from its listing. `false` if detached.
    async fn archive(&self, tenant_id: TenantId, id: CatalogItemId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    /// Delete a tracked item. `false` if detached.
    async fn remove(&self, tenant_id: TenantId, id: CatalogItemId) -> Result<bool, StoreError>;

    /// Apply an operator edit to the current stored row and return the result.
    /// Domain rejections surface as `StoreError::Rejected`.
    async fn apply_edit(
        &self,
        tenant_id: TenantId,
        id: CatalogItemId,
        edit: OperatorEdit,
        at: DateTime<Utc>,
    ) -> Result<CatalogItem, StoreError>;

    async fn get(&self, tenant_id: TenantId, id: CatalogItemId) -> Result<Option<CatalogItem>, StoreError>;

    async fn get_by_slug(&self, tenant_id: TenantId, slug: &str) -> Result<Option<CatalogItem>, StoreError>;

    async fn get_by_external_id(
        &self,
        tenant_id: TenantId,
        external_id: &str,
    ) -> Result<Option<CatalogItem>, StoreError>;

    /// Every item mirrored from the given root, including detached and removed ones.
    async fn list_root(&self, tenant_id: TenantId, root_folder_id: &str) -> Result<Vec<CatalogItem>, StoreError>;

    /// Slugs currently taken in the tenant.
    async fn slugs(&self, tenant_id: TenantId) -> Result<HashSet<String>, StoreError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Write the whole order document if the stored version matches
    /// `expected` (an absent order counts as version 0). Token issuance and
    /// revocation recorded in the document are committed in the same write.
    async fn save(&self, order: &Order, expected: ExpectedVersion) -> Result<(), StoreError>;

    /// All orders of a tenant, including deleted ones.
    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Order>, StoreError>;

    /// Orders whose enabled solution points at `reference`.
    async fn list_by_reference(
        &self,
        tenant_id: TenantId,
        reference: &StorageReference,
    ) -> Result<Vec<Order>, StoreError>;

    async fn token_owner(&self, token_id: TokenId) -> Result<Option<TokenOwner>, StoreError>;
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn insert(&self, item: &CatalogItem) -> Result<(), StoreError> {
        (**self).insert(item).await
    }

    async fn refresh_source(&self, item: &CatalogItem) -> Result<bool, StoreError> {
        (**self).refresh_source(item).await
    }

    async fn archive(&self, tenant_id: TenantId, id: CatalogItemId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        (**self).archive(tenant_id, id, at).await
    }

    async fn remove(&self, tenant_id: TenantId, id: CatalogItemId) -> Result<bool, StoreError> {
        (**self).remove(tenant_id, id).await
    }

    async fn apply_edit(
        &self,
        tenant_id: TenantId,
        id: CatalogItemId,
        edit: OperatorEdit,
        at: DateTime<Utc>,
    ) -> Result<CatalogItem, StoreError> {
        (**self).apply_edit(tenant_id, id, edit, at).await
    }

    async fn get(&self, tenant_id: TenantId, id: CatalogItemId) -> Result<Option<CatalogItem>, StoreError> {
        (**self).get(tenant_id, id).await
    }

    async fn get_by_slug(&self, tenant_id: TenantId, slug: &str) -> Result<Option<CatalogItem>, StoreError> {
        (**self).get_by_slug(tenant_id, slug).await
    }

    async fn get_by_external_id(
        &self,
        tenant_id: TenantId,
        external_id: &str,
    ) -> Result<Option<CatalogItem>, StoreError> {
        (**self).get_by_external_id(tenant_id, external_id).await
    }

    async fn list_root(&self, tenant_id: TenantId, root_folder_id: &str) -> Result<Vec<CatalogItem>, StoreError> {
        (**self).list_root(tenant_id, root_folder_id).await
    }

    async fn slugs(&self, tenant_id: TenantId) -> Result<HashSet<String>, StoreError> {
        (**self).slugs(tenant_id).await
    }
}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn get(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        (**self).get(tenant_id, order_id).await
    }

    async fn save(&self, order: &Order, expected: ExpectedVersion) -> Result<(), StoreError> {
        (**self).save(order, expected).await
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Order>, StoreError> {
        (**self).list(tenant_id).await
    }

    async fn list_by_reference(
        &self,
        tenant_id: TenantId,
        reference: &StorageReference,
    ) -> Result<Vec<Order>, StoreError> {
        (**self).list_by_reference(tenant_id, reference).await
    }

    async fn token_owner(&self, token_id: TokenId) -> Result<Option<TokenOwner>, StoreError> {
        (**self).token_owner(token_id).await
    }
}
