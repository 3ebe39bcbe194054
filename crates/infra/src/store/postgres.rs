//! Postgres-backed document stores.
//!
//! ## Error Mapping
//!
//! | SQLx error                         | Code    | StoreError            |
//! |------------------------------------|---------|-----------------------|
//! | unique violation on slug           | `23505` | `SlugTaken`           |
//! | unique violation on external id    | `23505` | `DuplicateExternalId` |
//! | unique violation (other)           | `23505` | `Conflict`            |
//! | anything else                      | any     | `Backend`             |
//!
//! ## Tenant Isolation
//!
//! Every query includes `tenant_id` in the WHERE clause or the primary key.
//!
//! ## Catalog Writes
//!
//! Sync writes carry `AND NOT detached` in their WHERE clause and touch only
//! source columns. Operator edits lock the row, apply the domain rule, and
//! write back `status`, `detached` and `updated_at`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;

use storefront_catalog::{CatalogItem, CatalogStatus, OperatorEdit};
use storefront_core::{AggregateRoot, CatalogItemId, ExpectedVersion, OrderId, TenantId, TokenId};
use storefront_orders::{AccessToken, Order};
use storefront_storage::StorageReference;

use super::{CatalogStore, OrderStore, StoreError, TokenOwner};

const SLUG_CONSTRAINT: &str = "catalog_items_slug_key";
const EXTERNAL_ID_CONSTRAINT: &str = "catalog_items_external_id_key";

/// Schema for the stores in this module. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS catalog_items (
    tenant_id          UUID        NOT NULL,
    id                 UUID        NOT NULL,
    root_folder_id     TEXT        NOT NULL,
    external_id        TEXT        NOT NULL,
    is_folder          BOOLEAN     NOT NULL,
    slug               TEXT        NOT NULL,
    title              TEXT        NOT NULL,
    excerpt            TEXT,
    metadata           JSONB       NOT NULL DEFAULT '{}'::jsonb,
    source_modified_at TIMESTAMPTZ NOT NULL,
    status             TEXT        NOT NULL,
    detached           BOOLEAN     NOT NULL DEFAULT FALSE,
    removed_at         TIMESTAMPTZ,
    created_at         TIMESTAMPTZ NOT NULL,
    updated_at         TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (tenant_id, id),
    CONSTRAINT catalog_items_slug_key UNIQUE (tenant_id, slug),
    CONSTRAINT catalog_items_external_id_key UNIQUE (tenant_id, external_id)
);

CREATE INDEX IF NOT EXISTS catalog_items_root_idx
    ON catalog_items (tenant_id, root_folder_id);

CREATE TABLE IF NOT EXISTS orders (
    tenant_id  UUID        NOT NULL,
    id         UUID        NOT NULL,
    version    BIGINT      NOT NULL,
    document   JSONB       NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (tenant_id, id)
);

CREATE TABLE IF NOT EXISTS access_tokens (
    token_id   UUID        PRIMARY KEY,
    tenant_id  UUID        NOT NULL,
    order_id   UUID        NOT NULL,
    subject_id UUID        NOT NULL,
    issued_at  TIMESTAMPTZ NOT NULL,
    revoked    BOOLEAN     NOT NULL DEFAULT FALSE,
    revoked_at TIMESTAMPTZ,
    FOREIGN KEY (tenant_id, order_id) REFERENCES orders (tenant_id, id)
);

CREATE UNIQUE INDEX IF NOT EXISTS access_tokens_one_live_per_order
    ON access_tokens (tenant_id, order_id) WHERE NOT revoked;
"#;

/// Create the tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            if db_err.code().as_deref() != Some("23505") {
                return StoreError::Backend(msg);
            }
            match db_err.constraint() {
                Some(SLUG_CONSTRAINT) => StoreError::SlugTaken(msg),
                Some(EXTERNAL_ID_CONSTRAINT) => StoreError::DuplicateExternalId(msg),
                _ => StoreError::Conflict(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn decode_error(operation: &str, err: impl core::fmt::Display) -> StoreError {
    StoreError::Backend(format!("failed to decode row in {operation}: {err}"))
}

/// Postgres-backed catalog store.
///
/// Slug and external-id uniqueness are table constraints, so a racing writer
/// loses at INSERT time and gets `SlugTaken` back.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Outcome of a write guarded by `NOT detached`: nothing matched means the
    /// row is either detached (skipped) or gone.
    async fn tracked_write(&self, rows_affected: u64, tenant_id: TenantId, id: CatalogItemId) -> Result<bool, StoreError> {
        if rows_affected > 0 {
            return Ok(true);
        }
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM catalog_items WHERE tenant_id = $1 AND id = $2)")
                .bind(tenant_id.as_uuid())
                .bind(id.as_uuid())
                .fetch_one(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("catalog_item_exists", e))?;
        if exists { Ok(false) } else { Err(StoreError::NotFound) }
    }
}

const CATALOG_COLUMNS: &str = "tenant_id, id, root_folder_id, external_id, is_folder, slug, title, \
     excerpt, metadata, source_modified_at, status, detached, removed_at, created_at, updated_at";

#[derive(Debug)]
struct CatalogItemRow {
    tenant_id: uuid::Uuid,
    id: uuid::Uuid,
    root_folder_id: String,
    external_id: String,
    is_folder: bool,
    slug: String,
    title: String,
    excerpt: Option<String>,
    metadata: serde_json::Value,
    source_modified_at: DateTime<Utc>,
    status: String,
    detached: bool,
    removed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for CatalogItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(CatalogItemRow {
            tenant_id: row.try_get("tenant_id")?,
            id: row.try_get("id")?,
            root_folder_id: row.try_get("root_folder_id")?,
            external_id: row.try_get("external_id")?,
            is_folder: row.try_get("is_folder")?,
            slug: row.try_get("slug")?,
            title: row.try_get("title")?,
            excerpt: row.try_get("excerpt")?,
            metadata: row.try_get("metadata")?,
            source_modified_at: row.try_get("source_modified_at")?,
            status: row.try_get("status")?,
            detached: row.try_get("detached")?,
            removed_at: row.try_get("removed_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<CatalogItemRow> for CatalogItem {
    type Error = StoreError;

    fn try_from(row: CatalogItemRow) -> Result<Self, Self::Error> {
        let metadata: BTreeMap<String, String> =
            serde_json::from_value(row.metadata).map_err(|e| decode_error("catalog_items", e))?;
        let status: CatalogStatus = row.status.parse().map_err(|e| decode_error("catalog_items", e))?;
        Ok(CatalogItem {
            id: CatalogItemId::from_uuid(row.id),
            tenant_id: TenantId::from_uuid(row.tenant_id),
            root_folder_id: row.root_folder_id,
            external_id: row.external_id,
            is_folder: row.is_folder,
            slug: row.slug,
            title: row.title,
            excerpt: row.excerpt,
            metadata,
            source_modified_at: row.source_modified_at,
            status,
            detached: row.detached,
            removed_at: row.removed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn metadata_json(item: &CatalogItem) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(&item.metadata).map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    #[instrument(skip(self, item), fields(tenant_id = %item.tenant_id, slug = %item.slug), err)]
    async fn insert(&self, item: &CatalogItem) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO catalog_items ({CATALOG_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        ))
        .bind(item.tenant_id.as_uuid())
        .bind(item.id.as_uuid())
        .bind(&item.root_folder_id)
        .bind(&item.external_id)
        .bind(item.is_folder)
        .bind(&item.slug)
        .bind(&item.title)
        .bind(&item.excerpt)
        .bind(metadata_json(item)?)
        .bind(item.source_modified_at)
        .bind(item.status.as_str())
        .bind(item.detached)
        .bind(item.removed_at)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert_catalog_item", e) {
            StoreError::SlugTaken(_) => StoreError::SlugTaken(item.slug.clone()),
            StoreError::DuplicateExternalId(_) => {
                StoreError::DuplicateExternalId(item.external_id.clone())
            }
            other => other,
        })?;
        Ok(())
    }

    #[instrument(skip(self, item), fields(tenant_id = %item.tenant_id, slug = %item.slug), err)]
    async fn refresh_source(&self, item: &CatalogItem) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE catalog_items
            SET root_folder_id = $3,
                title = $4,
                metadata = $5,
                source_modified_at = $6,
                removed_at = $7,
                updated_at = $8
            WHERE tenant_id = $1 AND id = $2 AND NOT detached
            "#,
        )
        .bind(item.tenant_id.as_uuid())
        .bind(item.id.as_uuid())
        .bind(&item.root_folder_id)
        .bind(&item.title)
        .bind(metadata_json(item)?)
        .bind(item.source_modified_at)
        .bind(item.removed_at)
        .bind(item.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("refresh_catalog_item", e))?;

        self.tracked_write(result.rows_affected(), item.tenant_id, item.id).await
    }

    async fn archive(&self, tenant_id: TenantId, id: CatalogItemId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE catalog_items SET removed_at = $3, updated_at = $3 \
             WHERE tenant_id = $1 AND id = $2 AND NOT detached",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("archive_catalog_item", e))?;

        self.tracked_write(result.rows_affected(), tenant_id, id).await
    }

    async fn remove(&self, tenant_id: TenantId, id: CatalogItemId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM catalog_items WHERE tenant_id = $1 AND id = $2 AND NOT detached")
            .bind(tenant_id.as_uuid())
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_catalog_item", e))?;

        self.tracked_write(result.rows_affected(), tenant_id, id).await
    }

    #[instrument(skip(self), err)]
    async fn apply_edit(
        &self,
        tenant_id: TenantId,
        id: CatalogItemId,
        edit: OperatorEdit,
        at: DateTime<Utc>,
    ) -> Result<CatalogItem, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_catalog_edit", e))?;

        let row: Option<CatalogItemRow> = sqlx::query_as(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE tenant_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_catalog_item", e))?;

        let mut item = CatalogItem::try_from(row.ok_or(StoreError::NotFound)?)?;
        item.apply_edit(edit, at)?;

        sqlx::query(
            "UPDATE catalog_items SET status = $3, detached = $4, updated_at = $5 \
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .bind(item.status.as_str())
        .bind(item.detached)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("edit_catalog_item", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_catalog_edit", e))?;
        Ok(item)
    }

    async fn get(&self, tenant_id: TenantId, id: CatalogItemId) -> Result<Option<CatalogItem>, StoreError> {
        let row: Option<CatalogItemRow> = sqlx::query_as(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE tenant_id = $1 AND id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_catalog_item", e))?;
        row.map(CatalogItem::try_from).transpose()
    }

    async fn get_by_slug(&self, tenant_id: TenantId, slug: &str) -> Result<Option<CatalogItem>, StoreError> {
        let row: Option<CatalogItemRow> = sqlx::query_as(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE tenant_id = $1 AND slug = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(slug)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_catalog_item_by_slug", e))?;
        row.map(CatalogItem::try_from).transpose()
    }

    async fn get_by_external_id(
        &self,
        tenant_id: TenantId,
        external_id: &str,
    ) -> Result<Option<CatalogItem>, StoreError> {
        let row: Option<CatalogItemRow> = sqlx::query_as(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_items WHERE tenant_id = $1 AND external_id = $2"
        ))
        .bind(tenant_id.as_uuid())
        .bind(external_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_catalog_item_by_external_id", e))?;
        row.map(CatalogItem::try_from).transpose()
    }

    async fn list_root(&self, tenant_id: TenantId, root_folder_id: &str) -> Result<Vec<CatalogItem>, StoreError> {
        let rows: Vec<CatalogItemRow> = sqlx::query_as(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalog_items \
             WHERE tenant_id = $1 AND root_folder_id = $2 ORDER BY external_id"
        ))
        .bind(tenant_id.as_uuid())
        .bind(root_folder_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_catalog_root", e))?;
        rows.into_iter().map(CatalogItem::try_from).collect()
    }

    async fn slugs(&self, tenant_id: TenantId) -> Result<HashSet<String>, StoreError> {
        let slugs: Vec<String> = sqlx::query_scalar("SELECT slug FROM catalog_items WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_catalog_slugs", e))?;
        Ok(slugs.into_iter().collect())
    }
}

/// Postgres-backed order store.
///
/// Orders are JSONB documents with a `version` column used for
/// compare-and-swap. Tokens are mirrored into `access_tokens` inside the same
/// transaction; its partial unique index rejects a second live token.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn decode_order(document: serde_json::Value) -> Result<Order, StoreError> {
    serde_json::from_value(document).map_err(|e| decode_error("orders", e))
}

/// Token rows a save has to write. Tokens the stored document already holds
/// in the same state are skipped, so a save costs one statement per change.
#[derive(Debug, Default)]
struct TokenChanges<'a> {
    revoked: Vec<&'a AccessToken>,
    issued: Vec<&'a AccessToken>,
}

fn token_changes<'a>(previous: Option<&Order>, next: &'a Order) -> TokenChanges<'a> {
    let stored: HashMap<TokenId, bool> = previous
        .map(|order| order.tokens().iter().map(|t| (t.token_id, t.revoked)).collect())
        .unwrap_or_default();

    let mut changes = TokenChanges::default();
    for token in next.tokens() {
        match stored.get(&token.token_id) {
            None => changes.issued.push(token),
            Some(false) if token.revoked => changes.revoked.push(token),
            Some(_) => {}
        }
    }
    changes
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn get(&self, tenant_id: TenantId, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let document: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT document FROM orders WHERE tenant_id = $1 AND id = $2")
                .bind(tenant_id.as_uuid())
                .bind(order_id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_order", e))?;
        document.map(decode_order).transpose()
    }

    #[instrument(
        skip(self, order),
        fields(order_id = %order.id_typed(), version = order.version()),
        err
    )]
    async fn save(&self, order: &Order, expected: ExpectedVersion) -> Result<(), StoreError> {
        let tenant_id = order
            .tenant_id()
            .ok_or_else(|| StoreError::Backend("order has no tenant".to_string()))?;
        let order_id = order.id_typed();
        let document = serde_json::to_value(order).map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current: Option<(i64, serde_json::Value)> = sqlx::query_as(
            "SELECT version, document FROM orders WHERE tenant_id = $1 AND id = $2 FOR UPDATE",
        )
        .bind(tenant_id.as_uuid())
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("lock_order", e))?;

        let current_version = current.as_ref().map(|(v, _)| *v as u64).unwrap_or(0);
        if !expected.matches(current_version) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Conflict(format!(
                "expected {expected:?}, found {current_version}"
            )));
        }

        let (current, previous) = match current {
            Some((v, stored)) => (Some(v), Some(decode_order(stored)?)),
            None => (None, None),
        };

        match current {
            None => {
                sqlx::query("INSERT INTO orders (tenant_id, id, version, document) VALUES ($1, $2, $3, $4)")
                    .bind(tenant_id.as_uuid())
                    .bind(order_id.as_uuid())
                    .bind(order.version() as i64)
                    .bind(&document)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("insert_order", e))?;
            }
            Some(v) => {
                sqlx::query(
                    "UPDATE orders SET version = $3, document = $4, updated_at = now() \
                     WHERE tenant_id = $1 AND id = $2 AND version = $5",
                )
                .bind(tenant_id.as_uuid())
                .bind(order_id.as_uuid())
                .bind(order.version() as i64)
                .bind(&document)
                .bind(v)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("update_order", e))?;
            }
        }

        let changes = token_changes(previous.as_ref(), order);
        // Revocations first, so the partial unique index sees at most one live row.
        for token in changes.revoked {
            sqlx::query(
                "UPDATE access_tokens SET revoked = TRUE, revoked_at = $2 \
                 WHERE token_id = $1 AND NOT revoked",
            )
            .bind(token.token_id.as_uuid())
            .bind(token.revoked_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("revoke_token", e))?;
        }
        for token in changes.issued {
            sqlx::query(
                r#"
                INSERT INTO access_tokens
                    (token_id, tenant_id, order_id, subject_id, issued_at, revoked, revoked_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (token_id) DO NOTHING
                "#,
            )
            .bind(token.token_id.as_uuid())
            .bind(tenant_id.as_uuid())
            .bind(order_id.as_uuid())
            .bind(token.subject_id.as_uuid())
            .bind(token.issued_at)
            .bind(token.revoked)
            .bind(token.revoked_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_token", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    async fn list(&self, tenant_id: TenantId) -> Result<Vec<Order>, StoreError> {
        let documents: Vec<serde_json::Value> =
            sqlx::query_scalar("SELECT document FROM orders WHERE tenant_id = $1 ORDER BY id")
                .bind(tenant_id.as_uuid())
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_orders", e))?;
        documents.into_iter().map(decode_order).collect()
    }

    async fn list_by_reference(
        &self,
        tenant_id: TenantId,
        reference: &StorageReference,
    ) -> Result<Vec<Order>, StoreError> {
        let reference =
            serde_json::to_value(reference).map_err(|e| StoreError::Backend(e.to_string()))?;
        let documents: Vec<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT document FROM orders
            WHERE tenant_id = $1
              AND (document -> 'solution' ->> 'isEnabled')::boolean
              AND document -> 'solution' -> 'reference' = $2
            ORDER BY id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(reference)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders_by_reference", e))?;
        documents.into_iter().map(decode_order).collect()
    }

    async fn token_owner(&self, token_id: TokenId) -> Result<Option<TokenOwner>, StoreError> {
        let row = sqlx::query("SELECT tenant_id, order_id FROM access_tokens WHERE token_id = $1")
            .bind(token_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_token_owner", e))?;

        row.map(|r| -> Result<TokenOwner, StoreError> {
            let tenant_id: uuid::Uuid = r.try_get("tenant_id").map_err(|e| decode_error("access_tokens", e))?;
            let order_id: uuid::Uuid = r.try_get("order_id").map_err(|e| decode_error("access_tokens", e))?;
            Ok(TokenOwner {
                tenant_id: TenantId::from_uuid(tenant_id),
                order_id: OrderId::from_uuid(order_id),
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::{Aggregate, SubjectId};
    use storefront_orders::{DisableSolution, EnableSolution, ItemType, OrderCommand, PlaceOrder};

    fn placed_book(tenant: TenantId) -> Order {
        let id = OrderId::new();
        let mut order = Order::empty(id);
        order
            .execute(&OrderCommand::PlaceOrder(PlaceOrder {
                tenant_id: tenant,
                order_id: id,
                purchaser_id: SubjectId::new(),
                item_type: ItemType::Book,
                item_ref: "book".into(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        order
    }

    fn enable(order: &mut Order, tenant: TenantId, token_id: TokenId) {
        order
            .execute(&OrderCommand::EnableSolution(EnableSolution {
                tenant_id: tenant,
                order_id: order.id_typed(),
                reference: StorageReference::folder("F1").unwrap(),
                token_id,
                occurred_at: Utc::now(),
            }))
            .unwrap();
    }

    fn ids(tokens: &[&AccessToken]) -> Vec<TokenId> {
        tokens.iter().map(|t| t.token_id).collect()
    }

    #[test]
    fn first_save_issues_every_token() {
        let tenant = TenantId::new();
        let mut order = placed_book(tenant);
        let token = TokenId::new();
        enable(&mut order, tenant, token);

        let changes = token_changes(None, &order);
        assert_eq!(ids(&changes.issued), vec![token]);
        assert!(changes.revoked.is_empty());
    }

    #[test]
    fn resaves_only_touch_tokens_that_changed() {
        let tenant = TenantId::new();
        let mut order = placed_book(tenant);
        let mut issued = Vec::new();
        for _ in 0..5 {
            let token = TokenId::new();
            enable(&mut order, tenant, token);
            issued.push(token);
        }
        let stored = order.clone();

        // Rotating once more revokes the live token and issues one fresh one.
        let fresh = TokenId::new();
        enable(&mut order, tenant, fresh);
        let changes = token_changes(Some(&stored), &order);
        assert_eq!(ids(&changes.issued), vec![fresh]);
        assert_eq!(ids(&changes.revoked), vec![issued[4]]);

        // Disabling revokes only the live one; the history is left alone.
        let stored = order.clone();
        order
            .execute(&OrderCommand::DisableSolution(DisableSolution {
                tenant_id: tenant,
                order_id: order.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        let changes = token_changes(Some(&stored), &order);
        assert!(changes.issued.is_empty());
        assert_eq!(ids(&changes.revoked), vec![fresh]);

        assert!(token_changes(Some(&order), &order).revoked.is_empty());
        assert!(token_changes(Some(&order), &order).issued.is_empty());
    }
}
