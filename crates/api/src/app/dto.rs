use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

use storefront_catalog::{CatalogItem, CatalogStatus};
use storefront_core::{OrderId, SubjectId, TokenId};
use storefront_orders::{ItemType, Order, OrderStatus};
use storefront_storage::{StorageReference, ViewingUrl};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub item_type: ItemType,
    pub item_ref: String,
    /// Operators may place on behalf of a purchaser; customers always place for themselves.
    pub purchaser_id: Option<SubjectId>,
}

#[derive(Debug, Deserialize)]
pub struct SetOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableSolutionRequest {
    pub raw_url: String,
}

#[derive(Debug, Deserialize)]
pub struct SetCatalogStatusRequest {
    pub status: CatalogStatus,
}

#[derive(Debug, Deserialize)]
pub struct SetTrackingRequest {
    pub detached: bool,
}

#[derive(Debug, Deserialize)]
pub struct CatalogListQuery {
    pub root: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionView {
    pub is_enabled: bool,
    /// Normalized `{kind, id}`. Only operators see it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<StorageReference>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub purchaser_id: Option<SubjectId>,
    pub item_type: ItemType,
    pub item_ref: String,
    pub status: OrderStatus,
    pub solution: SolutionView,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl OrderView {
    fn build(order: &Order, reference: Option<StorageReference>) -> Self {
        Self {
            id: order.id_typed(),
            purchaser_id: order.purchaser_id(),
            item_type: order.item_type(),
            item_ref: order.item_ref().to_string(),
            status: order.status(),
            solution: SolutionView {
                is_enabled: order.solution().is_enabled,
                reference,
            },
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }

    pub fn for_operator(order: &Order) -> Self {
        Self::build(order, order.solution().reference.clone())
    }

    /// The purchaser goes through the access token to reach the solution.
    pub fn for_purchaser(order: &Order) -> Self {
        Self::build(order, None)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenView {
    pub token_id: TokenId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerResponse {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

impl From<ViewingUrl> for ViewerResponse {
    fn from(value: ViewingUrl) -> Self {
        Self {
            url: value.url,
            expires_at: value.expires_at,
        }
    }
}

/// Catalog entry as customers see it: no source ids, no bookkeeping.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCatalogItem {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub is_folder: bool,
    pub metadata: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&CatalogItem> for PublicCatalogItem {
    fn from(item: &CatalogItem) -> Self {
        Self {
            slug: item.slug.clone(),
            title: item.title.clone(),
            excerpt: item.excerpt.clone(),
            is_folder: item.is_folder,
            metadata: item.metadata.clone(),
            updated_at: item.source_modified_at,
        }
    }
}
