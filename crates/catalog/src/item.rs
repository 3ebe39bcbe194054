use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{CatalogItemId, DomainError, DomainResult, Entity, TenantId, TenantScoped};
use storefront_storage::{ReferenceError, StorageKind, StorageReference};

use crate::listing::ObservedEntry;

/// Operator-controlled publication status. Reconciliation never touches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogStatus {
    Draft,
    Published,
    Archived,
}

impl CatalogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogStatus::Draft => "draft",
            CatalogStatus::Published => "published",
            CatalogStatus::Archived => "archived",
        }
    }
}

impl core::str::FromStr for CatalogStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CatalogStatus::Draft),
            "published" => Ok(CatalogStatus::Published),
            "archived" => Ok(CatalogStatus::Archived),
            other => Err(DomainError::validation(format!("unknown catalog status '{other}'"))),
        }
    }
}

/// A change an operator makes to an item. Only operator-owned fields move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorEdit {
    Status(CatalogStatus),
    Tracking { detached: bool },
}

/// A locally mirrored entry of an external content tree.
///
/// `external_id` is the reconciliation join key and never changes. `slug` is
/// assigned once at creation and kept for the lifetime of the item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub tenant_id: TenantId,
    pub root_folder_id: String,
    pub external_id: String,
    pub is_folder: bool,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub source_modified_at: DateTime<Utc>,
    pub status: CatalogStatus,
    /// Detached items are skipped by reconciliation entirely.
    pub detached: bool,
    /// Set when a sync archived the item because it left the listing.
    pub removed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    pub fn from_observed(
        tenant_id: TenantId,
        root_folder_id: &str,
        observed: &ObservedEntry,
        slug: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CatalogItemId::new(),
            tenant_id,
            root_folder_id: root_folder_id.to_string(),
            external_id: observed.external_id.clone(),
            is_folder: observed.is_folder,
            slug,
            title: observed.title(),
            excerpt: None,
            metadata: observed.metadata(),
            source_modified_at: observed.source_modified_at,
            status: CatalogStatus::Draft,
            detached: false,
            removed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    /// Whether the observed state differs from what is stored.
    pub fn needs_sync(&self, observed: &ObservedEntry) -> bool {
        self.is_removed()
            || observed.source_modified_at > self.source_modified_at
            || self.metadata != observed.metadata()
            || self.title != observed.title()
    }

    /// Copy source-owned fields from the listing. Slug and status stay put.
    pub fn refresh_from(&mut self, observed: &ObservedEntry, now: DateTime<Utc>) {
        self.title = observed.title();
        self.metadata = observed.metadata();
        self.source_modified_at = self.source_modified_at.max(observed.source_modified_at);
        self.removed_at = None;
        self.updated_at = now;
    }

    pub fn mark_removed(&mut self, now: DateTime<Utc>) {
        self.removed_at = Some(now);
        self.updated_at = now;
    }

    pub fn set_status(&mut self, status: CatalogStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if status == CatalogStatus::Published && self.is_removed() {
            return Err(DomainError::invariant(
                "cannot publish an item that is no longer in its source listing",
            ));
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }

    pub fn set_detached(&mut self, detached: bool, now: DateTime<Utc>) {
        self.detached = detached;
        self.updated_at = now;
    }

    pub fn apply_edit(&mut self, edit: OperatorEdit, now: DateTime<Utc>) -> DomainResult<()> {
        match edit {
            OperatorEdit::Status(status) => self.set_status(status, now),
            OperatorEdit::Tracking { detached } => {
                self.set_detached(detached, now);
                Ok(())
            }
        }
    }

    /// The storage reference this item would carry on an order solution.
    pub fn storage_reference(&self) -> Result<StorageReference, ReferenceError> {
        let kind = if self.is_folder {
            StorageKind::Folder
        } else {
            StorageKind::File
        };
        StorageReference::new(kind, self.external_id.clone())
    }
}

impl Entity for CatalogItem {
    type Id = CatalogItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl TenantScoped for CatalogItem {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
