//! Partition an observed listing against the persisted catalog.

use std::collections::{BTreeMap, HashMap};

use crate::item::CatalogItem;
use crate::listing::ObservedEntry;

/// An existing item together with the listing entry that supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub current: CatalogItem,
    pub observed: ObservedEntry,
}

/// The minimal set of writes that brings the local catalog in line with a
/// listing. Each set is ordered by external id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_create: Vec<ObservedEntry>,
    pub to_update: Vec<Update>,
    pub to_delete: Vec<CatalogItem>,
    /// External ids reported more than once by the listing. Only the first
    /// occurrence takes part in the plan.
    pub duplicates: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }
}

/// Compute the plan for one root.
///
/// Detached items are left alone whether or not they still appear in the
/// listing. Items already archived by an earlier run are not deleted again,
/// and come back as updates if their entry reappears.
pub fn plan(observed: &[ObservedEntry], local: &[CatalogItem]) -> SyncPlan {
    let mut seen: BTreeMap<&str, &ObservedEntry> = BTreeMap::new();
    let mut duplicates = Vec::new();
    for entry in observed {
        if seen.contains_key(entry.external_id.as_str()) {
            duplicates.push(entry.external_id.clone());
        } else {
            seen.insert(entry.external_id.as_str(), entry);
        }
    }

    let by_external: HashMap<&str, &CatalogItem> =
        local.iter().map(|i| (i.external_id.as_str(), i)).collect();

    let mut out = SyncPlan {
        duplicates,
        ..Default::default()
    };

    for (external_id, entry) in &seen {
        match by_external.get(external_id) {
            None => out.to_create.push((*entry).clone()),
            Some(item) if item.detached => {}
            Some(item) if item.needs_sync(entry) => out.to_update.push(Update {
                current: (*item).clone(),
                observed: (*entry).clone(),
            }),
            Some(_) => {}
        }
    }

    let mut to_delete: Vec<CatalogItem> = local
        .iter()
        .filter(|i| !i.detached && !i.is_removed())
        .filter(|i| !seen.contains_key(i.external_id.as_str()))
        .cloned()
        .collect();
    to_delete.sort_by(|a, b| a.external_id.cmp(&b.external_id));
    out.to_delete = to_delete;

    out
}
