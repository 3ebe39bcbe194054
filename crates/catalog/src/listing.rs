//! Listing model: what the external provider reports, and what the reconciler
//! observed after enriching it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of a provider listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    pub id: String,
    pub name: String,
    pub modified_at: DateTime<Utc>,
    pub is_folder: bool,
}

/// One page of a provider listing. `next_page_token == None` ends the cursor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub entries: Vec<ListingEntry>,
    pub next_page_token: Option<String>,
}

/// A direct child of a sync root, enriched with subtree statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEntry {
    pub external_id: String,
    pub name: String,
    pub is_folder: bool,
    pub parent_id: String,
    /// Number of files directly inside the folder. `None` for file entries.
    pub file_count: Option<usize>,
    /// Newest modification time of the entry and its listed contents.
    pub source_modified_at: DateTime<Utc>,
}

impl ObservedEntry {
    /// A file entry (or a folder whose contents were not walked).
    pub fn leaf(entry: &ListingEntry, parent_id: &str) -> Self {
        Self {
            external_id: entry.id.clone(),
            name: entry.name.clone(),
            is_folder: entry.is_folder,
            parent_id: parent_id.to_string(),
            file_count: None,
            source_modified_at: entry.modified_at,
        }
    }

    /// A folder entry together with the entries found inside it.
    pub fn folder(entry: &ListingEntry, parent_id: &str, contents: &[ListingEntry]) -> Self {
        let newest = contents
            .iter()
            .map(|c| c.modified_at)
            .max()
            .map_or(entry.modified_at, |m| m.max(entry.modified_at));
        Self {
            external_id: entry.id.clone(),
            name: entry.name.clone(),
            is_folder: true,
            parent_id: parent_id.to_string(),
            file_count: Some(contents.iter().filter(|c| !c.is_folder).count()),
            source_modified_at: newest,
        }
    }

    /// Display title: the entry name with a trailing file extension removed.
    pub fn title(&self) -> String {
        let name = self.name.trim();
        if self.is_folder {
            return name.to_string();
        }
        match name.rfind('.') {
            Some(idx) if idx > 0 => name[..idx].trim_end().to_string(),
            _ => name.to_string(),
        }
    }

    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(
            "kind".to_string(),
            if self.is_folder { "folder" } else { "file" }.to_string(),
        );
        m.insert("parentId".to_string(), self.parent_id.clone());
        m.insert("sourceName".to_string(), self.name.clone());
        if let Some(count) = self.file_count {
            m.insert("fileCount".to_string(), count.to_string());
        }
        m
    }
}
