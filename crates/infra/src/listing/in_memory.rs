use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use storefront_catalog::{ListingEntry, ListingPage};

use super::{ListingProvider, ProviderError};

/// Scriptable listing provider for tests/dev.
///
/// Page tokens are stringified offsets into the child list.
#[derive(Debug, Default)]
pub struct InMemoryListingProvider {
    children: RwLock<HashMap<String, Vec<ListingEntry>>>,
    failing: RwLock<HashSet<String>>,
    page_size: Option<usize>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl InMemoryListingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Replace the children of `parent_id`.
    pub fn set_children(&self, parent_id: &str, entries: Vec<ListingEntry>) {
        if let Ok(mut children) = self.children.write() {
            children.insert(parent_id.to_string(), entries);
        }
    }

    /// Make every listing of `parent_id` fail with `Unavailable`.
    pub fn fail_on(&self, parent_id: &str) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(parent_id.to_string());
        }
    }

    pub fn recover(&self, parent_id: &str) {
        if let Ok(mut failing) = self.failing.write() {
            failing.remove(parent_id);
        }
    }

    /// Number of `list` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ListingProvider for InMemoryListingProvider {
    async fn list(&self, parent_id: &str, page_token: Option<&str>) -> Result<ListingPage, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let poisoned = || ProviderError::Unavailable("provider state poisoned".into());
        if self.failing.read().map_err(|_| poisoned())?.contains(parent_id) {
            return Err(ProviderError::Unavailable(format!("listing {parent_id} failed")));
        }

        let children = self.children.read().map_err(|_| poisoned())?;
        let all = children
            .get(parent_id)
            .ok_or_else(|| ProviderError::NotFound(parent_id.to_string()))?;

        let offset = match page_token {
            None => 0,
            Some(t) => t
                .parse::<usize>()
                .map_err(|_| ProviderError::InvalidResponse(format!("unknown page token '{t}'")))?,
        };
        let size = self.page_size.unwrap_or(all.len().max(1));
        let end = (offset + size).min(all.len());
        let entries = all.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();

        Ok(ListingPage {
            entries,
            next_page_token: (end < all.len()).then(|| end.to_string()),
        })
    }
}
