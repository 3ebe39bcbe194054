//! External listing providers.
//!
//! A provider enumerates the direct children of a folder, one page at a time.
//! Callers own the cursor loop; see [`list_all`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use storefront_catalog::{ListingEntry, ListingPage};

pub mod drive;
pub mod in_memory;

pub use drive::{DriveListingProvider, DRIVE_FOLDER_MIME};
pub use in_memory::InMemoryListingProvider;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("listing provider unavailable: {0}")]
    Unavailable(String),

    #[error("listing provider timed out")]
    Timeout,

    #[error("listing provider returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("folder not found: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait ListingProvider: Send + Sync {
    /// Direct children of `parent_id`. `page_token` continues a previous page.
    async fn list(&self, parent_id: &str, page_token: Option<&str>) -> Result<ListingPage, ProviderError>;
}

#[async_trait]
impl<P> ListingProvider for Arc<P>
where
    P: ListingProvider + ?Sized,
{
    async fn list(&self, parent_id: &str, page_token: Option<&str>) -> Result<ListingPage, ProviderError> {
        (**self).list(parent_id, page_token).await
    }
}

/// Follow the page cursor of `parent_id` to exhaustion.
///
/// Every page call is bounded by `timeout`. A provider that hands back a token
/// it already issued would loop forever, so that is reported as invalid.
pub async fn list_all<P>(provider: &P, parent_id: &str, timeout: Duration) -> Result<Vec<ListingEntry>, ProviderError>
where
    P: ListingProvider + ?Sized,
{
    let mut entries = Vec::new();
    let mut seen_tokens: Vec<String> = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = tokio::time::timeout(timeout, provider.list(parent_id, page_token.as_deref()))
            .await
            .map_err(|_| ProviderError::Timeout)??;
        entries.extend(page.entries);

        match page.next_page_token {
            None => break,
            Some(next) => {
                if seen_tokens.contains(&next) {
                    return Err(ProviderError::InvalidResponse(format!(
                        "page token '{next}' repeated while listing {parent_id}"
                    )));
                }
                seen_tokens.push(next.clone());
                page_token = Some(next);
            }
        }
    }

    tracing::debug!(parent_id, entries = entries.len(), pages = seen_tokens.len() + 1, "listing fetched");
    Ok(entries)
}
