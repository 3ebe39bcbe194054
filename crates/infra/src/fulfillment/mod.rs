//! Order fulfillment: the order status machine wired to the order store, and
//! the access token service that gates solution viewing.

use std::time::Duration;

use thiserror::Error;

use storefront_core::DomainError;

use crate::store::StoreError;

pub mod access;
pub mod dispatcher;
pub mod orders;

pub use access::AccessTokenService;
pub use dispatcher::{Dispatched, OrderDispatcher};
pub use orders::{NewOrder, OrderService};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<storefront_storage::ReferenceError> for FulfillmentError {
    fn from(value: storefront_storage::ReferenceError) -> Self {
        FulfillmentError::Domain(value.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessConfig {
    /// How long a resolved viewing URL stays valid.
    pub viewer_ttl: Duration,
    /// Compare-and-swap retries before a conflicting write is reported.
    pub max_retries: usize,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            viewer_ttl: Duration::from_secs(300),
            max_retries: 3,
        }
    }
}

impl AccessConfig {
    pub fn with_viewer_ttl(mut self, ttl: Duration) -> Self {
        self.viewer_ttl = ttl;
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }
}
