//! Infrastructure layer: document stores, listing providers, and the
//! services that drive catalog sync and order fulfillment over them.

pub mod fulfillment;
pub mod listing;
pub mod store;
pub mod sync;

#[cfg(test)]
mod integration_tests;

pub use fulfillment::{AccessConfig, AccessTokenService, FulfillmentError, NewOrder, OrderService};
pub use listing::{DriveListingProvider, InMemoryListingProvider, ListingProvider, ProviderError};
pub use store::{
    CatalogStore, InMemoryCatalogStore, InMemoryOrderStore, OrderStore, PostgresCatalogStore, PostgresOrderStore,
    StoreError, ensure_schema,
};
pub use sync::{
    DeleteMode, ReconcileError, Reconciler, ReconcilerConfig, SchedulerConfig, SyncGuard, SyncRoot, spawn_scheduler,
};
