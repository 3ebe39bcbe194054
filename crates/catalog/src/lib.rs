//! Catalog domain module.
//!
//! Business rules for the locally mirrored catalog: items, slug allocation,
//! and the diff between an external listing and persisted state. Pure,
//! deterministic logic (no IO, no HTTP, no storage).

pub mod diff;
pub mod item;
pub mod listing;
pub mod result;
pub mod slug;

pub use diff::{plan, SyncPlan, Update};
pub use item::{CatalogItem, CatalogStatus, OperatorEdit};
pub use listing::{ListingEntry, ListingPage, ObservedEntry};
pub use result::{SyncError, SyncErrorKind, SyncResult};
pub use slug::{normalize, SlugAllocator};
