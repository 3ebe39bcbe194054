//! Catalog synchronization: the reconciler, its per-root guard, and the
//! optional periodic scheduler.

pub mod guard;
pub mod reconciler;
pub mod scheduler;

pub use guard::{SyncGuard, SyncPermit};
pub use reconciler::{DeleteMode, ReconcileError, Reconciler, ReconcilerConfig};
pub use scheduler::{SchedulerConfig, SyncRoot, spawn_scheduler};
