//! `storefront-core`: domain foundation building blocks.
//!
//! Pure domain primitives shared by the catalog and order crates (no IO).

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::{Entity, TenantScoped};
pub use error::{DomainError, DomainResult};
pub use id::{CatalogItemId, OrderId, SubjectId, TenantId, TokenId};
pub use value_object::ValueObject;
