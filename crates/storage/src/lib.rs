//! Storage references: sharing-URL parsing and viewer URL construction.
//!
//! Raw sharing URLs enter through [`parse`] and never leave this crate; the
//! rest of the system only handles the normalized [`StorageReference`].

pub mod reference;
pub mod viewer;

pub use reference::{parse, ReferenceError, StorageKind, StorageReference};
pub use viewer::{embed_url, ViewingUrl};
