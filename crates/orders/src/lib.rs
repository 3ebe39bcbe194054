//! Orders domain module.
//!
//! Business rules for orders: the status machine, the solution link and the
//! access tokens issued against it. Pure, deterministic logic (no IO, no HTTP,
//! no storage).

pub mod order;
pub mod status;
pub mod token;

pub use order::{
    AccessTokenRevoked, DeleteOrder, DisableSolution, EnableSolution, Order, OrderCommand,
    OrderDeleted, OrderEvent, OrderPlaced, PlaceOrder, SetStatus, SolutionDisabled,
    SolutionEnabled, SolutionLink, StatusChanged,
};
pub use status::{Fulfillment, ItemType, OrderStatus};
pub use token::AccessToken;
