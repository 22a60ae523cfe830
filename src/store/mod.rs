//! The storage-engine contract
//!
//! The core consumes per-shard storage through this typed interface and
//! implements none of it: B-tree layout, block caching, and durability
//! all live behind the trait. Handle types are associated so a store can
//! expose its own transaction and block-lock guards.

mod errors;
mod store;

pub use errors::{StoreError, StoreResult};
pub use store::{DeletionContext, Store, WriteToken, DISTANT_PAST};
