//! scatterdb - shard routing and result composition for a document store
//!
//! This crate is the layer between a logical read or write addressed at a
//! table and the per-shard storage engines that hold the table's rows. It
//! computes which hash/key shards an operation touches, restricts the
//! operation to each shard, and composes the per-shard responses back into
//! one logically correct response. It also contains the online
//! secondary-index post-construction engine, which builds a new index over
//! live primary data while writes continue.
//!
//! # Design Principles
//!
//! - Determinism over optimization
//! - Pure routing: the sharder and unsharder never observe storage state
//! - Explicit failure over silent recovery
//! - Single-key atomicity only; no cross-key transactions

pub mod concurrency;
pub mod observability;
pub mod operation;
pub mod postcon;
pub mod region;
pub mod sharding;
pub mod store;
