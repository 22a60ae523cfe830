//! The `Store` trait

use std::collections::BTreeSet;
use std::path::Path;

use uuid::Uuid;

use crate::concurrency::{Drainer, InlineHandle, InlineQueue, Signal};
use crate::operation::Durability;
use crate::postcon::{ModReport, SharedModQueue};

use super::errors::StoreResult;

/// The recency passed for writes that must order before every live
/// write, such as post-construction queue drains.
pub const DISTANT_PAST: u64 = 0;

/// An ordering token for a write transaction. Tokens are taken in the
/// order writes must commit; the store enforces that order at superblock
/// acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WriteToken(pub u64);

/// How index entries removed by an update are reclaimed.
///
/// Post-construction applies modifications that may race the scan, so
/// its deletions must tolerate entries that were never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionContext {
    Regular,
    PostConstruction,
}

/// One shard's storage engine, as consumed by the core.
///
/// Handle types are associated: a transaction guard, a superblock lock,
/// the secondary-index metadata block lock, and a per-index write
/// access. The core never inspects them, only threads them between
/// calls in the order the contract requires.
pub trait Store {
    type Txn;
    type Superblock;
    type SindexBlock;
    type Access;

    /// Root directory for this store's auxiliary files; disk-backed
    /// modification queues live under it.
    fn base_path(&self) -> &Path;

    /// The store's lifetime gate. Long-running tasks hold a lock on it
    /// for their whole duration.
    fn drainer(&self) -> &Drainer;

    /// The rwlock line that serializes exclusive backfills against
    /// concurrent post-constructions. Post-construction enqueues on the
    /// write side without waiting, which parks future exclusive
    /// backfills behind it.
    fn backfill_postcon_queue(&self) -> &InlineQueue;

    /// Takes the next write-ordering token.
    fn new_write_token(&self) -> WriteToken;

    /// Opens a write transaction and locks the superblock.
    ///
    /// With [`Durability::Hard`] the eventual commit waits for fsync,
    /// which throttles the caller once the cache's dirty-page limit is
    /// reached. Returns [`super::StoreError::Interrupted`] when
    /// `interruptor` fires first.
    fn acquire_superblock_for_write(
        &self,
        recency: u64,
        expected_changes: usize,
        durability: Durability,
        token: WriteToken,
        interruptor: &Signal,
    ) -> StoreResult<(Self::Txn, Self::Superblock)>;

    /// Locks the secondary-index metadata block, releasing the
    /// superblock.
    fn acquire_sindex_block_for_write(
        &self,
        superblock: Self::Superblock,
    ) -> StoreResult<Self::SindexBlock>;

    /// Registers a modification queue: from this call onward every write
    /// committed to the primary tree also appends its modification
    /// report to the queue, under the same lock that serializes primary
    /// commits. The caller must hold the head of the sindex-queue line.
    fn register_sindex_queue(
        &self,
        queue: SharedModQueue,
        line: &InlineHandle,
    ) -> StoreResult<()>;

    /// Removes a queue registration. The caller must hold the head of
    /// the sindex-queue line.
    fn deregister_sindex_queue(
        &self,
        queue: &SharedModQueue,
        line: &InlineHandle,
    ) -> StoreResult<()>;

    /// Removes a queue registration without block or line acquisition.
    /// Only for unwinding when the store is draining and blocks can no
    /// longer be acquired.
    fn emergency_deregister_sindex_queue(&self, queue: &SharedModQueue);

    /// Enqueues on the line serializing queue registration and queue
    /// pops against primary commits.
    fn get_in_line_for_sindex_queue(&self, block: &Self::SindexBlock) -> InlineHandle;

    /// Opens the named indexes for writing. Indexes that no longer exist
    /// are skipped; an empty result means every requested index was
    /// dropped.
    fn acquire_index_superblocks_for_write(
        &self,
        index_ids: &BTreeSet<Uuid>,
        block: &Self::SindexBlock,
    ) -> StoreResult<Vec<Self::Access>>;

    /// Marks an index fully built.
    fn mark_index_up_to_date(&self, index_id: Uuid, block: &Self::SindexBlock)
        -> StoreResult<()>;

    /// Traverses the primary tree and writes index entries for every row
    /// into the named indexes. Yields cooperatively; returns
    /// [`super::StoreError::Interrupted`] when `interruptor` fires.
    fn post_construct_indexes(
        &self,
        index_ids: &BTreeSet<Uuid>,
        interruptor: &Signal,
    ) -> StoreResult<()>;

    /// Applies one modification report to the open indexes.
    fn update_indexes(
        &self,
        accesses: &mut [Self::Access],
        report: &ModReport,
        txn: &Self::Txn,
        context: DeletionContext,
    ) -> StoreResult<()>;
}
