//! The online index-build engine
//!
//! Builds secondary indexes over live primary data while writes
//! continue. The modification queue is registered *before* the primary
//! scan starts, so every write lands in the new index at least once:
//! through the scan if it committed first, through the queue otherwise.
//! Writes that land during the scan are applied twice; index updates are
//! idempotent, so the double-count is harmless.
//!
//! State machine per build task:
//!
//! ```text
//!  Registered -> Scanning -> Draining -> Finalized
//!             \_ Interrupted (any state, emergency deregister)
//! ```

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::thread;

use uuid::Uuid;

use crate::concurrency::{yield_now, Access, DrainLock, Signal};
use crate::observability::{Logger, Severity};
use crate::operation::Durability;
use crate::store::{DeletionContext, Store, StoreError, StoreResult, DISTANT_PAST};

use super::queue::{ModQueue, SharedModQueue};

/// Reports applied per drain pass before re-yielding.
pub const MAX_CHUNK: usize = 10;

/// The lifecycle of one build task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostConstructionState {
    Registered,
    Scanning,
    Draining,
    Finalized,
    Interrupted,
}

/// How a drain run ended, short of an error.
enum DrainOutcome {
    /// Queue drained, indexes marked ready, queue deregistered.
    Finalized,
    /// Every target index was dropped mid-build.
    IndexesDropped,
}

/// Registers a modification queue for the given indexes and spawns the
/// build task.
///
/// Must be called while holding the sindex metadata block: registration
/// under that block is what guarantees no write commits between "queue
/// registered" and "scan started" without being captured. The spawned
/// task holds a drainer lock for its whole life, so the store cannot
/// shut down underneath it.
pub fn spawn_post_construction<S>(
    store: &Arc<S>,
    index_ids: BTreeSet<Uuid>,
    sindex_block: &S::SindexBlock,
) -> StoreResult<thread::JoinHandle<()>>
where
    S: Store + Send + Sync + 'static,
{
    let task_tag = Uuid::new_v4();
    let drain_lock = store
        .drainer()
        .lock()
        .ok_or(StoreError::Interrupted)?;

    let queue: SharedModQueue = Arc::new(Mutex::new(ModQueue::create(
        store.base_path(),
        task_tag,
    )?));

    // Queue registration serializes against primary commits through the
    // sindex-queue line.
    {
        let line = store.get_in_line_for_sindex_queue(sindex_block);
        line.ready().wait();
        store.register_sindex_queue(Arc::clone(&queue), &line)?;
    }
    log_task(task_tag, PostConstructionState::Registered, index_ids.len());

    let store = Arc::clone(store);
    let handle = thread::Builder::new()
        .name(format!("postcon-{task_tag}"))
        .spawn(move || {
            post_construct_and_drain_queue(drain_lock, task_tag, &index_ids, store.as_ref(), queue);
        })
        .map_err(StoreError::Io)?;
    Ok(handle)
}

/// The body of a build task: scan the primary tree, then drain the
/// modification queue, then finalize. Never panics; failures are logged
/// and the queue registration is always removed, by the emergency path
/// if blocks are no longer available.
pub fn post_construct_and_drain_queue<S: Store>(
    lock: DrainLock,
    task_tag: Uuid,
    index_ids: &BTreeSet<Uuid>,
    store: &S,
    queue: SharedModQueue,
) {
    // Enqueue on the write side of the backfill-postcon rwlock without
    // waiting: this parks future exclusive backfills while letting any
    // number of post-constructions run concurrently.
    let _backfill_line = store
        .backfill_postcon_queue()
        .enqueue_access(Access::Write);

    let drain = lock.drain_signal();

    match scan_and_drain(task_tag, index_ids, store, &queue, drain) {
        Ok(DrainOutcome::Finalized) => {
            remove_queue_file(&queue);
            log_task(task_tag, PostConstructionState::Finalized, index_ids.len());
        }
        Ok(DrainOutcome::IndexesDropped) => {
            // Nothing left to build; deregister the standard way unless
            // shutdown beats us to the blocks.
            match deregister_standalone(store, &queue, drain) {
                Ok(()) => remove_queue_file(&queue),
                Err(_) => store.emergency_deregister_sindex_queue(&queue),
            }
            log_task(task_tag, PostConstructionState::Finalized, 0);
        }
        Err(error) if error.is_interrupted() => {
            // Blocks are unavailable during a drain, so registration is
            // removed without them. The partially built index is left in
            // an indeterminate state for the store to garbage-collect.
            store.emergency_deregister_sindex_queue(&queue);
            log_task(task_tag, PostConstructionState::Interrupted, index_ids.len());
        }
        Err(error) => {
            store.emergency_deregister_sindex_queue(&queue);
            let task = task_tag.to_string();
            let error = error.to_string();
            Logger::log_stderr(
                Severity::Error,
                "postcon_failed",
                &[("task", task.as_str()), ("error", error.as_str())],
            );
        }
    }
}

fn scan_and_drain<S: Store>(
    task_tag: Uuid,
    index_ids: &BTreeSet<Uuid>,
    store: &S,
    queue: &SharedModQueue,
    drain: &Signal,
) -> StoreResult<DrainOutcome> {
    log_task(task_tag, PostConstructionState::Scanning, index_ids.len());
    store.post_construct_indexes(index_ids, drain)?;

    log_task(task_tag, PostConstructionState::Draining, index_ids.len());
    loop {
        if drain.is_pulsed() {
            return Err(StoreError::Interrupted);
        }
        // Yield while not holding any locks yet.
        yield_now();

        let token = store.new_write_token();
        // Hard durability is back-pressure, not a durability need: if
        // reports arrive faster than the index absorbs them, the cache's
        // dirty-page limit throttles the upstream writers.
        let (txn, superblock) = store.acquire_superblock_for_write(
            DISTANT_PAST,
            2,
            Durability::Hard,
            token,
            drain,
        )?;
        let sindex_block = store.acquire_sindex_block_for_write(superblock)?;

        let mut accesses = store.acquire_index_superblocks_for_write(index_ids, &sindex_block)?;
        if accesses.is_empty() {
            return Ok(DrainOutcome::IndexesDropped);
        }

        let line = store.get_in_line_for_sindex_queue(&sindex_block);
        if !line.ready().wait_interruptible(drain) {
            return Err(StoreError::Interrupted);
        }

        // Holding the head of the sindex-queue line excludes writers, so
        // reports popped here cannot race new appends.
        let mut applied = 0;
        while applied < MAX_CHUNK {
            let report = {
                let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
                queue.pop()?
            };
            match report {
                Some(report) => {
                    store.update_indexes(
                        &mut accesses,
                        &report,
                        &txn,
                        DeletionContext::PostConstruction,
                    )?;
                    applied += 1;
                }
                None => break,
            }
        }

        let emptied = {
            let queue = queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.is_empty()
        };
        if emptied {
            for index_id in index_ids {
                store.mark_index_up_to_date(*index_id, &sindex_block)?;
            }
            store.deregister_sindex_queue(queue, &line)?;
            return Ok(DrainOutcome::Finalized);
        }
    }
}

/// Deregisters the queue outside the drain loop, acquiring a fresh
/// superblock and sindex block for it.
fn deregister_standalone<S: Store>(
    store: &S,
    queue: &SharedModQueue,
    drain: &Signal,
) -> StoreResult<()> {
    let token = store.new_write_token();
    let (_txn, superblock) =
        store.acquire_superblock_for_write(DISTANT_PAST, 2, Durability::Hard, token, drain)?;
    let sindex_block = store.acquire_sindex_block_for_write(superblock)?;
    let line = store.get_in_line_for_sindex_queue(&sindex_block);
    if !line.ready().wait_interruptible(drain) {
        return Err(StoreError::Interrupted);
    }
    store.deregister_sindex_queue(queue, &line)
}

fn remove_queue_file(queue: &SharedModQueue) {
    let queue = queue.lock().unwrap_or_else(|e| e.into_inner());
    if let Err(error) = queue.remove_file() {
        let error = error.to_string();
        Logger::log_stderr(
            Severity::Warn,
            "postcon_queue_cleanup_failed",
            &[("error", error.as_str())],
        );
    }
}

fn log_task(task_tag: Uuid, state: PostConstructionState, index_count: usize) {
    let event = match state {
        PostConstructionState::Registered => "postcon_register",
        PostConstructionState::Scanning => "postcon_scan",
        PostConstructionState::Draining => "postcon_drain",
        PostConstructionState::Finalized => "postcon_finalize",
        PostConstructionState::Interrupted => "postcon_interrupted",
    };
    let task = task_tag.to_string();
    let index_count = index_count.to_string();
    Logger::log(
        Severity::Info,
        event,
        &[("index_count", index_count.as_str()), ("task", task.as_str())],
    );
}
