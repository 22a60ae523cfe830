//! Shared test fixtures: an in-memory store implementing the storage
//! contract, and a reference executor for reads and writes against a
//! plain table model.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use scatterdb::concurrency::{yield_now, Drainer, InlineHandle, InlineQueue, Signal};
use scatterdb::operation::{
    insert_row_key, DistributionResponse, Durability, RangePayload, RangeReadResponse, Read,
    ReadOp, ReadResponse, ReadResponsePayload, Row, Terminal, Write, WriteOp, WriteResponse,
    WriteResponsePayload,
};
use scatterdb::postcon::{ModReport, SharedModQueue};
use scatterdb::region::StoreKey;
use scatterdb::store::{DeletionContext, Store, StoreError, StoreResult, WriteToken};

/// One secondary index of the in-memory store: primary key -> encoded
/// index key for a single document field.
#[derive(Debug, Clone)]
pub struct MemIndex {
    pub name: String,
    pub field: String,
    pub entries: BTreeMap<StoreKey, StoreKey>,
    pub ready: bool,
}

impl MemIndex {
    pub fn new(name: &str, field: &str) -> Self {
        MemIndex {
            name: name.to_string(),
            field: field.to_string(),
            entries: BTreeMap::new(),
            ready: false,
        }
    }

    fn entry_for(&self, value: &Value) -> StoreKey {
        scatterdb::region::encode_primary(value.get(&self.field).unwrap_or(&Value::Null))
    }

    fn apply(&mut self, report: &ModReport) {
        match &report.new_value {
            Some(new_value) => {
                self.entries
                    .insert(report.key.clone(), self.entry_for(new_value));
            }
            None => {
                self.entries.remove(&report.key);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemStoreInner {
    pub rows: BTreeMap<StoreKey, Value>,
    pub indexes: BTreeMap<Uuid, MemIndex>,
    pub queues: Vec<SharedModQueue>,
    pub recency: u64,
}

/// An in-memory shard store implementing the storage contract.
pub struct MemStore {
    base_path: PathBuf,
    drainer: Drainer,
    backfill_queue: InlineQueue,
    sindex_line: InlineQueue,
    next_token: AtomicU64,
    /// Pulsed when a primary scan begins.
    scan_started: Signal,
    /// Scans block until this fires; pre-pulsed except in tests that
    /// need to catch a build mid-scan.
    scan_release: Signal,
    pub inner: Mutex<MemStoreInner>,
}

impl MemStore {
    pub fn new(base_path: &Path) -> Self {
        let store = Self::with_held_scans(base_path);
        store.scan_release.pulse();
        store
    }

    /// A store whose primary scans park at their first row until
    /// [`MemStore::release_scans`] is called, so a test can interrupt a
    /// build at a known point.
    pub fn with_held_scans(base_path: &Path) -> Self {
        MemStore {
            base_path: base_path.to_path_buf(),
            drainer: Drainer::new(),
            backfill_queue: InlineQueue::new(),
            sindex_line: InlineQueue::new(),
            next_token: AtomicU64::new(0),
            scan_started: Signal::new(),
            scan_release: Signal::new(),
            inner: Mutex::new(MemStoreInner::default()),
        }
    }

    /// Blocks until a build task has entered its primary scan.
    pub fn wait_for_scan(&self) {
        self.scan_started.wait();
    }

    pub fn release_scans(&self) {
        self.scan_release.pulse();
    }

    pub fn add_index(&self, name: &str, field: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.lock().unwrap();
        inner.indexes.insert(id, MemIndex::new(name, field));
        id
    }

    /// The store's write path: commit the row, then (under the
    /// sindex-queue line) hand the modification report to every
    /// registered queue and every ready index.
    pub fn write_row(&self, key: StoreKey, value: Option<Value>) {
        let line = self.sindex_line.enqueue();
        line.ready().wait();

        let mut inner = self.inner.lock().unwrap();
        inner.recency += 1;
        let recency = inner.recency;
        let old = match &value {
            Some(v) => inner.rows.insert(key.clone(), v.clone()),
            None => inner.rows.remove(&key),
        };

        let report = ModReport {
            key,
            old_value: old,
            new_value: value,
            recency,
            timestamp: chrono::Utc::now(),
        };

        for index in inner.indexes.values_mut() {
            if index.ready {
                index.apply(&report);
            }
        }
        for queue in &inner.queues {
            queue
                .lock()
                .unwrap()
                .push(&report)
                .expect("queue append failed");
        }
    }

    pub fn index_entries(&self, id: Uuid) -> BTreeMap<StoreKey, StoreKey> {
        self.inner.lock().unwrap().indexes[&id].entries.clone()
    }

    pub fn index_ready(&self, id: Uuid) -> bool {
        self.inner.lock().unwrap().indexes[&id].ready
    }

    pub fn registered_queue_count(&self) -> usize {
        self.inner.lock().unwrap().queues.len()
    }

    /// The entries the index *should* hold: the index function evaluated
    /// over every primary row.
    pub fn expected_entries(&self, id: Uuid) -> BTreeMap<StoreKey, StoreKey> {
        let inner = self.inner.lock().unwrap();
        let index = &inner.indexes[&id];
        inner
            .rows
            .iter()
            .map(|(key, value)| (key.clone(), index.entry_for(value)))
            .collect()
    }
}

impl Store for MemStore {
    type Txn = ();
    type Superblock = ();
    type SindexBlock = ();
    type Access = Uuid;

    fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn drainer(&self) -> &Drainer {
        &self.drainer
    }

    fn backfill_postcon_queue(&self) -> &InlineQueue {
        &self.backfill_queue
    }

    fn new_write_token(&self) -> WriteToken {
        WriteToken(self.next_token.fetch_add(1, Ordering::SeqCst))
    }

    fn acquire_superblock_for_write(
        &self,
        _recency: u64,
        _expected_changes: usize,
        _durability: Durability,
        _token: WriteToken,
        interruptor: &Signal,
    ) -> StoreResult<((), ())> {
        if interruptor.is_pulsed() {
            return Err(StoreError::Interrupted);
        }
        Ok(((), ()))
    }

    fn acquire_sindex_block_for_write(&self, _superblock: ()) -> StoreResult<()> {
        Ok(())
    }

    fn register_sindex_queue(
        &self,
        queue: SharedModQueue,
        _line: &InlineHandle,
    ) -> StoreResult<()> {
        self.inner.lock().unwrap().queues.push(queue);
        Ok(())
    }

    fn deregister_sindex_queue(
        &self,
        queue: &SharedModQueue,
        _line: &InlineHandle,
    ) -> StoreResult<()> {
        let tag = queue.lock().unwrap().tag();
        self.inner
            .lock()
            .unwrap()
            .queues
            .retain(|q| q.lock().unwrap().tag() != tag);
        Ok(())
    }

    fn emergency_deregister_sindex_queue(&self, queue: &SharedModQueue) {
        let tag = queue.lock().unwrap().tag();
        self.inner
            .lock()
            .unwrap()
            .queues
            .retain(|q| q.lock().unwrap().tag() != tag);
    }

    fn get_in_line_for_sindex_queue(&self, _block: &()) -> InlineHandle {
        self.sindex_line.enqueue()
    }

    fn acquire_index_superblocks_for_write(
        &self,
        index_ids: &BTreeSet<Uuid>,
        _block: &(),
    ) -> StoreResult<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        Ok(index_ids
            .iter()
            .filter(|id| inner.indexes.contains_key(id))
            .copied()
            .collect())
    }

    fn mark_index_up_to_date(&self, index_id: Uuid, _block: &()) -> StoreResult<()> {
        if let Some(index) = self.inner.lock().unwrap().indexes.get_mut(&index_id) {
            index.ready = true;
        }
        Ok(())
    }

    fn post_construct_indexes(
        &self,
        index_ids: &BTreeSet<Uuid>,
        interruptor: &Signal,
    ) -> StoreResult<()> {
        self.scan_started.pulse();
        if !self.scan_release.wait_interruptible(interruptor) {
            return Err(StoreError::Interrupted);
        }
        let rows: Vec<(StoreKey, Value)> = {
            let inner = self.inner.lock().unwrap();
            inner
                .rows
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        for (key, value) in rows {
            if interruptor.is_pulsed() {
                return Err(StoreError::Interrupted);
            }
            let mut inner = self.inner.lock().unwrap();
            for id in index_ids {
                if let Some(index) = inner.indexes.get_mut(id) {
                    let entry = index.entry_for(&value);
                    index.entries.insert(key.clone(), entry);
                }
            }
            drop(inner);
            yield_now();
        }
        Ok(())
    }

    fn update_indexes(
        &self,
        accesses: &mut [Uuid],
        report: &ModReport,
        _txn: &(),
        _context: DeletionContext,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        for id in accesses.iter() {
            if let Some(index) = inner.indexes.get_mut(id) {
                index.apply(report);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Reference executor over a plain table model
// ---------------------------------------------------------------------

/// A table as one logical unit: key -> document.
pub type Table = BTreeMap<StoreKey, Value>;

pub fn table_of(names: &[&str]) -> Table {
    names
        .iter()
        .map(|name| {
            (
                StoreKey::from(*name),
                serde_json::json!({"id": name, "weight": name.len() as u64}),
            )
        })
        .collect()
}

/// Executes a (possibly shard-restricted) read against the subset of
/// the table its region selects, the way one shard's storage engine
/// would.
pub fn execute_read(table: &Table, read: &Read) -> ReadResponse {
    let payload = match &read.op {
        ReadOp::PointRead { key } => ReadResponsePayload::PointRead {
            data: table.get(key).cloned().unwrap_or(Value::Null),
        },
        ReadOp::RangeRead {
            region,
            sorting,
            terminal,
            ..
        } => {
            let mut rows: Vec<Row> = table
                .iter()
                .filter(|(key, _)| region.contains_key(key))
                .map(|(key, value)| Row {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect();
            rows.sort_by(|a, b| sorting.key_cmp(&a.key, &b.key));

            let result = match terminal {
                None => RangePayload::Rows(rows),
                Some(Terminal::Count) => {
                    RangePayload::Aggregate(serde_json::json!(rows.len() as u64))
                }
                Some(Terminal::Sum { field }) => {
                    let total: f64 = rows
                        .iter()
                        .filter_map(|row| row.value.get(field).and_then(Value::as_f64))
                        .sum();
                    RangePayload::Aggregate(serde_json::json!(total))
                }
                Some(Terminal::Avg { field }) => {
                    let values: Vec<f64> = rows
                        .iter()
                        .filter_map(|row| row.value.get(field).and_then(Value::as_f64))
                        .collect();
                    let sum: f64 = values.iter().sum();
                    RangePayload::Aggregate(serde_json::json!([sum, values.len() as u64]))
                }
            };
            ReadResponsePayload::RangeRead(RangeReadResponse {
                result: Ok(result),
                truncated: false,
                last_key: sorting.key_max(),
                key_range: region.key_range.clone(),
            })
        }
        ReadOp::DistributionRead { region, .. } => {
            let key_counts: BTreeMap<StoreKey, u64> = table
                .iter()
                .filter(|(key, _)| region.contains_key(key))
                .map(|(key, _)| (key.clone(), 1))
                .collect();
            ReadResponsePayload::Distribution(DistributionResponse {
                region: region.clone(),
                key_counts,
            })
        }
        other => panic!("model cannot execute {}", other.name()),
    };
    ReadResponse::new(payload)
}

/// Executes a (possibly shard-restricted) batched write against the
/// table, producing the shard's statistics object.
pub fn execute_write(table: &mut Table, write: &Write) -> WriteResponse {
    let payload = match &write.op {
        WriteOp::BatchedInsert {
            rows, primary_key, ..
        } => {
            let mut inserted = 0u64;
            let mut errors = 0u64;
            for row in rows {
                let key = insert_row_key(row, primary_key);
                if table.contains_key(&key) {
                    errors += 1;
                } else {
                    table.insert(key, row.clone());
                    inserted += 1;
                }
            }
            WriteResponsePayload::Batched {
                stats: serde_json::json!({"inserted": inserted, "errors": errors}),
            }
        }
        WriteOp::BatchedReplace { keys, .. } => {
            let mut replaced = 0u64;
            let mut skipped = 0u64;
            for key in keys {
                if let Some(value) = table.get_mut(key) {
                    if let Some(obj) = value.as_object_mut() {
                        obj.insert("replaced".to_string(), Value::Bool(true));
                    }
                    replaced += 1;
                } else {
                    skipped += 1;
                }
            }
            WriteResponsePayload::Batched {
                stats: serde_json::json!({"replaced": replaced, "skipped": skipped}),
            }
        }
        other => panic!("model cannot execute {}", other.name()),
    };
    WriteResponse::new(payload)
}
