//! Restricting operations to a single shard
//!
//! `shard` is pure and idempotent: given the same operation and shard
//! region it always produces the same restriction, and it never observes
//! storage state. A `None` return means the shard is irrelevant to the
//! operation and must not be dispatched to.

use crate::operation::{
    index_list_region_key, insert_row_key, Read, ReadOp, Write, WriteOp, CPU_SHARDING_FACTOR,
};
use crate::region::{Region, StoreKey};

impl Read {
    /// Restricts this read to `shard`, or declines when the shard is
    /// disjoint from the read's region.
    pub fn shard(&self, shard: &Region) -> Option<Read> {
        let op = match &self.op {
            // Keyed reads pass through whole iff the shard owns the key.
            ReadOp::PointRead { key } => keyed(shard, key, || self.op.clone()),
            ReadOp::IndexList => keyed(shard, &index_list_region_key(), || self.op.clone()),
            ReadOp::ChangefeedPointStamp { key, .. } => keyed(shard, key, || self.op.clone()),

            ReadOp::RangeRead {
                region,
                sorting,
                transforms,
                terminal,
                index,
                batch,
            } => rangey(shard, region, |intersection| ReadOp::RangeRead {
                region: intersection,
                sorting: *sorting,
                transforms: transforms.clone(),
                terminal: terminal.clone(),
                index: index.clone(),
                // Each shard fetches proportionally fewer rows per batch.
                batch: batch.scale_down(CPU_SHARDING_FACTOR),
            }),
            ReadOp::GeoIntersect {
                region,
                geometry,
                index_id,
            } => rangey(shard, region, |intersection| ReadOp::GeoIntersect {
                region: intersection,
                geometry: geometry.clone(),
                index_id: *index_id,
            }),
            ReadOp::GeoNearest {
                region,
                center,
                max_dist,
                max_results,
                index_id,
            } => rangey(shard, region, |intersection| ReadOp::GeoNearest {
                region: intersection,
                center: center.clone(),
                max_dist: *max_dist,
                max_results: *max_results,
                index_id: *index_id,
            }),
            ReadOp::DistributionRead {
                region,
                max_depth,
                result_limit,
            } => rangey(shard, region, |intersection| ReadOp::DistributionRead {
                region: intersection,
                max_depth: *max_depth,
                result_limit: *result_limit,
            }),
            ReadOp::IndexStatus { names, region } => {
                rangey(shard, region, |intersection| ReadOp::IndexStatus {
                    names: names.clone(),
                    region: intersection,
                })
            }
            ReadOp::ChangefeedSubscribe { addr, region } => {
                rangey(shard, region, |intersection| ReadOp::ChangefeedSubscribe {
                    addr: *addr,
                    region: intersection,
                })
            }
            ReadOp::ChangefeedStamp { addr, region } => {
                rangey(shard, region, |intersection| ReadOp::ChangefeedStamp {
                    addr: *addr,
                    region: intersection,
                })
            }
        }?;

        Some(Read {
            op,
            profile: self.profile,
        })
    }
}

impl Write {
    /// Restricts this write to `shard`, or declines when the shard is
    /// disjoint from the write's region.
    pub fn shard(&self, shard: &Region) -> Option<Write> {
        let op = match &self.op {
            WriteOp::PointWrite { key, .. } => keyed(shard, key, || self.op.clone()),
            WriteOp::PointDelete { key } => keyed(shard, key, || self.op.clone()),

            WriteOp::BatchedReplace {
                keys,
                primary_key,
                func,
                return_changes,
            } => {
                let shard_keys: Vec<StoreKey> = keys
                    .iter()
                    .filter(|key| shard.contains_key(key))
                    .cloned()
                    .collect();
                if shard_keys.is_empty() {
                    None
                } else {
                    Some(WriteOp::BatchedReplace {
                        keys: shard_keys,
                        primary_key: primary_key.clone(),
                        func: func.clone(),
                        return_changes: *return_changes,
                    })
                }
            }
            WriteOp::BatchedInsert {
                rows,
                primary_key,
                conflict,
                limits,
                return_changes,
            } => {
                let shard_rows: Vec<serde_json::Value> = rows
                    .iter()
                    .filter(|row| shard.contains_key(&insert_row_key(row, primary_key)))
                    .cloned()
                    .collect();
                if shard_rows.is_empty() {
                    None
                } else {
                    Some(WriteOp::BatchedInsert {
                        rows: shard_rows,
                        primary_key: primary_key.clone(),
                        conflict: *conflict,
                        limits: *limits,
                        return_changes: *return_changes,
                    })
                }
            }

            WriteOp::IndexCreate { region, definition } => {
                rangey(shard, region, |intersection| WriteOp::IndexCreate {
                    region: intersection,
                    definition: definition.clone(),
                })
            }
            WriteOp::IndexDrop { region, name } => {
                rangey(shard, region, |intersection| WriteOp::IndexDrop {
                    region: intersection,
                    name: name.clone(),
                })
            }
            WriteOp::IndexRename {
                region,
                old_name,
                new_name,
                overwrite,
            } => rangey(shard, region, |intersection| WriteOp::IndexRename {
                region: intersection,
                old_name: old_name.clone(),
                new_name: new_name.clone(),
                overwrite: *overwrite,
            }),
            WriteOp::Sync { region } => rangey(shard, region, |intersection| WriteOp::Sync {
                region: intersection,
            }),
        }?;

        Some(Write {
            op,
            durability: self.durability,
            profile: self.profile,
            limits: self.limits,
        })
    }
}

/// Keyed restriction: the whole operation iff the shard owns the key.
fn keyed<T>(shard: &Region, key: &StoreKey, make: impl FnOnce() -> T) -> Option<T> {
    if shard.contains_key(key) {
        Some(make())
    } else {
        None
    }
}

/// Rangey restriction: a copy carrying the non-empty intersection.
fn rangey<T>(shard: &Region, region: &Region, make: impl FnOnce(Region) -> T) -> Option<T> {
    let intersection = shard.intersect(region);
    if intersection.is_empty() {
        None
    } else {
        Some(make(intersection))
    }
}
