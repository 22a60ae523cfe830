//! Composing per-shard read responses
//!
//! `unshard` consumes the per-shard response buffer and produces the one
//! response the caller sees. Behavior dispatches on the operation
//! variant; every merge is deterministic and first-error-wins where the
//! payload can carry a user-level error.

use std::collections::BTreeMap;

use crate::concurrency::Signal;
use crate::operation::{
    ChangefeedStampResponse, ChangefeedSubscribeResponse, DistributionResponse, IndexStatus,
    RangeReadResponse, Read, ReadOp, ReadResponse, ReadResponsePayload, Sorting, Terminal,
};
use crate::region::{Region, StoreKey};

use super::accumulator::make_accumulator;
use super::errors::{ShardingError, ShardingResult};

impl Read {
    /// Composes the per-shard responses for this read.
    ///
    /// `responses` must hold exactly one entry per shard that accepted
    /// the sharded operation, in shard index order. The interruptor cuts
    /// long merges short; when it fires the whole composite read fails
    /// with [`ShardingError::Interrupted`].
    pub fn unshard(
        &self,
        mut responses: Vec<ReadResponse>,
        interruptor: &Signal,
    ) -> ShardingResult<ReadResponse> {
        // Collect the profiling tail before the payloads are consumed.
        let (event_log, n_shards) = if self.profile.is_enabled() {
            let mut log = Vec::new();
            let mut shards = 0u32;
            for response in &mut responses {
                log.append(&mut response.event_log);
                shards += response.n_shards;
            }
            (log, shards)
        } else {
            (Vec::new(), 0)
        };

        let payloads: Vec<ReadResponsePayload> =
            responses.into_iter().map(|r| r.payload).collect();
        let payload = unshard_payload(&self.op, payloads, interruptor)?;

        Ok(ReadResponse {
            payload,
            event_log,
            n_shards,
        })
    }
}

fn unshard_payload(
    op: &ReadOp,
    payloads: Vec<ReadResponsePayload>,
    interruptor: &Signal,
) -> ShardingResult<ReadResponsePayload> {
    match op {
        ReadOp::PointRead { .. } => passthrough(op, payloads, |p| {
            matches!(p, ReadResponsePayload::PointRead { .. })
        }),
        ReadOp::IndexList => passthrough(op, payloads, |p| {
            matches!(p, ReadResponsePayload::IndexList { .. })
        }),
        ReadOp::ChangefeedPointStamp { .. } => passthrough(op, payloads, |p| {
            matches!(p, ReadResponsePayload::ChangefeedPointStamp { .. })
        }),

        ReadOp::RangeRead {
            region,
            sorting,
            terminal,
            ..
        } => unshard_range_read(region, *sorting, terminal.as_ref(), payloads, interruptor),

        ReadOp::GeoIntersect { .. } => unshard_geo_intersect(payloads, interruptor),
        ReadOp::GeoNearest { max_results, .. } => {
            unshard_geo_nearest(*max_results, payloads, interruptor)
        }
        ReadOp::DistributionRead {
            region,
            result_limit,
            ..
        } => unshard_distribution(region, *result_limit, payloads),
        ReadOp::IndexStatus { .. } => unshard_index_status(payloads),
        ReadOp::ChangefeedSubscribe { .. } => unshard_changefeed_subscribe(payloads),
        ReadOp::ChangefeedStamp { .. } => unshard_changefeed_stamp(payloads),
    }
}

/// Keyed reads hit exactly one shard; their single response passes
/// through unchanged.
fn passthrough(
    op: &ReadOp,
    mut payloads: Vec<ReadResponsePayload>,
    matches_variant: impl Fn(&ReadResponsePayload) -> bool,
) -> ShardingResult<ReadResponsePayload> {
    if payloads.len() != 1 {
        return Err(ShardingError::invariant(format!(
            "{} expects exactly one shard response, got {}",
            op.name(),
            payloads.len()
        )));
    }
    let payload = payloads.remove(0);
    if !matches_variant(&payload) {
        return Err(ShardingError::invariant(format!(
            "mismatched response variant for {}",
            op.name()
        )));
    }
    Ok(payload)
}

fn unshard_range_read(
    region: &Region,
    sorting: Sorting,
    terminal: Option<&Terminal>,
    payloads: Vec<ReadResponsePayload>,
    interruptor: &Signal,
) -> ShardingResult<ReadResponsePayload> {
    let mut shards: Vec<RangeReadResponse> = Vec::with_capacity(payloads.len());
    for payload in payloads {
        match payload {
            ReadResponsePayload::RangeRead(resp) => shards.push(resp),
            _ => {
                return Err(ShardingError::invariant(
                    "mismatched response variant for range_read",
                ))
            }
        }
    }

    // The continuation cursor: the least last_key among truncated shards
    // under the active sort, so the next page begins no later than the
    // earliest unexhausted shard. Untruncated composites use the
    // sort-max sentinel.
    let mut truncated = false;
    let mut best: Option<&StoreKey> = None;
    for shard in &shards {
        if shard.truncated {
            truncated = true;
            if best.map_or(true, |b| sorting.key_le(&shard.last_key, b)) {
                best = Some(&shard.last_key);
            }
        }
    }
    let last_key = best.cloned().unwrap_or_else(|| sorting.key_max());

    // First error wins; no merging beyond it.
    for shard in &shards {
        if let Err(error) = &shard.result {
            return Ok(ReadResponsePayload::RangeRead(RangeReadResponse {
                result: Err(error.clone()),
                truncated,
                last_key,
                key_range: region.key_range.clone(),
            }));
        }
    }

    let mut accumulator = make_accumulator(terminal, sorting, last_key.clone());
    for shard in shards {
        if interruptor.is_pulsed() {
            return Err(ShardingError::Interrupted);
        }
        if let Ok(payload) = shard.result {
            accumulator.feed(payload)?;
        }
    }

    Ok(ReadResponsePayload::RangeRead(RangeReadResponse {
        result: Ok(accumulator.finish()),
        truncated,
        last_key,
        key_range: region.key_range.clone(),
    }))
}

fn unshard_geo_intersect(
    payloads: Vec<ReadResponsePayload>,
    interruptor: &Signal,
) -> ShardingResult<ReadResponsePayload> {
    let mut combined = Vec::new();
    for payload in payloads {
        if interruptor.is_pulsed() {
            return Err(ShardingError::Interrupted);
        }
        match payload {
            ReadResponsePayload::GeoIntersect { result: Ok(docs) } => combined.extend(docs),
            ReadResponsePayload::GeoIntersect { result: Err(error) } => {
                return Ok(ReadResponsePayload::GeoIntersect { result: Err(error) })
            }
            _ => {
                return Err(ShardingError::invariant(
                    "mismatched response variant for geo_intersect",
                ))
            }
        }
    }
    Ok(ReadResponsePayload::GeoIntersect {
        result: Ok(combined),
    })
}

fn unshard_geo_nearest(
    max_results: u64,
    payloads: Vec<ReadResponsePayload>,
    interruptor: &Signal,
) -> ShardingResult<ReadResponsePayload> {
    let mut streams = Vec::with_capacity(payloads.len());
    let mut total = 0usize;
    for payload in payloads {
        match payload {
            ReadResponsePayload::GeoNearest { result: Ok(hits) } => {
                total += hits.len();
                if !hits.is_empty() {
                    streams.push(hits.into_iter().peekable());
                }
            }
            ReadResponsePayload::GeoNearest { result: Err(error) } => {
                return Ok(ReadResponsePayload::GeoNearest { result: Err(error) })
            }
            _ => {
                return Err(ShardingError::invariant(
                    "mismatched response variant for geo_nearest",
                ))
            }
        }
    }

    let take = total.min(max_results as usize);
    let mut combined = Vec::with_capacity(take);
    while combined.len() < take {
        if interruptor.is_pulsed() {
            return Err(ShardingError::Interrupted);
        }
        // Strict less-than keeps ties stable in shard index order.
        let mut nearest: Option<usize> = None;
        let mut nearest_dist = f64::INFINITY;
        for (i, stream) in streams.iter_mut().enumerate() {
            if let Some(hit) = stream.peek() {
                if nearest.is_none() || hit.distance < nearest_dist {
                    nearest = Some(i);
                    nearest_dist = hit.distance;
                }
            }
        }
        let Some(i) = nearest else { break };
        if let Some(hit) = streams[i].next() {
            combined.push(hit);
        }
    }

    Ok(ReadResponsePayload::GeoNearest {
        result: Ok(combined),
    })
}

fn unshard_distribution(
    region: &Region,
    result_limit: usize,
    payloads: Vec<ReadResponsePayload>,
) -> ShardingResult<ReadResponsePayload> {
    let mut results: Vec<DistributionResponse> = Vec::with_capacity(payloads.len());
    for payload in payloads {
        match payload {
            ReadResponsePayload::Distribution(resp) => results.push(resp),
            _ => {
                return Err(ShardingError::invariant(
                    "mismatched response variant for distribution_read",
                ))
            }
        }
    }
    if results.is_empty() {
        return Err(ShardingError::invariant(
            "distribution_read expects at least one shard response",
        ));
    }

    // Group hash shards that cover the same key range; regions order by
    // key range first, so equal key ranges are adjacent after sorting.
    results.sort_by(|a, b| a.region.cmp(&b.region));

    let mut composed: BTreeMap<StoreKey, u64> = BTreeMap::new();
    let mut i = 0;
    while i < results.len() {
        let group_range = results[i].region.key_range.clone();
        let mut largest_index = i;
        let mut largest_total = 0u64;
        let mut group_total = 0u64;

        while i < results.len() && results[i].region.key_range == group_range {
            let shard_total: u64 = results[i].key_counts.values().sum();
            if shard_total > largest_total {
                largest_total = shard_total;
                largest_index = i;
            }
            group_total += shard_total;
            i += 1;
        }

        if largest_total > 0 {
            // Hash shards over one key range are assumed to hold keys at
            // comparable density, so the densest shard's histogram scaled
            // by the group total approximates the group's distribution.
            // Heavy skew between hash shards will distort this.
            let scale_factor = group_total as f64 / largest_total as f64;
            for (key, count) in std::mem::take(&mut results[largest_index].key_counts) {
                composed.insert(key, (count as f64 * scale_factor) as u64);
            }
        }
    }

    if result_limit > 0 && composed.len() > result_limit {
        scale_down_distribution(result_limit, &mut composed);
    }

    Ok(ReadResponsePayload::Distribution(DistributionResponse {
        region: region.clone(),
        key_counts: composed,
    }))
}

/// Coalesces histogram buckets until the histogram fits the result
/// limit: buckets are chunked in key order into runs of
/// `ceil(size / result_limit)` and each run keeps its first key with the
/// run's summed count.
fn scale_down_distribution(result_limit: usize, key_counts: &mut BTreeMap<StoreKey, u64>) {
    debug_assert!(result_limit > 0);
    let combine = key_counts.len().div_ceil(result_limit);
    if combine <= 1 {
        return;
    }
    let entries: Vec<(StoreKey, u64)> = std::mem::take(key_counts).into_iter().collect();
    for run in entries.chunks(combine) {
        let total: u64 = run.iter().map(|(_, count)| count).sum();
        key_counts.insert(run[0].0.clone(), total);
    }
}

fn unshard_index_status(
    payloads: Vec<ReadResponsePayload>,
) -> ShardingResult<ReadResponsePayload> {
    let mut composed: BTreeMap<String, IndexStatus> = BTreeMap::new();
    for payload in payloads {
        match payload {
            ReadResponsePayload::IndexStatus { statuses } => {
                for (name, status) in statuses {
                    composed
                        .entry(name)
                        .or_insert_with(IndexStatus::empty)
                        .add(&status);
                }
            }
            _ => {
                return Err(ShardingError::invariant(
                    "mismatched response variant for index_status",
                ))
            }
        }
    }
    Ok(ReadResponsePayload::IndexStatus { statuses: composed })
}

fn unshard_changefeed_subscribe(
    payloads: Vec<ReadResponsePayload>,
) -> ShardingResult<ReadResponsePayload> {
    let mut composed = ChangefeedSubscribeResponse::default();
    for payload in payloads {
        match payload {
            ReadResponsePayload::ChangefeedSubscribe(resp) => {
                composed.server_uuids.extend(resp.server_uuids);
                composed.addrs.extend(resp.addrs);
            }
            _ => {
                return Err(ShardingError::invariant(
                    "mismatched response variant for changefeed_subscribe",
                ))
            }
        }
    }
    Ok(ReadResponsePayload::ChangefeedSubscribe(composed))
}

fn unshard_changefeed_stamp(
    payloads: Vec<ReadResponsePayload>,
) -> ShardingResult<ReadResponsePayload> {
    // Stamps are monotonically increasing per peer (the feed layer's
    // contract), so the per-peer maximum is the freshest.
    let mut composed = ChangefeedStampResponse::default();
    for payload in payloads {
        match payload {
            ReadResponsePayload::ChangefeedStamp(resp) => {
                for (peer, stamp) in resp.stamps {
                    composed
                        .stamps
                        .entry(peer)
                        .and_modify(|existing| *existing = (*existing).max(stamp))
                        .or_insert(stamp);
                }
            }
            _ => {
                return Err(ShardingError::invariant(
                    "mismatched response variant for changefeed_stamp",
                ))
            }
        }
    }
    Ok(ReadResponsePayload::ChangefeedStamp(composed))
}
