//! Sort-aware accumulators for range-read composition
//!
//! The unsharder feeds each shard's partial result into one accumulator
//! and finishes it to produce the composed payload. Without a terminal
//! the accumulator appends rows under the operation's sort order,
//! bounded by the continuation cursor; with a terminal it folds the
//! shards' partial aggregates.

use serde_json::{json, Value};

use crate::operation::{RangePayload, Row, Sorting, Terminal};
use crate::region::StoreKey;

use super::errors::{ShardingError, ShardingResult};

/// Folds per-shard range-read payloads into one.
///
/// `feed` is called once per shard, in shard index order; `finish`
/// consumes the accumulated state.
pub trait Accumulator {
    fn feed(&mut self, payload: RangePayload) -> ShardingResult<()>;
    fn finish(&mut self) -> RangePayload;
}

/// Instantiates the accumulator for an operation: the terminal's fold
/// when one is attached, otherwise the sort-ordered append.
pub fn make_accumulator(
    terminal: Option<&Terminal>,
    sorting: Sorting,
    bound: StoreKey,
) -> Box<dyn Accumulator> {
    match terminal {
        None => Box::new(AppendAccumulator::new(sorting, bound)),
        Some(Terminal::Count) => Box::new(CountAccumulator::default()),
        Some(Terminal::Sum { .. }) => Box::new(SumAccumulator::default()),
        Some(Terminal::Avg { .. }) => Box::new(AvgAccumulator::default()),
    }
}

/// Appends per-shard row streams into one stream in sort order.
///
/// Rows beyond the continuation cursor are dropped: they will be fetched
/// again on the next page starting from the cursor, so keeping them here
/// would duplicate them.
pub struct AppendAccumulator {
    sorting: Sorting,
    bound: StoreKey,
    streams: Vec<Vec<Row>>,
}

impl AppendAccumulator {
    pub fn new(sorting: Sorting, bound: StoreKey) -> Self {
        AppendAccumulator {
            sorting,
            bound,
            streams: Vec::new(),
        }
    }
}

impl Accumulator for AppendAccumulator {
    fn feed(&mut self, payload: RangePayload) -> ShardingResult<()> {
        match payload {
            RangePayload::Rows(rows) => {
                let bounded: Vec<Row> = rows
                    .into_iter()
                    .filter(|row| self.sorting.key_le(&row.key, &self.bound))
                    .collect();
                self.streams.push(bounded);
                Ok(())
            }
            RangePayload::Aggregate(_) => Err(ShardingError::invariant(
                "aggregate partial fed to append accumulator",
            )),
        }
    }

    fn finish(&mut self) -> RangePayload {
        let streams = std::mem::take(&mut self.streams);

        if self.sorting == Sorting::Unordered {
            // No ordering contract: concatenate in shard index order.
            let rows: Vec<Row> = streams.into_iter().flatten().collect();
            return RangePayload::Rows(rows);
        }

        // K-way merge; ties resolve to the lowest shard index, which
        // keeps the merge stable.
        let mut cursors: Vec<(usize, std::vec::IntoIter<Row>)> = streams
            .into_iter()
            .enumerate()
            .map(|(i, s)| (i, s.into_iter()))
            .collect();
        let mut heads: Vec<Option<Row>> = cursors.iter_mut().map(|(_, it)| it.next()).collect();
        let mut merged = Vec::new();

        loop {
            let mut best: Option<usize> = None;
            for (i, head) in heads.iter().enumerate() {
                if let Some(row) = head {
                    let better = match best {
                        None => true,
                        Some(b) => {
                            let best_key = heads[b].as_ref().map(|r| &r.key);
                            match best_key {
                                Some(best_key) => {
                                    self.sorting.key_cmp(&row.key, best_key)
                                        == std::cmp::Ordering::Less
                                }
                                None => true,
                            }
                        }
                    };
                    if better {
                        best = Some(i);
                    }
                }
            }
            match best {
                None => break,
                Some(i) => {
                    if let Some(row) = heads[i].take() {
                        merged.push(row);
                    }
                    heads[i] = cursors[i].1.next();
                }
            }
        }
        RangePayload::Rows(merged)
    }
}

/// Sums per-shard row counts.
#[derive(Default)]
pub struct CountAccumulator {
    total: u64,
}

impl Accumulator for CountAccumulator {
    fn feed(&mut self, payload: RangePayload) -> ShardingResult<()> {
        self.total += aggregate_u64(payload, "count")?;
        Ok(())
    }

    fn finish(&mut self) -> RangePayload {
        RangePayload::Aggregate(json!(self.total))
    }
}

/// Sums per-shard field sums.
#[derive(Default)]
pub struct SumAccumulator {
    total: f64,
}

impl Accumulator for SumAccumulator {
    fn feed(&mut self, payload: RangePayload) -> ShardingResult<()> {
        self.total += aggregate_f64(payload, "sum")?;
        Ok(())
    }

    fn finish(&mut self) -> RangePayload {
        RangePayload::Aggregate(json!(self.total))
    }
}

/// Folds per-shard `[sum, count]` pairs and divides at the end.
#[derive(Default)]
pub struct AvgAccumulator {
    sum: f64,
    count: u64,
}

impl Accumulator for AvgAccumulator {
    fn feed(&mut self, payload: RangePayload) -> ShardingResult<()> {
        let value = aggregate_value(payload)?;
        let pair = value
            .as_array()
            .filter(|a| a.len() == 2)
            .ok_or_else(|| ShardingError::invariant("avg partial is not a [sum, count] pair"))?;
        self.sum += pair[0].as_f64().unwrap_or(0.0);
        self.count += pair[1].as_u64().unwrap_or(0);
        Ok(())
    }

    fn finish(&mut self) -> RangePayload {
        if self.count == 0 {
            RangePayload::Aggregate(Value::Null)
        } else {
            RangePayload::Aggregate(json!(self.sum / self.count as f64))
        }
    }
}

fn aggregate_value(payload: RangePayload) -> ShardingResult<Value> {
    match payload {
        RangePayload::Aggregate(value) => Ok(value),
        RangePayload::Rows(_) => Err(ShardingError::invariant(
            "row stream fed to terminal accumulator",
        )),
    }
}

fn aggregate_u64(payload: RangePayload, what: &str) -> ShardingResult<u64> {
    aggregate_value(payload)?
        .as_u64()
        .ok_or_else(|| ShardingError::invariant(format!("{what} partial is not an integer")))
}

fn aggregate_f64(payload: RangePayload, what: &str) -> ShardingResult<f64> {
    aggregate_value(payload)?
        .as_f64()
        .ok_or_else(|| ShardingError::invariant(format!("{what} partial is not a number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(keys: &[&str]) -> RangePayload {
        RangePayload::Rows(
            keys.iter()
                .map(|k| Row {
                    key: StoreKey::from(*k),
                    value: json!({"id": k}),
                })
                .collect(),
        )
    }

    fn keys_of(payload: RangePayload) -> Vec<String> {
        match payload {
            RangePayload::Rows(rows) => rows.iter().map(|r| r.key.to_string()).collect(),
            RangePayload::Aggregate(_) => panic!("expected rows"),
        }
    }

    #[test]
    fn test_append_merges_in_sort_order() {
        let mut acc = AppendAccumulator::new(Sorting::Ascending, StoreKey::max());
        acc.feed(rows(&["a", "d", "f"])).unwrap();
        acc.feed(rows(&["b", "c", "g"])).unwrap();
        assert_eq!(keys_of(acc.finish()), ["a", "b", "c", "d", "f", "g"]);
    }

    #[test]
    fn test_append_descending() {
        let mut acc = AppendAccumulator::new(Sorting::Descending, StoreKey::min());
        acc.feed(rows(&["f", "d", "a"])).unwrap();
        acc.feed(rows(&["g", "c", "b"])).unwrap();
        assert_eq!(keys_of(acc.finish()), ["g", "f", "d", "c", "b", "a"]);
    }

    #[test]
    fn test_append_bounds_by_cursor() {
        let mut acc = AppendAccumulator::new(Sorting::Ascending, StoreKey::from("c"));
        acc.feed(rows(&["a", "b", "x"])).unwrap();
        acc.feed(rows(&["c", "y"])).unwrap();
        assert_eq!(keys_of(acc.finish()), ["a", "b", "c"]);
    }

    #[test]
    fn test_unordered_keeps_shard_order() {
        let mut acc = AppendAccumulator::new(Sorting::Unordered, StoreKey::max());
        acc.feed(rows(&["z", "a"])).unwrap();
        acc.feed(rows(&["m"])).unwrap();
        assert_eq!(keys_of(acc.finish()), ["z", "a", "m"]);
    }

    #[test]
    fn test_count_folds_partials() {
        let mut acc = CountAccumulator::default();
        acc.feed(RangePayload::Aggregate(json!(3))).unwrap();
        acc.feed(RangePayload::Aggregate(json!(4))).unwrap();
        assert_eq!(acc.finish(), RangePayload::Aggregate(json!(7)));
    }

    #[test]
    fn test_avg_folds_pairs() {
        let mut acc = AvgAccumulator::default();
        acc.feed(RangePayload::Aggregate(json!([10.0, 2]))).unwrap();
        acc.feed(RangePayload::Aggregate(json!([20.0, 3]))).unwrap();
        assert_eq!(acc.finish(), RangePayload::Aggregate(json!(6.0)));
    }

    #[test]
    fn test_avg_of_nothing_is_null() {
        let mut acc = AvgAccumulator::default();
        assert_eq!(acc.finish(), RangePayload::Aggregate(Value::Null));
    }

    #[test]
    fn test_mismatched_partial_rejected() {
        let mut acc = CountAccumulator::default();
        let err = acc.feed(rows(&["a"])).unwrap_err();
        assert!(matches!(err, ShardingError::InvariantViolation(_)));
    }
}
