//! Composing per-shard write responses
//!
//! Batched writes are the only writes that fan out; their per-shard
//! statistics objects merge structurally. Everything else hits exactly
//! one shard and passes through.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::operation::{Limits, Write, WriteOp, WriteResponse, WriteResponsePayload};

use super::errors::{ShardingError, ShardingResult};

/// Fields whose numeric values add across shards.
const COUNTER_FIELDS: [&str; 6] = [
    "inserted",
    "replaced",
    "unchanged",
    "errors",
    "skipped",
    "deleted",
];

impl Write {
    /// Composes the per-shard responses for this write.
    ///
    /// `responses` must hold exactly one entry per shard that accepted
    /// the sharded operation, in shard index order.
    pub fn unshard(&self, mut responses: Vec<WriteResponse>) -> ShardingResult<WriteResponse> {
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

        let payloads: Vec<WriteResponsePayload> =
            responses.into_iter().map(|r| r.payload).collect();

        let payload = match &self.op {
            WriteOp::BatchedReplace { .. } | WriteOp::BatchedInsert { .. } => {
                let mut stats = Vec::with_capacity(payloads.len());
                for payload in payloads {
                    match payload {
                        WriteResponsePayload::Batched { stats: s } => stats.push(s),
                        _ => {
                            return Err(ShardingError::invariant(format!(
                                "mismatched response variant for {}",
                                self.op.name()
                            )))
                        }
                    }
                }
                WriteResponsePayload::Batched {
                    stats: merge_write_stats(stats, &self.limits),
                }
            }
            _ => {
                if payloads.len() != 1 {
                    return Err(ShardingError::invariant(format!(
                        "{} expects exactly one shard response, got {}",
                        self.op.name(),
                        payloads.len()
                    )));
                }
                let payload = payloads.into_iter().next().ok_or_else(|| {
                    ShardingError::invariant("write response buffer emptied unexpectedly")
                })?;
                if !variant_matches(&self.op, &payload) {
                    return Err(ShardingError::invariant(format!(
                        "mismatched response variant for {}",
                        self.op.name()
                    )));
                }
                payload
            }
        };

        Ok(WriteResponse {
            payload,
            event_log,
            n_shards,
        })
    }
}

fn variant_matches(op: &WriteOp, payload: &WriteResponsePayload) -> bool {
    matches!(
        (op, payload),
        (
            WriteOp::PointWrite { .. },
            WriteResponsePayload::PointWrite { .. }
        ) | (
            WriteOp::PointDelete { .. },
            WriteResponsePayload::PointDelete { .. }
        ) | (
            WriteOp::IndexCreate { .. },
            WriteResponsePayload::IndexCreate { .. }
        ) | (
            WriteOp::IndexDrop { .. },
            WriteResponsePayload::IndexDrop { .. }
        ) | (
            WriteOp::IndexRename { .. },
            WriteResponsePayload::IndexRename { .. }
        ) | (WriteOp::Sync { .. }, WriteResponsePayload::Sync)
    )
}

/// Structurally merges per-shard statistics objects.
///
/// Counter fields sum; arrays concatenate (capped afterwards by the
/// caller's limits); objects merge recursively; other conflicting values
/// keep the first writer and record a warning. Per-shard warning sets
/// union with dedup.
pub fn merge_write_stats(stats: Vec<Value>, limits: &Limits) -> Value {
    let mut warnings: BTreeSet<String> = BTreeSet::new();
    let mut composed = Map::new();

    for shard_stats in stats {
        let Value::Object(mut fields) = shard_stats else {
            warnings.insert("non-object statistics from a shard were dropped".to_string());
            continue;
        };
        // Warning sets union instead of merging structurally.
        if let Some(Value::Array(shard_warnings)) = fields.remove("warnings") {
            for warning in shard_warnings {
                if let Value::String(w) = warning {
                    warnings.insert(w);
                }
            }
        }
        merge_objects(&mut composed, fields, &mut warnings);
    }

    let mut composed = Value::Object(composed);
    cap_arrays(&mut composed, limits.array_size_limit, &mut warnings);

    if !warnings.is_empty() {
        if let Value::Object(fields) = &mut composed {
            fields.insert(
                "warnings".to_string(),
                Value::Array(warnings.into_iter().map(Value::String).collect()),
            );
        }
    }
    composed
}

fn merge_objects(into: &mut Map<String, Value>, from: Map<String, Value>, warnings: &mut BTreeSet<String>) {
    for (key, value) in from {
        match into.get_mut(&key) {
            None => {
                into.insert(key, value);
            }
            Some(existing) => merge_field(&key, existing, value, warnings),
        }
    }
}

fn merge_field(key: &str, existing: &mut Value, incoming: Value, warnings: &mut BTreeSet<String>) {
    match (existing, incoming) {
        (Value::Number(a), Value::Number(b)) if COUNTER_FIELDS.contains(&key) => {
            let sum = a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0);
            *a = sum.into();
        }
        (Value::Array(a), Value::Array(b)) => {
            a.extend(b);
        }
        (Value::Object(a), Value::Object(b)) => {
            merge_objects(a, b, warnings);
        }
        (existing, incoming) => {
            // First writer wins on conflicting scalars; a silent pick
            // would hide shard disagreement, so it is recorded.
            if *existing != incoming {
                warnings.insert(format!("conflicting values for field `{key}`"));
            }
        }
    }
}

fn cap_arrays(value: &mut Value, limit: usize, warnings: &mut BTreeSet<String>) {
    match value {
        Value::Array(items) => {
            if items.len() > limit {
                items.truncate(limit);
                warnings.insert(format!("array limit of {limit} reached, result truncated"));
            }
            for item in items {
                cap_arrays(item, limit, warnings);
            }
        }
        Value::Object(fields) => {
            for field in fields.values_mut() {
                cap_arrays(field, limit, warnings);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{
        ConflictBehavior, PointWriteResult, WriteOp,
    };
    use crate::region::StoreKey;
    use serde_json::json;

    fn batched_insert() -> Write {
        Write::new(WriteOp::BatchedInsert {
            rows: vec![json!({"id": "a"}), json!({"id": "b"})],
            primary_key: "id".to_string(),
            conflict: ConflictBehavior::Error,
            limits: Limits::default(),
            return_changes: true,
        })
    }

    fn batched_resp(stats: Value) -> WriteResponse {
        WriteResponse::new(WriteResponsePayload::Batched { stats })
    }

    #[test]
    fn test_counters_sum_across_shards() {
        let write = batched_insert();
        let out = write
            .unshard(vec![
                batched_resp(json!({"inserted": 2, "errors": 0})),
                batched_resp(json!({"inserted": 3, "errors": 1})),
            ])
            .unwrap();
        match out.payload {
            WriteResponsePayload::Batched { stats } => {
                assert_eq!(stats["inserted"], json!(5));
                assert_eq!(stats["errors"], json!(1));
            }
            _ => panic!("expected batched response"),
        }
    }

    #[test]
    fn test_changes_concatenate() {
        let write = batched_insert();
        let out = write
            .unshard(vec![
                batched_resp(json!({"inserted": 1, "changes": [{"new_val": {"id": "a"}}]})),
                batched_resp(json!({"inserted": 1, "changes": [{"new_val": {"id": "b"}}]})),
            ])
            .unwrap();
        match out.payload {
            WriteResponsePayload::Batched { stats } => {
                assert_eq!(stats["changes"].as_array().unwrap().len(), 2);
            }
            _ => panic!("expected batched response"),
        }
    }

    #[test]
    fn test_conflicting_scalar_first_writer_wins() {
        let write = batched_insert();
        let out = write
            .unshard(vec![
                batched_resp(json!({"first_error": "left", "inserted": 1})),
                batched_resp(json!({"first_error": "right", "inserted": 1})),
            ])
            .unwrap();
        match out.payload {
            WriteResponsePayload::Batched { stats } => {
                assert_eq!(stats["first_error"], json!("left"));
                let warnings = stats["warnings"].as_array().unwrap();
                assert!(warnings
                    .iter()
                    .any(|w| w.as_str().unwrap().contains("first_error")));
            }
            _ => panic!("expected batched response"),
        }
    }

    #[test]
    fn test_warning_sets_dedup() {
        let write = batched_insert();
        let out = write
            .unshard(vec![
                batched_resp(json!({"inserted": 1, "warnings": ["slow index"]})),
                batched_resp(json!({"inserted": 1, "warnings": ["slow index"]})),
            ])
            .unwrap();
        match out.payload {
            WriteResponsePayload::Batched { stats } => {
                assert_eq!(stats["warnings"], json!(["slow index"]));
            }
            _ => panic!("expected batched response"),
        }
    }

    #[test]
    fn test_array_limit_caps_changes() {
        let mut write = batched_insert();
        write.limits = Limits {
            array_size_limit: 2,
        };
        let changes: Vec<Value> = (0..5).map(|i| json!({"new_val": {"n": i}})).collect();
        let out = write
            .unshard(vec![batched_resp(json!({"changes": changes}))])
            .unwrap();
        match out.payload {
            WriteResponsePayload::Batched { stats } => {
                assert_eq!(stats["changes"].as_array().unwrap().len(), 2);
                assert!(stats["warnings"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .any(|w| w.as_str().unwrap().contains("array limit")));
            }
            _ => panic!("expected batched response"),
        }
    }

    #[test]
    fn test_point_write_passthrough() {
        let write = Write::new(WriteOp::PointWrite {
            key: StoreKey::from("k"),
            data: json!({"id": "k"}),
            overwrite: false,
        });
        let resp = WriteResponse::new(WriteResponsePayload::PointWrite {
            result: PointWriteResult::Stored,
        });
        let out = write.unshard(vec![resp.clone()]).unwrap();
        assert_eq!(out.payload, resp.payload);
    }

    #[test]
    fn test_point_write_count_invariant() {
        let write = Write::new(WriteOp::PointWrite {
            key: StoreKey::from("k"),
            data: json!({}),
            overwrite: false,
        });
        let resp = WriteResponse::new(WriteResponsePayload::PointWrite {
            result: PointWriteResult::Stored,
        });
        let err = write.unshard(vec![resp.clone(), resp]).unwrap_err();
        assert!(matches!(err, ShardingError::InvariantViolation(_)));
    }

    #[test]
    fn test_mismatched_variant_rejected() {
        let write = Write::new(WriteOp::Sync {
            region: crate::region::Region::universe(),
        });
        let resp = WriteResponse::new(WriteResponsePayload::IndexDrop { success: true });
        let err = write.unshard(vec![resp]).unwrap_err();
        assert!(matches!(err, ShardingError::InvariantViolation(_)));
    }
}
