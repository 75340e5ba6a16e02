use crate::error::SyncError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Extracts the dedup key of a record
pub type KeyFn<R, K> = Arc<dyn Fn(&R) -> K + Send + Sync>;

/// Counters describing one merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// Records in the response
    pub received: usize,
    /// Records kept after dedup
    pub retained: usize,
    /// Records that replaced an earlier record with the same key
    pub duplicates: usize,
}

/// Decode a response body into records. An array yields one record per
/// element; a single object is a one-record response.
pub fn records_from_value<R: DeserializeOwned>(body: Value) -> Result<Vec<R>, SyncError> {
    match body {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::from_value(item).map_err(|e| SyncError::ParseFailure(format!("record {i}: {e}")))
            })
            .collect(),
        single @ Value::Object(_) => Ok(vec![serde_json::from_value(single)?]),
        other => Err(SyncError::ParseFailure(format!("expected a JSON array or object, got {}", kind_of(&other)))),
    }
}

/// Fold records into a key-unique collection. A key keeps the position of its
/// first occurrence and the value of its last one.
pub fn dedup_by_key<R, K>(records: Vec<R>, key_of: impl Fn(&R) -> K) -> (Vec<R>, MergeStats)
where
    K: Eq + Hash,
{
    let received = records.len();
    let mut positions: HashMap<K, usize> = HashMap::with_capacity(received);
    let mut collection: Vec<R> = Vec::with_capacity(received);
    let mut duplicates = 0;

    for record in records {
        match positions.entry(key_of(&record)) {
            Entry::Occupied(slot) => {
                collection[*slot.get()] = record;
                duplicates += 1;
            }
            Entry::Vacant(slot) => {
                slot.insert(collection.len());
                collection.push(record);
            }
        }
    }

    let stats = MergeStats { received, retained: collection.len(), duplicates };
    (collection, stats)
}

/// Decode and dedup a response in one step
pub fn merge_response<R, K>(body: Value, key_of: &KeyFn<R, K>) -> Result<(Vec<R>, MergeStats), SyncError>
where
    R: DeserializeOwned,
    K: Eq + Hash,
{
    let records = records_from_value(body)?;
    Ok(dedup_by_key(records, |r| key_of(r)))
}

/// Key function that gives every record its own key, for series with no
/// natural identifier. Keys keep counting across fetches.
pub fn sequential_keys<R: 'static>() -> KeyFn<R, u64> {
    let next = AtomicU64::new(0);
    Arc::new(move |_: &R| next.fetch_add(1, Ordering::Relaxed))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
