//! Tolerant field readers for agency records.
//!
//! The agency stores whatever the cluster actors wrote, including residue of
//! half-finished operations. A value of the wrong shape never fails the
//! parse: it degrades to the empty value of the field, so the record shows up
//! as a zombie or broken finding instead of aborting the run.

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Reads a record, falling back to its default when the value has the wrong shape.
pub(crate) fn record<T: DeserializeOwned + Default>(value: Value) -> T {
    serde_json::from_value(value).unwrap_or_default()
}

fn map_of<T>(value: Value, f: impl Fn(Value) -> T) -> BTreeMap<String, T> {
    match value {
        Value::Object(map) => map.into_iter().map(|(k, v)| (k, f(v))).collect(),
        _ => BTreeMap::new(),
    }
}

pub(crate) fn records<'de, D, T>(d: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Option::<Value>::deserialize(d)?.unwrap_or(Value::Null);
    Ok(map_of(raw, record))
}

pub(crate) fn nested_records<'de, D, T>(
    d: D,
) -> Result<BTreeMap<String, BTreeMap<String, T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Option::<Value>::deserialize(d)?.unwrap_or(Value::Null);
    Ok(map_of(raw, |db| map_of(db, record)))
}

#[allow(clippy::type_complexity)]
pub(crate) fn nested_records3<'de, D, T>(
    d: D,
) -> Result<BTreeMap<String, BTreeMap<String, BTreeMap<String, T>>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Option::<Value>::deserialize(d)?.unwrap_or(Value::Null);
    Ok(map_of(raw, |db| map_of(db, |col| map_of(col, record))))
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Strings and numbers are both accepted; ids show up in either form.
pub(crate) fn string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.as_ref().and_then(as_string))
}

/// Like [`string`], but an empty string counts as absent.
pub(crate) fn non_empty_string<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<String>, D::Error> {
    Ok(string(d)?.filter(|s| !s.is_empty()))
}

pub(crate) fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

pub(crate) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(matches!(raw, Some(Value::Bool(true))))
}

fn strings_of(value: Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(as_string).collect()),
        _ => None,
    }
}

pub(crate) fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.and_then(strings_of).unwrap_or_default())
}

pub(crate) fn opt_string_list<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<Vec<String>>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.and_then(strings_of))
}

/// A shard map is an object of shard name to server list. Anything else
/// (missing, `null`, an array) reads as `None`.
pub(crate) fn shard_map<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<BTreeMap<String, Vec<String>>>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(match raw {
        Some(Value::Object(map)) => Some(
            map.into_iter()
                .map(|(shard, servers)| (shard, strings_of(servers).unwrap_or_default()))
                .collect(),
        ),
        _ => None,
    })
}

/// Server ids given either as an array or as the keys of an object
/// (`Target/FailedServers` maps server id to the shards it held).
pub(crate) fn server_set<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeSet<String>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?;
    Ok(match raw {
        Some(Value::Array(items)) => items.iter().filter_map(as_string).collect(),
        Some(Value::Object(map)) => map.into_iter().map(|(k, _)| k).collect(),
        _ => BTreeSet::new(),
    })
}

/// Raw subtrees kept verbatim; a non-object becomes an empty map.
pub(crate) fn raw_map<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<BTreeMap<String, Value>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?.unwrap_or(Value::Null);
    Ok(map_of(raw, |v| v))
}

pub(crate) fn nested_raw_map<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<BTreeMap<String, BTreeMap<String, Value>>, D::Error> {
    let raw = Option::<Value>::deserialize(d)?.unwrap_or(Value::Null);
    Ok(map_of(raw, |db| map_of(db, |v| v)))
}

pub(crate) fn section<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let raw = Option::<Value>::deserialize(d)?.unwrap_or(Value::Null);
    Ok(record(raw))
}

pub(crate) fn opt_record<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Value>::deserialize(d)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}
