//! Field deserializers that never reject a value. A wrongly typed field turns
//! into `None` (or an empty list) instead of failing the whole record.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(integer_from_value(&Value::deserialize(deserializer)?))
}

pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Moves each alias onto its key. The key keeps its own value unless it is
/// missing or null; the alias is dropped either way, so a record carrying
/// both spellings still decodes.
pub fn fold_aliases(object: &mut Map<String, Value>, aliases: &[(&str, &str)]) {
    for &(alias, key) in aliases {
        let Some(aliased) = object.remove(alias) else {
            continue;
        };
        if object.get(key).map_or(true, Value::is_null) {
            object.insert(key.to_string(), aliased);
        }
    }
}

/// Takes a list out of `object`, leaving nothing behind. Non-lists are empty.
pub fn take_list(object: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match object.remove(key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

pub fn integer_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
