//! Lenient field decoders for records written by other clients.
//!
//! The realtime database turns arrays into keyed objects once they have
//! holes, and the citizen app writes timestamps both as ISO strings and as
//! epoch milliseconds, so every such field goes through one of these.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Parse a timestamp from RFC 3339 text, a naive `YYYY-MM-DD HH:MM:SS`
/// string, or epoch milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    s.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
}

/// Scalar text of a field. Numbers and booleans are rendered, anything
/// else is absent.
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Values of an array, or of an object in key order. Integer keys (an
/// array with holes) sort numerically and come before push ids. Nulls
/// are skipped.
pub fn list_values(value: Value) -> Vec<Value> {
    list_entries(value)
        .into_iter()
        .filter(|v| !v.is_null())
        .collect()
}

/// Like [`list_values`] but keeps nulls, so parallel lists stay aligned.
fn list_entries(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| {
                match (a.0.parse::<u64>(), b.0.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => a.0.cmp(&b.0),
                }
            });
            entries.into_iter().map(|(_, v)| v).collect()
        }
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(list_values(value)
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

/// Timestamps kept by position. An unreadable entry stays as `None` so the
/// n-th timestamp still belongs to the n-th photo.
pub fn timestamp_list<'de, D>(deserializer: D) -> Result<Vec<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(list_entries(value).iter().map(parse_timestamp).collect())
}

pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(parse_timestamp(&value))
}

/// Strings that may have been written as numbers (pincodes, phones).
pub fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(text(&value).unwrap_or_default())
}

pub fn optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(text(&value).filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_timestamp_variants() {
        let iso = parse_timestamp(&json!("2024-05-01T10:30:00Z")).unwrap();
        let naive = parse_timestamp(&json!("2024-05-01 10:30:00")).unwrap();
        let millis = parse_timestamp(&json!(1714559400000i64)).unwrap();
        assert_eq!(iso, naive);
        assert_eq!(iso, millis);
        assert!(parse_timestamp(&json!("")).is_none());
        assert!(parse_timestamp(&json!("yesterday")).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }

    #[test]
    fn test_list_values_from_object_in_key_order() {
        let values = list_values(json!({ "b": "second", "a": "first", "c": null }));
        assert_eq!(values, vec![json!("first"), json!("second")]);
    }

    #[test]
    fn test_list_values_orders_index_keys_numerically() {
        let mut map = serde_json::Map::new();
        for i in (0..12).rev() {
            map.insert(i.to_string(), json!(format!("photo-{i}")));
        }
        let values = list_values(Value::Object(map));
        let expected: Vec<Value> = (0..12).map(|i| json!(format!("photo-{i}"))).collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn test_timestamp_list_keeps_positions() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "timestamp_list")]
            at: Vec<Option<DateTime<Utc>>>,
        }
        let row: Row = serde_json::from_value(json!({
            "at": ["2024-05-01T10:30:00Z", "soon", 1714559400000i64]
        }))
        .unwrap();
        assert_eq!(row.at.len(), 3);
        assert!(row.at[0].is_some());
        assert!(row.at[1].is_none());
        assert_eq!(row.at[2], row.at[0]);
    }

    #[test]
    fn test_text_renders_scalars_only() {
        assert_eq!(text(&json!("a")), Some("a".to_string()));
        assert_eq!(text(&json!(110001)), Some("110001".to_string()));
        assert_eq!(text(&json!({ "lat": 1 })), None);
    }

    #[test]
    fn test_list_values_from_sparse_array() {
        let values = list_values(json!([null, "x", "y"]));
        assert_eq!(values, vec![json!("x"), json!("y")]);
    }
}
