// Conversion between plain JSON and Firestore's typed value encoding.
//
// Only the keys in `TIMESTAMP_KEYS` carry `chrono::DateTime` values; those are
// stored as native Firestore timestamps. Every other string stays a string.

use chrono::DateTime;
use serde_json::{json, Map, Value};

/// Serialized names of the `DateTime` fields in the stored documents
const TIMESTAMP_KEYS: &[&str] = &[
    "created",
    "updated",
    "lastSeen",
    "lastActivity",
    "lastLog",
    "lastUpdated",
    "joinDate",
];

/// Encodes a value stored under `key`; a key may be a dotted field path
pub fn encode_field(key: &str, value: &Value) -> Value {
    let name = key.rsplit('.').next().unwrap_or(key);
    match value {
        Value::String(s) if TIMESTAMP_KEYS.contains(&name) && is_timestamp(s) => {
            json!({ "timestampValue": s })
        }
        _ => encode_value(value),
    }
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// `fields` object of a document body
pub fn encode_fields(map: &Map<String, Value>) -> Value {
    Value::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), encode_field(key, value)))
            .collect(),
    )
}

pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|obj| obj.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "stringValue" | "timestampValue" | "booleanValue" | "doubleValue" | "referenceValue" => {
            inner.clone()
        }
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| inner.clone()),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => decode_fields(inner.get("fields")),
        _ => Value::Null,
    }
}

/// Decodes a document's `fields`; a missing field set is an empty object
pub fn decode_fields(fields: Option<&Value>) -> Value {
    let map = fields
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(key, value)| (key.clone(), decode_value(value)))
                .collect::<Map<_, _>>()
        })
        .unwrap_or_default();
    Value::Object(map)
}

/// Last path segment of a document `name`
pub fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn is_timestamp(s: &str) -> bool {
    s.len() >= 20 && s.contains('T') && DateTime::parse_from_rfc3339(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_scalars() {
        assert_eq!(encode_value(&json!(3)), json!({ "integerValue": "3" }));
        assert_eq!(encode_value(&json!(2.5)), json!({ "doubleValue": 2.5 }));
        assert_eq!(encode_value(&json!("anime")), json!({ "stringValue": "anime" }));
        assert_eq!(encode_value(&json!(null)), json!({ "nullValue": null }));
    }

    #[test]
    fn test_only_datetime_fields_become_timestamps() {
        let doc = json!({
            "timestamps": { "created": "2025-01-05T10:00:00+09:00", "date": "2025-01-05" },
            "activity": { "title": "2025-01-05T10:00:00+09:00", "comment": "2025-01-05T10:00:00Z" }
        });
        let encoded = encode_fields(doc.as_object().unwrap());
        let timestamps = &encoded["timestamps"]["mapValue"]["fields"];
        let activity = &encoded["activity"]["mapValue"]["fields"];

        assert_eq!(timestamps["created"], json!({ "timestampValue": "2025-01-05T10:00:00+09:00" }));
        assert_eq!(timestamps["date"], json!({ "stringValue": "2025-01-05" }));
        assert_eq!(activity["title"], json!({ "stringValue": "2025-01-05T10:00:00+09:00" }));
        assert_eq!(activity["comment"], json!({ "stringValue": "2025-01-05T10:00:00Z" }));
        assert_eq!(decode_fields(Some(&encoded)), doc);
    }

    #[test]
    fn test_field_paths_use_their_last_segment() {
        assert_eq!(
            encode_field("timestamps.created", &json!("2025-01-05T10:00:00Z")),
            json!({ "timestampValue": "2025-01-05T10:00:00Z" })
        );
        assert_eq!(
            encode_field("created", &json!("not a date")),
            json!({ "stringValue": "not a date" })
        );
    }

    #[test]
    fn test_decode_nested_document() {
        let fields = json!({
            "activity": { "mapValue": { "fields": {
                "type": { "stringValue": "manga" },
                "amount": { "integerValue": "40" }
            }}},
            "tags": { "arrayValue": { "values": [ { "booleanValue": true } ] } },
            "empty": { "arrayValue": {} },
            "created": { "timestampValue": "2024-02-01T00:00:00.123Z" }
        });
        let decoded = decode_fields(Some(&fields));

        assert_eq!(decoded["activity"]["type"], "manga");
        assert_eq!(decoded["activity"]["amount"], 40);
        assert_eq!(decoded["tags"], json!([true]));
        assert_eq!(decoded["empty"], json!([]));
        assert_eq!(decoded["created"], "2024-02-01T00:00:00.123Z");
    }

    #[test]
    fn test_encoded_map_decodes_back() {
        let original = json!({ "stats": { "anime": { "total": 12.5, "sessions": 3 } } });
        let encoded = encode_fields(original.as_object().unwrap());
        assert_eq!(decode_fields(Some(&encoded)), original);
    }

    #[test]
    fn test_document_id() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/users/1/immersion_logs/abc"),
            "abc"
        );
    }
}
