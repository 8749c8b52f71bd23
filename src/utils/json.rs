use bson::{Bson, Document};
use serde_json::Value;

use crate::errors::QueryError;

/// Convert JSON into BSON without extended-JSON interpretation, so operator keys such
/// as `$regex` or `$date` stay plain document keys. Integers that fit in 32 bits
/// become `Int32`, larger ones `Int64`, everything else `Double`.
pub fn json_to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32)
            } else {
                Bson::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Bson::String(s),
        Value::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(json_object_to_document(map)),
    }
}

pub fn json_object_to_document(map: serde_json::Map<String, Value>) -> Document {
    map.into_iter().map(|(k, v)| (k, json_to_bson(v))).collect()
}

/// Parse JSON text that must hold a top-level object.
pub fn parse_json_document(json: &str) -> Result<Document, QueryError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => Ok(json_object_to_document(map)),
        other => Err(QueryError::InvalidQuery(format!("expected a JSON object, got {other}"))),
    }
}

/// Render BSON as plain JSON, the inverse of [`json_to_bson`] for JSON-compatible values.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Bson::String(s) => Value::String(s.clone()),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => {
            Value::Object(doc.iter().map(|(k, v)| (k.clone(), bson_to_json(v))).collect())
        }
        other => Value::String(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_to_bson_keeps_operator_keys_and_order() {
        let d = parse_json_document(r#"{"b":{"$regex":"^a","$options":"i"},"a":1}"#).unwrap();
        let keys: Vec<&str> = d.keys().map(String::as_str).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(d.get_document("b").unwrap().get_str("$regex").unwrap(), "^a");
        assert_eq!(d.get_i32("a").unwrap(), 1);
    }

    #[test]
    fn json_to_bson_widens_large_integers() {
        assert_eq!(json_to_bson(serde_json::json!(5_000_000_000i64)), Bson::Int64(5_000_000_000));
        assert_eq!(json_to_bson(serde_json::json!(1.5)), Bson::Double(1.5));
    }

    #[test]
    fn json_to_bson_rejects_array() {
        let e = parse_json_document("[1,2,3]").unwrap_err();
        assert!(matches!(e, QueryError::InvalidQuery(_)));
    }

    #[test]
    fn bson_to_json_renders_plain_values() {
        let v = bson_to_json(&Bson::Document(bson::doc! { "a": [1, "x", null] }));
        assert_eq!(v, serde_json::json!({ "a": [1, "x", null] }));
    }
}
