//! Mapping between plain JSON and Firestore's typed value encoding.

use serde_json::{json, Map, Value};

/// Encode a JSON object as a Firestore `fields` map
pub fn to_fields(object: &Map<String, Value>) -> Map<String, Value> {
    object.iter().map(|(k, v)| (k.clone(), encode(v))).collect()
}

/// Decode a Firestore `fields` map back into a JSON object
pub fn from_fields(fields: &Map<String, Value>) -> Result<Value, String> {
    let mut object = Map::with_capacity(fields.len());
    for (key, value) in fields {
        object.insert(key.clone(), decode(value).map_err(|e| format!("{key}: {e}"))?);
    }
    Ok(Value::Object(object))
}

pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({ "integerValue": n.to_string() }),
        Value::Number(n) => json!({ "doubleValue": n }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(object) => json!({ "mapValue": { "fields": to_fields(object) } }),
    }
}

pub fn decode(value: &Value) -> Result<Value, String> {
    let Some((kind, inner)) = value.as_object().and_then(|o| o.iter().next()) else {
        return Err(format!("not a typed value: {value}"));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| format!("bad booleanValue {inner}")),
        "integerValue" => {
            // The API returns int64 as a string
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| format!("bad integerValue {inner}"))
        }
        "doubleValue" => inner
            .as_f64()
            .map(Value::from)
            .ok_or_else(|| format!("bad doubleValue {inner}")),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| format!("bad {kind} {inner}")),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => match inner.get("fields").and_then(Value::as_object) {
            Some(fields) => from_fields(fields),
            None => Ok(Value::Object(Map::new())),
        },
        other => Err(format!("unsupported value type {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_scalars() {
        assert_eq!(encode(&json!(42)), json!({ "integerValue": "42" }));
        assert_eq!(encode(&json!(1.25)), json!({ "doubleValue": 1.25 }));
        assert_eq!(encode(&json!("x")), json!({ "stringValue": "x" }));
        assert_eq!(encode(&json!(null)), json!({ "nullValue": null }));
    }

    #[test]
    fn nested_objects_survive_a_round_trip() {
        let original = json!({
            "id": "123",
            "price": 150,
            "analysis": { "recommendation": "buy", "score": 7.5, "error": null },
            "tags": ["a", "b"],
            "empty": []
        });
        let fields = to_fields(original.as_object().unwrap());
        assert_eq!(from_fields(&fields).unwrap(), original);
    }

    #[test]
    fn whole_doubles_decode_from_integer_json() {
        // Firestore renders 50.0 as `50`
        assert_eq!(decode(&json!({ "doubleValue": 50 })).unwrap().as_f64(), Some(50.0));
    }

    #[test]
    fn timestamps_decode_as_strings() {
        assert_eq!(
            decode(&json!({ "timestampValue": "2024-05-01T10:00:00Z" })).unwrap(),
            json!("2024-05-01T10:00:00Z")
        );
    }

    #[test]
    fn rejects_untyped_values() {
        assert!(decode(&json!("plain")).is_err());
        assert!(decode(&json!({ "geoPointValue": {} })).is_err());
    }
}
