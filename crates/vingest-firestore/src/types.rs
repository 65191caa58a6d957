//! Firestore REST API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Firestore document value types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    NullValue(()),
    BooleanValue(bool),
    IntegerValue(String), // Firestore sends integers as strings
    DoubleValue(f64),
    TimestampValue(String),
    StringValue(String),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    pub values: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapValue {
    pub fields: Option<HashMap<String, Value>>,
}

/// Firestore document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Full resource name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Document fields
    pub fields: Option<HashMap<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    /// Used as the optimistic concurrency token on writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Create a new document with the given fields.
    pub fn new(fields: HashMap<String, Value>) -> Self {
        Self {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        }
    }

    /// Look up a single top-level field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.as_ref().and_then(|f| f.get(name))
    }

    /// Read a typed top-level field.
    pub fn get<T: FromFirestoreValue>(&self, name: &str) -> Option<T> {
        self.field(name).and_then(T::from_firestore_value)
    }
}

// ============================================================================
// Rust <-> Firestore conversion
// ============================================================================

/// Convert Rust type to Firestore Value.
pub trait ToFirestoreValue {
    fn to_firestore_value(&self) -> Value;
}

impl ToFirestoreValue for String {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue(self.clone())
    }
}

impl ToFirestoreValue for &str {
    fn to_firestore_value(&self) -> Value {
        Value::StringValue((*self).to_string())
    }
}

impl ToFirestoreValue for i64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u32 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for u64 {
    fn to_firestore_value(&self) -> Value {
        Value::IntegerValue(self.to_string())
    }
}

impl ToFirestoreValue for f64 {
    fn to_firestore_value(&self) -> Value {
        Value::DoubleValue(*self)
    }
}

impl ToFirestoreValue for bool {
    fn to_firestore_value(&self) -> Value {
        Value::BooleanValue(*self)
    }
}

impl ToFirestoreValue for DateTime<Utc> {
    fn to_firestore_value(&self) -> Value {
        Value::TimestampValue(self.to_rfc3339())
    }
}

impl<T: ToFirestoreValue> ToFirestoreValue for Option<T> {
    fn to_firestore_value(&self) -> Value {
        match self {
            Some(v) => v.to_firestore_value(),
            None => Value::NullValue(()),
        }
    }
}

/// Convert Firestore Value to Rust type.
pub trait FromFirestoreValue: Sized {
    fn from_firestore_value(value: &Value) -> Option<Self>;
}

impl FromFirestoreValue for String {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::StringValue(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromFirestoreValue for i64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u32 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for u64 {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntegerValue(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl FromFirestoreValue for bool {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromFirestoreValue for DateTime<Utc> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::TimestampValue(s) | Value::StringValue(s) => {
                DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.into())
            }
            _ => None,
        }
    }
}

impl<T: FromFirestoreValue> FromFirestoreValue for Option<T> {
    fn from_firestore_value(value: &Value) -> Option<Self> {
        match value {
            Value::NullValue(()) => Some(None),
            other => T::from_firestore_value(other).map(Some),
        }
    }
}

// ============================================================================
// JSON <-> Firestore conversion
// ============================================================================

/// Encode a JSON value as a Firestore value.
///
/// Integral numbers become `integerValue`, other numbers `doubleValue`.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::NullValue(()),
        serde_json::Value::Bool(b) => b.to_firestore_value(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_firestore_value()
            } else if let Some(u) = n.as_u64() {
                u.to_firestore_value()
            } else {
                Value::DoubleValue(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => Value::StringValue(s.clone()),
        serde_json::Value::Array(items) => Value::ArrayValue(ArrayValue {
            values: Some(items.iter().map(json_to_value).collect()),
        }),
        serde_json::Value::Object(map) => Value::MapValue(MapValue {
            fields: Some(json_object_to_fields(map)),
        }),
    }
}

/// Encode a JSON object as document fields.
pub fn json_object_to_fields(map: &serde_json::Map<String, serde_json::Value>) -> HashMap<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), json_to_value(v))).collect()
}

/// Decode a Firestore value into JSON.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::NullValue(()) => serde_json::Value::Null,
        Value::BooleanValue(b) => serde_json::Value::Bool(*b),
        Value::IntegerValue(s) => s
            .parse::<i64>()
            .map(serde_json::Value::from)
            .or_else(|_| s.parse::<u64>().map(serde_json::Value::from))
            .unwrap_or_else(|_| serde_json::Value::String(s.clone())),
        Value::DoubleValue(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::TimestampValue(s) | Value::StringValue(s) => serde_json::Value::String(s.clone()),
        Value::ArrayValue(arr) => serde_json::Value::Array(
            arr.values
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(value_to_json)
                .collect(),
        ),
        Value::MapValue(map) => fields_to_json(map.fields.as_ref()),
    }
}

/// Decode document fields into a JSON object.
pub fn fields_to_json(fields: Option<&HashMap<String, Value>>) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    if let Some(fields) = fields {
        for (k, v) in fields {
            out.insert(k.clone(), value_to_json(v));
        }
    }
    serde_json::Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_wire_format() {
        let v = 42u32.to_firestore_value();
        assert_eq!(serde_json::to_value(&v).unwrap(), json!({"integerValue": "42"}));

        let null: Option<String> = None;
        assert_eq!(
            serde_json::to_value(null.to_firestore_value()).unwrap(),
            json!({"nullValue": null})
        );
    }

    #[test]
    fn test_nested_json_survives_conversion() {
        let original = json!({
            "status": "ready_for_analysis",
            "retry_count": 2,
            "metadata": {"title": "Clip", "is_hd": true, "tags": ["a", "b"], "thumbnail_url": null}
        });
        let serde_json::Value::Object(map) = &original else {
            unreachable!()
        };
        let fields = json_object_to_fields(map);
        assert!(matches!(fields.get("retry_count"), Some(Value::IntegerValue(s)) if s == "2"));
        assert_eq!(fields_to_json(Some(&fields)), original);
    }

    #[test]
    fn test_document_typed_getters() {
        let mut fields = HashMap::new();
        fields.insert("status".to_string(), "processing".to_firestore_value());
        fields.insert("retry_count".to_string(), 3u32.to_firestore_value());
        let doc = Document::new(fields);

        assert_eq!(doc.get::<String>("status").as_deref(), Some("processing"));
        assert_eq!(doc.get::<u32>("retry_count"), Some(3));
        assert_eq!(doc.get::<bool>("missing"), None);
    }

    #[test]
    fn test_document_deserializes_from_rest_payload() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/video_acquisitions/j1",
            "fields": {"status": {"stringValue": "error"}},
            "createTime": "2024-01-01T00:00:00Z",
            "updateTime": "2024-01-01T00:00:01.5Z"
        }))
        .unwrap();
        assert_eq!(doc.update_time.as_deref(), Some("2024-01-01T00:00:01.5Z"));
        assert_eq!(doc.get::<String>("status").as_deref(), Some("error"));
    }
}
