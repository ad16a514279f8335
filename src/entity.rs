//! Entity data model and wire encoding
//!
//! A row is a partition key, a row key, an opaque ETag, and a mapping of named
//! typed properties. Property values are a tagged variant with explicit
//! encode/decode per variant; the wire format is OData JSON with
//! `@odata.type` annotations for the types JSON cannot carry natively.

use crate::errors::{Result, TableError};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Ordered property map.
///
/// Ordered so that serializing the same entity twice produces identical
/// bytes, which the batch serializer relies on for retry safety.
pub type Properties = BTreeMap<String, EntityValue>;

/// A typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityValue {
    /// UTF-8 string
    String(String),
    /// 32-bit integer
    Int32(i32),
    /// 64-bit integer (transmitted as an annotated decimal string)
    Int64(i64),
    /// Boolean
    Boolean(bool),
    /// 64-bit float
    Double(f64),
    /// UTC timestamp
    DateTime(DateTime<Utc>),
    /// Raw bytes (transmitted as annotated base64)
    Binary(Vec<u8>),
    /// Explicit null: the property exists but has no value.
    ///
    /// Distinct from omitting the property, which on a replace deletes it.
    Null,
}

impl EntityValue {
    /// Whether this value is the explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, EntityValue::Null)
    }

    /// OData type annotation for variants that need one
    fn odata_type(&self) -> Option<&'static str> {
        match self {
            EntityValue::Int64(_) => Some("Edm.Int64"),
            EntityValue::Double(_) => Some("Edm.Double"),
            EntityValue::DateTime(_) => Some("Edm.DateTime"),
            EntityValue::Binary(_) => Some("Edm.Binary"),
            _ => None,
        }
    }

    /// Wire representation of the value itself, without the annotation
    fn wire_value(&self) -> Value {
        match self {
            EntityValue::String(s) => Value::String(s.clone()),
            EntityValue::Int32(n) => Value::from(*n),
            EntityValue::Int64(n) => Value::String(n.to_string()),
            EntityValue::Boolean(b) => Value::Bool(*b),
            EntityValue::Double(f) => Value::from(*f),
            EntityValue::DateTime(t) => {
                Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            EntityValue::Binary(bytes) => Value::String(BASE64.encode(bytes)),
            EntityValue::Null => Value::Null,
        }
    }

    /// Decode one wire value, using the `@odata.type` annotation when present
    fn from_wire(value: &Value, odata_type: Option<&str>) -> Result<EntityValue> {
        if let Some(kind) = odata_type {
            let text = value.as_str().ok_or_else(|| {
                TableError::MalformedResponse(format!("annotated {} value is not a string", kind))
            });
            return match kind {
                "Edm.Int64" => {
                    let text = text?;
                    text.parse::<i64>().map(EntityValue::Int64).map_err(|_| {
                        TableError::MalformedResponse(format!("invalid Edm.Int64: {}", text))
                    })
                }
                "Edm.Double" => match value {
                    Value::Number(n) => n.as_f64().map(EntityValue::Double).ok_or_else(|| {
                        TableError::MalformedResponse("non-finite Edm.Double".to_string())
                    }),
                    Value::String(s) => s.parse::<f64>().map(EntityValue::Double).map_err(|_| {
                        TableError::MalformedResponse(format!("invalid Edm.Double: {}", s))
                    }),
                    _ => Err(TableError::MalformedResponse(
                        "Edm.Double value is neither number nor string".to_string(),
                    )),
                },
                "Edm.DateTime" => {
                    let text = text?;
                    DateTime::parse_from_rfc3339(text)
                        .map(|t| EntityValue::DateTime(t.with_timezone(&Utc)))
                        .map_err(|_| {
                            TableError::MalformedResponse(format!("invalid Edm.DateTime: {}", text))
                        })
                }
                "Edm.Binary" => {
                    let text = text?;
                    BASE64.decode(text).map(EntityValue::Binary).map_err(|_| {
                        TableError::MalformedResponse("invalid Edm.Binary base64".to_string())
                    })
                }
                "Edm.String" => Ok(EntityValue::String(text?.to_string())),
                other => Err(TableError::MalformedResponse(format!(
                    "unknown property type: {}",
                    other
                ))),
            };
        }

        match value {
            Value::Null => Ok(EntityValue::Null),
            Value::Bool(b) => Ok(EntityValue::Boolean(*b)),
            Value::String(s) => Ok(EntityValue::String(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i >= i64::from(i32::MIN) && i <= i64::from(i32::MAX) {
                        Ok(EntityValue::Int32(i as i32))
                    } else {
                        Ok(EntityValue::Int64(i))
                    }
                } else {
                    n.as_f64().map(EntityValue::Double).ok_or_else(|| {
                        TableError::MalformedResponse("non-finite number".to_string())
                    })
                }
            }
            other => Err(TableError::MalformedResponse(format!(
                "unsupported property value: {}",
                other
            ))),
        }
    }
}

impl From<&str> for EntityValue {
    fn from(s: &str) -> Self {
        EntityValue::String(s.to_string())
    }
}

impl From<String> for EntityValue {
    fn from(s: String) -> Self {
        EntityValue::String(s)
    }
}

impl From<i32> for EntityValue {
    fn from(n: i32) -> Self {
        EntityValue::Int32(n)
    }
}

impl From<i64> for EntityValue {
    fn from(n: i64) -> Self {
        EntityValue::Int64(n)
    }
}

impl From<bool> for EntityValue {
    fn from(b: bool) -> Self {
        EntityValue::Boolean(b)
    }
}

impl From<f64> for EntityValue {
    fn from(f: f64) -> Self {
        EntityValue::Double(f)
    }
}

impl From<DateTime<Utc>> for EntityValue {
    fn from(t: DateTime<Utc>) -> Self {
        EntityValue::DateTime(t)
    }
}

/// Encode a property map into an OData JSON object.
///
/// Annotation keys (`Name@odata.type`) are written alongside the value keys
/// for the variants that need them. Explicit nulls are written as JSON
/// `null` so the service stores a null-valued property rather than dropping
/// the name.
pub fn encode_properties(properties: &Properties) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, value) in properties {
        if let Some(kind) = value.odata_type() {
            out.insert(format!("{}@odata.type", name), Value::String(kind.to_string()));
        }
        out.insert(name.clone(), value.wire_value());
    }
    out
}

/// Decode an OData JSON object into a property map.
///
/// System keys (`odata.`-prefixed metadata and `@odata.type` annotations)
/// are consumed, not surfaced as properties; a user property whose name
/// merely contains `odata.` somewhere is kept.
pub fn decode_properties(object: &Map<String, Value>) -> Result<Properties> {
    let mut out = Properties::new();
    for (key, value) in object {
        if key.starts_with("odata.") || key.ends_with("@odata.type") {
            continue;
        }
        let annotation = object
            .get(&format!("{}@odata.type", key))
            .and_then(|v| v.as_str());
        out.insert(key.clone(), EntityValue::from_wire(value, annotation)?);
    }
    Ok(out)
}

/// A row: addressing, concurrency token, and properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Owning table name
    pub table: String,
    /// Partition key (immutable once stored)
    pub partition_key: String,
    /// Row key (immutable once stored)
    pub row_key: String,
    /// Opaque concurrency token; always present on an entity read back
    /// from the service
    pub etag: Option<String>,
    /// Named typed properties, excluding the addressing keys
    pub properties: Properties,
}

impl Entity {
    /// Build an entity from a service payload.
    ///
    /// `PartitionKey` and `RowKey` are lifted out of the property map into
    /// their dedicated fields; the ETag comes from the response header or,
    /// failing that, the `odata.etag` payload key.
    pub fn decode(table: &str, payload: &Map<String, Value>, etag: Option<String>) -> Result<Self> {
        let mut properties = decode_properties(payload)?;
        let partition_key = match properties.remove("PartitionKey") {
            Some(EntityValue::String(s)) => s,
            _ => {
                return Err(TableError::MalformedResponse(
                    "entity payload missing PartitionKey".to_string(),
                ));
            }
        };
        let row_key = match properties.remove("RowKey") {
            Some(EntityValue::String(s)) => s,
            _ => {
                return Err(TableError::MalformedResponse(
                    "entity payload missing RowKey".to_string(),
                ));
            }
        };
        let etag = etag.or_else(|| match payload.get("odata.etag") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        });
        Ok(Entity {
            table: table.to_string(),
            partition_key,
            row_key,
            etag,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_properties() -> Properties {
        let mut props = Properties::new();
        props.insert("Name".to_string(), EntityValue::from("value"));
        props.insert("Count".to_string(), EntityValue::Int32(37));
        props.insert("Big".to_string(), EntityValue::Int64(5_000_000_000));
        props.insert("Flag".to_string(), EntityValue::Boolean(true));
        props.insert("Ratio".to_string(), EntityValue::Double(0.25));
        props.insert(
            "Seen".to_string(),
            EntityValue::DateTime(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
        );
        props.insert("Blob".to_string(), EntityValue::Binary(vec![1, 2, 3]));
        props.insert("Gone".to_string(), EntityValue::Null);
        props
    }

    #[test]
    fn test_round_trip_all_variants() {
        let props = sample_properties();
        let encoded = encode_properties(&props);
        let decoded = decode_properties(&encoded).unwrap();
        assert_eq!(decoded, props);
    }

    #[test]
    fn test_null_encodes_as_json_null() {
        let mut props = Properties::new();
        props.insert("C".to_string(), EntityValue::Null);
        let encoded = encode_properties(&props);
        assert_eq!(encoded.get("C"), Some(&Value::Null));
        assert!(!encoded.contains_key("C@odata.type"));
    }

    #[test]
    fn test_int64_is_annotated_string() {
        let mut props = Properties::new();
        props.insert("Big".to_string(), EntityValue::Int64(5_000_000_000));
        let encoded = encode_properties(&props);
        assert_eq!(
            encoded.get("Big@odata.type").and_then(|v| v.as_str()),
            Some("Edm.Int64")
        );
        assert_eq!(
            encoded.get("Big").and_then(|v| v.as_str()),
            Some("5000000000")
        );
    }

    #[test]
    fn test_plain_numbers_decode_by_range() {
        let mut object = Map::new();
        object.insert("Small".to_string(), Value::from(42));
        object.insert("Large".to_string(), Value::from(5_000_000_000i64));
        object.insert("Frac".to_string(), Value::from(1.5));
        let decoded = decode_properties(&object).unwrap();
        assert_eq!(decoded.get("Small"), Some(&EntityValue::Int32(42)));
        assert_eq!(decoded.get("Large"), Some(&EntityValue::Int64(5_000_000_000)));
        assert_eq!(decoded.get("Frac"), Some(&EntityValue::Double(1.5)));
    }

    #[test]
    fn test_property_name_containing_odata_substring_survives() {
        let mut object = Map::new();
        object.insert("odata.etag".to_string(), Value::from("W/\"x\""));
        object.insert("geodata.region".to_string(), Value::from("emea"));
        let decoded = decode_properties(&object).unwrap();
        assert_eq!(
            decoded.get("geodata.region"),
            Some(&EntityValue::from("emea"))
        );
        assert!(!decoded.contains_key("odata.etag"));
    }

    #[test]
    fn test_unknown_annotation_is_malformed() {
        let mut object = Map::new();
        object.insert("X@odata.type".to_string(), Value::from("Edm.Mystery"));
        object.insert("X".to_string(), Value::from("?"));
        let err = decode_properties(&object).unwrap_err();
        assert!(matches!(err, TableError::MalformedResponse(_)));
    }

    #[test]
    fn test_entity_decode_lifts_addressing() {
        let mut object = Map::new();
        object.insert("odata.etag".to_string(), Value::from("W/\"datetime'x'\""));
        object.insert("PartitionKey".to_string(), Value::from("p"));
        object.insert("RowKey".to_string(), Value::from("r1"));
        object.insert("A".to_string(), Value::from("x"));
        let entity = Entity::decode("mytable", &object, None).unwrap();
        assert_eq!(entity.table, "mytable");
        assert_eq!(entity.partition_key, "p");
        assert_eq!(entity.row_key, "r1");
        assert_eq!(entity.etag.as_deref(), Some("W/\"datetime'x'\""));
        assert_eq!(entity.properties.len(), 1);
        assert_eq!(entity.properties.get("A"), Some(&EntityValue::from("x")));
    }

    #[test]
    fn test_entity_decode_missing_keys_is_malformed() {
        let mut object = Map::new();
        object.insert("A".to_string(), Value::from("x"));
        assert!(Entity::decode("mytable", &object, None).is_err());
    }
}
