use serde_json::Map;
use serde_json::Value;

use crate::DecodeError;

/// Value as carried on the wire, before interpretation
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bool(bool),
    /// JSON or JSON_IETF document
    Json(Vec<u8>),
    /// Opaque bytes (bytes_val, proto_bytes)
    Bytes(Vec<u8>),
}

/// Decoded telemetry value
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryValue {
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Bool(bool),
    /// Structured mapping from a JSON object
    Map(Map<String, Value>),
    /// JSON array (leaf-lists)
    List(Vec<Value>),
}

impl TelemetryValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            TelemetryValue::Int(_) => "int",
            TelemetryValue::Uint(_) => "uint",
            TelemetryValue::Float(_) => "float",
            TelemetryValue::String(_) => "string",
            TelemetryValue::Bool(_) => "bool",
            TelemetryValue::Map(_) => "map",
            TelemetryValue::List(_) => "list",
        }
    }

    pub(crate) fn from_raw(
        raw: &RawValue,
        path: &str,
    ) -> Result<Self, DecodeError> {
        Ok(match raw {
            RawValue::Int(v) => TelemetryValue::Int(*v),
            RawValue::Uint(v) => TelemetryValue::Uint(*v),
            RawValue::Float(v) => TelemetryValue::Float(*v),
            RawValue::String(v) => TelemetryValue::String(v.clone()),
            RawValue::Bool(v) => TelemetryValue::Bool(*v),
            RawValue::Json(bytes) => {
                let doc: Value = serde_json::from_slice(bytes).map_err(|e| DecodeError::InvalidJson {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?;
                Self::from_json(doc, path)?
            }
            RawValue::Bytes(_) => {
                return Err(DecodeError::Unsupported {
                    path: path.to_string(),
                    encoding: "bytes",
                })
            }
        })
    }

    pub(crate) fn from_json(
        doc: Value,
        path: &str,
    ) -> Result<Self, DecodeError> {
        Ok(match doc {
            Value::Bool(b) => TelemetryValue::Bool(b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    TelemetryValue::Uint(u)
                } else if let Some(i) = n.as_i64() {
                    TelemetryValue::Int(i)
                } else {
                    TelemetryValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => TelemetryValue::String(s),
            Value::Object(map) => TelemetryValue::Map(map),
            Value::Array(items) => TelemetryValue::List(items),
            Value::Null => {
                return Err(DecodeError::MissingValue {
                    path: path.to_string(),
                })
            }
        })
    }

    /// Interpret as a cumulative counter.
    ///
    /// JSON_IETF encodes 64-bit integers as strings, so numeric strings are
    /// accepted. A structured value is unwrapped through its `leaf` member.
    pub(crate) fn into_counter(
        self,
        leaf: &str,
        path: &str,
    ) -> Result<u64, DecodeError> {
        match self {
            TelemetryValue::Uint(v) => Ok(v),
            TelemetryValue::Int(v) if v >= 0 => Ok(v as u64),
            TelemetryValue::Float(v) if v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => Ok(v as u64),
            TelemetryValue::String(ref s) => s.trim().parse::<u64>().map_err(|_| DecodeError::NotNumeric {
                path: path.to_string(),
                found: format!("string {s:?}"),
            }),
            TelemetryValue::Map(map) => Self::member(map, leaf, path)?.into_counter(leaf, path),
            other => Err(DecodeError::NotNumeric {
                path: path.to_string(),
                found: other.describe(),
            }),
        }
    }

    /// Interpret as an enumerated status such as `UP`/`DOWN`
    pub(crate) fn into_status(
        self,
        leaf: &str,
        path: &str,
    ) -> Result<String, DecodeError> {
        match self {
            TelemetryValue::String(s) => Ok(s),
            TelemetryValue::Map(map) => Self::member(map, leaf, path)?.into_status(leaf, path),
            other => Err(DecodeError::NotText {
                path: path.to_string(),
                found: other.describe(),
            }),
        }
    }

    /// Pick the member named `leaf`, bare or module-qualified (`module:leaf`)
    fn member(
        mut map: Map<String, Value>,
        leaf: &str,
        path: &str,
    ) -> Result<TelemetryValue, DecodeError> {
        let key = map
            .keys()
            .find(|k| k.as_str() == leaf || k.rsplit_once(':').is_some_and(|(_, local)| local == leaf))
            .cloned()
            .ok_or_else(|| DecodeError::MissingMember {
                path: path.to_string(),
                member: leaf.to_string(),
            })?;
        let value = map.remove(&key).unwrap_or(Value::Null);
        Self::from_json(value, path)
    }

    fn describe(&self) -> String {
        match self {
            TelemetryValue::Int(v) => format!("int {v}"),
            TelemetryValue::Float(v) => format!("float {v}"),
            TelemetryValue::Bool(v) => format!("bool {v}"),
            other => other.type_name().to_string(),
        }
    }
}
