//! Part records.
//!
//! A record is its IPN, its part type, and a sparse map of typed field
//! values. An absent key means the field is unset (null). On disk a record
//! is one flat JSON object with an explicit `"type"` discriminator:
//!
//! ```json
//! {"ipn":"R-4k7","type":"resistor","package":"0805","resistance":4700.0,"stock":12}
//! ```

use partdb_kernel::{FieldSource, TypedValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stocked part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDocument", into = "RawDocument")]
pub struct PartRecord {
    pub ipn: String,
    pub type_name: String,
    pub fields: BTreeMap<String, TypedValue>,
}

impl PartRecord {
    pub fn new(ipn: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            ipn: ipn.into(),
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<TypedValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<TypedValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn unset(&mut self, name: &str) -> Option<TypedValue> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.fields.get(name)
    }

    /// Current stock; an unset or non-integer stock reads as zero.
    pub fn stock(&self) -> i64 {
        self.get("stock").and_then(TypedValue::as_i64).unwrap_or(0)
    }
}

impl FieldSource for PartRecord {
    fn field_value(&self, name: &str) -> Option<TypedValue> {
        match name {
            "ipn" => Some(TypedValue::Text(self.ipn.clone())),
            _ => self.fields.get(name).cloned(),
        }
    }
}

/// Flat document form of a record.
#[derive(Debug, Serialize, Deserialize)]
struct RawDocument {
    ipn: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl TryFrom<RawDocument> for PartRecord {
    type Error = String;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        let mut fields = BTreeMap::new();
        for (name, value) in raw.rest {
            let typed = match value {
                serde_json::Value::Null => continue,
                serde_json::Value::String(text) => TypedValue::Text(text),
                serde_json::Value::Number(number) => match number.as_i64() {
                    Some(int) => TypedValue::Int(int),
                    None => TypedValue::Float(number.as_f64().ok_or_else(|| {
                        format!("part {}: field `{name}` is out of range", raw.ipn)
                    })?),
                },
                other => {
                    return Err(format!(
                        "part {}: field `{name}` must be a scalar, got {other}",
                        raw.ipn
                    ));
                }
            };
            fields.insert(name, typed);
        }
        Ok(Self {
            ipn: raw.ipn,
            type_name: raw.type_name,
            fields,
        })
    }
}

impl From<PartRecord> for RawDocument {
    fn from(record: PartRecord) -> Self {
        let rest = record
            .fields
            .into_iter()
            .map(|(name, value)| {
                let json = match value {
                    TypedValue::Int(v) => serde_json::Value::from(v),
                    TypedValue::Float(v) => serde_json::Value::from(v),
                    TypedValue::Text(v) => serde_json::Value::from(v),
                };
                (name, json)
            })
            .collect();
        Self {
            ipn: record.ipn,
            type_name: record.type_name,
            rest,
        }
    }
}
