//! Value kinds, typed values, and comparison operators.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// How a field's raw text is interpreted.
///
/// `EngineeringFloat`, `Percentage` and `Fraction` are input/display
/// conventions; all three resolve down to a `Float` primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Int,
    Float,
    Text,
    EngineeringFloat,
    Percentage,
    Fraction,
}

impl ValueKind {
    /// Whether values of this kind are ordered numerically.
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Name of the primitive this kind resolves to.
    pub fn primitive_name(self) -> &'static str {
        match self {
            Self::Int => "integer",
            Self::Text => "text",
            Self::Float | Self::EngineeringFloat | Self::Percentage | Self::Fraction => "number",
        }
    }

    /// Bring `value` to this kind's primitive.
    ///
    /// Integers widen to floats for float-backed kinds. Nothing narrows:
    /// a float is never accepted for an `Int` field, and text never
    /// converts to or from numbers.
    pub fn coerce(self, value: TypedValue) -> Option<TypedValue> {
        match (self, value) {
            (Self::Int, TypedValue::Int(v)) => Some(TypedValue::Int(v)),
            (Self::Text, TypedValue::Text(v)) => Some(TypedValue::Text(v)),
            (Self::Int | Self::Text, _) => None,
            (_, TypedValue::Int(v)) => Some(TypedValue::Float(v as f64)),
            (_, TypedValue::Float(v)) if v.is_finite() => Some(TypedValue::Float(v)),
            (_, _) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::EngineeringFloat => "engineering",
            Self::Percentage => "percentage",
            Self::Fraction => "fraction",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl TypedValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view; integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Order two values of compatible primitives.
    ///
    /// Ints compare exactly, mixed numerics compare as floats, text
    /// compares lexically. Text against a number has no ordering.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Text(_), _) | (_, Self::Text(_)) => None,
            (a, b) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        }
    }
}

impl std::fmt::Display for TypedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TypedValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    #[default]
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Whether `ordering` (record value vs. clause value) satisfies the operator.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

impl std::str::FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "=" | "==" | "eq" => Ok(Self::Eq),
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "le" => Ok(Self::Le),
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "ge" => Ok(Self::Ge),
            _ => Err(format!("unknown comparison operator: {s}")),
        }
    }
}
