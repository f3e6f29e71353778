//! Validation errors for part specs, field values, and filter clauses.
//!
//! Every variant is recoverable at the call site: callers re-prompt or
//! reject the single offending field without aborting the whole operation.

use crate::value::CompareOp;

/// Errors raised while resolving specs or validating values against them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was empty or absent.
    #[error("required field `{field}` is missing")]
    RequiredFieldMissing { field: String },

    /// The field is not declared by the part type's spec.
    #[error("unknown field `{field}` for part type `{type_name}`")]
    UnknownField { type_name: String, field: String },

    /// No part type with this name is registered.
    #[error("unknown part type `{0}`")]
    UnknownType(String),

    /// A part type with this name is already registered.
    #[error("part type `{0}` is already registered")]
    DuplicateType(String),

    /// The record claims a different type than the one it is stored under.
    #[error("record is typed `{found}` but was submitted as `{expected}`")]
    TypeNameMismatch { expected: String, found: String },

    /// A value could not be converted to the field's primitive.
    #[error("`{raw}` is not a valid {expected} for `{field}`")]
    TypeMismatch {
        field: String,
        raw: String,
        expected: &'static str,
    },

    /// Malformed mantissa or unrecognized SI magnitude suffix.
    #[error("`{raw}` is not a valid engineering number for `{field}`")]
    InvalidEngineeringNumber { field: String, raw: String },

    /// Non-numeric operands or a zero denominator.
    #[error("`{raw}` is not a valid fraction for `{field}`: {reason}")]
    InvalidFraction {
        field: String,
        raw: String,
        reason: &'static str,
    },

    /// Ordering comparisons are only defined for numeric fields.
    #[error("operator `{op}` cannot be applied to text field `{field}`")]
    InvalidOperatorForType { field: String, op: CompareOp },

    /// The field identifies the record and cannot be rewritten.
    #[error("field `{field}` cannot be changed")]
    ImmutableField { field: String },

    /// A filter clause is not `field<op>value`.
    #[error("`{raw}` is not a filter clause (expected field<op>value)")]
    MalformedClause { raw: String },

    /// The field only admits values `>= 0`.
    #[error("`{field}` cannot be negative (got {value})")]
    NegativeValue { field: String, value: i64 },
}

impl ValidationError {
    /// Name of the field the error is about, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::RequiredFieldMissing { field }
            | Self::UnknownField { field, .. }
            | Self::TypeMismatch { field, .. }
            | Self::InvalidEngineeringNumber { field, .. }
            | Self::InvalidFraction { field, .. }
            | Self::InvalidOperatorForType { field, .. }
            | Self::ImmutableField { field }
            | Self::NegativeValue { field, .. } => Some(field),
            Self::UnknownType(_)
            | Self::DuplicateType(_)
            | Self::TypeNameMismatch { .. }
            | Self::MalformedClause { .. } => None,
        }
    }
}
