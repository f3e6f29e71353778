//! Filter clauses over typed field values.
//!
//! A filter is a list of clauses, all of which must hold. There is no OR
//! and no grouping.

use crate::error::ValidationError;
use crate::parse::parse;
use crate::registry::SpecRegistry;
use crate::spec::PartTypeSpec;
use crate::value::{CompareOp, TypedValue, ValueKind};
use serde::{Deserialize, Serialize};

/// `field <op> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    pub field: String,
    pub op: CompareOp,
    pub value: TypedValue,
}

impl FilterClause {
    pub fn new(field: impl Into<String>, op: CompareOp, value: impl Into<TypedValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Whether `candidate` (a record's value) satisfies this clause.
    pub fn holds_for(&self, candidate: &TypedValue) -> bool {
        candidate
            .compare(&self.value)
            .is_some_and(|ordering| self.op.holds(ordering))
    }
}

impl std::fmt::Display for FilterClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

/// Anything a clause can be evaluated against.
pub trait FieldSource {
    /// The current value of `name`, or `None` when unset.
    fn field_value(&self, name: &str) -> Option<TypedValue>;
}

/// Check `clause` against `spec`.
pub fn validate(clause: &FilterClause, spec: &PartTypeSpec) -> Result<(), ValidationError> {
    let field = spec
        .field(&clause.field)
        .ok_or_else(|| ValidationError::UnknownField {
            type_name: spec.type_name.clone(),
            field: clause.field.clone(),
        })?;
    if clause.op != CompareOp::Eq && field.kind == ValueKind::Text {
        return Err(ValidationError::InvalidOperatorForType {
            field: clause.field.clone(),
            op: clause.op,
        });
    }
    if field.kind.coerce(clause.value.clone()).is_none() {
        return Err(ValidationError::TypeMismatch {
            field: clause.field.clone(),
            raw: clause.value.to_string(),
            expected: field.kind.primitive_name(),
        });
    }
    Ok(())
}

pub fn validate_all(clauses: &[FilterClause], spec: &PartTypeSpec) -> Result<(), ValidationError> {
    clauses.iter().try_for_each(|clause| validate(clause, spec))
}

/// Whether every clause holds for `record`.
///
/// An unset field never matches, whatever the operator.
pub fn matches<R: FieldSource + ?Sized>(record: &R, clauses: &[FilterClause]) -> bool {
    clauses.iter().all(|clause| {
        record
            .field_value(&clause.field)
            .is_some_and(|value| clause.holds_for(&value))
    })
}

/// The records matching every clause, in input order.
pub fn apply<R: FieldSource>(records: Vec<R>, clauses: &[FilterClause]) -> Vec<R> {
    if clauses.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| matches(record, clauses))
        .collect()
}

/// Split `resistance>=1.5k` into `("resistance", ">=1.5k")`.
fn split_clause(raw: &str) -> Result<(&str, &str), ValidationError> {
    let malformed = || ValidationError::MalformedClause {
        raw: raw.to_string(),
    };
    let text = raw.trim();
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .ok_or_else(malformed)?;
    let (name, rest) = text.split_at(end);
    let rest = rest.trim_start();
    if name.is_empty() || !rest.starts_with(['=', '<', '>']) {
        return Err(malformed());
    }
    Ok((name, rest))
}

/// Parse `field<op>value` against one part type.
///
/// `=` and `==` mean equality; `<`, `<=`, `>`, `>=` go through the value
/// parser's operator prefix. The clause is validated before it is returned.
pub fn parse_clause(raw: &str, spec: &PartTypeSpec) -> Result<FilterClause, ValidationError> {
    let (name, rest) = split_clause(raw)?;
    let field = spec.field(name).ok_or_else(|| ValidationError::UnknownField {
        type_name: spec.type_name.clone(),
        field: name.to_string(),
    })?;

    let (value, op) = match rest.strip_prefix("==").or_else(|| rest.strip_prefix('=')) {
        Some(operand) => {
            let mut optional = field.clone();
            optional.required = false;
            let (value, _) = parse(operand, &optional, false)?;
            (value, CompareOp::Eq)
        }
        None => {
            let (value, op) = parse(rest, field, true)?;
            (value, op.unwrap_or_default())
        }
    };
    let value = value.ok_or_else(|| ValidationError::MalformedClause {
        raw: raw.to_string(),
    })?;

    let clause = FilterClause::new(name, op, value);
    validate(&clause, spec)?;
    Ok(clause)
}

/// Parse a clause when no part type is selected.
///
/// The first registered type declaring the field supplies its spec, so
/// units and value kinds still apply.
pub fn parse_clause_any(raw: &str, registry: &SpecRegistry) -> Result<FilterClause, ValidationError> {
    let (name, _) = split_clause(raw)?;
    let spec = registry
        .list_types()
        .find(|spec| spec.field(name).is_some())
        .ok_or_else(|| ValidationError::UnknownField {
            type_name: "*".to_string(),
            field: name.to_string(),
        })?;
    parse_clause(raw, spec)
}
