//! Raw text ⇄ typed values.
//!
//! `parse` is order-sensitive: operator prefix, then unit suffix, then the
//! kind-specific numeric grammar. `format` is its display inverse.

use crate::error::ValidationError;
use crate::spec::FieldSpec;
use crate::value::{CompareOp, TypedValue, ValueKind};
use regex::Regex;
use std::sync::LazyLock;

/// A parsed value and the comparison operator that prefixed it.
///
/// `(None, None)` means an optional field was left empty.
pub type ParseOutcome = (Option<TypedValue>, Option<CompareOp>);

static MANTISSA: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^([+-]?(?:\d+(?:\.\d+)?|\.\d+))(?:[eE]([+-]?\d+))?$").ok()
});

/// Operator tokens, longest first so `<=` wins over `<`.
const OPERATORS: &[(&str, CompareOp)] = &[
    ("<=", CompareOp::Le),
    (">=", CompareOp::Ge),
    ("<", CompareOp::Lt),
    (">", CompareOp::Gt),
];

/// Parse `raw` for `field`.
pub fn parse(
    raw: &str,
    field: &FieldSpec,
    allow_operator_prefix: bool,
) -> Result<ParseOutcome, ValidationError> {
    let mut text = raw.trim();
    if text.is_empty() {
        if field.required {
            return Err(ValidationError::RequiredFieldMissing {
                field: field.name.clone(),
            });
        }
        return Ok((None, None));
    }

    let mut op = CompareOp::Eq;
    if allow_operator_prefix {
        if let Some((token, found)) = OPERATORS.iter().find(|(t, _)| text.starts_with(t)) {
            op = *found;
            text = text[token.len()..].trim_start();
        }
    }

    if let Some(units) = field.unit_suffix() {
        text = strip_suffix_ignore_case(text, units).trim_end();
    }

    if text.is_empty() {
        return Err(mismatch(field, raw));
    }

    let value = match field.kind {
        ValueKind::Int => TypedValue::Int(text.parse().map_err(|_| mismatch(field, raw))?),
        ValueKind::Float => TypedValue::Float(parse_finite(text).ok_or_else(|| mismatch(field, raw))?),
        ValueKind::Text => TypedValue::Text(text.to_string()),
        ValueKind::Percentage => {
            let bare = text.strip_suffix('%').unwrap_or(text).trim_end();
            TypedValue::Float(parse_finite(bare).ok_or_else(|| mismatch(field, raw))?)
        }
        ValueKind::Fraction => TypedValue::Float(parse_fraction(text, field, raw)?),
        ValueKind::EngineeringFloat => {
            TypedValue::Float(parse_engineering(text).ok_or_else(|| {
                ValidationError::InvalidEngineeringNumber {
                    field: field.name.clone(),
                    raw: raw.to_string(),
                }
            })?)
        }
    };

    Ok((Some(value), Some(op)))
}

fn mismatch(field: &FieldSpec, raw: &str) -> ValidationError {
    ValidationError::TypeMismatch {
        field: field.name.clone(),
        raw: raw.to_string(),
        expected: field.kind.primitive_name(),
    }
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_fraction(text: &str, field: &FieldSpec, raw: &str) -> Result<f64, ValidationError> {
    let invalid = |reason| ValidationError::InvalidFraction {
        field: field.name.clone(),
        raw: raw.to_string(),
        reason,
    };
    let Some((numerator, denominator)) = text.split_once('/') else {
        return parse_finite(text).ok_or_else(|| mismatch(field, raw));
    };
    let numerator = parse_finite(numerator).ok_or_else(|| invalid("non-numeric numerator"))?;
    let denominator = parse_finite(denominator).ok_or_else(|| invalid("non-numeric denominator"))?;
    if denominator == 0.0 {
        return Err(invalid("zero denominator"));
    }
    let value = numerator / denominator;
    if value.is_finite() { Ok(value) } else { Err(invalid("result out of range")) }
}

/// Case-insensitive suffix strip, on char boundaries.
fn strip_suffix_ignore_case<'a>(text: &'a str, suffix: &str) -> &'a str {
    let count = suffix.chars().count();
    let Some((start, _)) = text.char_indices().rev().nth(count.saturating_sub(1)) else {
        return text;
    };
    if count > 0 && text[start..].to_lowercase() == suffix.to_lowercase() {
        &text[..start]
    } else {
        text
    }
}

fn si_exponent(suffix: char) -> Option<i32> {
    match suffix {
        'p' => Some(-12),
        'n' => Some(-9),
        'u' | 'µ' | 'μ' => Some(-6),
        'm' => Some(-3),
        'k' => Some(3),
        'M' => Some(6),
        'G' => Some(9),
        'T' => Some(12),
        _ => None,
    }
}

fn si_suffix(exponent: i32) -> Option<&'static str> {
    match exponent {
        -12 => Some("p"),
        -9 => Some("n"),
        -6 => Some("u"),
        -3 => Some("m"),
        0 => Some(""),
        3 => Some("k"),
        6 => Some("M"),
        9 => Some("G"),
        12 => Some("T"),
        _ => None,
    }
}

/// Parse an engineering literal such as `4.7k`, `-2.2u` or `1.5e3m`.
///
/// The SI magnitude is folded into the decimal exponent before the single
/// float conversion, so `2.2u` is bit-identical to `0.0000022`.
pub fn parse_engineering(text: &str) -> Option<f64> {
    let text = text.trim();
    let last = text.chars().last()?;
    let (mantissa, magnitude) = if last.is_ascii_digit() || last == '.' {
        (text, 0)
    } else {
        let exponent = si_exponent(last)?;
        (text[..text.len() - last.len_utf8()].trim_end(), exponent)
    };

    let captures = MANTISSA.as_ref()?.captures(mantissa)?;
    let base = captures.get(1)?.as_str();
    let written: i32 = match captures.get(2) {
        Some(exp) => exp.as_str().parse().ok()?,
        None => 0,
    };
    let exponent = written.checked_add(magnitude)?;
    format!("{base}e{exponent}")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Render `value` with the SI suffix that keeps the mantissa in `[1, 1000)`.
///
/// Digits are the shortest that round-trip through [`parse_engineering`].
/// Magnitudes outside `p..T` fall back to `e` notation.
pub fn format_engineering(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let scientific = format!("{:e}", value.abs());
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return format!("{value}");
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return format!("{value}");
    };
    let engineering = exponent.div_euclid(3) * 3;
    let Some(suffix) = si_suffix(engineering) else {
        return format!("{value:e}");
    };

    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let whole_len = 1 + (exponent - engineering) as usize;
    let number = if digits.len() <= whole_len {
        format!("{digits:0<whole_len$}")
    } else {
        format!("{}.{}", &digits[..whole_len], &digits[whole_len..])
    };
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{number}{suffix}")
}

/// Render `value` for display in `field`.
pub fn format(value: &TypedValue, field: &FieldSpec) -> String {
    let body = match (field.kind, value.as_f64()) {
        (ValueKind::EngineeringFloat, Some(v)) => format_engineering(v),
        (ValueKind::Percentage, Some(_)) => format!("{value}%"),
        _ => value.to_string(),
    };
    match field.unit_suffix() {
        Some(units) => format!("{body}{units}"),
        None => body,
    }
}
