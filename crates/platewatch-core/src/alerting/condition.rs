//! Field normalization and single-condition evaluation
//!
//! Sensor fields arrive either as plain scalars or as label-prefixed strings
//! (`"TEMP_55.0C"`, `"VOLTAGE_30.0V"`, `"PH_4.0"`). Normalization extracts the
//! magnitude so ordered operators can compare numerically; anything that does
//! not parse is kept as text for `contains` and equality checks.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::models::{Operator, RuleValue};

/// Label-prefixed encodings, tried in order
static ENCODED_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"TEMP_([\d.]+)").expect("valid regex"),
        Regex::new(r"VOLTAGE_([\d.]+)").expect("valid regex"),
        Regex::new(r"PH_([\d.]+)").expect("valid regex"),
    ]
});

/// Longest numeric prefix, after leading whitespace
static LEADING_FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)").expect("valid regex")
});

/// A whole string that is a decimal number
static WHOLE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("valid regex")
});

/// A sensor field after normalization
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Numeric magnitude (may be NaN when an encoded prefix had no digits)
    Number(f64),
    /// Text kept as-is
    Text(String),
    /// Boolean flag
    Bool(bool),
}

impl FieldValue {
    /// Numeric coercion: booleans become 1/0, text must be a whole number
    /// (blank text is 0), everything else is NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Number(n) => *n,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Text(text) => text_to_number(text),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&number_to_string(*n)),
            Self::Text(text) => f.write_str(text),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&RuleValue> for FieldValue {
    fn from(value: &RuleValue) -> Self {
        match value {
            RuleValue::Number(n) => Self::Number(*n),
            RuleValue::Text(text) => Self::Text(text.clone()),
        }
    }
}

/// Normalize a raw sample value.
///
/// Returns `None` for JSON `null`: an absent reading never satisfies a rule.
pub fn normalize_field(raw: &Value) -> Option<FieldValue> {
    match raw {
        Value::Null => None,
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Number(n) => Some(FieldValue::Number(n.as_f64().unwrap_or(f64::NAN))),
        Value::String(text) => Some(normalize_text(text)),
        other => Some(FieldValue::Text(other.to_string())),
    }
}

fn normalize_text(text: &str) -> FieldValue {
    for pattern in ENCODED_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            let magnitude = leading_float(&captures[1]).unwrap_or(f64::NAN);
            return FieldValue::Number(magnitude);
        }
    }

    // A direct parse that fails or lands on zero keeps the original text.
    match leading_float(text) {
        Some(n) if n != 0.0 && !n.is_nan() => FieldValue::Number(n),
        _ => FieldValue::Text(text.to_string()),
    }
}

fn leading_float(text: &str) -> Option<f64> {
    LEADING_FLOAT
        .captures(text)
        .and_then(|captures| captures[1].parse::<f64>().ok())
}

fn text_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if WHOLE_NUMBER.is_match(trimmed) {
        return trimmed.parse().unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ => f64::NAN,
    }
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        n.to_string()
    }
}

/// Loose equality.
///
/// Same-kind operands compare directly; mixed kinds compare numerically, so
/// the number `5` equals the text `"5"`.
pub fn loose_eq(left: &FieldValue, right: &FieldValue) -> bool {
    match (left, right) {
        (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
        (FieldValue::Text(a), FieldValue::Text(b)) => a == b,
        (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
        _ => left.to_number() == right.to_number(),
    }
}

/// Apply `operator` between a normalized field and a rule threshold.
///
/// Never panics; an unknown operator is simply false.
pub fn evaluate_condition(field: &FieldValue, operator: &Operator, threshold: &RuleValue) -> bool {
    let threshold = FieldValue::from(threshold);

    match operator {
        Operator::Gt => field.to_number() > threshold.to_number(),
        Operator::Lt => field.to_number() < threshold.to_number(),
        Operator::Gte => field.to_number() >= threshold.to_number(),
        Operator::Lte => field.to_number() <= threshold.to_number(),
        Operator::Eq => loose_eq(field, &threshold),
        Operator::Ne => !loose_eq(field, &threshold),
        Operator::Contains => field.to_string().contains(&threshold.to_string()),
        Operator::Unknown(_) => false,
    }
}
