//! Variable-set validation against a template's declared schema (PRD-03).
//!
//! Validation never short-circuits: every violation across every declared
//! variable is collected into one [`ValidationReport`] so the submitter can
//! fix them all in a single pass. Only declared variables are checked —
//! `${VAR}` tokens without a schema entry are a lint concern, not a
//! validation error (see [`crate::substitution::undeclared_placeholders`]).

use regex::Regex;

use crate::substitution::stringify;
use crate::template::{Template, VariableType};

/// One validation violation, tied to the variable that caused it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ValidationIssue {
    pub variable: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.variable, self.message)
    }
}

/// Outcome of validating a variable set against a template schema.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All violations joined into a single line, for error messages and logs.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn push(&mut self, variable: &str, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            variable: variable.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a proposed variable set against the template's schema.
///
/// Checks, per declared variable: required presence, native JSON kind for
/// `string`/`number`/`boolean`, numeric `min`/`max` bounds, `pattern` match
/// against the value's string form, and `enum` membership.
pub fn validate_variables(
    template: &Template,
    values: &serde_json::Map<String, serde_json::Value>,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (name, var) in &template.variables {
        let value = match values.get(name) {
            Some(v) => v,
            None => {
                if var.required {
                    report.push(name, "required variable is missing");
                }
                continue;
            }
        };

        check_native_kind(&mut report, name, var.kind, value);

        if let Some(rules) = &var.validation {
            check_bounds(&mut report, name, rules.min, rules.max, value);
            check_pattern(&mut report, name, rules.pattern.as_deref(), value);
            check_membership(&mut report, name, rules.allowed.as_deref(), value);
        }
    }

    report
}

/// `string`/`number`/`boolean` must match the submitted value's JSON kind.
/// Media and color types are path/notation strings by convention and are
/// constrained via `pattern`/`enum` instead.
fn check_native_kind(
    report: &mut ValidationReport,
    name: &str,
    kind: VariableType,
    value: &serde_json::Value,
) {
    let ok = match kind {
        VariableType::String => value.is_string(),
        VariableType::Number => value.is_number(),
        VariableType::Boolean => value.is_boolean(),
        _ => true,
    };
    if !ok {
        report.push(
            name,
            format!("expected a {} value, got {}", kind_label(kind), json_kind(value)),
        );
    }
}

fn check_bounds(
    report: &mut ValidationReport,
    name: &str,
    min: Option<f64>,
    max: Option<f64>,
    value: &serde_json::Value,
) {
    // Bounds only apply to numeric values; a kind mismatch is already
    // reported by the native-kind check.
    let Some(n) = value.as_f64() else {
        return;
    };
    if let Some(min) = min {
        if n < min {
            report.push(name, format!("value {n} is below the minimum of {min}"));
        }
    }
    if let Some(max) = max {
        if n > max {
            report.push(name, format!("value {n} is above the maximum of {max}"));
        }
    }
}

fn check_pattern(
    report: &mut ValidationReport,
    name: &str,
    pattern: Option<&str>,
    value: &serde_json::Value,
) {
    let Some(pattern) = pattern else {
        return;
    };
    match Regex::new(pattern) {
        Ok(re) => {
            if !re.is_match(&stringify(value)) {
                report.push(name, format!("value does not match pattern {pattern:?}"));
            }
        }
        Err(_) => {
            report.push(name, format!("schema pattern {pattern:?} is not a valid regex"));
        }
    }
}

fn check_membership(
    report: &mut ValidationReport,
    name: &str,
    allowed: Option<&[serde_json::Value]>,
    value: &serde_json::Value,
) {
    let Some(allowed) = allowed else {
        return;
    };
    // Membership compares string forms so `2` satisfies both `[1, 2, 3]`
    // and `["1", "2", "3"]` schemas.
    let candidate = stringify(value);
    if !allowed.iter().any(|a| stringify(a) == candidate) {
        report.push(name, format!("value {candidate:?} is not one of the allowed values"));
    }
}

fn kind_label(kind: VariableType) -> &'static str {
    match kind {
        VariableType::String => "string",
        VariableType::Number => "number",
        VariableType::Boolean => "boolean",
        VariableType::Image => "image",
        VariableType::Video => "video",
        VariableType::Audio => "audio",
        VariableType::Color => "color",
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
