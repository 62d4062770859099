//! Field validation and coercion.
//!
//! Checks run in a fixed order: length bounds, null defaulting, type
//! coercion, then the not-zero rule. A field that fails is dropped from the
//! payload, never written as a bad value.

use cmdbsync_core::text::truncate_with_ellipsis;
use cmdbsync_core::{MappingRule, TargetType};
use cmdbsync_device42::SourceRecord;
use serde_json::{json, Value};

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::mapping::resolve::{resolve_value, value_text, ResolveMode};

/// Identifier field that is never defaulted when null.
pub const IDENTIFIER_FIELD: &str = "serial_number";

/// Result of validating one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    /// Write this value.
    Valid(Value),
    /// Leave the field out, for the given reason.
    Invalid(String),
}

impl FieldOutcome {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid(reason.into())
    }
}

/// Validate a resolved value.
///
/// A foreign-key rule whose lookup came back null although the field is
/// not-null is resolved again with auto-create; it stays invalid if that
/// still yields null.
pub async fn validate_value(
    ctx: &mut SyncContext,
    record: &SourceRecord,
    rule: &MappingRule,
    value: Value,
    owner_type_id: Option<i64>,
    choices: Option<&[String]>,
) -> SyncResult<FieldOutcome> {
    let mut value = value;
    if rule.is_foreign_key() && rule.not_null && value.is_null() {
        value = resolve_value(ctx, record, rule, ResolveMode::AutoCreate { owner_type_id }).await?;
        if value.is_null() {
            return Ok(FieldOutcome::invalid("foreign key could not be resolved"));
        }
    }
    Ok(coerce(value, rule, choices))
}

/// Apply bounds, defaults and type coercion to a value.
#[must_use]
pub fn coerce(value: Value, rule: &MappingRule, choices: Option<&[String]>) -> FieldOutcome {
    let value = match apply_length_bounds(value, rule) {
        Ok(value) => value,
        Err(reason) => return FieldOutcome::Invalid(reason),
    };

    let value = if value.is_null() {
        if !rule.not_null {
            return FieldOutcome::Valid(Value::Null);
        }
        match null_default(rule) {
            Some(value) => value,
            None => return FieldOutcome::invalid("null value for a not-null field"),
        }
    } else {
        value
    };

    let value = match rule.target_type {
        TargetType::Integer => match to_integer(&value) {
            Some(n) => json!(n),
            None => return FieldOutcome::invalid(format!("'{value}' is not an integer")),
        },
        TargetType::Float => match to_float(&value) {
            Some(n) => json!(n),
            None => return FieldOutcome::invalid(format!("'{value}' is not a number")),
        },
        TargetType::Dropdown => match choices.filter(|c| !c.is_empty()) {
            Some(choices) => match match_choice(&value, choices) {
                Some(choice) => Value::String(choice.to_string()),
                None => return FieldOutcome::invalid(format!("'{value}' matches no choice")),
            },
            None => value,
        },
        TargetType::String | TargetType::Date => value,
    };

    if rule.not_zero && is_zero(&value) {
        return match rule.target_type {
            TargetType::Integer => FieldOutcome::Valid(json!(1)),
            TargetType::Float => FieldOutcome::Valid(json!(0.01)),
            _ => FieldOutcome::invalid("zero value for a not-zero field"),
        };
    }

    FieldOutcome::Valid(value)
}

fn apply_length_bounds(value: Value, rule: &MappingRule) -> Result<Value, String> {
    let mut text = match value {
        Value::String(text) => text,
        other => return Ok(other),
    };

    if let Some(min) = rule.min_length {
        if text.chars().count() < min {
            if text.is_empty() && rule.set_space {
                text = " ".repeat(min);
            } else {
                return Err(format!("shorter than {min} characters"));
            }
        }
    }
    if let Some(max) = rule.max_length {
        text = truncate_with_ellipsis(&text, max);
    }
    Ok(Value::String(text))
}

fn null_default(rule: &MappingRule) -> Option<Value> {
    if rule.target == IDENTIFIER_FIELD {
        return None;
    }
    match rule.target_type {
        TargetType::Integer => Some(json!(0)),
        TargetType::Float => Some(json!(0.0)),
        TargetType::Date | TargetType::Dropdown => None,
        TargetType::String => Some(Value::String(" ".to_string())),
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().is_ok_and(|f| f == 0.0),
        _ => false,
    }
}

/// First choice that contains the value or is contained in it, ignoring case.
#[must_use]
pub fn match_choice<'a>(value: &Value, choices: &'a [String]) -> Option<&'a str> {
    let needle = value_text(value)?.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    choices
        .iter()
        .find(|choice| {
            let choice = choice.to_lowercase();
            choice.contains(&needle) || needle.contains(&choice)
        })
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(outcome: FieldOutcome) -> Value {
        match outcome {
            FieldOutcome::Valid(v) => v,
            FieldOutcome::Invalid(reason) => panic!("unexpected invalid: {reason}"),
        }
    }

    #[test]
    fn test_max_length_truncates_with_ellipsis() {
        let rule = MappingRule::new("notes", "description").with_length(None, Some(10));
        let out = valid(coerce(json!("a rather long description"), &rule, None));
        assert_eq!(out, json!("a rathe..."));
        assert_eq!(out.as_str().map(|s| s.chars().count()), Some(10));
    }

    #[test]
    fn test_min_length_pads_empty_with_set_space() {
        let rule = MappingRule::new("asset_no", "asset_tag")
            .with_length(Some(4), None)
            .with_set_space();
        assert_eq!(valid(coerce(json!(""), &rule, None)), json!("    "));

        assert!(matches!(coerce(json!("ab"), &rule, None), FieldOutcome::Invalid(_)));
    }

    #[test]
    fn test_min_length_without_set_space_is_invalid() {
        let rule = MappingRule::new("asset_no", "asset_tag").with_length(Some(2), None);
        assert!(matches!(coerce(json!(""), &rule, None), FieldOutcome::Invalid(_)));
    }

    #[test]
    fn test_null_without_not_null_is_written() {
        let rule = MappingRule::new("notes", "description");
        assert_eq!(valid(coerce(Value::Null, &rule, None)), Value::Null);
    }

    #[test]
    fn test_null_defaults_per_type() {
        let text = MappingRule::new("notes", "description").not_null();
        assert_eq!(valid(coerce(Value::Null, &text, None)), json!(" "));

        let int = MappingRule::new("cpucount", "cpu_count")
            .with_type(TargetType::Integer)
            .not_null();
        assert_eq!(valid(coerce(Value::Null, &int, None)), json!(0));

        let float = MappingRule::new("cost", "cost").with_type(TargetType::Float).not_null();
        assert_eq!(valid(coerce(Value::Null, &float, None)), json!(0.0));

        let date = MappingRule::new("warranty", "warranty_expiry_date")
            .with_type(TargetType::Date)
            .not_null();
        assert!(matches!(coerce(Value::Null, &date, None), FieldOutcome::Invalid(_)));
    }

    #[test]
    fn test_identifier_is_never_defaulted() {
        let rule = MappingRule::new("serial_no", "serial_number").not_null();
        assert!(matches!(coerce(Value::Null, &rule, None), FieldOutcome::Invalid(_)));
    }

    #[test]
    fn test_integer_coercion() {
        let rule = MappingRule::new("ram", "memory").with_type(TargetType::Integer);
        assert_eq!(valid(coerce(json!("2048"), &rule, None)), json!(2048));
        assert_eq!(valid(coerce(json!(" 16.7 "), &rule, None)), json!(16));
        assert_eq!(valid(coerce(json!(4.9), &rule, None)), json!(4));
        assert!(matches!(coerce(json!("lots"), &rule, None), FieldOutcome::Invalid(_)));
    }

    #[test]
    fn test_not_zero_substitutes() {
        let int = MappingRule::new("cpucore", "cpu_core_count")
            .with_type(TargetType::Integer)
            .not_zero();
        assert_eq!(valid(coerce(json!("0"), &int, None)), json!(1));
        assert_eq!(valid(coerce(json!(8), &int, None)), json!(8));

        let float = MappingRule::new("cost", "cost").with_type(TargetType::Float).not_zero();
        assert_eq!(valid(coerce(json!(0), &float, None)), json!(0.01));

        let text = MappingRule::new("rack", "rack").not_zero();
        assert!(matches!(coerce(json!("0"), &text, None), FieldOutcome::Invalid(_)));
    }

    #[test]
    fn test_null_not_null_integer_then_not_zero() {
        let rule = MappingRule::new("cpucount", "cpu_count")
            .with_type(TargetType::Integer)
            .not_null()
            .not_zero();
        assert_eq!(valid(coerce(Value::Null, &rule, None)), json!(1));
    }

    #[test]
    fn test_dropdown_matches_substring_either_way() {
        let choices = vec!["Windows Server 2019".to_string(), "Linux".to_string()];
        let rule = MappingRule::new("os", "os").with_type(TargetType::Dropdown);

        assert_eq!(
            valid(coerce(json!("windows server"), &rule, Some(choices.as_slice()))),
            json!("Windows Server 2019")
        );
        assert_eq!(
            valid(coerce(json!("Red Hat Enterprise Linux 8"), &rule, Some(choices.as_slice()))),
            json!("Linux")
        );
        assert!(matches!(
            coerce(json!("Solaris"), &rule, Some(choices.as_slice())),
            FieldOutcome::Invalid(_)
        ));
        assert!(matches!(coerce(json!(""), &rule, Some(choices.as_slice())), FieldOutcome::Invalid(_)));
    }

    #[test]
    fn test_dropdown_without_choices_passes_through() {
        let rule = MappingRule::new("os", "os").with_type(TargetType::Dropdown);
        assert_eq!(valid(coerce(json!("Solaris"), &rule, None)), json!("Solaris"));
        assert_eq!(valid(coerce(json!("Solaris"), &rule, Some(&Vec::<String>::new()[..]))), json!("Solaris"));
    }

    #[test]
    fn test_null_dropdown_not_null_is_invalid() {
        let rule = MappingRule::new("os", "os").with_type(TargetType::Dropdown).not_null();
        let choices = vec!["Linux".to_string()];
        assert!(matches!(coerce(Value::Null, &rule, Some(choices.as_slice())), FieldOutcome::Invalid(_)));
    }
}
