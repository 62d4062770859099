//! Payload assembly.

use cmdbsync_core::MappingRule;
use cmdbsync_device42::SourceRecord;
use cmdbsync_freshservice::AssetTypeSchema;
use serde_json::{Map, Value};
use tracing::debug;

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::mapping::resolve::{resolve_value, ResolveMode};
use crate::mapping::validate::{validate_value, FieldOutcome};

/// Target payload: flat fields plus the type-specific `type_fields` map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub fields: Map<String, Value>,
    pub type_fields: Map<String, Value>,
}

impl Payload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a flat field.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    /// Flat field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// JSON body; `type_fields` is only present when non-empty.
    #[must_use]
    pub fn into_value(self) -> Value {
        let mut body = self.fields;
        if !self.type_fields.is_empty() {
            body.insert("type_fields".to_string(), Value::Object(self.type_fields));
        }
        Value::Object(body)
    }
}

/// Where a rule's value lands and what it may hold.
struct Placement {
    key: String,
    type_specific: bool,
    choices: Option<Vec<String>>,
}

fn place(rule: &MappingRule, schema: Option<&AssetTypeSchema>) -> Option<Placement> {
    let Some(schema) = schema else {
        return Some(Placement {
            key: rule.target.clone(),
            type_specific: false,
            choices: None,
        });
    };

    let field = schema.find_field(rule.target_header.as_deref(), rule.schema_field_name())?;
    Some(if field.is_type_specific() {
        Placement {
            key: field.name.clone(),
            type_specific: true,
            choices: Some(field.choice_labels()),
        }
    } else {
        Placement {
            key: rule.target.clone(),
            type_specific: false,
            choices: Some(field.choice_labels()),
        }
    })
}

/// Run every rule through resolution and validation and collect the valid fields.
///
/// With a `schema`, rules whose field the asset type does not expose are
/// skipped. With `skip_error_fields`, rules flagged `error-skip` are left out.
pub async fn build_payload(
    ctx: &mut SyncContext,
    record: &SourceRecord,
    rules: &[MappingRule],
    schema: Option<&AssetTypeSchema>,
    owner_type_id: Option<i64>,
    skip_error_fields: bool,
) -> SyncResult<Payload> {
    let mut payload = Payload::new();

    for rule in rules {
        if skip_error_fields && rule.error_skip {
            continue;
        }
        let Some(placement) = place(rule, schema) else {
            debug!(field = %rule.target, "Field not in asset type schema, skipping");
            continue;
        };

        let value = resolve_value(ctx, record, rule, ResolveMode::Lookup).await?;
        let outcome = validate_value(
            ctx,
            record,
            rule,
            value,
            owner_type_id,
            placement.choices.as_deref(),
        )
        .await?;

        let target = if placement.type_specific {
            &mut payload.type_fields
        } else {
            &mut payload.fields
        };
        match outcome {
            FieldOutcome::Valid(value) => {
                target.insert(placement.key, value);
            }
            FieldOutcome::Invalid(reason) => {
                debug!(field = %rule.target, reason = %reason, "Argument is invalid, dropping it");
                target.remove(&placement.key);
            }
        }
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdbsync_freshservice::{AssetTypeField, AssetTypeFieldSection};
    use serde_json::json;

    fn schema() -> AssetTypeSchema {
        let field = |name: &str, type_id: Option<i64>, choices: Vec<Value>| AssetTypeField {
            name: name.to_string(),
            label: None,
            asset_type_id: type_id,
            field_type: None,
            choices,
        };
        AssetTypeSchema {
            asset_type_id: 7,
            sections: vec![
                AssetTypeFieldSection {
                    field_header: "General".to_string(),
                    fields: vec![field("name", None, vec![])],
                },
                AssetTypeFieldSection {
                    field_header: "Hardware".to_string(),
                    fields: vec![field("os_7", Some(7), vec![json!(["Linux", 1])])],
                },
            ],
        }
    }

    #[test]
    fn test_placement_follows_schema() {
        let schema = schema();

        let name = MappingRule::new("name", "name").with_header("General");
        let placed = place(&name, Some(&schema)).unwrap();
        assert_eq!(placed.key, "name");
        assert!(!placed.type_specific);

        let os = MappingRule::new("os", "os").with_header("Hardware");
        let placed = place(&os, Some(&schema)).unwrap();
        assert_eq!(placed.key, "os_7");
        assert!(placed.type_specific);
        assert_eq!(placed.choices, Some(vec!["Linux".to_string()]));

        let missing = MappingRule::new("rack", "rack").with_header("Location");
        assert!(place(&missing, Some(&schema)).is_none());

        let flat = place(&missing, None).unwrap();
        assert_eq!(flat.key, "rack");
        assert!(flat.choices.is_none());
    }

    #[test]
    fn test_into_value_nests_type_fields() {
        let mut payload = Payload::new();
        payload.set("name", json!("srv1"));
        assert_eq!(payload.clone().into_value(), json!({"name": "srv1"}));

        payload.type_fields.insert("os_7".to_string(), json!("Linux"));
        assert_eq!(
            payload.into_value(),
            json!({"name": "srv1", "type_fields": {"os_7": "Linux"}})
        );
    }
}
