//! Value resolution: read, extract, substitute, resolve foreign keys, sanitize.

use cmdbsync_core::text::{sanitize, truncate_with_ellipsis};
use cmdbsync_core::{FieldAddressing, MappingDefault, MappingRule, ValueMapping};
use cmdbsync_device42::SourceRecord;
use cmdbsync_freshservice::CollectionKey;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::context::SyncContext;
use crate::error::SyncResult;

/// Length bound for auto-created lookup names when the rule declares none.
pub const DEFAULT_NAME_MAX_LENGTH: usize = 255;

/// Lookup collections created without an owning asset type.
const UNTYPED_COLLECTIONS: [&str; 3] = ["vendors", "groups", "agents"];

/// How unresolved foreign keys are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Only look up existing objects.
    Lookup,
    /// Create missing objects of not-null rules, owned by `owner_type_id`.
    AutoCreate { owner_type_id: Option<i64> },
}

/// Text form of a scalar value.
#[must_use]
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Raw source value of a rule, falling back to the secondary resource.
#[must_use]
pub fn read_source(record: &SourceRecord, rule: &MappingRule) -> Value {
    let primary = record.get(&rule.resource).filter(|v| !v.is_null());
    let value = match (primary, &rule.resource_secondary) {
        (Some(value), _) => Some(value),
        (None, Some(secondary)) => record.get(secondary),
        (None, None) => None,
    };
    value.cloned().unwrap_or(Value::Null)
}

/// First sub-record carrying `sub_key`, or null.
fn extract_sub_key(value: &Value, sub_key: &str) -> Value {
    value
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .find_map(|item| item.as_object().and_then(|o| o.get(sub_key)))
        })
        .cloned()
        .unwrap_or(Value::Null)
}

/// Apply a substitution table.
///
/// Entries are tried in declaration order. A comma-separated key matches
/// when any of its alternatives occurs in the value, ignoring case; a
/// single key must equal the value exactly.
#[must_use]
pub fn substitute(value: &Value, mapping: &ValueMapping) -> Value {
    let text = value_text(value);
    let lowered = text.as_deref().map(str::to_lowercase);

    for item in &mapping.items {
        let matched = match item.alternatives() {
            Some(alternatives) => lowered
                .as_deref()
                .is_some_and(|v| alternatives.iter().any(|alt| v.contains(alt.as_str()))),
            None => text.as_deref() == Some(item.key.as_str()),
        };
        if matched {
            return Value::String(item.value.clone());
        }
    }

    match &mapping.default {
        Some(MappingDefault::Literal(literal)) => Value::String(literal.clone()),
        Some(MappingDefault::Clear) | None => Value::Null,
    }
}

/// Source value after sub-key extraction or substitution.
#[must_use]
pub fn source_value(record: &SourceRecord, rule: &MappingRule) -> Value {
    let value = read_source(record, rule);
    match (&rule.addressing, &rule.value_mapping) {
        (FieldAddressing::SubKeyed { sub_key }, _) => extract_sub_key(&value, sub_key),
        (_, Some(mapping)) => substitute(&value, mapping),
        (_, None) => value,
    }
}

/// Resolve the value a rule writes for `record`.
///
/// Never fails for data-quality reasons: an unresolvable value comes back
/// as null. Errors are transport failures of lookups or auto-creates.
pub async fn resolve_value(
    ctx: &mut SyncContext,
    record: &SourceRecord,
    rule: &MappingRule,
    mode: ResolveMode,
) -> SyncResult<Value> {
    let mut value = source_value(record, rule);

    if let Some((collection, name_field)) = rule.addressing.foreign_key() {
        value = resolve_foreign_key(ctx, rule, collection, name_field, value, mode).await?;
    }

    if rule.escape {
        if let Value::String(s) = &value {
            value = Value::String(sanitize(s));
        }
    }
    Ok(value)
}

async fn resolve_foreign_key(
    ctx: &mut SyncContext,
    rule: &MappingRule,
    collection: &str,
    name_field: &str,
    value: Value,
    mode: ResolveMode,
) -> SyncResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let key = CollectionKey::new(collection, name_field);
    ctx.ensure_collection(&key, &format!("api/v2/{collection}"))
        .await?;
    if let Some(found) = ctx.cache.find_value(&key, &value) {
        return Ok(json!(found.id));
    }

    if !rule.not_null {
        return Ok(value);
    }

    let ResolveMode::AutoCreate { owner_type_id } = mode else {
        return Ok(Value::Null);
    };
    let Some(name) = value_text(&value) else {
        return Ok(Value::Null);
    };

    let truncated = truncate_with_ellipsis(&name, rule.max_length.unwrap_or(DEFAULT_NAME_MAX_LENGTH));
    if truncated != name {
        if let Some(found) = ctx.cache.find(&key, &truncated) {
            return Ok(json!(found.id));
        }
    }

    let owner = if UNTYPED_COLLECTIONS.contains(&collection) {
        None
    } else {
        owner_type_id
    };
    info!(collection = %collection, name = %truncated, "Creating missing lookup object");
    let created = ctx
        .target
        .insert_by_name(collection, name_field, &truncated, owner)
        .await?;
    debug!(collection = %collection, id = created.id, "Created lookup object");

    let id = created.id;
    ctx.cache.insert(&key, &name, created.clone());
    ctx.cache.insert(&key, &truncated, created);
    Ok(json!(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmdbsync_core::ValueMapping;

    fn record(value: Value) -> SourceRecord {
        match value {
            Value::Object(map) => map,
            _ => SourceRecord::new(),
        }
    }

    #[test]
    fn test_secondary_resource_on_null() {
        let rule = MappingRule::new("serial_no", "serial_number").with_secondary("uuid");
        let rec = record(json!({"serial_no": null, "uuid": "U-1"}));
        assert_eq!(read_source(&rec, &rule), json!("U-1"));

        let rec = record(json!({"serial_no": "S-1", "uuid": "U-1"}));
        assert_eq!(read_source(&rec, &rule), json!("S-1"));

        let rec = record(json!({"uuid": "U-2"}));
        assert_eq!(read_source(&rec, &rule), json!("U-2"));
    }

    #[test]
    fn test_sub_key_takes_first_carrier() {
        let rule = MappingRule::new("ip_addresses", "ip_address").sub_keyed("ip");
        let rec = record(json!({
            "ip_addresses": [{"label": "mgmt"}, {"ip": "10.0.0.1"}, {"ip": "10.0.0.2"}]
        }));
        assert_eq!(source_value(&rec, &rule), json!("10.0.0.1"));

        let rec = record(json!({"ip_addresses": [{"label": "mgmt"}]}));
        assert_eq!(source_value(&rec, &rule), Value::Null);

        let rec = record(json!({"ip_addresses": null}));
        assert_eq!(source_value(&rec, &rule), Value::Null);
    }

    #[test]
    fn test_exact_substitution_is_case_sensitive() {
        let mapping = ValueMapping::new().with_item("physical", "Physical Server");
        assert_eq!(substitute(&json!("physical"), &mapping), json!("Physical Server"));
        assert_eq!(substitute(&json!("Physical"), &mapping), Value::Null);
    }

    #[test]
    fn test_alternatives_match_ignoring_case() {
        let mapping = ValueMapping::new()
            .with_item("windows 2019, win2019", "Windows Server 2019")
            .with_item("ubuntu, centos", "Linux");
        assert_eq!(
            substitute(&json!("Microsoft Windows 2019 Datacenter"), &mapping),
            json!("Windows Server 2019")
        );
        assert_eq!(substitute(&json!("CentOS 7"), &mapping), json!("Linux"));
        assert_eq!(substitute(&Value::Null, &mapping), Value::Null);
    }

    #[test]
    fn test_null_default_clears() {
        let mapping = ValueMapping::new().with_item("a", "A").with_default("null");
        assert_eq!(substitute(&json!("zzz"), &mapping), Value::Null);

        let mapping = ValueMapping::new().with_item("a", "A").with_default("Other");
        assert_eq!(substitute(&json!("zzz"), &mapping), json!("Other"));
    }

    #[test]
    fn test_substitution_of_scalars() {
        let mapping = ValueMapping::new().with_item("true", "Yes").with_item("3", "Three");
        assert_eq!(substitute(&json!(true), &mapping), json!("Yes"));
        assert_eq!(substitute(&json!(3), &mapping), json!("Three"));
    }

    #[test]
    fn test_sub_keyed_rule_ignores_value_mapping() {
        let rule = MappingRule::new("macs", "mac_address")
            .sub_keyed("mac")
            .with_value_mapping(ValueMapping::new().with_default("null"));
        let rec = record(json!({"macs": [{"mac": "aa:bb"}]}));
        assert_eq!(source_value(&rec, &rule), json!("aa:bb"));
    }
}
