//! Field mapping rules.
//!
//! A [`MappingRule`] describes how one source attribute becomes one target
//! field: where the value is read from, how it is addressed (plain value,
//! foreign key, or sub-keyed array), how it is coerced, and which bounds it
//! must satisfy before it is written into the payload.

use serde::{Deserialize, Serialize};

/// Target value type a field is coerced to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// Free text (no coercion).
    #[default]
    String,
    /// Whole number.
    Integer,
    /// Decimal number.
    Float,
    /// Date or date-time, passed through as text.
    Date,
    /// Value chosen from the target field's declared choice list.
    Dropdown,
}

impl TargetType {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::String => "string",
            TargetType::Integer => "integer",
            TargetType::Float => "float",
            TargetType::Date => "date",
            TargetType::Dropdown => "dropdown",
        }
    }

    /// Whether values of this type are numeric.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TargetType::Integer | TargetType::Float)
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TargetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "string" | "text" => Ok(TargetType::String),
            "integer" | "int" => Ok(TargetType::Integer),
            "float" | "decimal" => Ok(TargetType::Float),
            "date" => Ok(TargetType::Date),
            "dropdown" => Ok(TargetType::Dropdown),
            _ => Err(format!("unknown target type: {s}")),
        }
    }
}

/// How the value of a rule is addressed in the source and the target.
///
/// Exactly one addressing mode applies per rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FieldAddressing {
    /// The (possibly substituted) source value is sent as-is.
    Plain,
    /// The value names a record in another target collection and is replaced
    /// by that record's id.
    ForeignKey {
        /// Target collection, e.g. `vendors` or `products`.
        collection: String,
        /// Field of the collection the value is matched against.
        name_field: String,
    },
    /// The source value is a list of sub-records; the first one carrying
    /// `sub_key` provides the value.
    SubKeyed {
        /// Key looked up in each sub-record.
        sub_key: String,
    },
}

impl FieldAddressing {
    /// The foreign collection and its name field, when this is a foreign key.
    #[must_use]
    pub fn foreign_key(&self) -> Option<(&str, &str)> {
        match self {
            FieldAddressing::ForeignKey {
                collection,
                name_field,
            } => Some((collection.as_str(), name_field.as_str())),
            _ => None,
        }
    }
}

/// Default applied when no value-mapping entry matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MappingDefault {
    /// Clear the field (declared as the literal `"null"`).
    Clear,
    /// Send this literal text.
    Literal(String),
}

impl MappingDefault {
    /// Interpret a declared default, mapping the literal `"null"` to [`MappingDefault::Clear`].
    #[must_use]
    pub fn from_declared(value: &str) -> Self {
        if value == "null" {
            MappingDefault::Clear
        } else {
            MappingDefault::Literal(value.to_string())
        }
    }
}

/// One key/value entry of a substitution table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMappingItem {
    /// Source value (or comma-separated alternatives).
    pub key: String,
    /// Replacement sent to the target.
    pub value: String,
}

impl ValueMappingItem {
    /// Create a new entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Lowercased alternatives when the key is in comma-separated form.
    #[must_use]
    pub fn alternatives(&self) -> Option<Vec<String>> {
        if !self.key.contains(',') {
            return None;
        }
        Some(
            self.key
                .split(',')
                .map(|alt| alt.trim().to_lowercase())
                .filter(|alt| !alt.is_empty())
                .collect(),
        )
    }
}

/// Ordered substitution table with an optional default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueMapping {
    /// Entries in declaration order.
    pub items: Vec<ValueMappingItem>,
    /// Fallback when no entry matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<MappingDefault>,
}

impl ValueMapping {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    #[must_use]
    pub fn with_item(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.push(ValueMappingItem::new(key, value));
        self
    }

    /// Set the declared default.
    #[must_use]
    pub fn with_default(mut self, declared: &str) -> Self {
        self.default = Some(MappingDefault::from_declared(declared));
        self
    }
}

/// A single field translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRule {
    /// Source attribute read from the record.
    pub resource: String,

    /// Fallback source attribute used when `resource` is absent or null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_secondary: Option<String>,

    /// Addressing mode.
    pub addressing: FieldAddressing,

    /// Target field name.
    pub target: String,

    /// Schema header the target field is grouped under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_header: Option<String>,

    /// Schema field name when it differs from `target`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_field: Option<String>,

    /// Coercion applied before the value is written.
    #[serde(default)]
    pub target_type: TargetType,

    /// Substitution table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_mapping: Option<ValueMapping>,

    /// Minimum string length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum string length; longer values are truncated with an ellipsis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Pad an empty value with spaces up to `min_length`.
    #[serde(default)]
    pub set_space: bool,

    /// The target rejects null for this field.
    #[serde(default)]
    pub not_null: bool,

    /// The target rejects a literal zero for this field.
    #[serde(default)]
    pub not_zero: bool,

    /// Replace characters the target does not accept.
    #[serde(default)]
    pub escape: bool,

    /// Drop this field on the degraded retry after a duplicate-value conflict.
    #[serde(default)]
    pub error_skip: bool,
}

impl MappingRule {
    /// Create a plain rule copying `resource` into `target`.
    pub fn new(resource: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            resource_secondary: None,
            addressing: FieldAddressing::Plain,
            target: target.into(),
            target_header: None,
            target_field: None,
            target_type: TargetType::String,
            value_mapping: None,
            min_length: None,
            max_length: None,
            set_space: false,
            not_null: false,
            not_zero: false,
            escape: false,
            error_skip: false,
        }
    }

    /// Resolve the value as a foreign key into `collection`, matched on `name_field`.
    #[must_use]
    pub fn foreign_key(mut self, collection: impl Into<String>, name_field: impl Into<String>) -> Self {
        self.addressing = FieldAddressing::ForeignKey {
            collection: collection.into(),
            name_field: name_field.into(),
        };
        self
    }

    /// Read the value from the first sub-record carrying `sub_key`.
    #[must_use]
    pub fn sub_keyed(mut self, sub_key: impl Into<String>) -> Self {
        self.addressing = FieldAddressing::SubKeyed {
            sub_key: sub_key.into(),
        };
        self
    }

    /// Set the fallback source attribute.
    #[must_use]
    pub fn with_secondary(mut self, resource: impl Into<String>) -> Self {
        self.resource_secondary = Some(resource.into());
        self
    }

    /// Set the schema header.
    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.target_header = Some(header.into());
        self
    }

    /// Set the schema field name override.
    #[must_use]
    pub fn with_target_field(mut self, field: impl Into<String>) -> Self {
        self.target_field = Some(field.into());
        self
    }

    /// Set the target type.
    #[must_use]
    pub fn with_type(mut self, target_type: TargetType) -> Self {
        self.target_type = target_type;
        self
    }

    /// Set the substitution table.
    #[must_use]
    pub fn with_value_mapping(mut self, mapping: ValueMapping) -> Self {
        self.value_mapping = Some(mapping);
        self
    }

    /// Set length bounds.
    #[must_use]
    pub fn with_length(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.min_length = min;
        self.max_length = max;
        self
    }

    /// Pad empty values with spaces up to the minimum length.
    #[must_use]
    pub fn with_set_space(mut self) -> Self {
        self.set_space = true;
        self
    }

    /// Mark the field as not-null.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark the field as not-zero.
    #[must_use]
    pub fn not_zero(mut self) -> Self {
        self.not_zero = true;
        self
    }

    /// Enable character sanitizing.
    #[must_use]
    pub fn escaped(mut self) -> Self {
        self.escape = true;
        self
    }

    /// Drop the field on the degraded retry pass.
    #[must_use]
    pub fn error_skip(mut self) -> Self {
        self.error_skip = true;
        self
    }

    /// Schema field name before any asset-type suffix is applied.
    #[must_use]
    pub fn schema_field_name(&self) -> &str {
        self.target_field.as_deref().unwrap_or(&self.target)
    }

    /// Whether this rule resolves through a foreign collection.
    #[must_use]
    pub fn is_foreign_key(&self) -> bool {
        matches!(self.addressing, FieldAddressing::ForeignKey { .. })
    }
}
