//! Mapping-file loader.
//!
//! The mapping file is XML. Attributes are read into raw string structs with
//! `quick-xml`'s serde support and then converted into the validated domain
//! types, so every malformed value is reported with the task and field it
//! belongs to.
//!
//! ```xml
//! <meta>
//!   <settings>
//!     <device42 url="https://d42.example.com" user="admin" pass="..."/>
//!     <freshservice url="acme.freshservice.com" api_key="..." default-approver="ops@example.com"/>
//!   </settings>
//!   <tasks>
//!     <task enable="true" description="Servers" type="asset">
//!       <api>
//!         <resource model="Devices" path="api/1.0/devices/all/" method="GET"/>
//!         <target model="assets" path="api/v2/assets" asset-type="Server"/>
//!       </api>
//!       <mapping key="name">
//!         <field resource="name" target="name" target-header="General" not-null="true" max-length="255"/>
//!       </mapping>
//!     </task>
//!   </tasks>
//! </meta>
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::rule::{FieldAddressing, MappingDefault, MappingRule, TargetType, ValueMapping, ValueMappingItem};
use crate::settings::{Device42Settings, FreshServiceSettings, Settings, SyncTuning};
use crate::task::{ResourceDescriptor, SourceMethod, TargetDescriptor, Task, TaskKind, TaskMapping};

/// A loaded mapping file.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Backend settings.
    pub settings: Settings,
    /// Tasks in declaration order (disabled ones included).
    pub tasks: Vec<Task>,
}

impl SyncConfig {
    /// Enabled tasks in declaration order.
    pub fn enabled_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.enabled)
    }
}

/// Read and parse the mapping file at `path`.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<SyncConfig> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&xml)
}

/// Parse a mapping file from text.
pub fn parse_config(xml: &str) -> ConfigResult<SyncConfig> {
    let raw: RawMeta = quick_xml::de::from_str(xml)?;

    let settings = raw.settings.into_settings()?;
    settings.validate()?;

    let tasks = raw
        .tasks
        .map(|t| t.tasks)
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(index, task)| task.into_task(index))
        .collect::<ConfigResult<Vec<_>>>()?;

    Ok(SyncConfig { settings, tasks })
}

// ── Raw document ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawMeta {
    settings: RawSettings,
    #[serde(default)]
    tasks: Option<RawTasks>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    device42: RawDevice42,
    freshservice: RawFreshService,
    #[serde(default)]
    sync: Option<RawSync>,
}

#[derive(Debug, Deserialize)]
struct RawDevice42 {
    #[serde(rename = "@url")]
    url: String,
    #[serde(rename = "@user")]
    user: String,
    #[serde(rename = "@pass")]
    pass: String,
}

#[derive(Debug, Deserialize)]
struct RawFreshService {
    #[serde(rename = "@url")]
    url: String,
    #[serde(rename = "@api_key")]
    api_key: String,
    #[serde(rename = "@default-approver", alias = "@default_approver", default)]
    default_approver: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSync {
    #[serde(rename = "@relationship-batch-size", default)]
    relationship_batch_size: Option<String>,
    #[serde(rename = "@relationships-per-second", default)]
    relationships_per_second: Option<String>,
    #[serde(rename = "@poll-safety-margin", default)]
    poll_safety_margin: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTasks {
    #[serde(rename = "task", default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(rename = "@enable", default)]
    enable: Option<String>,
    #[serde(rename = "@description", default)]
    description: Option<String>,
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    api: RawApi,
    #[serde(default)]
    mapping: Option<RawMapping>,
}

#[derive(Debug, Deserialize)]
struct RawApi {
    resource: RawResource,
    target: RawTarget,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    #[serde(rename = "@path")]
    path: String,
    #[serde(rename = "@method", default)]
    method: Option<String>,
    #[serde(rename = "@model", default)]
    model: Option<String>,
    #[serde(rename = "@doql", default)]
    doql: Option<String>,
    #[serde(rename = "@extra-filter", default)]
    extra_filter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    #[serde(rename = "@path")]
    path: String,
    #[serde(rename = "@model")]
    model: String,
    #[serde(rename = "@asset-type", default)]
    asset_type: Option<String>,
    #[serde(rename = "@delete", default)]
    delete: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMapping {
    #[serde(rename = "@key", default)]
    key: Option<String>,
    #[serde(rename = "@target-key", default)]
    target_key: Option<String>,
    #[serde(rename = "@forward-relationship", default)]
    forward_relationship: Option<String>,
    #[serde(rename = "@backward-relationship", default)]
    backward_relationship: Option<String>,
    #[serde(rename = "field", default)]
    fields: Vec<RawField>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    #[serde(rename = "@resource")]
    resource: String,
    #[serde(rename = "@resource-secondary", default)]
    resource_secondary: Option<String>,
    #[serde(rename = "@is-array", default)]
    is_array: Option<String>,
    #[serde(rename = "@sub-key", default)]
    sub_key: Option<String>,
    #[serde(rename = "@target")]
    target: String,
    #[serde(rename = "@target-header", default)]
    target_header: Option<String>,
    #[serde(rename = "@target-field", default)]
    target_field: Option<String>,
    #[serde(rename = "@target-type", default)]
    target_type: Option<String>,
    #[serde(rename = "@target-foreign", alias = "@target-foregin", default)]
    target_foreign: Option<String>,
    #[serde(rename = "@target-foreign-key", alias = "@target-foregin-key", default)]
    target_foreign_key: Option<String>,
    #[serde(rename = "@min-length", default)]
    min_length: Option<String>,
    #[serde(rename = "@max-length", default)]
    max_length: Option<String>,
    #[serde(rename = "@set-space", default)]
    set_space: Option<String>,
    #[serde(rename = "@not-null", default)]
    not_null: Option<String>,
    #[serde(rename = "@not-zero", default)]
    not_zero: Option<String>,
    #[serde(rename = "@escape", default)]
    escape: Option<String>,
    #[serde(rename = "@error-skip", default)]
    error_skip: Option<String>,
    #[serde(rename = "value-mapping", default)]
    value_mapping: Option<RawValueMapping>,
}

#[derive(Debug, Deserialize)]
struct RawValueMapping {
    #[serde(rename = "@default", default)]
    default: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "@key")]
    key: String,
    #[serde(rename = "@value")]
    value: String,
}

// ── Conversion ────────────────────────────────────────────────────────

fn parse_flag(value: Option<&str>, context: &str, name: &str) -> ConfigResult<bool> {
    let Some(value) = value else {
        return Ok(false);
    };
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "" | "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::invalid(
            context,
            format!("'{name}' must be a boolean, got '{other}'"),
        )),
    }
}

fn parse_number<T: std::str::FromStr>(
    value: Option<&str>,
    context: &str,
    name: &str,
) -> ConfigResult<Option<T>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v.parse::<T>().map(Some).map_err(|_| {
            ConfigError::invalid(context, format!("'{name}' must be a number, got '{v}'"))
        }),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawSettings {
    fn into_settings(self) -> ConfigResult<Settings> {
        let sync = match self.sync {
            None => SyncTuning::default(),
            Some(raw) => {
                let defaults = SyncTuning::default();
                SyncTuning {
                    relationship_batch_size: parse_number(
                        raw.relationship_batch_size.as_deref(),
                        "settings.sync",
                        "relationship-batch-size",
                    )?
                    .unwrap_or(defaults.relationship_batch_size),
                    relationships_per_second: parse_number(
                        raw.relationships_per_second.as_deref(),
                        "settings.sync",
                        "relationships-per-second",
                    )?
                    .unwrap_or(defaults.relationships_per_second),
                    poll_safety_margin: parse_number(
                        raw.poll_safety_margin.as_deref(),
                        "settings.sync",
                        "poll-safety-margin",
                    )?
                    .unwrap_or(defaults.poll_safety_margin),
                }
            }
        };

        Ok(Settings {
            device42: Device42Settings {
                url: self.device42.url,
                user: self.device42.user,
                password: self.device42.pass,
            },
            freshservice: FreshServiceSettings {
                url: self.freshservice.url,
                api_key: self.freshservice.api_key,
                default_approver: non_blank(self.freshservice.default_approver),
            },
            sync,
        })
    }
}

impl RawTask {
    fn into_task(self, index: usize) -> ConfigResult<Task> {
        let context = match &self.description {
            Some(d) => format!("task[{index}] '{d}'"),
            None => format!("task[{index}]"),
        };

        let kind = self
            .kind
            .as_deref()
            .unwrap_or_default()
            .parse::<TaskKind>()
            .map_err(|e| ConfigError::invalid(&context, e))?;

        let method = self
            .api
            .resource
            .method
            .as_deref()
            .unwrap_or_default()
            .parse::<SourceMethod>()
            .map_err(|e| ConfigError::invalid(&context, e))?;

        let resource = ResourceDescriptor {
            path: self.api.resource.path,
            method,
            model: non_blank(self.api.resource.model),
            doql: non_blank(self.api.resource.doql),
            extra_filter: non_blank(self.api.resource.extra_filter),
        };

        let target = TargetDescriptor {
            path: self.api.target.path,
            model: self.api.target.model,
            asset_type: non_blank(self.api.target.asset_type),
            delete: parse_flag(self.api.target.delete.as_deref(), &context, "delete")?,
        };

        if resource.raw_query().is_none() && resource.model.is_none() {
            return Err(ConfigError::invalid(
                &context,
                "resource needs either a 'model' or a 'doql' query",
            ));
        }

        let raw_mapping = self.mapping.unwrap_or_default();
        let fields = raw_mapping
            .fields
            .into_iter()
            .map(|field| field.into_rule(&context))
            .collect::<ConfigResult<Vec<_>>>()?;

        let mapping = TaskMapping {
            key: non_blank(raw_mapping.key),
            target_key: non_blank(raw_mapping.target_key),
            forward_relationship: non_blank(raw_mapping.forward_relationship),
            backward_relationship: non_blank(raw_mapping.backward_relationship),
            fields,
        };

        if kind.links_pair() && (mapping.key.is_none() || mapping.target_key.is_none()) {
            return Err(ConfigError::invalid(
                &context,
                format!("{kind} tasks need 'key' and 'target-key' on the mapping"),
            ));
        }

        if kind.is_relationship()
            && (mapping.forward_relationship.is_none() || mapping.backward_relationship.is_none())
        {
            return Err(ConfigError::invalid(
                &context,
                "relationship tasks need 'forward-relationship' and 'backward-relationship'",
            ));
        }

        Ok(Task {
            enabled: parse_flag(self.enable.as_deref(), &context, "enable")?,
            description: non_blank(self.description),
            kind,
            resource,
            target,
            mapping,
        })
    }
}

impl RawField {
    fn into_rule(self, task_context: &str) -> ConfigResult<MappingRule> {
        let context = format!("{task_context} field '{}'", self.target);

        let is_array = parse_flag(self.is_array.as_deref(), &context, "is-array")?;
        let foreign = non_blank(self.target_foreign);
        let foreign_key = non_blank(self.target_foreign_key);

        let addressing = match (is_array, foreign, foreign_key) {
            (true, None, None) => {
                let sub_key = non_blank(self.sub_key).ok_or_else(|| {
                    ConfigError::invalid(&context, "'is-array' requires a 'sub-key'")
                })?;
                FieldAddressing::SubKeyed { sub_key }
            }
            (false, None, None) => FieldAddressing::Plain,
            (false, Some(collection), name_field) => FieldAddressing::ForeignKey {
                collection,
                name_field: name_field.unwrap_or_else(|| "name".to_string()),
            },
            (false, None, Some(_)) => {
                return Err(ConfigError::invalid(
                    &context,
                    "'target-foreign-key' requires 'target-foreign'",
                ))
            }
            (true, _, _) => {
                return Err(ConfigError::invalid(
                    &context,
                    "a field cannot be both a sub-keyed array and a foreign key",
                ))
            }
        };

        let target_type = self
            .target_type
            .as_deref()
            .unwrap_or_default()
            .parse::<TargetType>()
            .map_err(|e| ConfigError::invalid(&context, e))?;

        let value_mapping = self.value_mapping.map(|vm| ValueMapping {
            items: vm
                .items
                .into_iter()
                .map(|item| ValueMappingItem::new(item.key, item.value))
                .collect(),
            default: vm.default.as_deref().map(MappingDefault::from_declared),
        });

        if value_mapping.is_some() && matches!(addressing, FieldAddressing::SubKeyed { .. }) {
            return Err(ConfigError::invalid(
                &context,
                "'value-mapping' cannot be combined with 'is-array'",
            ));
        }

        let min_length = parse_number::<usize>(self.min_length.as_deref(), &context, "min-length")?;
        let max_length = parse_number::<usize>(self.max_length.as_deref(), &context, "max-length")?;
        if let (Some(min), Some(max)) = (min_length, max_length) {
            if min > max {
                return Err(ConfigError::invalid(
                    &context,
                    format!("min-length {min} exceeds max-length {max}"),
                ));
            }
        }

        Ok(MappingRule {
            resource: self.resource,
            resource_secondary: non_blank(self.resource_secondary),
            addressing,
            target: self.target,
            target_header: non_blank(self.target_header),
            target_field: non_blank(self.target_field),
            target_type,
            value_mapping,
            min_length,
            max_length,
            set_space: parse_flag(self.set_space.as_deref(), &context, "set-space")?,
            not_null: parse_flag(self.not_null.as_deref(), &context, "not-null")?,
            not_zero: parse_flag(self.not_zero.as_deref(), &context, "not-zero")?,
            escape: parse_flag(self.escape.as_deref(), &context, "escape")?,
            error_skip: parse_flag(self.error_skip.as_deref(), &context, "error-skip")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SETTINGS: &str = r#"
        <settings>
            <device42 url="https://d42.example.com" user="admin" pass="secret"/>
            <freshservice url="acme.freshservice.com" api_key="abc" default-approver="ops@example.com"/>
        </settings>"#;

    fn document(tasks: &str) -> String {
        format!("<meta>{SETTINGS}<tasks>{tasks}</tasks></meta>")
    }

    #[test]
    fn test_parse_full_asset_task() {
        let xml = document(
            r#"
            <task enable="true" description="Servers" type="asset">
                <api>
                    <resource model="Devices" path="api/1.0/devices/all/" method="GET" extra-filter="type=physical"/>
                    <target model="assets" path="api/v2/assets" asset-type="Server"/>
                </api>
                <mapping key="name">
                    <field resource="name" target="name" target-header="General" not-null="true" max-length="255" escape="true"/>
                    <field resource="serial_no" target="serial_number" target-header="Hardware" error-skip="true"/>
                    <field resource="manufacturer" target="vendor" target-header="Hardware"
                           target-foregin="vendors" target-foregin-key="name" not-null="true"/>
                    <field resource="ip_addresses" target="ip_address" target-header="Network" is-array="true" sub-key="ip"/>
                    <field resource="os" target="os" target-header="Software" target-type="dropdown">
                        <value-mapping default="null">
                            <item key="windows 2019, win2k19" value="Windows Server 2019"/>
                            <item key="ubuntu" value="Linux"/>
                        </value-mapping>
                    </field>
                    <field resource="cpucount" target="cpu_core_count" target-header="Hardware" target-type="integer" not-zero="true"/>
                </mapping>
            </task>"#,
        );

        let config = parse_config(&xml).unwrap();
        assert_eq!(config.settings.freshservice.default_approver.as_deref(), Some("ops@example.com"));
        assert_eq!(config.tasks.len(), 1);

        let task = &config.tasks[0];
        assert!(task.enabled);
        assert_eq!(task.kind, TaskKind::Asset);
        assert_eq!(task.target.asset_type.as_deref(), Some("Server"));
        assert!(!task.target.delete);
        assert_eq!(task.resource.filtered_path(), "api/1.0/devices/all/?type=physical");
        assert_eq!(task.mapping.fields.len(), 6);

        let name = &task.mapping.fields[0];
        assert!(name.not_null && name.escape);
        assert_eq!(name.max_length, Some(255));

        assert!(task.mapping.fields[1].error_skip);

        let vendor = &task.mapping.fields[2];
        assert_eq!(vendor.addressing.foreign_key(), Some(("vendors", "name")));

        let ip = &task.mapping.fields[3];
        assert_eq!(
            ip.addressing,
            FieldAddressing::SubKeyed {
                sub_key: "ip".to_string()
            }
        );

        let os = &task.mapping.fields[4];
        let table = os.value_mapping.as_ref().unwrap();
        assert_eq!(table.items.len(), 2);
        assert_eq!(table.default, Some(MappingDefault::Clear));
        assert_eq!(os.target_type, TargetType::Dropdown);

        let cpu = &task.mapping.fields[5];
        assert_eq!(cpu.target_type, TargetType::Integer);
        assert!(cpu.not_zero);
    }

    #[test]
    fn test_parse_relationship_task_and_sync_tuning() {
        let xml = format!(
            r#"<meta>
                <settings>
                    <device42 url="https://d42.example.com" user="admin" pass="secret"/>
                    <freshservice url="https://acme.freshservice.com" api_key="abc"/>
                    <sync relationship-batch-size="10" relationships-per-second="5"/>
                </settings>
                <tasks>
                    <task enable="false" type="affinity_group">
                        <api>
                            <resource path="services/data/v1.0/query/" method="POST" doql="select 1"/>
                            <target model="assets" path="api/v2/relationships" delete="true"/>
                        </api>
                        <mapping key="dependent_device_name" target-key="dependency_device_name"
                                 forward-relationship="Depends On" backward-relationship="Used By"/>
                    </task>
                </tasks>
            </meta>"#
        );

        let config = parse_config(&xml).unwrap();
        assert_eq!(config.settings.sync.relationship_batch_size, 10);
        assert_eq!(config.settings.sync.relationships_per_second, 5.0);
        assert_eq!(config.settings.sync.poll_safety_margin, 0.2);
        assert!(config.settings.freshservice.default_approver.is_none());

        let task = &config.tasks[0];
        assert!(!task.enabled);
        assert!(task.target.delete);
        assert_eq!(task.resource.method, SourceMethod::Post);
        assert_eq!(task.resource.raw_query(), Some("select 1"));
        assert_eq!(task.mapping.forward_relationship.as_deref(), Some("Depends On"));
        assert_eq!(config.enabled_tasks().count(), 0);
    }

    #[test]
    fn test_no_tasks_is_valid() {
        let xml = format!("<meta>{SETTINGS}<tasks/></meta>");
        let config = parse_config(&xml).unwrap();
        assert!(config.tasks.is_empty());

        let xml = format!("<meta>{SETTINGS}</meta>");
        assert!(parse_config(&xml).unwrap().tasks.is_empty());
    }

    #[test]
    fn test_conflicting_addressing_is_rejected() {
        let xml = document(
            r#"
            <task enable="true">
                <api>
                    <resource model="Devices" path="api/1.0/devices/all/"/>
                    <target model="assets" path="api/v2/assets"/>
                </api>
                <mapping>
                    <field resource="ips" target="ip" is-array="true" sub-key="ip" target-foreign="vendors"/>
                </mapping>
            </task>"#,
        );

        let err = parse_config(&xml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }), "got {err:?}");
    }

    #[test]
    fn test_bad_flag_is_rejected() {
        let xml = document(
            r#"
            <task enable="maybe">
                <api>
                    <resource model="Devices" path="api/1.0/devices/all/"/>
                    <target model="assets" path="api/v2/assets"/>
                </api>
            </task>"#,
        );

        let err = parse_config(&xml).unwrap_err();
        assert!(err.to_string().contains("enable"), "got {err}");
    }

    #[test]
    fn test_relationship_task_requires_relation_names() {
        let xml = document(
            r#"
            <task enable="true" type="business_app">
                <api>
                    <resource model="Devices" path="api/1.0/devices/all/"/>
                    <target model="assets" path="api/v2/assets"/>
                </api>
                <mapping key="a" target-key="b" forward-relationship="Uses"/>
            </task>"#,
        );

        assert!(parse_config(&xml).is_err());
    }

    #[test]
    fn test_installation_task_requires_key_pair() {
        let xml = document(
            r#"
            <task enable="true" type="software_in_use">
                <api>
                    <resource model="softwaredetails" path="api/1.0/software_details/"/>
                    <target model="applications" path="api/v2/applications"/>
                </api>
                <mapping key="software"/>
            </task>"#,
        );

        let err = parse_config(&xml).unwrap_err();
        assert!(err.to_string().contains("target-key"), "got {err}");
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", document("")).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.settings.freshservice_base_url(), "https://acme.freshservice.com");
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/mapping.xml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
