//! Common test utilities for cmdbsync-engine integration tests.

#![allow(dead_code)]

use cmdbsync_core::{parse_config, SyncConfig};
use cmdbsync_engine::SyncContext;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Source path every test task reads from.
pub const SOURCE_PATH: &str = "/api/1.0/devices/all/";

/// Mock Device42 and Freshservice servers.
pub struct Backends {
    pub device42: MockServer,
    pub freshservice: MockServer,
}

impl Backends {
    pub async fn start() -> Self {
        Self {
            device42: MockServer::start().await,
            freshservice: MockServer::start().await,
        }
    }

    /// Mapping file pointing at the mock servers.
    ///
    /// Relationship jobs are polled every 20 ms so polling tests stay fast.
    pub fn config(&self, approver: Option<&str>, tasks: &str) -> SyncConfig {
        let approver = approver
            .map(|email| format!(r#" default-approver="{email}""#))
            .unwrap_or_default();
        let xml = format!(
            r#"<meta>
                <settings>
                    <device42 url="{d42}" user="admin" pass="secret"/>
                    <freshservice url="{fs}" api_key="fs-key"{approver}/>
                    <sync relationship-batch-size="20" relationships-per-second="1000" poll-safety-margin="0.2"/>
                </settings>
                <tasks>{tasks}</tasks>
            </meta>"#,
            d42 = self.device42.uri(),
            fs = self.freshservice.uri(),
        );
        parse_config(&xml).unwrap()
    }

    pub fn context(&self, config: &SyncConfig) -> SyncContext {
        SyncContext::from_settings(&config.settings).unwrap()
    }

    /// Serve `records` as the single page of the source collection.
    pub async fn source(&self, records: Value) {
        Mock::given(method("GET"))
            .and(path(SOURCE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Devices": records })))
            .mount(&self.device42)
            .await;
    }

    /// Serve `items` as page 1 of a Freshservice collection and an empty page after it.
    pub async fn collection(&self, collection_path: &str, key: &str, items: Value) {
        Mock::given(method("GET"))
            .and(path(collection_path))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ key: items })))
            .mount(&self.freshservice)
            .await;

        Mock::given(method("GET"))
            .and(path(collection_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ key: [] })))
            .mount(&self.freshservice)
            .await;
    }

    /// Asset types `Server` (1) and `Business Service` (2), with a schema for `Server`.
    pub async fn asset_types(&self, server_fields: Value) {
        self.collection(
            "/api/v2/asset_types",
            "asset_types",
            json!([
                {"id": 1, "name": "Server", "parent_asset_type_id": null},
                {"id": 2, "name": "Business Service", "parent_asset_type_id": null}
            ]),
        )
        .await;

        Mock::given(method("GET"))
            .and(path("/api/v2/asset_types/1/fields"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "asset_type_fields": server_fields
            })))
            .mount(&self.freshservice)
            .await;
    }

    /// Requests the Freshservice mock received with `verb` on `request_path`.
    pub async fn requests(&self, verb: &str, request_path: &str) -> Vec<Request> {
        self.freshservice
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == verb && r.url.path() == request_path)
            .collect()
    }
}

/// Schema with shared `name`, `serial_number` and `vendor` fields and a
/// type-specific `os_1` dropdown.
pub fn server_schema() -> Value {
    json!([
        {
            "field_header": "General",
            "fields": [
                {"name": "name", "label": "Name", "asset_type_id": null},
                {"name": "serial_number", "label": "Serial Number", "asset_type_id": null},
                {"name": "vendor", "label": "Vendor", "asset_type_id": null}
            ]
        },
        {
            "field_header": "Hardware",
            "fields": [
                {
                    "name": "os_1",
                    "label": "OS",
                    "asset_type_id": 1,
                    "field_type": "dropdown",
                    "choices": [["Windows Server 2019", 1], ["Linux", 2]]
                }
            ]
        }
    ])
}

/// JSON body of a recorded request.
pub fn body(request: &Request) -> Value {
    serde_json::from_slice(&request.body).unwrap()
}
