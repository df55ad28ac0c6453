#![cfg(test)]

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::MockServer;

use crate::api::{Auth, ClientOptions, InsightClient};

pub(crate) const TEST_TOKEN: &str = "test-token";

/// Options with short retry delays and a generous rate limit.
pub(crate) fn test_options() -> ClientOptions {
    ClientOptions {
        timeout: Duration::from_secs(5),
        rate_limit_tokens: 1000,
        rate_limit_interval: Duration::from_secs(1),
        retry_base_delay: Duration::from_millis(1),
        ..ClientOptions::default()
    }
}

/// A Data Center client pointed at a mock server.
pub(crate) fn mock_client(server: &MockServer) -> InsightClient {
    mock_client_with(server, test_options())
}

pub(crate) fn mock_client_with(server: &MockServer, options: ClientOptions) -> InsightClient {
    InsightClient::with_auth(&server.uri(), Auth::bearer(TEST_TOKEN), options)
        .expect("client should build against mock server")
}

/// An IQL result page with `per_page` objects, numbered by page.
pub(crate) fn object_page(page: u32, page_count: u32, per_page: u32) -> Value {
    let first_id = (page - 1) * per_page + 1;
    let entries: Vec<Value> = (first_id..first_id + per_page)
        .map(|id| {
            json!({
                "id": id,
                "label": format!("host-{}", id),
                "objectKey": format!("ITSM-{}", id),
                "objectType": {"id": 7, "name": "Physical Host"}
            })
        })
        .collect();

    json!({
        "objectEntries": entries,
        "objectTypeAttributes": [{"id": 70, "name": "Name", "label": true}],
        "totalFilterCount": page_count * per_page,
        "pageNumber": page,
        "pageSize": page_count
    })
}
