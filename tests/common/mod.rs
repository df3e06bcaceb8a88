// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use hcpverify::client::ArmClient;
use hcpverify::config::HarnessConfig;
use hcpverify::resource::{ResourceId, Scope};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "t0k3n";

pub fn scope() -> Scope {
    Scope::new("sub-1", "rg-test")
}

pub fn node_pool_id(name: &str) -> ResourceId {
    ResourceId::node_pool(&scope(), "c1", name)
}

/// Client pointed at a mock resource manager.
pub fn arm_client(server: &MockServer) -> ArmClient {
    ArmClient::new(&server.uri(), Some(TEST_TOKEN.to_string()), false)
        .expect("mock server URI is a valid endpoint")
}

/// Absolute URL on the mock server.
pub fn server_url(server: &MockServer, path: &str) -> String {
    format!("{}{path}", server.uri())
}

pub fn error_body(code: &str, message: &str) -> Value {
    json!({ "error": { "code": code, "message": message } })
}

pub fn operation_status(status: &str) -> Value {
    json!({ "id": "op-1", "name": "op-1", "status": status })
}

pub fn node_pool_body(name: &str, state: &str) -> Value {
    json!({
        "id": node_pool_id(name).path(),
        "name": name,
        "location": "westus3",
        "properties": {
            "provisioningState": state,
            "replicas": 2,
            "platform": { "vmSize": "Standard_D8s_v3" }
        }
    })
}

/// Live-service configuration, or `None` when the environment does not
/// describe a reachable service.
pub fn live_config_or_skip() -> Option<HarnessConfig> {
    let config = match HarnessConfig::load(None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("⊘ Skipping live test: configuration error: {e}");
            return None;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("⊘ Skipping live test: {e}");
        return None;
    }
    println!("✓ Live configuration loaded for {}", config.arm_endpoint);
    Some(config)
}
