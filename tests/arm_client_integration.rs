// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for `ArmClient` against a mock resource manager.
//!
//! Run with: cargo test --test arm_client_integration

mod common;

use common::{
    arm_client, error_body, node_pool_body, node_pool_id, operation_status, server_url, TEST_TOKEN,
};
use hcpverify::client::{OperationKind, ResourceClient};
use hcpverify::constants::API_VERSION;
use hcpverify::errors::VerifyError;
use hcpverify::poller::PollConfig;
use hcpverify::provisioning::ProvisioningState;
use hcpverify::submitter::{OperationSubmitter, SubmitRequest};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Mutations
// ============================================================================

#[tokio::test]
async fn test_create_sends_body_and_follows_async_operation_header() {
    let server = MockServer::start().await;
    let id = node_pool_id("np1");
    let body = json!({ "location": "westus3", "properties": { "replicas": 2 } });
    let status_url = server_url(&server, "/operations/op-1");

    Mock::given(method("PUT"))
        .and(path(id.path()))
        .and(query_param("api-version", API_VERSION))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(body_json(&body))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Azure-AsyncOperation", status_url.as_str())
                .set_body_json(node_pool_body("np1", "Accepted")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let handle = arm_client(&server)
        .create_or_update(&id, &body)
        .await
        .unwrap();

    assert_eq!(handle.kind(), OperationKind::Create);
    assert_eq!(handle.status_url().map(ToString::to_string), Some(status_url));
    assert_eq!(handle.initial_state(), Some(&ProvisioningState::Accepted));
}

#[tokio::test]
async fn test_location_header_is_used_without_async_operation() {
    let server = MockServer::start().await;
    let id = node_pool_id("np1");
    let location = server_url(&server, "/locations/op-7");

    Mock::given(method("DELETE"))
        .and(path(id.path()))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", location.as_str()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locations/op-7"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/locations/op-7"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = arm_client(&server);
    let handle = client.delete(&id).await.unwrap();
    assert_eq!(handle.status_url().map(ToString::to_string), Some(location));

    let first = client.operation_status(&handle).await.unwrap();
    assert_eq!(first.status, ProvisioningState::Provisioning);
    let second = client.operation_status(&handle).await.unwrap();
    assert_eq!(second.status, ProvisioningState::Succeeded);
}

#[tokio::test]
async fn test_rejection_carries_service_message_and_correlation_id() {
    let server = MockServer::start().await;
    let id = node_pool_id("np-bad");

    Mock::given(method("PUT"))
        .and(path(id.path()))
        .respond_with(
            ResponseTemplate::new(400)
                .insert_header("x-ms-correlation-request-id", "corr-123")
                .set_body_json(error_body(
                    "InvalidRequestContent",
                    "nodeDrainTimeoutMinutes must not be negative",
                )),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = arm_client(&server)
        .create_or_update(&id, &json!({}))
        .await
        .unwrap_err();

    match &err {
        VerifyError::ImmediateRejection {
            status,
            error,
            correlation_id,
            ..
        } => {
            assert_eq!(*status, 400);
            assert_eq!(error.code, "InvalidRequestContent");
            assert_eq!(correlation_id.as_deref(), Some("corr-123"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(err
        .service_message()
        .unwrap()
        .contains("must not be negative"));
}

#[tokio::test]
async fn test_refused_token_is_a_transport_error_and_not_retried() {
    let server = MockServer::start().await;
    let id = node_pool_id("np-auth");

    Mock::given(method("PUT"))
        .and(path(id.path()))
        .respond_with(ResponseTemplate::new(401).set_body_json(error_body(
            "InvalidAuthenticationToken",
            "The access token is invalid.",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let err = arm_client(&server)
        .create_or_update(&id, &json!({}))
        .await
        .unwrap_err();

    match &err {
        VerifyError::Transport { status, reason, .. } => {
            assert_eq!(*status, Some(401));
            assert!(reason.starts_with("AuthFailed"), "{reason}");
            assert!(reason.contains("InvalidAuthenticationToken"), "{reason}");
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert!(err.service_message().is_none());
}

#[tokio::test]
async fn test_forbidden_read_is_a_transport_error() {
    let server = MockServer::start().await;
    let id = node_pool_id("np-auth");

    Mock::given(method("GET"))
        .and(path(id.path()))
        .respond_with(ResponseTemplate::new(403).set_body_json(error_body(
            "AuthorizationFailed",
            "The client does not have authorization to perform action",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let err = arm_client(&server).get(&id).await.unwrap_err();

    assert_eq!(err.kind(), "transport");
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_delete_of_missing_resource_completes_immediately() {
    let server = MockServer::start().await;
    let id = node_pool_id("gone");

    Mock::given(method("DELETE"))
        .and(path(id.path()))
        .respond_with(ResponseTemplate::new(404).set_body_json(error_body("NotFound", "gone")))
        .mount(&server)
        .await;

    let handle = arm_client(&server).delete(&id).await.unwrap();

    assert!(handle.status_url().is_none());
    assert_eq!(handle.initial_state(), Some(&ProvisioningState::Succeeded));
}

#[tokio::test]
async fn test_wait_on_synchronous_delete_sends_no_reads() {
    let server = MockServer::start().await;
    let id = node_pool_id("gone");

    Mock::given(method("DELETE"))
        .and(path(id.path()))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let submitter = OperationSubmitter::new(Arc::new(arm_client(&server)));
    let config = PollConfig::new(Duration::from_millis(20), Duration::from_secs(10)).unwrap();
    let result = submitter
        .submit_and_wait(SubmitRequest::delete(id), config, &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.attempts, 0);
}

#[tokio::test]
async fn test_transient_errors_are_retried() {
    let server = MockServer::start().await;
    let id = node_pool_id("np1");

    Mock::given(method("PATCH"))
        .and(path(id.path()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(id.path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(node_pool_body("np1", "Updating")))
        .expect(1)
        .mount(&server)
        .await;

    let handle = arm_client(&server)
        .update(&id, &json!({ "properties": { "replicas": 3 } }))
        .await
        .unwrap();

    assert_eq!(handle.initial_state(), Some(&ProvisioningState::Updating));
}

// ============================================================================
// Reads
// ============================================================================

#[tokio::test]
async fn test_get_missing_resource_is_not_found() {
    let server = MockServer::start().await;
    let id = node_pool_id("missing");

    Mock::given(method("GET"))
        .and(path(id.path()))
        .respond_with(ResponseTemplate::new(404).set_body_json(error_body(
            "ResourceNotFound",
            "The Resource was not found",
        )))
        .mount(&server)
        .await;

    let err = arm_client(&server).get(&id).await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");
}

#[tokio::test]
async fn test_list_follows_next_link() {
    let server = MockServer::start().await;
    let collection = node_pool_id("").collection();

    Mock::given(method("GET"))
        .and(path(collection.path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [node_pool_body("np-a", "Succeeded")],
            "nextLink": server_url(&server, "/next-page"),
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next-page"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [node_pool_body("np-b", "Succeeded")],
        })))
        .mount(&server)
        .await;

    let items = arm_client(&server).list(&collection).await.unwrap();

    let names: Vec<&str> = items.iter().filter_map(|v| v["name"].as_str()).collect();
    assert_eq!(names, vec!["np-a", "np-b"]);
}

#[tokio::test]
async fn test_operation_status_document_with_error() {
    let server = MockServer::start().await;
    let id = node_pool_id("np1");
    let status_url = server_url(&server, "/operations/op-9");

    Mock::given(method("PUT"))
        .and(path(id.path()))
        .respond_with(
            ResponseTemplate::new(201).insert_header("Azure-AsyncOperation", status_url.as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "op-9",
            "status": "Failed",
            "startTime": "2025-03-01T10:00:00Z",
            "error": { "code": "InvalidRequestContent", "message": "Cannot delete the last node pool" }
        })))
        .mount(&server)
        .await;

    let client = arm_client(&server);
    let handle = client.create_or_update(&id, &json!({})).await.unwrap();
    let status = client.operation_status(&handle).await.unwrap();

    assert_eq!(status.status, ProvisioningState::Failed);
    assert!(status.start_time.is_some());
    assert_eq!(status.error.unwrap().code, "InvalidRequestContent");
}

// ============================================================================
// Submit and wait
// ============================================================================

#[tokio::test]
async fn test_submit_and_wait_returns_final_resource() {
    let server = MockServer::start().await;
    let id = node_pool_id("np1");
    let status_url = server_url(&server, "/operations/op-2");

    Mock::given(method("PUT"))
        .and(path(id.path()))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Azure-AsyncOperation", status_url.as_str())
                .set_body_json(node_pool_body("np1", "Accepted")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(operation_status("InProgress")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(operation_status("Succeeded")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(id.path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(node_pool_body("np1", "Succeeded")))
        .mount(&server)
        .await;

    let submitter = OperationSubmitter::new(Arc::new(arm_client(&server)));
    let config = PollConfig::new(Duration::from_millis(20), Duration::from_secs(10)).unwrap();
    let result = submitter
        .submit_and_wait(
            SubmitRequest::CreateOrUpdate {
                id: id.clone(),
                body: json!({ "properties": { "replicas": 2 } }),
            },
            config,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.attempts, 2);
    assert_eq!(result.observation.payload["name"], json!("np1"));
}

#[tokio::test]
async fn test_submit_and_wait_times_out_on_stuck_operation() {
    let server = MockServer::start().await;
    let id = node_pool_id("np-stuck");
    let status_url = server_url(&server, "/operations/op-3");

    Mock::given(method("PUT"))
        .and(path(id.path()))
        .respond_with(
            ResponseTemplate::new(201).insert_header("Azure-AsyncOperation", status_url.as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(operation_status("Provisioning")))
        .mount(&server)
        .await;

    let submitter = OperationSubmitter::new(Arc::new(arm_client(&server)));
    let config = PollConfig::new(Duration::from_millis(20), Duration::from_millis(100)).unwrap();
    let err = submitter
        .submit_and_wait(
            SubmitRequest::CreateOrUpdate {
                id,
                body: json!({}),
            },
            config,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        VerifyError::Timeout {
            elapsed,
            last_state,
            ..
        } => {
            assert!(elapsed >= Duration::from_millis(80), "{elapsed:?}");
            assert_eq!(last_state, Some(ProvisioningState::Provisioning));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}
