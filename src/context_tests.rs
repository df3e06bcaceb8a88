// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `context.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::client::OperationKind;
    use crate::config::TargetCluster;
    use crate::fake_client::FakeClient;
    use chrono::TimeZone;
    use serde_json::json;

    fn config() -> Arc<HarnessConfig> {
        Arc::new(HarnessConfig {
            subscription_id: "sub-1".to_string(),
            location: "eastus".to_string(),
            target_cluster: Some(TargetCluster {
                resource_group: "rg-shared".to_string(),
                cluster_name: "shared".to_string(),
            }),
            ..HarnessConfig::default()
        })
    }

    fn context(fake: &Arc<FakeClient>) -> ScenarioContext {
        ScenarioContext::new("ctx-test", fake.clone(), config(), CancellationToken::new())
    }

    fn poll() -> PollConfig {
        PollConfig::new(Duration::from_secs(10), Duration::from_secs(600)).unwrap()
    }

    #[test]
    fn test_resource_group_name_is_unique_and_bounded() {
        let fake = Arc::new(FakeClient::new());
        let a = context(&fake);
        let b = context(&fake);

        assert!(a.scope().resource_group.starts_with("hcp-e2e-ctx-test-"));
        assert!(a.scope().resource_group.len() <= MAX_RESOURCE_GROUP_NAME_LEN);
        assert_eq!(a.scope().subscription_id, "sub-1");
        assert_ne!(a.scope().resource_group, b.scope().resource_group);
    }

    #[test]
    fn test_name_uses_run_id() {
        let fake = Arc::new(FakeClient::new());
        let ctx = context(&fake);
        assert_eq!(ctx.name("np", 64), format!("np-{}", ctx.run_id()));
    }

    #[test]
    fn test_target_cluster() {
        let fake = Arc::new(FakeClient::new());
        let (scope, cluster) = context(&fake).target_cluster().unwrap();
        assert_eq!(scope.resource_group, "rg-shared");
        assert_eq!(cluster, "shared");

        let bare = ScenarioContext::new(
            "bare",
            fake.clone(),
            Arc::new(HarnessConfig::default()),
            CancellationToken::new(),
        );
        assert_eq!(bare.target_cluster().unwrap_err().kind(), "setup");
    }

    #[test]
    fn test_resource_group_tags() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let tags = resource_group_tags(now, 4 * 60 * 60).unwrap();
        assert_eq!(tags["deleteAfter"], "2025-03-01T14:00:00Z");
        assert_eq!(tags["createdBy"], "hcpverify");
    }

    #[test]
    fn test_resource_group_tags_out_of_range_expiry() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let err = resource_group_tags(now, i64::MAX / 2).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_resource_group_with_out_of_range_expiry_sends_nothing() {
        let fake = Arc::new(FakeClient::new());
        let config = HarnessConfig {
            resource_group_expiry_secs: i64::MAX / 2,
            ..(*config()).clone()
        };
        let ctx = ScenarioContext::new(
            "expiry",
            fake.clone(),
            Arc::new(config),
            CancellationToken::new(),
        );

        let err = ctx.create_resource_group().await.unwrap_err();

        assert_eq!(err.kind(), "config");
        assert!(fake.calls().is_empty());
        assert!(ctx.take_cleanup().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_resource_group_registers_cleanup() {
        let fake = Arc::new(FakeClient::new());
        let ctx = context(&fake);

        ctx.create_resource_group().await.unwrap();

        let id = ResourceId::resource_group(ctx.scope());
        let stored = fake.resource(&id).unwrap();
        assert_eq!(stored["location"], json!("eastus"));
        assert!(stored["tags"]["deleteAfter"].is_string());
        assert_eq!(ctx.take_cleanup().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_resource_group_is_setup_error() {
        let fake = Arc::new(FakeClient::new());
        let ctx = context(&fake);
        let id = ResourceId::resource_group(ctx.scope());
        fake.reject(OperationKind::Create, &id, "QuotaExceeded", "too many resource groups");

        let err = ctx.create_resource_group().await.unwrap_err();
        assert_eq!(err.kind(), "setup");
        assert!(ctx.take_cleanup().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_create_registers_nothing() {
        let fake = Arc::new(FakeClient::new());
        let ctx = context(&fake);
        let id = ResourceId::node_pool(ctx.scope(), "c1", "np1");
        fake.reject(OperationKind::Create, &id, "InvalidRequestContent", "bad");

        assert!(ctx.create(&id, &json!({}), poll()).await.is_err());
        assert!(ctx.take_cleanup().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_is_reverse_order_and_dropped_after_delete() {
        let fake = Arc::new(FakeClient::new());
        let ctx = context(&fake);
        let first = ResourceId::node_pool(ctx.scope(), "c1", "np1");
        let second = ResourceId::node_pool(ctx.scope(), "c1", "np2");
        let third = ResourceId::node_pool(ctx.scope(), "c1", "np3");
        let body = json!({ "properties": {} });

        for id in [&first, &second, &third] {
            ctx.create(id, &body, poll()).await.unwrap();
        }
        ctx.delete(&second, poll()).await.unwrap();

        let order: Vec<String> = ctx.take_cleanup().into_iter().map(|e| e.id.name).collect();
        assert_eq!(order, vec!["np3".to_string(), "np1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_records_timing() {
        let fake = Arc::new(FakeClient::new());
        let ctx = context(&fake);

        let value = ctx
            .step("wait a bit", async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Ok(7)
            })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let failed: Result<()> = ctx
            .step("fail", async { Err(VerifyError::setup("fail", "boom")) })
            .await;
        assert!(failed.is_err());

        let steps = ctx.steps();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].name, "wait a bit");
        assert_eq!(steps[0].duration, Duration::from_secs(3));
        assert!(steps[0].success);
        assert!(!steps[1].success);
    }
}
