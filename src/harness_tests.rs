// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `harness.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::fake_client::FakeClient;
    use crate::resource::ResourceId;
    use crate::verifier::{verify_poll_result, Expectation};
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn config() -> HarnessConfig {
        HarnessConfig {
            subscription_id: "sub-1".to_string(),
            ..HarnessConfig::default()
        }
    }

    fn harness(fake: &Arc<FakeClient>, config: HarnessConfig) -> ScenarioHarness {
        ScenarioHarness::new(fake.clone(), Arc::new(config))
    }

    /// Creates a resource group and a node pool, then verifies `expectation`.
    struct CreateTwo {
        name: &'static str,
        expectation: Expectation,
    }

    #[async_trait]
    impl Scenario for CreateTwo {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "creates a resource group and a node pool"
        }

        async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
            ctx.step("create resource group", ctx.create_resource_group())
                .await?;
            let id = ResourceId::node_pool(ctx.scope(), "c1", ctx.name("np", 15));
            let result = ctx
                .create(&id, &json!({ "properties": { "replicas": 2 } }), ctx.poll_config(600)?)
                .await;
            Ok(verify_poll_result(&result, &self.expectation))
        }
    }

    struct FailsSetup;

    #[async_trait]
    impl Scenario for FailsSetup {
        fn name(&self) -> &str {
            "fails-setup"
        }

        fn description(&self) -> &str {
            "fails before creating anything"
        }

        async fn run(&self, _ctx: &ScenarioContext) -> Result<VerificationOutcome> {
            Err(VerifyError::setup("prepare", "missing prerequisite"))
        }
    }

    /// Blocks until its token is canceled.
    struct Hangs {
        saw_cancel: Arc<AtomicBool>,
    }

    #[async_trait]
    impl Scenario for Hangs {
        fn name(&self) -> &str {
            "hangs"
        }

        fn description(&self) -> &str {
            "waits forever"
        }

        async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
            ctx.cancel_token().cancelled().await;
            self.saw_cancel.store(true, Ordering::SeqCst);
            Err(VerifyError::Canceled {
                operation: "wait".to_string(),
                resource: ctx.scope().resource_group.clone(),
            })
        }
    }

    fn deletes(fake: &FakeClient) -> usize {
        fake.calls().iter().filter(|c| c.starts_with("delete ")).count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_passing_scenario_cleans_up_in_reverse_order() {
        let fake = Arc::new(FakeClient::new());
        let scenario = CreateTwo {
            name: "create-two",
            expectation: Expectation::succeeded(),
        };

        let report = harness(&fake, config()).run(&scenario).await;

        assert!(report.passed, "{}", report.message);
        assert!(report.cleanup_clean());
        assert_eq!(report.steps.len(), 1);
        let deleted: Vec<String> = fake
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("delete "))
            .collect();
        assert_eq!(deleted.len(), 2);
        assert!(deleted[0].contains("/nodePools/"));
        assert!(deleted[1].ends_with(&report.resource_group));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_verification_still_cleans_up() {
        let fake = Arc::new(FakeClient::new());
        let scenario = CreateTwo {
            name: "create-two-wrong",
            expectation: Expectation::State(ProvisioningState::Failed),
        };

        let report = harness(&fake, config()).run(&scenario).await;

        assert!(!report.passed);
        assert_eq!(report.error_kind, None);
        assert_eq!(report.observed_state, Some(ProvisioningState::Succeeded));
        assert_eq!(deletes(&fake), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_failure_does_not_flip_pass() {
        let fake = Arc::new(FakeClient::new());

        let report = harness(&fake, config())
            .run(&BrokenCleanup { fake: fake.clone() })
            .await;

        assert!(report.passed, "{}", report.message);
        assert_eq!(report.cleanup_failures.len(), 1);
        assert!(report.cleanup_failures[0].error.contains("ServiceUnavailable"));
    }

    /// Creates a node pool whose deletion always fails.
    struct BrokenCleanup {
        fake: Arc<FakeClient>,
    }

    #[async_trait]
    impl Scenario for BrokenCleanup {
        fn name(&self) -> &str {
            "broken-cleanup"
        }

        fn description(&self) -> &str {
            "leaves a resource that cannot be deleted"
        }

        async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
            let id = ResourceId::node_pool(ctx.scope(), "c1", "np-stuck");
            self.fake.break_deletes(&id);
            let result = ctx
                .create(&id, &json!({ "properties": {} }), ctx.poll_config(600)?)
                .await;
            Ok(verify_poll_result(&result, &Expectation::succeeded()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_failure_attempts_no_cleanup() {
        let fake = Arc::new(FakeClient::new());

        let report = harness(&fake, config()).run(&FailsSetup).await;

        assert!(!report.passed);
        assert_eq!(report.error_kind.as_deref(), Some("setup"));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_cleanup_leaves_resources() {
        let fake = Arc::new(FakeClient::new());
        let scenario = CreateTwo {
            name: "keep-resources",
            expectation: Expectation::succeeded(),
        };
        let config = HarnessConfig {
            skip_cleanup: true,
            ..config()
        };

        let report = harness(&fake, config).run(&scenario).await;

        assert!(report.passed);
        assert!(report.cleanup_skipped);
        assert!(!report.cleanup_clean());
        assert_eq!(deletes(&fake), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_scenario() {
        let fake = Arc::new(FakeClient::new());
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let mut config = config();
        config.timeouts.scenario_deadline_secs = 30;

        let report = harness(&fake, config)
            .run(&Hangs {
                saw_cancel: saw_cancel.clone(),
            })
            .await;

        assert!(saw_cancel.load(Ordering::SeqCst));
        assert!(!report.passed);
        assert_eq!(report.error_kind.as_deref(), Some("canceled"));
        assert_eq!(report.duration, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_scenario() {
        let fake = Arc::new(FakeClient::new());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let report = harness(&fake, config())
            .with_shutdown(shutdown)
            .run(&Hangs {
                saw_cancel: Arc::new(AtomicBool::new(false)),
            })
            .await;

        assert_eq!(report.error_kind.as_deref(), Some("canceled"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_all_reports_in_input_order() {
        let fake = Arc::new(FakeClient::new());
        let scenarios: Vec<Arc<dyn Scenario>> = vec![
            Arc::new(CreateTwo {
                name: "first",
                expectation: Expectation::succeeded(),
            }),
            Arc::new(FailsSetup),
            Arc::new(CreateTwo {
                name: "third",
                expectation: Expectation::succeeded(),
            }),
        ];
        let config = HarnessConfig {
            parallelism: 2,
            ..config()
        };

        let reports = harness(&fake, config).run_all(&scenarios).await;

        let names: Vec<&str> = reports.iter().map(|r| r.scenario.as_str()).collect();
        assert_eq!(names, vec!["first", "fails-setup", "third"]);
        assert!(reports[0].passed);
        assert!(!reports[1].passed);
        assert!(reports[2].passed);
        assert_ne!(reports[0].resource_group, reports[2].resource_group);
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_serializes() {
        let fake = Arc::new(FakeClient::new());
        let report = harness(&fake, config()).run(&FailsSetup).await;
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["scenario"], json!("fails-setup"));
        assert_eq!(value["errorKind"], json!("setup"));
        assert_eq!(value["cleanupFailures"], json!([]));
    }
}
