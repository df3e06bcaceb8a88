// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Built-in scenarios.
//!
//! Node pool scenarios run against the pre-provisioned cluster named by
//! `targetCluster` in the configuration; creating a cluster per scenario is
//! left to the environment that provisions it. Every node pool they create is
//! registered for cleanup, including pools a negative scenario expected the
//! service to refuse.
//!
//! | name                           | expects                                   |
//! |--------------------------------|-------------------------------------------|
//! | `nodepool-drain-timeout-negative` | failure matching `out-of-range`        |
//! | `nodepool-drain-timeout-too-large` | failure matching `out-of-range`       |
//! | `nodepool-immutable-recreate`  | each immutable field change fails `duplicate-or-immutable` |
//! | `nodepool-autoscaling-update`  | `replicas` unset, `autoScaling` as sent   |
//! | `nodepool-delete-last`         | failure matching `last-node-pool`         |
//! | `nodepool-lifecycle`           | create, read back, delete                 |
//! | `cluster-naming-restriction`   | failure matching `naming-restriction`     |
//! | `externalauth-invalid-tenant`  | failure matching `invalid-tenant`         |
//! | `externalauth-invalid-audience` | failure matching `invalid-audience`      |
//!
//! External auth scenarios also attach to `targetCluster`. The invalid
//! tenant case needs `entraClientId` as its valid audience and the invalid
//! audience case needs `tenantId` for a valid issuer.

use crate::constants::{MAX_EXTERNAL_AUTH_NAME_LEN, MAX_NODE_POOL_NAME_LEN};
use crate::context::ScenarioContext;
use crate::errors::{Result, VerifyError};
use crate::harness::Scenario;
use crate::models::NodePoolAutoScaling;
use crate::params::{ClusterParams, ExternalAuthParams, NodePoolParams};
use crate::patterns::{
    ErrorPattern, DUPLICATE_OR_IMMUTABLE, INVALID_AUDIENCE, INVALID_TENANT, LAST_NODE_POOL,
    NAMING_RESTRICTION, OUT_OF_RANGE,
};
use crate::poller::PollConfig;
use crate::resource::ResourceId;
use crate::verifier::{
    compare_operation_result, verify_poll_result, Expectation, FieldAssertion,
    VerificationOutcome,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Largest node drain timeout the service accepts, in minutes (one week).
pub const MAX_NODE_DRAIN_TIMEOUT_MINUTES: i32 = 7 * 24 * 60;

/// VM size swapped in when re-submitting an existing node pool.
pub const REPLACEMENT_VM_SIZE: &str = "Standard_D16s_v3";

/// Node pool fields the service must refuse to change after creation, as
/// dotted paths under `properties.platform` with their replacement values.
#[must_use]
pub fn immutable_node_pool_changes() -> Vec<(&'static str, Value)> {
    vec![
        ("vmSize", json!(REPLACEMENT_VM_SIZE)),
        ("availabilityZone", json!("2")),
        ("osDisk.sizeGiB", json!(256)),
        ("osDisk.diskStorageAccountType", json!("Premium_LRS")),
    ]
}

/// Every built-in scenario, in the order `run` executes them by default.
#[must_use]
pub fn builtin_scenarios() -> Vec<Arc<dyn Scenario>> {
    vec![
        Arc::new(NodePoolDrainTimeout {
            name: "nodepool-drain-timeout-negative",
            minutes: -1,
        }),
        Arc::new(NodePoolDrainTimeout {
            name: "nodepool-drain-timeout-too-large",
            minutes: MAX_NODE_DRAIN_TIMEOUT_MINUTES + 1,
        }),
        Arc::new(NodePoolImmutableRecreate),
        Arc::new(NodePoolAutoscalingUpdate { min: 1, max: 3 }),
        Arc::new(NodePoolDeleteLast),
        Arc::new(NodePoolLifecycle),
        Arc::new(ClusterNamingRestriction),
        Arc::new(ExternalAuthInvalidTenant),
        Arc::new(ExternalAuthInvalidAudience),
    ]
}

/// Look up a built-in scenario by name.
#[must_use]
pub fn find_scenario(name: &str) -> Option<Arc<dyn Scenario>> {
    builtin_scenarios().into_iter().find(|s| s.name() == name)
}

/// Resolve `names` to scenarios, or every built-in scenario when empty.
///
/// # Errors
///
/// Returns [`VerifyError::Config`] naming the first unknown scenario.
pub fn select_scenarios(names: &[String]) -> Result<Vec<Arc<dyn Scenario>>> {
    if names.is_empty() {
        return Ok(builtin_scenarios());
    }
    names
        .iter()
        .map(|name| {
            find_scenario(name).ok_or_else(|| VerifyError::Config {
                reason: format!("unknown scenario '{name}'"),
            })
        })
        .collect()
}

fn to_body<T: Serialize>(id: &ResourceId, model: &T) -> Result<Value> {
    serde_json::to_value(model).map_err(|e| VerifyError::Decode {
        what: format!("request body for {id}"),
        reason: e.to_string(),
    })
}

fn node_pool_timeout(ctx: &ScenarioContext) -> Result<PollConfig> {
    ctx.poll_config(ctx.config().timeouts.node_pool_secs)
}

/// A fresh node pool id in the target cluster plus its default parameters.
fn new_node_pool(ctx: &ScenarioContext, base: &str) -> Result<(ResourceId, NodePoolParams)> {
    let (scope, cluster) = ctx.target_cluster()?;
    let name = ctx.name(base, MAX_NODE_POOL_NAME_LEN);
    let id = ResourceId::node_pool(&scope, cluster.clone(), name.clone());
    Ok((id, NodePoolParams::default_params().named(cluster, name)))
}

/// Create `params` as `id` and require it to succeed.
async fn create_node_pool(
    ctx: &ScenarioContext,
    id: &ResourceId,
    params: &NodePoolParams,
) -> Result<Value> {
    let body = to_body(id, &params.build(ctx.location()))?;
    let result = ctx.create(id, &body, node_pool_timeout(ctx)?).await?;
    Ok(result.into_success("create", &id.to_string())?.payload)
}

/// Node pool with a drain timeout outside the accepted range.
pub struct NodePoolDrainTimeout {
    name: &'static str,
    minutes: i32,
}

#[async_trait]
impl Scenario for NodePoolDrainTimeout {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "node pool with an out-of-range node drain timeout is refused"
    }

    fn labels(&self) -> &[&'static str] {
        &["negative", "nodepool"]
    }

    async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
        let (id, mut params) = new_node_pool(ctx, "np-drain")?;
        params.node_drain_timeout_minutes = Some(self.minutes);
        let body = to_body(&id, &params.build(ctx.location()))?;

        let result = ctx
            .step("create node pool", async {
                Ok::<_, VerifyError>(ctx.create(&id, &body, node_pool_timeout(ctx)?).await)
            })
            .await?;
        Ok(verify_poll_result(&result, &Expectation::failure(&OUT_OF_RANGE)))
    }
}

/// Re-submit an existing node pool with an immutable field changed.
pub struct NodePoolImmutableRecreate;

#[async_trait]
impl Scenario for NodePoolImmutableRecreate {
    fn name(&self) -> &str {
        "nodepool-immutable-recreate"
    }

    fn description(&self) -> &str {
        "changing any immutable platform field of an existing node pool is refused"
    }

    fn labels(&self) -> &[&'static str] {
        &["negative", "nodepool"]
    }

    async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
        let (id, params) = new_node_pool(ctx, "np-immut")?;
        ctx.step("create node pool", create_node_pool(ctx, &id, &params))
            .await?;

        let mut current = ctx.step("read node pool", ctx.get(&id)).await?;
        if let Some(properties) = current["properties"].as_object_mut() {
            properties.remove("provisioningState");
        }

        let mut refused = Vec::new();
        let mut observed_state = None;
        for (field, value) in immutable_node_pool_changes() {
            let mut body = current.clone();
            let target = field
                .split('.')
                .fold(&mut body["properties"]["platform"], |node, key| &mut node[key]);
            *target = value;

            let step = format!("re-create with new {field}");
            let result = ctx
                .step(&step, async {
                    Ok::<_, VerifyError>(ctx.create(&id, &body, node_pool_timeout(ctx)?).await)
                })
                .await?;
            let outcome = verify_poll_result(&result, &Expectation::failure(&DUPLICATE_OR_IMMUTABLE));
            if !outcome.success {
                return Ok(VerificationOutcome::fail(
                    format!("{field}: {}", outcome.message),
                    outcome.observed_state,
                ));
            }
            refused.push(format!("{field}: {}", outcome.message));
            observed_state = outcome.observed_state;
        }
        Ok(VerificationOutcome::pass(refused.join("; "), observed_state))
    }
}

/// Switch a fixed-size node pool to autoscaling with a PATCH.
pub struct NodePoolAutoscalingUpdate {
    min: i32,
    max: i32,
}

#[async_trait]
impl Scenario for NodePoolAutoscalingUpdate {
    fn name(&self) -> &str {
        "nodepool-autoscaling-update"
    }

    fn description(&self) -> &str {
        "a fixed-replica node pool patched to autoscaling drops its replica count"
    }

    fn labels(&self) -> &[&'static str] {
        &["positive", "nodepool"]
    }

    async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
        let (id, mut params) = new_node_pool(ctx, "np-scale")?;
        params.replicas = Some(1);
        ctx.step("create node pool", create_node_pool(ctx, &id, &params))
            .await?;

        let auto_scaling = NodePoolAutoScaling {
            min: self.min,
            max: self.max,
        };
        let patch = json!({
            "properties": {
                "replicas": null,
                "autoScaling": auto_scaling,
            }
        });
        let result = ctx
            .step("enable autoscaling", async {
                Ok::<_, VerifyError>(ctx.update(&id, patch, node_pool_timeout(ctx)?).await)
            })
            .await?;

        Ok(verify_poll_result(
            &result,
            &Expectation::Fields(vec![
                FieldAssertion::unset("/properties/replicas"),
                FieldAssertion::equals("/properties/autoScaling/min", self.min),
                FieldAssertion::equals("/properties/autoScaling/max", self.max),
            ]),
        ))
    }
}

/// Delete the only node pool of the target cluster.
pub struct NodePoolDeleteLast;

#[async_trait]
impl Scenario for NodePoolDeleteLast {
    fn name(&self) -> &str {
        "nodepool-delete-last"
    }

    fn description(&self) -> &str {
        "deleting the last node pool of a cluster is refused"
    }

    fn labels(&self) -> &[&'static str] {
        &["negative", "nodepool"]
    }

    async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
        let (scope, cluster) = ctx.target_cluster()?;
        let collection = ResourceId::node_pool(&scope, cluster.clone(), "");

        let pools = ctx
            .step("list node pools", ctx.client().list(&collection))
            .await
            .map_err(|e| VerifyError::setup("list node pools", e))?;
        let names: Vec<&str> = pools
            .iter()
            .filter_map(|pool| pool.get("name").and_then(Value::as_str))
            .collect();
        let [only] = names.as_slice() else {
            return Err(VerifyError::setup(
                "list node pools",
                format!(
                    "cluster {cluster} must have exactly one node pool, found {}",
                    names.len()
                ),
            ));
        };
        info!(scenario = ctx.scenario(), node_pool = only, "Deleting last node pool");

        let id = ResourceId::node_pool(&scope, cluster, *only);
        let result = ctx
            .step("delete last node pool", async {
                let timeout = ctx.poll_config(ctx.config().timeouts.delete_secs)?;
                Ok::<_, VerifyError>(ctx.delete(&id, timeout).await)
            })
            .await?;
        Ok(verify_poll_result(&result, &Expectation::failure(&LAST_NODE_POOL)))
    }
}

/// Create, read back and delete a node pool.
pub struct NodePoolLifecycle;

#[async_trait]
impl Scenario for NodePoolLifecycle {
    fn name(&self) -> &str {
        "nodepool-lifecycle"
    }

    fn description(&self) -> &str {
        "a default node pool is created as requested and deleted"
    }

    fn labels(&self) -> &[&'static str] {
        &["positive", "nodepool"]
    }

    async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
        let (id, params) = new_node_pool(ctx, "np-life")?;
        let body = to_body(&id, &params.build(ctx.location()))?;

        let created = ctx
            .step("create node pool", async {
                Ok::<_, VerifyError>(ctx.create(&id, &body, node_pool_timeout(ctx)?).await)
            })
            .await?;
        let expectation = Expectation::Fields(vec![
            FieldAssertion::equals("/properties/platform/vmSize", params.vm_size.as_str()),
            FieldAssertion::equals("/properties/replicas", params.replicas),
            FieldAssertion::equals("/properties/autoRepair", params.auto_repair),
            FieldAssertion::equals("/properties/version/channelGroup", params.channel_group.as_str()),
        ]);
        let outcome = verify_poll_result(&created, &expectation);
        if !outcome.success {
            return Ok(outcome);
        }
        let operation_result = created?.observation.payload;

        let fetched = ctx.step("read node pool", ctx.get(&id)).await?;
        let consistency = compare_operation_result(&fetched, &operation_result);
        if !consistency.success {
            return Ok(consistency);
        }

        let deleted = ctx
            .step("delete node pool", async {
                let timeout = ctx.poll_config(ctx.config().timeouts.delete_secs)?;
                Ok::<_, VerifyError>(ctx.delete(&id, timeout).await)
            })
            .await?;
        let outcome = verify_poll_result(&deleted, &Expectation::succeeded());
        if !outcome.success {
            return Ok(outcome);
        }

        match ctx.get(&id).await {
            Err(e) if e.is_not_found() => Ok(VerificationOutcome::pass(
                format!("node pool {} created, read back and deleted", id.name),
                outcome.observed_state,
            )),
            Err(e) => Err(e),
            Ok(_) => Ok(VerificationOutcome::fail(
                format!("node pool {} still readable after delete", id.name),
                outcome.observed_state,
            )),
        }
    }
}

/// Cluster whose name starts with a hyphen.
pub struct ClusterNamingRestriction;

/// Invalid because cluster names must start with a letter.
pub const INVALID_CLUSTER_NAME: &str = "-invalid-name";

#[async_trait]
impl Scenario for ClusterNamingRestriction {
    fn name(&self) -> &str {
        "cluster-naming-restriction"
    }

    fn description(&self) -> &str {
        "a cluster name violating the naming rules is refused"
    }

    fn labels(&self) -> &[&'static str] {
        &["negative", "cluster"]
    }

    async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
        ctx.step("create resource group", ctx.create_resource_group())
            .await?;

        let id = ResourceId::cluster(ctx.scope(), INVALID_CLUSTER_NAME);
        let params = ClusterParams {
            cluster_name: INVALID_CLUSTER_NAME.to_string(),
            ..ClusterParams::default_params()
        };
        let body = to_body(&id, &params.build(ctx.location()))?;

        let result = ctx
            .step("create cluster", async {
                let timeout = ctx.poll_config(ctx.config().timeouts.cluster_secs)?;
                Ok::<_, VerifyError>(ctx.create(&id, &body, timeout).await)
            })
            .await?;
        Ok(verify_poll_result(
            &result,
            &Expectation::failure(&NAMING_RESTRICTION),
        ))
    }
}

/// Well-formed tenant id that no directory uses.
pub const INVALID_TENANT_ID: &str = "11111111-2222-3333-4444-555555555555";

/// Well-formed client id that no application is registered under.
pub const INVALID_CLIENT_ID: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

/// External auth whose issuer names a tenant that does not exist.
pub struct ExternalAuthInvalidTenant;

#[async_trait]
impl Scenario for ExternalAuthInvalidTenant {
    fn name(&self) -> &str {
        "externalauth-invalid-tenant"
    }

    fn description(&self) -> &str {
        "an external auth issuer in an unknown Entra tenant is refused"
    }

    fn labels(&self) -> &[&'static str] {
        &["negative", "externalauth"]
    }

    async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
        let client_id = required(ctx.config().entra_client_id.as_deref(), "entraClientId")?;
        let params = ExternalAuthParams::entra(INVALID_TENANT_ID, client_id);
        create_invalid_external_auth(ctx, "ea-tenant", &params, &INVALID_TENANT).await
    }
}

/// External auth whose audience and client are not registered.
pub struct ExternalAuthInvalidAudience;

#[async_trait]
impl Scenario for ExternalAuthInvalidAudience {
    fn name(&self) -> &str {
        "externalauth-invalid-audience"
    }

    fn description(&self) -> &str {
        "an external auth audience not registered in the tenant is refused"
    }

    fn labels(&self) -> &[&'static str] {
        &["negative", "externalauth"]
    }

    async fn run(&self, ctx: &ScenarioContext) -> Result<VerificationOutcome> {
        let tenant_id = required(ctx.config().tenant_id.as_deref(), "tenantId")?;
        let params = ExternalAuthParams::entra(tenant_id, INVALID_CLIENT_ID);
        create_invalid_external_auth(ctx, "ea-audience", &params, &INVALID_AUDIENCE).await
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        VerifyError::setup("read configuration", format!("{field} must be set for this scenario"))
    })
}

/// Create an external auth on the target cluster and expect `pattern`.
async fn create_invalid_external_auth(
    ctx: &ScenarioContext,
    base: &str,
    params: &ExternalAuthParams,
    pattern: &ErrorPattern,
) -> Result<VerificationOutcome> {
    let (scope, cluster) = ctx.target_cluster()?;
    let id = ResourceId::external_auth(&scope, cluster, ctx.name(base, MAX_EXTERNAL_AUTH_NAME_LEN));
    let body = to_body(&id, &params.build())?;

    let result = ctx
        .step("create external auth", async {
            // Shares the node pool budget; both are cluster children.
            Ok::<_, VerifyError>(ctx.create(&id, &body, node_pool_timeout(ctx)?).await)
        })
        .await?;
    Ok(verify_poll_result(&result, &Expectation::failure(pattern)))
}

#[cfg(test)]
#[path = "scenarios_tests.rs"]
mod scenarios_tests;
