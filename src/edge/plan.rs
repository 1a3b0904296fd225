//! Deployment plan assembly
//!
//! Builds the complete set of stacks in two phases. The producer phase
//! synthesises the secondary-region stack (when one is needed) and yields
//! plain handles. The consumer phase selects the topology with those
//! handles and builds the primary stack, which depends on the producer.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::info;

use super::binding::synthesize_secondary;
use super::listener::TargetGroupBinding;
use super::resources::Stack;
use super::topology::{Topology, TopologyKind};
use crate::config::EdgeConfig;
use crate::domain::BackendRoute;
use crate::errors::{EdgeplaneError, Result};
use crate::{plan_span, stack_span};

/// Name of the stack holding the load balancer and, if fronted, the CDN
pub const PRIMARY_STACK_NAME: &str = "EdgeStack";

/// Everything the provisioning engine needs for one deployment
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentPlan {
    pub topology: Topology,
    /// Producers before consumers
    pub stacks: Vec<Stack>,
    pub base_url: String,
    pub target_groups: Vec<TargetGroupBinding>,
}

impl DeploymentPlan {
    /// Validate `config` and compile the plan, registering `routes` in the
    /// order given.
    pub fn assemble(config: &EdgeConfig, routes: &[BackendRoute]) -> Result<Self> {
        config.validate()?;

        let kind = TopologyKind::from_config(config);
        let span = plan_span!(kind, services = routes.len());
        let _guard = span.enter();

        let policy = config.access_policy()?;
        let secondary = synthesize_secondary(config, &policy)?;

        let topology = Topology::select(config, secondary.as_ref().map(|s| &s.binding))?;

        let built = {
            let span = stack_span!(PRIMARY_STACK_NAME, config.region);
            let _guard = span.enter();
            topology.build(Stack::new(PRIMARY_STACK_NAME, config.region.as_str()), routes)?
        };

        let mut stacks = Vec::with_capacity(2);
        if let Some(secondary) = secondary {
            stacks.push(secondary.stack);
        }
        stacks.push(built.stack);

        info!(
            topology = %kind,
            stacks = stacks.len(),
            services = built.target_groups.len(),
            base_url = %built.base_url,
            "assembled deployment plan"
        );

        Ok(Self {
            topology,
            stacks,
            base_url: built.base_url,
            target_groups: built.target_groups,
        })
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    pub fn primary(&self) -> Option<&Stack> {
        self.stack(PRIMARY_STACK_NAME)
    }

    /// Stacks in an order where each one follows everything it depends on
    pub fn deployment_order(&self) -> Result<Vec<&Stack>> {
        let names: BTreeSet<&str> = self.stacks.iter().map(|s| s.name.as_str()).collect();
        for stack in &self.stacks {
            if let Some(missing) = stack.depends_on.iter().find(|d| !names.contains(d.as_str())) {
                return Err(EdgeplaneError::cross_region(format!(
                    "stack '{}' depends on '{}', which is not part of the plan",
                    stack.name, missing
                )));
            }
        }

        let mut done: Vec<&str> = Vec::with_capacity(self.stacks.len());
        let mut order = Vec::with_capacity(self.stacks.len());
        while order.len() < self.stacks.len() {
            let next = self.stacks.iter().find(|s| {
                !done.contains(&s.name.as_str())
                    && s.depends_on.iter().all(|d| done.contains(&d.as_str()))
            });
            match next {
                Some(stack) => {
                    done.push(&stack.name);
                    order.push(stack);
                }
                None => {
                    return Err(EdgeplaneError::cross_region(
                        "stack dependencies form a cycle",
                    ))
                }
            }
        }
        Ok(order)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| EdgeplaneError::from(e).with_context("rendering deployment plan"))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| EdgeplaneError::from(e).with_context("rendering deployment plan"))
    }
}

/// Refuse to start `stack` before every stack it depends on has completed.
///
/// A producer that failed or never ran leaves its consumer blocked; nothing
/// of the consumer may be created in that case.
pub fn ready_to_deploy(stack: &Stack, completed: &[&str]) -> Result<()> {
    let pending: Vec<&str> = stack
        .depends_on
        .iter()
        .map(String::as_str)
        .filter(|d| !completed.contains(d))
        .collect();
    if pending.is_empty() {
        return Ok(());
    }
    Err(EdgeplaneError::cross_region(format!(
        "stack '{}' is blocked until {} completes",
        stack.name,
        pending.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::binding::SECONDARY_STACK_NAME;
    use crate::edge::services::default_backend_routes;

    #[test]
    fn fronted_without_extras_is_a_single_stack() {
        let plan = DeploymentPlan::assemble(&EdgeConfig::default(), &default_backend_routes().unwrap()).unwrap();
        assert_eq!(plan.stacks.len(), 1);
        assert_eq!(plan.stacks[0].name, PRIMARY_STACK_NAME);
        assert_eq!(plan.topology.kind(), TopologyKind::Fronted);
    }

    #[test]
    fn secondary_stack_precedes_primary() {
        let mut config = EdgeConfig::default();
        config.domain.domain_name = Some("example.com".into());
        config.access.allowed_country_codes = Some(vec!["JP".into()]);

        let plan = DeploymentPlan::assemble(&config, &default_backend_routes().unwrap()).unwrap();
        let order: Vec<&str> = plan.deployment_order().unwrap().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(order, vec![SECONDARY_STACK_NAME, PRIMARY_STACK_NAME]);

        let primary = plan.primary().unwrap();
        assert!(ready_to_deploy(primary, &[]).is_err());
        assert!(ready_to_deploy(primary, &[SECONDARY_STACK_NAME]).is_ok());
    }

    #[test]
    fn missing_producer_is_reported() {
        let mut plan = DeploymentPlan::assemble(&EdgeConfig::default(), &default_backend_routes().unwrap()).unwrap();
        plan.stacks[0].depend_on("Elsewhere");
        let err = plan.deployment_order().unwrap_err();
        assert!(matches!(err, EdgeplaneError::CrossRegion { .. }));
    }

    #[test]
    fn cycle_is_reported() {
        let mut a = Stack::new("A", "us-west-2");
        let mut b = Stack::new("B", "us-east-1");
        a.depend_on("B");
        b.depend_on("A");
        let mut plan = DeploymentPlan::assemble(&EdgeConfig::default(), &default_backend_routes().unwrap()).unwrap();
        plan.stacks = vec![a, b];
        assert!(plan.deployment_order().is_err());
    }

    #[test]
    fn conflicting_config_builds_nothing() {
        let mut config = EdgeConfig::default();
        config.network.vpc_isolated = Some(true);
        let err = DeploymentPlan::assemble(&config, &default_backend_routes().unwrap()).unwrap_err();
        assert!(matches!(err, EdgeplaneError::Conflict { .. }));
    }

    #[test]
    fn renders_json_and_yaml() {
        let plan = DeploymentPlan::assemble(&EdgeConfig::default(), &default_backend_routes().unwrap()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&plan.to_json().unwrap()).unwrap();
        assert_eq!(json["topology"]["kind"], "fronted");
        assert_eq!(json["stacks"][0]["outputs"]["BaseUrl"], plan.base_url);
        assert!(plan.to_yaml().unwrap().contains("EdgeStack"));
    }
}
