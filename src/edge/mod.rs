//! # Edge Compiler
//!
//! Compiles backend routes and an access policy into the resource graph of
//! a deployment's network edge.
//!
//! ## Module Organization
//!
//! - `batch`: Splits path patterns into condition-sized groups
//! - `priority`: Per-listener rule priority counter
//! - `listener`: Target groups and listener rules for registered services
//! - `waf`: Access policy to firewall rule compilation
//! - `topology`: Direct and CDN-fronted edge shapes
//! - `binding`: Secondary-region certificate and firewall stack
//! - `resources`: Declarative resource descriptions
//! - `plan`: Two-phase plan assembly and deployment ordering
//! - `services`: Default backend registrations

pub mod batch;
pub mod binding;
pub mod listener;
pub mod plan;
pub mod priority;
pub mod resources;
pub mod services;
pub mod topology;
pub mod waf;

pub use batch::{batch, batch_count, MAX_CONDITION_VALUES};
pub use binding::{
    requires_secondary, synthesize_secondary, CertificateBinding, SecondaryStack,
    CDN_CONTROL_REGION, SECONDARY_STACK_NAME,
};
pub use listener::{ListenerRulePlanner, RuleBatch, TargetGroupBinding, MAX_RULES_PER_LISTENER};
pub use plan::{ready_to_deploy, DeploymentPlan, PRIMARY_STACK_NAME};
pub use priority::{Priority, PriorityAllocator, MAX_RULE_PRIORITY};
pub use resources::{Resource, Stack, Token};
pub use services::default_backend_routes;
pub use topology::{Topology, TopologyKind};
pub use waf::{AccessPolicyCompiler, CompiledFirewall, FirewallRule, FirewallScope, MatchExpression};
