//! Access policy compilation
//!
//! Turns an [`AccessPolicy`] into web firewall rules. Rules are OR'd: a
//! request matching any rule is allowed. Predicates inside one rule are
//! AND'd. A request matching no rule falls through to the block action.
//!
//! | Policy fields set        | Rules emitted                              |
//! |--------------------------|--------------------------------------------|
//! | none                     | none                                       |
//! | IPv4                     | 1: IPv4 set                                |
//! | IPv4 + countries         | 1: IPv4 set AND geo                        |
//! | IPv6 (+ countries)       | 2: IPv6 set (AND geo)                      |
//! | countries only           | 3: geo                                     |

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::net::IpAddr;
use tracing::debug;

use super::resources::{IpSet, Resource, RuleAction, WebAcl};
use crate::domain::{AccessPolicy, Cidr, CountryCode, IpVersion, LogicalId};
use crate::errors::Result;

pub const IPV4_RULE_PRIORITY: u32 = 1;
pub const IPV6_RULE_PRIORITY: u32 = 2;
pub const GEO_RULE_PRIORITY: u32 = 3;

/// Hex characters of the content digest kept in an IP set's logical id
const IP_SET_KEY_LENGTH: usize = 12;

/// Where a firewall can be attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FirewallScope {
    /// Attached to a regional resource such as a load balancer
    Regional,
    /// Attached to a CDN distribution; must live in the CDN control region
    Cloudfront,
}

/// Boolean predicate over a request's source address and country
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchExpression {
    IpSetReference(LogicalId),
    GeoMatch(Vec<CountryCode>),
    And(Vec<MatchExpression>),
}

impl MatchExpression {
    fn matches(&self, ip_sets: &[IpSet], addr: &IpAddr, country: Option<&CountryCode>) -> bool {
        match self {
            MatchExpression::IpSetReference(id) => ip_sets
                .iter()
                .find(|set| &set.logical_id == id)
                .is_some_and(|set| set.addresses.iter().any(|cidr| cidr.contains(addr))),
            MatchExpression::GeoMatch(codes) => country.is_some_and(|c| codes.contains(c)),
            MatchExpression::And(parts) => {
                parts.iter().all(|part| part.matches(ip_sets, addr, country))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirewallRule {
    pub name: String,
    pub priority: u32,
    pub statement: MatchExpression,
    pub action: RuleAction,
    /// Rule-level request metrics are always visible under this name
    pub metric_name: String,
}

/// Output of [`AccessPolicyCompiler::compile`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompiledFirewall {
    pub ip_sets: Vec<IpSet>,
    /// Ordered by priority
    pub rules: Vec<FirewallRule>,
}

impl CompiledFirewall {
    /// No rules means no firewall should be attached at all
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Decide a request the way the attached firewall would
    pub fn evaluate(&self, addr: IpAddr, country: Option<&CountryCode>) -> RuleAction {
        self.rules
            .iter()
            .find(|rule| rule.statement.matches(&self.ip_sets, &addr, country))
            .map_or(RuleAction::Block, |rule| rule.action)
    }

    /// IP sets followed by the web ACL that references them.
    ///
    /// Returns nothing for an empty firewall.
    pub fn into_resources(self, web_acl: LogicalId, scope: FirewallScope) -> Vec<Resource> {
        if self.is_empty() {
            return Vec::new();
        }
        let metric_name = web_acl.to_string();
        let mut resources: Vec<Resource> = self.ip_sets.into_iter().map(Resource::IpSet).collect();
        resources.push(Resource::WebAcl(WebAcl {
            logical_id: web_acl,
            scope,
            default_action: RuleAction::Block,
            metric_name,
            rules: self.rules,
        }));
        resources
    }
}

/// Compiles allow-lists into firewall rules for one scope.
#[derive(Debug, Clone, Copy)]
pub struct AccessPolicyCompiler {
    scope: FirewallScope,
}

impl AccessPolicyCompiler {
    pub fn new(scope: FirewallScope) -> Self {
        Self { scope }
    }

    pub fn scope(&self) -> FirewallScope {
        self.scope
    }

    pub fn compile(&self, policy: &AccessPolicy) -> Result<CompiledFirewall> {
        let mut compiled = CompiledFirewall::default();

        let geo = policy
            .has_countries()
            .then(|| MatchExpression::GeoMatch(policy.allowed_country_codes.iter().cloned().collect()));

        let families = [
            (IpVersion::Ipv4, &policy.allowed_ipv4, IPV4_RULE_PRIORITY, "IpV4Set"),
            (IpVersion::Ipv6, &policy.allowed_ipv6, IPV6_RULE_PRIORITY, "IpV6Set"),
        ];

        for (version, cidrs, priority, base) in families {
            if cidrs.is_empty() {
                continue;
            }
            let addresses: Vec<Cidr> = cidrs.iter().copied().collect();
            let set = IpSet {
                logical_id: ip_set_id(base, &addresses)?,
                ip_address_version: version,
                scope: self.scope,
                addresses,
            };

            let reference = MatchExpression::IpSetReference(set.logical_id.clone());
            let (name, statement) = match &geo {
                Some(geo) => {
                    (format!("{}AndGeoMatchRule", base), MatchExpression::And(vec![reference, geo.clone()]))
                }
                None => (format!("{}Rule", base), reference),
            };

            compiled.ip_sets.push(set);
            compiled.rules.push(allow_rule(name, priority, statement));
        }

        if let (Some(geo), true) = (geo, compiled.rules.is_empty()) {
            compiled.rules.push(allow_rule("GeoMatchRule".to_string(), GEO_RULE_PRIORITY, geo));
        }

        for rule in &compiled.rules {
            debug!(scope = ?self.scope, rule = %rule.name, priority = rule.priority, "compiled firewall rule");
        }

        Ok(compiled)
    }
}

fn allow_rule(name: String, priority: u32, statement: MatchExpression) -> FirewallRule {
    FirewallRule { metric_name: name.clone(), name, priority, statement, action: RuleAction::Allow }
}

/// Logical id keyed by the set's contents, so the same list always maps to
/// the same resource. `addresses` must already be sorted and unique.
fn ip_set_id(base: &str, addresses: &[Cidr]) -> Result<LogicalId> {
    let mut hasher = Sha256::new();
    for cidr in addresses {
        hasher.update(cidr.to_string().as_bytes());
        hasher.update(b"\n");
    }
    let digest = hex::encode(hasher.finalize());
    LogicalId::new(format!("{}{}", base, &digest[..IP_SET_KEY_LENGTH]))
}
