//! Declarative resource descriptions
//!
//! These are the values the compiler hands to the provisioning engine. They
//! describe desired state only; nothing here talks to a cloud API. Values
//! that exist only once a resource is created (DNS names, ARNs) are carried
//! as [`Token`]s that the engine resolves at deploy time.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use super::waf::{FirewallRule, FirewallScope};
use crate::domain::{Cidr, IpVersion, LogicalId, ResolvedHealthCheck, ServiceId};
use crate::errors::{EdgeplaneError, Result};

/// Reference to an attribute of a resource that is only known after deployment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    /// Set when the resource lives in another stack
    pub stack: Option<String>,
    pub resource: LogicalId,
    pub attribute: String,
}

impl Token {
    pub fn attr(resource: &LogicalId, attribute: &str) -> Self {
        Self { stack: None, resource: resource.clone(), attribute: attribute.to_string() }
    }

    /// The same reference, seen from another stack
    pub fn exported_from(&self, stack: &str) -> Self {
        Self { stack: Some(stack.to_string()), ..self.clone() }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.stack {
            Some(stack) => write!(f, "${{{}.{}.{}}}", stack, self.resource, self.attribute),
            None => write!(f, "${{{}.{}}}", self.resource, self.attribute),
        }
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whether a load balancer has a public address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scheme {
    InternetFacing,
    Internal,
}

/// Subnets a load balancer is placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetSelection {
    Public,
    Private,
    PrivateAndIsolated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessLogs {
    pub bucket: String,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancer {
    pub logical_id: LogicalId,
    pub scheme: Scheme,
    pub subnets: SubnetSelection,
    pub idle_timeout_seconds: u64,
    pub access_logs: AccessLogs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

/// What a listener does with a request no rule matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefaultAction {
    FixedResponse { status_code: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listener {
    pub logical_id: LogicalId,
    pub load_balancer: LogicalId,
    pub protocol: Protocol,
    pub port: u16,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<Token>,
    pub default_action: DefaultAction,
    /// Never open to the world implicitly; ingress rules grant access.
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetGroup {
    pub logical_id: LogicalId,
    pub service_id: ServiceId,
    pub protocol: Protocol,
    pub port: u16,
    pub deregistration_delay_seconds: u64,
    pub health_check: ResolvedHealthCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListenerRule {
    pub logical_id: LogicalId,
    pub listener: LogicalId,
    pub priority: u32,
    pub path_patterns: Vec<String>,
    pub target_group: LogicalId,
}

/// Source allowed through a listener's ingress
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Peer {
    Ipv4(Cidr),
    Ipv6(Cidr),
    PrefixList(Token),
}

impl Peer {
    pub fn from_cidr(cidr: Cidr) -> Self {
        match cidr.version() {
            IpVersion::Ipv4 => Peer::Ipv4(cidr),
            IpVersion::Ipv6 => Peer::Ipv6(cidr),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressRule {
    pub logical_id: LogicalId,
    pub listener: LogicalId,
    pub peer: Peer,
    pub port: u16,
}

/// Resolves a platform-managed prefix list by name at deploy time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixListLookup {
    pub logical_id: LogicalId,
    pub prefix_list_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    pub logical_id: LogicalId,
    pub domain_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
    /// Hosted zone holding the DNS validation records
    pub validation_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpSet {
    pub logical_id: LogicalId,
    pub ip_address_version: IpVersion,
    pub scope: FirewallScope,
    pub addresses: Vec<Cidr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebAcl {
    pub logical_id: LogicalId,
    pub scope: FirewallScope,
    pub default_action: RuleAction,
    pub metric_name: String,
    pub rules: Vec<FirewallRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OriginProtocolPolicy {
    HttpOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VpcOrigin {
    pub logical_id: LogicalId,
    pub load_balancer: LogicalId,
    pub name: String,
    pub http_port: u16,
    pub origin_protocol_policy: OriginProtocolPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewerProtocolPolicy {
    RedirectToHttps,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Distribution {
    pub logical_id: LogicalId,
    pub comment: String,
    pub origin: LogicalId,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub domain_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_acl: Option<Token>,
    pub viewer_protocol_policy: ViewerProtocolPolicy,
    pub compress: bool,
    pub cache_policy: String,
    pub origin_request_policy: String,
    pub allowed_methods: String,
    pub access_logs: AccessLogs,
}

/// DNS alias from `record_name.zone` to a load balancer or distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRecord {
    pub logical_id: LogicalId,
    pub zone: String,
    pub record_name: String,
    pub target: Token,
}

/// Any resource the compiler can emit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum Resource {
    LoadBalancer(LoadBalancer),
    Listener(Listener),
    TargetGroup(TargetGroup),
    ListenerRule(ListenerRule),
    IngressRule(IngressRule),
    PrefixListLookup(PrefixListLookup),
    Certificate(Certificate),
    IpSet(IpSet),
    WebAcl(WebAcl),
    VpcOrigin(VpcOrigin),
    Distribution(Distribution),
    AliasRecord(AliasRecord),
}

impl Resource {
    pub fn logical_id(&self) -> &LogicalId {
        match self {
            Resource::LoadBalancer(r) => &r.logical_id,
            Resource::Listener(r) => &r.logical_id,
            Resource::TargetGroup(r) => &r.logical_id,
            Resource::ListenerRule(r) => &r.logical_id,
            Resource::IngressRule(r) => &r.logical_id,
            Resource::PrefixListLookup(r) => &r.logical_id,
            Resource::Certificate(r) => &r.logical_id,
            Resource::IpSet(r) => &r.logical_id,
            Resource::WebAcl(r) => &r.logical_id,
            Resource::VpcOrigin(r) => &r.logical_id,
            Resource::Distribution(r) => &r.logical_id,
            Resource::AliasRecord(r) => &r.logical_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Resource::LoadBalancer(_) => "LoadBalancer",
            Resource::Listener(_) => "Listener",
            Resource::TargetGroup(_) => "TargetGroup",
            Resource::ListenerRule(_) => "ListenerRule",
            Resource::IngressRule(_) => "IngressRule",
            Resource::PrefixListLookup(_) => "PrefixListLookup",
            Resource::Certificate(_) => "Certificate",
            Resource::IpSet(_) => "IpSet",
            Resource::WebAcl(_) => "WebAcl",
            Resource::VpcOrigin(_) => "VpcOrigin",
            Resource::Distribution(_) => "Distribution",
            Resource::AliasRecord(_) => "AliasRecord",
        }
    }
}

/// One independently deployed resource graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stack {
    pub name: String,
    pub region: String,
    /// Stacks that must finish deploying before this one starts
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    pub resources: Vec<Resource>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, String>,
}

impl Stack {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            depends_on: Vec::new(),
            resources: Vec::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Add a resource, refusing duplicate logical ids
    pub fn add(&mut self, resource: Resource) -> Result<()> {
        if self.resource(resource.logical_id().as_str()).is_some() {
            return Err(EdgeplaneError::constraint(format!(
                "stack '{}' already has a resource named '{}'",
                self.name,
                resource.logical_id()
            )));
        }
        self.resources.push(resource);
        Ok(())
    }

    pub fn extend(&mut self, resources: impl IntoIterator<Item = Resource>) -> Result<()> {
        for resource in resources {
            self.add(resource)?;
        }
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.logical_id().as_str() == logical_id)
    }

    pub fn resources_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources.iter().filter(move |r| r.kind() == kind)
    }

    pub fn depend_on(&mut self, stack: &str) {
        if !self.depends_on.iter().any(|s| s == stack) {
            self.depends_on.push(stack.to_string());
        }
    }

    pub fn output(&mut self, name: &str, value: impl fmt::Display) {
        self.outputs.insert(name.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    #[test]
    fn token_rendering() {
        let token = Token::attr(&id("Alb"), "DnsName");
        assert_eq!(token.to_string(), "${Alb.DnsName}");
        assert_eq!(token.exported_from("EdgeGlobalStack").to_string(), "${EdgeGlobalStack.Alb.DnsName}");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"${Alb.DnsName}\"");
    }

    #[test]
    fn stack_rejects_duplicate_ids() {
        let mut stack = Stack::new("EdgeStack", "us-west-2");
        let lookup = PrefixListLookup { logical_id: id("Lookup"), prefix_list_name: "x".into() };
        stack.add(Resource::PrefixListLookup(lookup.clone())).unwrap();
        let err = stack.add(Resource::PrefixListLookup(lookup)).unwrap_err();
        assert!(matches!(err, EdgeplaneError::Constraint { .. }));
    }

    #[test]
    fn resource_serializes_with_type_tag() {
        let resource = Resource::IngressRule(IngressRule {
            logical_id: id("AlbIngress0"),
            listener: id("AlbListener"),
            peer: Peer::from_cidr("10.0.0.0/8".parse().unwrap()),
            port: 80,
        });
        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["type"], "IngressRule");
        assert_eq!(value["peer"]["kind"], "ipv4");
        assert_eq!(value["peer"]["value"], "10.0.0.0/8");
    }

    #[test]
    fn depend_on_is_idempotent() {
        let mut stack = Stack::new("EdgeStack", "us-west-2");
        stack.depend_on("EdgeGlobalStack");
        stack.depend_on("EdgeGlobalStack");
        assert_eq!(stack.depends_on, vec!["EdgeGlobalStack"]);
    }
}
