//! Edge topology selection and construction
//!
//! A deployment is fronted by exactly one of two shapes, chosen once from
//! configuration:
//!
//! - [`DirectTopology`]: the load balancer faces clients itself. Access is
//!   controlled by per-range ingress rules on the listener, and TLS (when a
//!   domain is configured) terminates at the load balancer.
//! - [`FrontedTopology`]: a CDN distribution terminates TLS and carries the
//!   firewall. The load balancer is private and only admits the CDN's
//!   managed origin-facing prefix list.

use serde::Serialize;
use std::fmt;
use tracing::info;

use super::binding::CertificateBinding;
use super::listener::{ListenerRulePlanner, TargetGroupBinding};
use super::resources::{
    AccessLogs, AliasRecord, Certificate, DefaultAction, Distribution, IngressRule, Listener,
    LoadBalancer, OriginProtocolPolicy, Peer, PrefixListLookup, Protocol, Resource, Scheme, Stack,
    SubnetSelection, Token, ViewerProtocolPolicy, VpcOrigin,
};
use crate::config::EdgeConfig;
use crate::domain::{AccessPolicy, BackendRoute, Cidr, HealthCheckProfile, LogicalId};
use crate::errors::{EdgeplaneError, Result};

/// Managed prefix list covering the CDN's origin-facing addresses
pub const CDN_ORIGIN_PREFIX_LIST: &str = "com.amazonaws.global.cloudfront.origin-facing";

/// Status returned by the listener when no rule matches
pub const UNMATCHED_STATUS_CODE: u16 = 400;

pub const BASE_URL_OUTPUT: &str = "BaseUrl";

const LOAD_BALANCER_ID: &str = "Alb";
const LISTENER_ID: &str = "AlbListener";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyKind {
    Direct,
    Fronted,
}

impl TopologyKind {
    /// Fronted unless the CDN is switched off
    pub fn from_config(config: &EdgeConfig) -> Self {
        if config.network.use_cdn {
            TopologyKind::Fronted
        } else {
            TopologyKind::Direct
        }
    }
}

impl fmt::Display for TopologyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyKind::Direct => write!(f, "direct"),
            TopologyKind::Fronted => write!(f, "fronted"),
        }
    }
}

/// `record_name.zone`, published as an alias to the entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomDomain {
    pub zone: String,
    pub record_name: String,
}

impl CustomDomain {
    fn from_config(config: &EdgeConfig) -> Option<Self> {
        config.domain.domain_name.as_ref().map(|zone| Self {
            zone: zone.clone(),
            record_name: config.domain.effective_sub_domain().to_string(),
        })
    }

    pub fn host_name(&self) -> String {
        format!("{}.{}", self.record_name, self.zone)
    }
}

/// Settings shared by both shapes' load balancer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerSettings {
    pub idle_timeout_seconds: u64,
    pub access_log_bucket: String,
}

impl LoadBalancerSettings {
    fn from_config(config: &EdgeConfig) -> Self {
        Self {
            idle_timeout_seconds: config.load_balancer.idle_timeout_seconds,
            access_log_bucket: config.load_balancer.access_log_bucket.clone(),
        }
    }

    fn load_balancer(&self, scheme: Scheme, subnets: SubnetSelection) -> Result<LoadBalancer> {
        Ok(LoadBalancer {
            logical_id: LogicalId::new(LOAD_BALANCER_ID)?,
            scheme,
            subnets,
            idle_timeout_seconds: self.idle_timeout_seconds,
            access_logs: AccessLogs {
                bucket: self.access_log_bucket.clone(),
                prefix: "edge-alb".to_string(),
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectTopology {
    pub scheme: Scheme,
    pub subnets: SubnetSelection,
    /// Ranges admitted by the listener's network ingress
    pub ingress: Vec<Cidr>,
    /// TLS terminates at the load balancer when set
    pub domain: Option<CustomDomain>,
    pub load_balancer: LoadBalancerSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrontedTopology {
    pub domain: Option<CustomDomain>,
    /// Certificate produced in the CDN control region
    pub certificate: Option<Token>,
    /// Firewall produced in the CDN control region
    pub firewall: Option<Token>,
    /// Stack the handles above come from
    pub producer_stack: Option<String>,
    pub load_balancer: LoadBalancerSettings,
}

/// Primary-stack output of a topology build
#[derive(Debug, Clone)]
pub struct BuiltTopology {
    pub stack: Stack,
    pub base_url: String,
    pub target_groups: Vec<TargetGroupBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Topology {
    Direct(DirectTopology),
    Fronted(FrontedTopology),
}

impl Topology {
    /// Choose and parameterise the topology.
    ///
    /// `binding` carries the secondary-region handles; a fronted topology
    /// that needs a certificate or firewall fails without them.
    pub fn select(config: &EdgeConfig, binding: Option<&CertificateBinding>) -> Result<Self> {
        let policy = config.access_policy()?;
        let domain = CustomDomain::from_config(config);
        let load_balancer = LoadBalancerSettings::from_config(config);

        let topology = match TopologyKind::from_config(config) {
            TopologyKind::Direct => {
                let internal = config.network.is_internal_alb();
                Topology::Direct(DirectTopology {
                    scheme: if internal { Scheme::Internal } else { Scheme::InternetFacing },
                    subnets: if internal {
                        SubnetSelection::PrivateAndIsolated
                    } else {
                        SubnetSelection::Public
                    },
                    ingress: policy.network_ingress_ranges(),
                    domain,
                    load_balancer,
                })
            }
            TopologyKind::Fronted => {
                let certificate = binding.and_then(|b| b.certificate.clone());
                let firewall = binding.and_then(|b| b.firewall.clone());
                check_fronted_inputs(domain.as_ref(), &policy, certificate.as_ref(), firewall.as_ref())?;
                Topology::Fronted(FrontedTopology {
                    domain,
                    certificate,
                    firewall,
                    producer_stack: binding.map(|b| b.producer_stack.clone()),
                    load_balancer,
                })
            }
        };

        info!(topology = %topology.kind(), "selected edge topology");
        Ok(topology)
    }

    pub fn kind(&self) -> TopologyKind {
        match self {
            Topology::Direct(_) => TopologyKind::Direct,
            Topology::Fronted(_) => TopologyKind::Fronted,
        }
    }

    pub fn health_profile(&self) -> HealthCheckProfile {
        match self {
            Topology::Direct(_) => HealthCheckProfile::direct(),
            Topology::Fronted(_) => HealthCheckProfile::fronted(),
        }
    }

    /// Target groups attach to a single load balancer, so the fronted
    /// shape names them apart from the direct one.
    pub fn target_group_suffix(&self) -> &'static str {
        match self {
            Topology::Direct(_) => "TargetGroup",
            Topology::Fronted(_) => "TargetGroupInternal",
        }
    }

    pub fn domain(&self) -> Option<&CustomDomain> {
        match self {
            Topology::Direct(t) => t.domain.as_ref(),
            Topology::Fronted(t) => t.domain.as_ref(),
        }
    }

    /// Public entry point of the deployment
    pub fn base_url(&self) -> Result<String> {
        let url = match (self, self.domain()) {
            (_, Some(domain)) => format!("https://{}", domain.host_name()),
            (Topology::Direct(_), None) => {
                format!("http://{}", Token::attr(&LogicalId::new(LOAD_BALANCER_ID)?, "DnsName"))
            }
            (Topology::Fronted(_), None) => {
                format!("https://{}", Token::attr(&distribution_id()?, "DomainName"))
            }
        };
        Ok(url)
    }

    /// Build the primary-region stack, registering `routes` in order
    pub fn build(&self, stack: Stack, routes: &[BackendRoute]) -> Result<BuiltTopology> {
        let planner =
            ListenerRulePlanner::new(LogicalId::new(LISTENER_ID)?, self.health_profile())
                .with_target_group_suffix(self.target_group_suffix());

        match self {
            Topology::Direct(direct) => direct.build(stack, planner, routes, self.base_url()?),
            Topology::Fronted(fronted) => fronted.build(stack, planner, routes, self.base_url()?),
        }
    }
}

fn check_fronted_inputs(
    domain: Option<&CustomDomain>,
    policy: &AccessPolicy,
    certificate: Option<&Token>,
    firewall: Option<&Token>,
) -> Result<()> {
    if let (Some(domain), None) = (domain, certificate) {
        return Err(EdgeplaneError::cross_region(format!(
            "custom domain '{}' needs a certificate from the CDN control region, but none was produced",
            domain.host_name()
        )));
    }
    if !policy.is_empty() && firewall.is_none() {
        return Err(EdgeplaneError::cross_region(
            "access policy needs a firewall from the CDN control region, but none was produced",
        ));
    }
    Ok(())
}

fn distribution_id() -> Result<LogicalId> {
    LogicalId::new("Distribution")
}

fn register_routes(
    planner: &mut ListenerRulePlanner,
    routes: &[BackendRoute],
) -> Result<Vec<TargetGroupBinding>> {
    routes.iter().map(|route| planner.add_service(route)).collect()
}

fn listener(protocol: Protocol, certificates: Vec<Token>) -> Result<Listener> {
    Ok(Listener {
        logical_id: LogicalId::new(LISTENER_ID)?,
        load_balancer: LogicalId::new(LOAD_BALANCER_ID)?,
        protocol,
        port: protocol.default_port(),
        certificates,
        default_action: DefaultAction::FixedResponse { status_code: UNMATCHED_STATUS_CODE },
        open: false,
    })
}

impl DirectTopology {
    fn build(
        &self,
        mut stack: Stack,
        mut planner: ListenerRulePlanner,
        routes: &[BackendRoute],
        base_url: String,
    ) -> Result<BuiltTopology> {
        let load_balancer = self.load_balancer.load_balancer(self.scheme, self.subnets)?;
        let lb_id = load_balancer.logical_id.clone();
        stack.add(Resource::LoadBalancer(load_balancer))?;

        let (protocol, certificates) = match &self.domain {
            Some(domain) => {
                let cert_id = LogicalId::new("AlbCertificate")?;
                stack.add(Resource::Certificate(Certificate {
                    logical_id: cert_id.clone(),
                    domain_name: domain.host_name(),
                    subject_alternative_names: Vec::new(),
                    validation_zone: domain.zone.clone(),
                }))?;
                (Protocol::Https, vec![Token::attr(&cert_id, "Arn")])
            }
            None => (Protocol::Http, Vec::new()),
        };

        let listener = listener(protocol, certificates)?;
        for (i, cidr) in self.ingress.iter().enumerate() {
            stack.add(Resource::IngressRule(IngressRule {
                logical_id: LogicalId::new(format!("AlbIngress{}", i))?,
                listener: listener.logical_id.clone(),
                peer: Peer::from_cidr(*cidr),
                port: listener.port,
            }))?;
        }
        stack.add(Resource::Listener(listener))?;

        let target_groups = register_routes(&mut planner, routes)?;
        stack.extend(planner.into_resources())?;

        if let Some(domain) = &self.domain {
            stack.add(Resource::AliasRecord(AliasRecord {
                logical_id: LogicalId::new("AlbAliasRecord")?,
                zone: domain.zone.clone(),
                record_name: domain.record_name.clone(),
                target: Token::attr(&lb_id, "DnsName"),
            }))?;
        }

        stack.output(BASE_URL_OUTPUT, &base_url);
        Ok(BuiltTopology { stack, base_url, target_groups })
    }
}

impl FrontedTopology {
    fn build(
        &self,
        mut stack: Stack,
        mut planner: ListenerRulePlanner,
        routes: &[BackendRoute],
        base_url: String,
    ) -> Result<BuiltTopology> {
        if let Some(producer) = &self.producer_stack {
            stack.depend_on(producer);
        }

        let load_balancer =
            self.load_balancer.load_balancer(Scheme::Internal, SubnetSelection::Private)?;
        let lb_id = load_balancer.logical_id.clone();
        stack.add(Resource::LoadBalancer(load_balancer))?;

        let lookup_id = LogicalId::new("CdnOriginPrefixList")?;
        stack.add(Resource::PrefixListLookup(PrefixListLookup {
            logical_id: lookup_id.clone(),
            prefix_list_name: CDN_ORIGIN_PREFIX_LIST.to_string(),
        }))?;

        let listener = listener(Protocol::Http, Vec::new())?;
        stack.add(Resource::IngressRule(IngressRule {
            logical_id: LogicalId::new("AlbIngressCdn")?,
            listener: listener.logical_id.clone(),
            peer: Peer::PrefixList(Token::attr(&lookup_id, "PrefixListId")),
            port: listener.port,
        }))?;
        stack.add(Resource::Listener(listener))?;

        let target_groups = register_routes(&mut planner, routes)?;
        stack.extend(planner.into_resources())?;

        let origin_id = LogicalId::new("AlbVpcOrigin")?;
        stack.add(Resource::VpcOrigin(VpcOrigin {
            logical_id: origin_id.clone(),
            load_balancer: lb_id,
            name: "edge-alb-origin".to_string(),
            http_port: Protocol::Http.default_port(),
            origin_protocol_policy: OriginProtocolPolicy::HttpOnly,
        }))?;

        let distribution = distribution_id()?;
        let comment = format!("{} edge distribution", stack.name);
        stack.add(Resource::Distribution(Distribution {
            logical_id: distribution.clone(),
            comment,
            origin: origin_id,
            domain_names: self.domain.iter().map(CustomDomain::host_name).collect(),
            certificate: self.certificate.clone(),
            web_acl: self.firewall.clone(),
            viewer_protocol_policy: ViewerProtocolPolicy::RedirectToHttps,
            compress: true,
            cache_policy: "USE_ORIGIN_CACHE_CONTROL_HEADERS_QUERY_STRINGS".to_string(),
            origin_request_policy: "ALL_VIEWER".to_string(),
            allowed_methods: "ALLOW_ALL".to_string(),
            access_logs: AccessLogs {
                bucket: self.load_balancer.access_log_bucket.clone(),
                prefix: "edge-cdn/".to_string(),
            },
        }))?;

        if let Some(domain) = &self.domain {
            stack.add(Resource::AliasRecord(AliasRecord {
                logical_id: LogicalId::new("DistributionAliasRecord")?,
                zone: domain.zone.clone(),
                record_name: domain.record_name.clone(),
                target: Token::attr(&distribution, "DomainName"),
            }))?;
        }

        stack.output(BASE_URL_OUTPUT, &base_url);
        Ok(BuiltTopology { stack, base_url, target_groups })
    }
}
