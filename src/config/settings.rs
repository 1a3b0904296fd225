//! # Configuration Settings
//!
//! Defines the deployment configuration consumed by the edge compiler and
//! the conflict rules that reject impossible option combinations before any
//! resource graph is built.

use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

use crate::domain::AccessPolicy;
use crate::errors::{EdgeplaneError, Result};

/// Sub-domain used when a domain is configured without one
pub const DEFAULT_SUB_DOMAIN: &str = "app";

/// Main deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EdgeConfig {
    /// Primary deployment region
    #[validate(length(min = 1, message = "Region cannot be empty"))]
    pub region: String,

    /// Account the stacks are deployed to
    pub account: Option<String>,

    /// IP and country allow-lists
    #[validate(nested)]
    pub access: AccessConfig,

    /// Custom domain settings
    #[validate(nested)]
    pub domain: DomainConfig,

    /// Network shape
    #[validate(nested)]
    pub network: NetworkConfig,

    /// Load balancer settings
    #[validate(nested)]
    pub load_balancer: LoadBalancerConfig,

    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
            account: None,
            access: AccessConfig::default(),
            domain: DomainConfig::default(),
            network: NetworkConfig::default(),
            load_balancer: LoadBalancerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl EdgeConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(EdgeplaneError::from)?;
        self.validate_conflicts()?;
        self.access_policy()?;

        if !self.network.use_cdn && !self.network.is_internal_alb() && !self.domain.is_configured()
        {
            warn!(
                topology = "direct",
                "load balancer is exposed to the internet without TLS; set network.use_cdn or domain.domain_name"
            );
        }

        Ok(())
    }

    /// Option pairs that cannot be honoured together
    fn validate_conflicts(&self) -> Result<()> {
        let network = &self.network;

        if let Some(vpc_id) = &network.vpc_id {
            if network.vpc_isolated.is_some() {
                return Err(EdgeplaneError::conflict(
                    "network.vpc_id",
                    "network.vpc_isolated",
                    format!("an imported VPC ({}) cannot also set vpc_isolated", vpc_id),
                ));
            }
            if network.use_nat_instance.is_some() {
                return Err(EdgeplaneError::conflict(
                    "network.vpc_id",
                    "network.use_nat_instance",
                    format!("an imported VPC ({}) cannot also set use_nat_instance", vpc_id),
                ));
            }
        }

        if network.use_cdn && network.internal_alb.is_some() {
            return Err(EdgeplaneError::conflict(
                "network.use_cdn",
                "network.internal_alb",
                "the CDN always uses a private load balancer; internal_alb cannot be set with it",
            ));
        }

        if network.use_cdn && network.is_vpc_isolated() {
            return Err(EdgeplaneError::conflict(
                "network.use_cdn",
                "network.vpc_isolated",
                "the CDN needs an origin reachable from its edge address range, which a fully isolated network cannot provide",
            ));
        }

        if self.domain.sub_domain.is_some() && self.domain.domain_name.is_none() {
            return Err(EdgeplaneError::conflict(
                "domain.sub_domain",
                "domain.domain_name",
                "sub_domain requires domain_name",
            ));
        }

        if !network.use_cdn && !network.is_internal_alb() && network.is_vpc_isolated() {
            return Err(EdgeplaneError::conflict(
                "network.internal_alb",
                "network.vpc_isolated",
                "an internet-facing load balancer needs public subnets; set internal_alb: true for an isolated network",
            ));
        }

        if !network.use_cdn && self.access.has_country_codes() {
            return Err(EdgeplaneError::conflict(
                "network.use_cdn",
                "access.allowed_country_codes",
                "country allow-lists are enforced by the CDN firewall and need use_cdn: true",
            ));
        }

        Ok(())
    }

    /// Parsed access policy
    pub fn access_policy(&self) -> Result<AccessPolicy> {
        AccessPolicy::from_lists(
            self.access.allowed_ipv4_cidrs.as_deref(),
            self.access.allowed_ipv6_cidrs.as_deref(),
            self.access.allowed_country_codes.as_deref(),
        )
    }
}

/// Allow-list configuration, as written by the operator
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AccessConfig {
    /// IPv4 ranges in CIDR notation allowed to reach the app
    pub allowed_ipv4_cidrs: Option<Vec<String>>,

    /// IPv6 ranges in CIDR notation allowed to reach the app
    pub allowed_ipv6_cidrs: Option<Vec<String>>,

    /// ISO 3166-1 alpha-2 country codes allowed to reach the app
    pub allowed_country_codes: Option<Vec<String>>,
}

impl AccessConfig {
    pub fn has_country_codes(&self) -> bool {
        self.allowed_country_codes.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Custom domain configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DomainConfig {
    /// Public hosted zone the app is published under
    #[validate(length(min = 1, message = "Domain name cannot be empty"))]
    pub domain_name: Option<String>,

    /// Label prepended to the domain name
    #[validate(length(min = 1, max = 63, message = "Sub-domain must be 1-63 characters"))]
    pub sub_domain: Option<String>,
}

impl DomainConfig {
    pub fn is_configured(&self) -> bool {
        self.domain_name.is_some()
    }

    /// Fully qualified host name, when a domain is configured
    pub fn host_name(&self) -> Option<String> {
        self.domain_name.as_ref().map(|zone| format!("{}.{}", self.effective_sub_domain(), zone))
    }

    pub fn effective_sub_domain(&self) -> &str {
        self.sub_domain.as_deref().unwrap_or(DEFAULT_SUB_DOMAIN)
    }
}

/// Network shape configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NetworkConfig {
    /// Put a CDN in front of a private load balancer
    pub use_cdn: bool,

    /// Place a direct load balancer in private subnets only
    pub internal_alb: Option<bool>,

    /// Network with isolated subnets only (no internet gateway)
    pub vpc_isolated: Option<bool>,

    /// Import an existing network instead of creating one
    #[validate(length(min = 1, message = "VPC id cannot be empty"))]
    pub vpc_id: Option<String>,

    /// Use NAT instances instead of NAT gateways
    pub use_nat_instance: Option<bool>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            use_cdn: true,
            internal_alb: None,
            vpc_isolated: None,
            vpc_id: None,
            use_nat_instance: None,
        }
    }
}

impl NetworkConfig {
    pub fn is_internal_alb(&self) -> bool {
        self.internal_alb.unwrap_or(false)
    }

    pub fn is_vpc_isolated(&self) -> bool {
        self.vpc_isolated.unwrap_or(false)
    }
}

/// Load balancer configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Connection idle timeout in seconds
    #[validate(range(
        min = 1,
        max = 4000,
        message = "Idle timeout must be between 1 and 4000 seconds"
    ))]
    pub idle_timeout_seconds: u64,

    /// Logical name of the bucket receiving access logs
    #[validate(length(min = 1, message = "Access log bucket cannot be empty"))]
    pub access_log_bucket: String,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self { idle_timeout_seconds: 600, access_log_bucket: "AccessLogBucket".to_string() }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn conflict_pair(err: EdgeplaneError) -> (String, String) {
        match err {
            EdgeplaneError::Conflict { first, second, .. } => (first, second),
            other => panic!("expected conflict, got {other}"),
        }
    }

    #[test]
    fn test_default_config_validation() {
        let config = EdgeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.network.use_cdn);
    }

    #[test]
    fn test_cdn_with_internal_alb_rejected() {
        let mut config = EdgeConfig::default();
        config.network.internal_alb = Some(false);
        let (first, second) = conflict_pair(config.validate().unwrap_err());
        assert_eq!(first, "network.use_cdn");
        assert_eq!(second, "network.internal_alb");
    }

    #[test]
    fn test_cdn_with_isolated_network_rejected() {
        let mut config = EdgeConfig::default();
        config.network.vpc_isolated = Some(true);
        let (_, second) = conflict_pair(config.validate().unwrap_err());
        assert_eq!(second, "network.vpc_isolated");
    }

    #[test]
    fn test_sub_domain_without_domain_rejected() {
        let mut config = EdgeConfig::default();
        config.domain.sub_domain = Some("edge".to_string());
        let (first, _) = conflict_pair(config.validate().unwrap_err());
        assert_eq!(first, "domain.sub_domain");
    }

    #[test]
    fn test_imported_vpc_conflicts() {
        let mut config = EdgeConfig::default();
        config.network.vpc_id = Some("vpc-123".to_string());
        config.network.use_nat_instance = Some(true);
        let (first, second) = conflict_pair(config.validate().unwrap_err());
        assert_eq!(first, "network.vpc_id");
        assert_eq!(second, "network.use_nat_instance");
    }

    #[test]
    fn test_direct_internal_isolated_is_fine() {
        let mut config = EdgeConfig::default();
        config.network.use_cdn = false;
        config.network.internal_alb = Some(true);
        config.network.vpc_isolated = Some(true);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_direct_public_isolated_rejected() {
        let mut config = EdgeConfig::default();
        config.network.use_cdn = false;
        config.network.vpc_isolated = Some(true);
        assert!(matches!(config.validate(), Err(EdgeplaneError::Conflict { .. })));
    }

    #[test]
    fn test_direct_with_countries_rejected() {
        let mut config = EdgeConfig::default();
        config.network.use_cdn = false;
        config.access.allowed_country_codes = Some(vec!["JP".to_string()]);
        let (_, second) = conflict_pair(config.validate().unwrap_err());
        assert_eq!(second, "access.allowed_country_codes");
    }

    #[test]
    fn test_bad_cidr_rejected() {
        let mut config = EdgeConfig::default();
        config.access.allowed_ipv4_cidrs = Some(vec!["300.1.1.1/8".to_string()]);
        assert!(matches!(config.validate(), Err(EdgeplaneError::Validation { .. })));
    }

    #[test]
    fn test_idle_timeout_range() {
        let mut config = EdgeConfig::default();
        config.load_balancer.idle_timeout_seconds = 0;
        assert!(matches!(config.validate(), Err(EdgeplaneError::Validation { .. })));
    }

    #[test]
    fn test_host_name() {
        let mut domain = DomainConfig::default();
        assert_eq!(domain.host_name(), None);

        domain.domain_name = Some("example.com".to_string());
        assert_eq!(domain.host_name().as_deref(), Some("app.example.com"));

        domain.sub_domain = Some("edge".to_string());
        assert_eq!(domain.host_name().as_deref(), Some("edge.example.com"));
    }

    #[test]
    #[traced_test]
    fn test_plaintext_direct_warns() {
        let mut config = EdgeConfig::default();
        config.network.use_cdn = false;
        assert!(config.validate().is_ok());
        assert!(logs_contain("without TLS"));
    }
}
