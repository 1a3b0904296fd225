//! Cross-region certificate and firewall binding
//!
//! The CDN control plane only accepts certificates and firewalls created in
//! one fixed region. When the fronted topology needs either, they are
//! produced by a separate stack in that region and handed to the primary
//! stack as opaque [`Token`]s. The primary stack records a build-time
//! dependency on the producer so it is never deployed first.

use serde::Serialize;
use tracing::{debug, info};

use super::resources::{Certificate, Resource, Stack, Token};
use super::topology::TopologyKind;
use super::waf::{AccessPolicyCompiler, FirewallScope};
use crate::config::EdgeConfig;
use crate::domain::{AccessPolicy, LogicalId};
use crate::errors::Result;
use crate::stack_span;

/// Region where CDN certificates and firewalls must be created
pub const CDN_CONTROL_REGION: &str = "us-east-1";

/// Name of the stack producing CDN-scoped objects
pub const SECONDARY_STACK_NAME: &str = "EdgeGlobalStack";

pub const CERTIFICATE_OUTPUT: &str = "CertificateRef";
pub const FIREWALL_OUTPUT: &str = "FirewallRef";

/// Handles produced by the secondary stack for the primary stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateBinding {
    pub producer_stack: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<Token>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firewall: Option<Token>,
}

/// Secondary stack plus the handles it exports
#[derive(Debug, Clone)]
pub struct SecondaryStack {
    pub stack: Stack,
    pub binding: CertificateBinding,
}

/// Whether the deployment needs a secondary-region stack at all
pub fn requires_secondary(config: &EdgeConfig, policy: &AccessPolicy) -> bool {
    TopologyKind::from_config(config) == TopologyKind::Fronted
        && (config.domain.is_configured() || !policy.is_empty())
}

/// Produce the secondary-region stack, or `None` when nothing needs it.
pub fn synthesize_secondary(
    config: &EdgeConfig,
    policy: &AccessPolicy,
) -> Result<Option<SecondaryStack>> {
    if !requires_secondary(config, policy) {
        debug!("no CDN-scoped objects needed; skipping secondary stack");
        return Ok(None);
    }

    let span = stack_span!(SECONDARY_STACK_NAME, CDN_CONTROL_REGION);
    let _guard = span.enter();

    let mut stack = Stack::new(SECONDARY_STACK_NAME, CDN_CONTROL_REGION);
    let mut binding = CertificateBinding {
        producer_stack: SECONDARY_STACK_NAME.to_string(),
        certificate: None,
        firewall: None,
    };

    if let Some(zone) = &config.domain.domain_name {
        let id = LogicalId::new("CdnCertificate")?;
        stack.add(Resource::Certificate(Certificate {
            logical_id: id.clone(),
            domain_name: format!("*.{}", zone),
            subject_alternative_names: vec![zone.clone()],
            validation_zone: zone.clone(),
        }))?;
        let token = Token::attr(&id, "Arn");
        stack.output(CERTIFICATE_OUTPUT, &token);
        binding.certificate = Some(token.exported_from(SECONDARY_STACK_NAME));
    }

    let compiled = AccessPolicyCompiler::new(FirewallScope::Cloudfront).compile(policy)?;
    if !compiled.is_empty() {
        let id = LogicalId::new("CdnWebAcl")?;
        stack.extend(compiled.into_resources(id.clone(), FirewallScope::Cloudfront))?;
        let token = Token::attr(&id, "Arn");
        stack.output(FIREWALL_OUTPUT, &token);
        binding.firewall = Some(token.exported_from(SECONDARY_STACK_NAME));
    }

    info!(
        stack = SECONDARY_STACK_NAME,
        region = CDN_CONTROL_REGION,
        certificate = binding.certificate.is_some(),
        firewall = binding.firewall.is_some(),
        resources = stack.resources.len(),
        "synthesised secondary stack"
    );

    Ok(Some(SecondaryStack { stack, binding }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fronted() -> EdgeConfig {
        EdgeConfig::default()
    }

    #[test]
    fn skipped_without_domain_or_policy() {
        let config = fronted();
        let policy = AccessPolicy::default();
        assert!(!requires_secondary(&config, &policy));
        assert!(synthesize_secondary(&config, &policy).unwrap().is_none());
    }

    #[test]
    fn skipped_for_direct_topology() {
        let mut config = fronted();
        config.network.use_cdn = false;
        config.domain.domain_name = Some("example.com".into());
        assert!(!requires_secondary(&config, &AccessPolicy::default()));
    }

    #[test]
    fn certificate_only() {
        let mut config = fronted();
        config.domain.domain_name = Some("example.com".into());
        let secondary = synthesize_secondary(&config, &AccessPolicy::default()).unwrap().unwrap();

        assert_eq!(secondary.stack.region, CDN_CONTROL_REGION);
        assert!(secondary.binding.firewall.is_none());
        assert_eq!(
            secondary.binding.certificate.as_ref().unwrap().to_string(),
            "${EdgeGlobalStack.CdnCertificate.Arn}"
        );
        match secondary.stack.resource("CdnCertificate").unwrap() {
            Resource::Certificate(cert) => {
                assert_eq!(cert.domain_name, "*.example.com");
                assert_eq!(cert.subject_alternative_names, vec!["example.com"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(secondary.stack.outputs[CERTIFICATE_OUTPUT], "${CdnCertificate.Arn}");
    }

    #[test]
    fn firewall_only() {
        let policy = AccessPolicy::default().with_country("JP").unwrap();
        let secondary = synthesize_secondary(&fronted(), &policy).unwrap().unwrap();

        assert!(secondary.binding.certificate.is_none());
        assert!(secondary.binding.firewall.is_some());
        assert_eq!(secondary.stack.resources_of("WebAcl").count(), 1);
        assert_eq!(secondary.stack.resources_of("Certificate").count(), 0);
        assert!(secondary.stack.outputs.contains_key(FIREWALL_OUTPUT));
    }
}
