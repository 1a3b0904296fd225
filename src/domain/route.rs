//! Backend route domain types
//!
//! A [`BackendRoute`] is what a backend service hands to the listener rule
//! planner: where to send traffic, how to health check it, and which URL
//! paths belong to it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::id::ServiceId;
use crate::errors::{EdgeplaneError, Result};

/// Longest path pattern the load balancer accepts in a condition value
pub const MAX_PATH_PATTERN_LENGTH: usize = 128;

/// Health check settings supplied by a service.
///
/// Only the path is mandatory. Anything left unset is filled from the
/// listener's [`HealthCheckProfile`] when the target group is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// HTTP path probed on each target
    pub path: String,

    /// Interval between checks in seconds
    #[serde(default)]
    pub interval_seconds: Option<u64>,

    /// Consecutive successes before a target is healthy
    #[serde(default)]
    pub healthy_threshold: Option<u32>,

    /// Consecutive failures before a target is unhealthy
    #[serde(default)]
    pub unhealthy_threshold: Option<u32>,

    /// Status codes counted as healthy, e.g. `200-299,307`
    #[serde(default)]
    pub healthy_http_codes: Option<String>,
}

impl HealthCheck {
    /// Create an HTTP health check on the given path
    pub fn http(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            interval_seconds: None,
            healthy_threshold: None,
            unhealthy_threshold: None,
            healthy_http_codes: None,
        }
    }

    pub fn with_interval(mut self, seconds: u64) -> Self {
        self.interval_seconds = Some(seconds);
        self
    }

    pub fn with_thresholds(mut self, healthy: u32, unhealthy: u32) -> Self {
        self.healthy_threshold = Some(healthy);
        self.unhealthy_threshold = Some(unhealthy);
        self
    }

    pub fn with_healthy_http_codes(mut self, codes: impl Into<String>) -> Self {
        self.healthy_http_codes = Some(codes.into());
        self
    }
}

/// Listener-wide health check defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckProfile {
    pub interval_seconds: u64,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub healthy_http_codes: String,
}

impl HealthCheckProfile {
    /// Profile for a load balancer that faces clients directly
    pub fn direct() -> Self {
        Self {
            interval_seconds: 30,
            healthy_threshold: 2,
            unhealthy_threshold: 10,
            healthy_http_codes: "200-299,307".to_string(),
        }
    }

    /// Profile for a private load balancer behind the CDN
    pub fn fronted() -> Self {
        Self {
            interval_seconds: 20,
            healthy_threshold: 2,
            unhealthy_threshold: 6,
            healthy_http_codes: "200-299,307".to_string(),
        }
    }

    /// Fill the unset parts of a service's health check from this profile
    pub fn resolve(&self, check: &HealthCheck) -> ResolvedHealthCheck {
        ResolvedHealthCheck {
            path: check.path.clone(),
            interval_seconds: check.interval_seconds.unwrap_or(self.interval_seconds),
            healthy_threshold: check.healthy_threshold.unwrap_or(self.healthy_threshold),
            unhealthy_threshold: check.unhealthy_threshold.unwrap_or(self.unhealthy_threshold),
            healthy_http_codes: check
                .healthy_http_codes
                .clone()
                .unwrap_or_else(|| self.healthy_http_codes.clone()),
        }
    }
}

/// Health check bound to a target group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedHealthCheck {
    pub path: String,
    pub interval_seconds: u64,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub healthy_http_codes: String,
}

/// A backend service as registered with a listener.
///
/// Immutable once handed to the planner; the planner only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRoute {
    pub service_id: ServiceId,
    pub target_port: u16,
    pub health_check: HealthCheck,

    /// Paths owned by this service, in the order they should be matched.
    /// Each one also claims all of its sub-paths.
    pub path_patterns: Vec<String>,
}

impl BackendRoute {
    pub fn new(
        service_id: ServiceId,
        target_port: u16,
        health_check: HealthCheck,
        path_patterns: Vec<String>,
    ) -> Self {
        Self { service_id, target_port, health_check, path_patterns }
    }

    /// Every pattern this route matches: each path followed by its
    /// sub-path wildcard, in registration order.
    pub fn expanded_patterns(&self) -> Vec<String> {
        let exact = self.path_patterns.iter().cloned();
        let wildcards = self.path_patterns.iter().map(|p| sub_path_pattern(p));
        exact.chain(wildcards).collect()
    }

    /// Validate the route before any rule is allocated for it
    pub fn validate(&self) -> Result<()> {
        if self.path_patterns.is_empty() {
            return Err(EdgeplaneError::validation_field(
                format!("service '{}' has no path patterns", self.service_id),
                "path_patterns",
            ));
        }

        if self.target_port == 0 {
            return Err(EdgeplaneError::validation_field(
                format!("service '{}' has target port 0", self.service_id),
                "target_port",
            ));
        }

        if !self.health_check.path.starts_with('/') {
            return Err(EdgeplaneError::validation_field(
                format!(
                    "service '{}' health check path '{}' must start with '/'",
                    self.service_id, self.health_check.path
                ),
                "health_check.path",
            ));
        }

        let mut seen = HashSet::new();
        for pattern in self.expanded_patterns() {
            if !pattern.starts_with('/') || pattern.chars().any(char::is_whitespace) {
                return Err(EdgeplaneError::validation_field(
                    format!(
                        "service '{}' path pattern '{}' must start with '/' and contain no whitespace",
                        self.service_id, pattern
                    ),
                    "path_patterns",
                ));
            }
            if pattern.len() > MAX_PATH_PATTERN_LENGTH {
                return Err(EdgeplaneError::validation_field(
                    format!(
                        "service '{}' path pattern '{}' exceeds {} characters",
                        self.service_id, pattern, MAX_PATH_PATTERN_LENGTH
                    ),
                    "path_patterns",
                ));
            }
            if !seen.insert(pattern.clone()) {
                return Err(EdgeplaneError::validation_field(
                    format!(
                        "service '{}' path pattern '{}' is listed more than once",
                        self.service_id, pattern
                    ),
                    "path_patterns",
                ));
            }
        }

        Ok(())
    }
}

/// Wildcard pattern covering everything below `path`.
fn sub_path_pattern(path: &str) -> String {
    if path.ends_with('/') {
        format!("{}*", path)
    } else {
        format!("{}/*", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(paths: &[&str]) -> BackendRoute {
        BackendRoute::new(
            ServiceId::new("Api").unwrap(),
            5001,
            HealthCheck::http("/health"),
            paths.iter().map(|p| p.to_string()).collect(),
        )
    }

    #[test]
    fn expansion_puts_exact_paths_first() {
        let r = route(&["/console/api", "/api"]);
        assert_eq!(r.expanded_patterns(), vec!["/console/api", "/api", "/console/api/*", "/api/*"]);
    }

    #[test]
    fn expansion_of_root() {
        let r = route(&["/"]);
        assert_eq!(r.expanded_patterns(), vec!["/", "/*"]);
    }

    #[test]
    fn zero_patterns_rejected() {
        let err = route(&[]).validate().unwrap_err();
        assert!(err.to_string().contains("no path patterns"));
    }

    #[test]
    fn relative_pattern_rejected() {
        assert!(route(&["api"]).validate().is_err());
    }

    #[test]
    fn overlong_pattern_rejected() {
        let long = format!("/{}", "a".repeat(MAX_PATH_PATTERN_LENGTH));
        assert!(route(&[long.as_str()]).validate().is_err());
    }

    #[test]
    fn repeated_path_rejected() {
        let err = route(&["/a", "/b", "/a"]).validate().unwrap_err();
        assert!(err.to_string().contains("'/a' is listed more than once"));
    }

    #[test]
    fn wildcard_colliding_with_expansion_rejected() {
        // "/a" already expands to "/a/*"
        let err = route(&["/a", "/a/*"]).validate().unwrap_err();
        match err {
            EdgeplaneError::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("path_patterns"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn zero_port_rejected() {
        let mut r = route(&["/api"]);
        r.target_port = 0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn profile_fills_only_missing_fields() {
        let check = HealthCheck::http("/health").with_interval(5);
        let resolved = HealthCheckProfile::fronted().resolve(&check);
        assert_eq!(resolved.interval_seconds, 5);
        assert_eq!(resolved.unhealthy_threshold, 6);
        assert_eq!(resolved.healthy_threshold, 2);
        assert_eq!(resolved.healthy_http_codes, "200-299,307");
    }

    #[test]
    fn direct_profile_defaults() {
        let resolved = HealthCheckProfile::direct().resolve(&HealthCheck::http("/"));
        assert_eq!(resolved.interval_seconds, 30);
        assert_eq!(resolved.unhealthy_threshold, 10);
    }

    #[test]
    fn service_overrides_win_over_profile() {
        let check = HealthCheck::http("/health")
            .with_thresholds(3, 4)
            .with_healthy_http_codes("200");
        let resolved = HealthCheckProfile::direct().resolve(&check);
        assert_eq!(resolved.healthy_threshold, 3);
        assert_eq!(resolved.unhealthy_threshold, 4);
        assert_eq!(resolved.healthy_http_codes, "200");
        assert_eq!(resolved.interval_seconds, 30);
    }
}
