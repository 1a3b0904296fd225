//! Listener rule planning
//!
//! Several backend services share one listener. Each service gets one
//! target group and as many path-pattern rules as its patterns need, with
//! priorities issued in registration order.

use serde::Serialize;
use tracing::debug;

use super::batch::{batch, batch_count, MAX_CONDITION_VALUES};
use super::priority::{Priority, PriorityAllocator};
use super::resources::{ListenerRule, Protocol, Resource, TargetGroup};
use crate::domain::{BackendRoute, HealthCheckProfile, LogicalId, ServiceId};
use crate::errors::{EdgeplaneError, Result};

/// Non-default rules a single listener may hold
pub const MAX_RULES_PER_LISTENER: usize = 100;

/// Seconds a deregistering target keeps receiving in-flight requests
pub const DEREGISTRATION_DELAY_SECONDS: u64 = 10;

/// One listener rule forwarding a batch of patterns to a target group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleBatch {
    pub logical_id: LogicalId,
    pub service_id: ServiceId,
    pub priority: Priority,
    pub path_patterns: Vec<String>,
    pub target_group: LogicalId,
}

/// Where the compute layer attaches a service's running instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetGroupBinding {
    pub service_id: ServiceId,
    pub target_group: LogicalId,
    pub port: u16,
}

/// Plans rules for every service registered on one listener.
#[derive(Debug)]
pub struct ListenerRulePlanner {
    listener: LogicalId,
    allocator: PriorityAllocator,
    health_profile: HealthCheckProfile,
    target_group_suffix: String,
    target_groups: Vec<TargetGroup>,
    rules: Vec<RuleBatch>,
    claimed: Vec<(ServiceId, String)>,
}

impl ListenerRulePlanner {
    pub fn new(listener: LogicalId, health_profile: HealthCheckProfile) -> Self {
        Self {
            listener,
            allocator: PriorityAllocator::new(),
            health_profile,
            target_group_suffix: "TargetGroup".to_string(),
            target_groups: Vec::new(),
            rules: Vec::new(),
            claimed: Vec::new(),
        }
    }

    /// Suffix appended to service ids to name their target groups
    pub fn with_target_group_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.target_group_suffix = suffix.into();
        self
    }

    /// Register a service: one target group plus one rule per batch of
    /// patterns. Nothing is recorded if the route is rejected.
    pub fn add_service(&mut self, route: &BackendRoute) -> Result<TargetGroupBinding> {
        route.validate()?;

        if self.target_groups.iter().any(|tg| tg.service_id == route.service_id) {
            return Err(EdgeplaneError::constraint(format!(
                "service '{}' is already registered on listener '{}'",
                route.service_id, self.listener
            )));
        }

        let patterns = route.expanded_patterns();
        self.check_overlap(&route.service_id, &patterns)?;

        let needed = batch_count(patterns.len(), MAX_CONDITION_VALUES);
        if self.rules.len() + needed > MAX_RULES_PER_LISTENER {
            return Err(EdgeplaneError::constraint(format!(
                "service '{}' needs {} rules but listener '{}' has room for {}",
                route.service_id,
                needed,
                self.listener,
                MAX_RULES_PER_LISTENER - self.rules.len()
            )));
        }
        if needed as u64 > u64::from(self.allocator.remaining()) {
            return Err(EdgeplaneError::constraint(format!(
                "listener '{}' has no priorities left for service '{}'",
                self.listener, route.service_id
            )));
        }

        let target_group_id = route.service_id.logical(&self.target_group_suffix)?;
        let rule_ids = (0..needed)
            .map(|i| route.service_id.logical(&format!("Rule{}", i)))
            .collect::<Result<Vec<_>>>()?;

        let target_group = TargetGroup {
            logical_id: target_group_id.clone(),
            service_id: route.service_id.clone(),
            protocol: Protocol::Http,
            port: route.target_port,
            deregistration_delay_seconds: DEREGISTRATION_DELAY_SECONDS,
            health_check: self.health_profile.resolve(&route.health_check),
        };

        for (logical_id, path_patterns) in
            rule_ids.into_iter().zip(batch(&patterns, MAX_CONDITION_VALUES)?)
        {
            let priority = self.allocator.next()?;
            debug!(
                listener = %self.listener,
                service = %route.service_id,
                priority = priority.get(),
                patterns = ?path_patterns,
                "planned listener rule"
            );
            self.rules.push(RuleBatch {
                logical_id,
                service_id: route.service_id.clone(),
                priority,
                path_patterns,
                target_group: target_group_id.clone(),
            });
        }

        self.claimed.extend(patterns.into_iter().map(|p| (route.service_id.clone(), p)));
        self.target_groups.push(target_group);

        Ok(TargetGroupBinding {
            service_id: route.service_id.clone(),
            target_group: target_group_id,
            port: route.target_port,
        })
    }

    /// Reject patterns that an earlier service already matches in full.
    ///
    /// Earlier rules win, so a later pattern equal to or inside an earlier
    /// wildcard would never receive traffic. A later, broader pattern is
    /// fine: it only catches what earlier rules left over.
    fn check_overlap(&self, service: &ServiceId, patterns: &[String]) -> Result<()> {
        for pattern in patterns {
            let shadowing = self
                .claimed
                .iter()
                .find(|(owner, earlier)| owner != service && pattern_covers(earlier, pattern));
            if let Some((owner, earlier)) = shadowing {
                return Err(EdgeplaneError::constraint(format!(
                    "path pattern '{}' of service '{}' is already matched by '{}' of service '{}'",
                    pattern, service, earlier, owner
                )));
            }
        }
        Ok(())
    }

    pub fn rules(&self) -> &[RuleBatch] {
        &self.rules
    }

    pub fn target_groups(&self) -> &[TargetGroup] {
        &self.target_groups
    }

    /// Target groups followed by rules, in registration order
    pub fn into_resources(self) -> Vec<Resource> {
        let listener = self.listener;
        let groups = self.target_groups.into_iter().map(Resource::TargetGroup);
        let rules = self.rules.into_iter().map(|rule| {
            Resource::ListenerRule(ListenerRule {
                logical_id: rule.logical_id,
                listener: listener.clone(),
                priority: rule.priority.get(),
                path_patterns: rule.path_patterns,
                target_group: rule.target_group,
            })
        });
        groups.chain(rules).collect()
    }
}

/// Whether every path matched by `later` is also matched by `earlier`.
///
/// Only a trailing `*` is treated as a wildcard. A `?` or an interior `*`
/// is compared literally, so such patterns only collide when they are
/// equal; overlaps they would cause are not detected.
pub fn pattern_covers(earlier: &str, later: &str) -> bool {
    if earlier == later {
        return true;
    }
    match earlier.strip_suffix('*') {
        Some(prefix) => later.starts_with(prefix),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HealthCheck;

    fn route(id: &str, port: u16, paths: &[&str]) -> BackendRoute {
        BackendRoute::new(
            ServiceId::new(id).unwrap(),
            port,
            HealthCheck::http("/health"),
            paths.iter().map(|p| p.to_string()).collect(),
        )
    }

    fn planner() -> ListenerRulePlanner {
        ListenerRulePlanner::new(LogicalId::new("AlbListener").unwrap(), HealthCheckProfile::direct())
    }

    fn priorities(planner: &ListenerRulePlanner, service: &str) -> Vec<u32> {
        planner
            .rules()
            .iter()
            .filter(|r| r.service_id.as_str() == service)
            .map(|r| r.priority.get())
            .collect()
    }

    #[test]
    fn one_target_group_per_service() {
        let mut planner = planner();
        let binding = planner.add_service(&route("Api", 5001, &["/a", "/b", "/c"])).unwrap();
        assert_eq!(binding.target_group.as_str(), "ApiTargetGroup");
        assert_eq!(binding.port, 5001);
        assert_eq!(planner.target_groups().len(), 1);
        // 6 patterns -> two rules, both forwarding to the same group
        assert_eq!(planner.rules().len(), 2);
        assert!(planner.rules().iter().all(|r| r.target_group.as_str() == "ApiTargetGroup"));
        assert_eq!(planner.rules()[0].path_patterns, vec!["/a", "/b", "/c", "/a/*", "/b/*"]);
        assert_eq!(planner.rules()[1].path_patterns, vec!["/c/*"]);
    }

    #[test]
    fn priorities_follow_registration_order() {
        let mut planner = planner();
        planner.add_service(&route("Api", 5001, &["/console/api", "/api", "/v1", "/files"])).unwrap();
        planner.add_service(&route("Extension", 5002, &["/e"])).unwrap();
        planner.add_service(&route("Web", 3000, &["/"])).unwrap();

        assert_eq!(priorities(&planner, "Api"), vec![1, 2]);
        assert_eq!(priorities(&planner, "Extension"), vec![3]);
        assert_eq!(priorities(&planner, "Web"), vec![4]);
    }

    #[test]
    fn zero_patterns_rejected_before_allocation() {
        let mut planner = planner();
        assert!(planner.add_service(&route("Api", 5001, &[])).is_err());
        planner.add_service(&route("Web", 3000, &["/"])).unwrap();
        assert_eq!(priorities(&planner, "Web"), vec![1]);
    }

    #[test]
    fn duplicate_service_rejected() {
        let mut planner = planner();
        planner.add_service(&route("Api", 5001, &["/api"])).unwrap();
        assert!(planner.add_service(&route("Api", 5001, &["/v2"])).is_err());
    }

    #[test]
    fn shadowed_pattern_rejected_without_allocating() {
        let mut planner = planner();
        planner.add_service(&route("Web", 3000, &["/"])).unwrap();
        let err = planner.add_service(&route("Api", 5001, &["/api"])).unwrap_err();
        assert!(err.to_string().contains("already matched by '/*'"));
        assert_eq!(planner.rules().len(), 1);
        assert_eq!(planner.target_groups().len(), 1);
    }

    #[test]
    fn broader_later_pattern_allowed() {
        let mut planner = planner();
        planner.add_service(&route("Api", 5001, &["/api"])).unwrap();
        assert!(planner.add_service(&route("Web", 3000, &["/"])).is_ok());
    }

    #[test]
    fn exact_duplicate_across_services_rejected() {
        let mut planner = planner();
        planner.add_service(&route("Api", 5001, &["/files"])).unwrap();
        assert!(planner.add_service(&route("Storage", 5003, &["/files"])).is_err());
    }

    #[test]
    fn listener_rule_limit() {
        let mut planner = planner();
        let paths: Vec<String> = (0..251).map(|i| format!("/p{}", i)).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        // 502 patterns -> 101 rules
        let err = planner.add_service(&route("Api", 5001, &refs)).unwrap_err();
        assert!(matches!(err, EdgeplaneError::Constraint { .. }));
        assert!(planner.rules().is_empty());
    }

    #[test]
    fn health_profile_applied_once_per_group() {
        let mut planner = ListenerRulePlanner::new(
            LogicalId::new("AlbListener").unwrap(),
            HealthCheckProfile::fronted(),
        )
        .with_target_group_suffix("TargetGroupInternal");
        planner.add_service(&route("Api", 5001, &["/a", "/b", "/c"])).unwrap();

        let group = &planner.target_groups()[0];
        assert_eq!(group.logical_id.as_str(), "ApiTargetGroupInternal");
        assert_eq!(group.health_check.interval_seconds, 20);
        assert_eq!(group.health_check.unhealthy_threshold, 6);
        assert_eq!(group.deregistration_delay_seconds, 10);
    }

    #[test]
    fn into_resources_orders_groups_then_rules() {
        let mut planner = planner();
        planner.add_service(&route("Api", 5001, &["/api"])).unwrap();
        planner.add_service(&route("Web", 3000, &["/"])).unwrap();
        let kinds: Vec<&str> = planner.into_resources().iter().map(Resource::kind).collect();
        assert_eq!(kinds, vec!["TargetGroup", "TargetGroup", "ListenerRule", "ListenerRule"]);
    }

    #[test]
    fn covers() {
        assert!(pattern_covers("/api", "/api"));
        assert!(pattern_covers("/*", "/api"));
        assert!(pattern_covers("/api/*", "/api/v1/*"));
        assert!(!pattern_covers("/api/*", "/api"));
        assert!(!pattern_covers("/api", "/api/*"));
    }

    #[test]
    fn interior_wildcards_compare_literally() {
        assert!(pattern_covers("/a*/b", "/a*/b"));
        assert!(!pattern_covers("/a*/b", "/ab/b"));
        assert!(!pattern_covers("/a?", "/ab"));
        assert!(pattern_covers("/a?*", "/a?/x"));
    }

    #[test]
    fn repeated_pattern_allocates_nothing() {
        let mut planner = planner();
        let err = planner.add_service(&route("Api", 5001, &["/api", "/api"])).unwrap_err();
        assert!(matches!(err, EdgeplaneError::Validation { .. }));
        assert!(planner.rules().is_empty());
        assert!(planner.target_groups().is_empty());

        planner.add_service(&route("Web", 3000, &["/"])).unwrap();
        assert_eq!(priorities(&planner, "Web"), vec![1]);
    }

    #[test]
    fn service_thresholds_reach_target_group() {
        let mut planner = planner();
        let custom = BackendRoute::new(
            ServiceId::new("Api").unwrap(),
            5001,
            HealthCheck::http("/health").with_thresholds(5, 3).with_healthy_http_codes("200,204"),
            vec!["/api".to_string()],
        );
        planner.add_service(&custom).unwrap();

        let check = &planner.target_groups()[0].health_check;
        assert_eq!(check.healthy_threshold, 5);
        assert_eq!(check.unhealthy_threshold, 3);
        assert_eq!(check.healthy_http_codes, "200,204");
        assert_eq!(check.interval_seconds, 30);
    }
}
