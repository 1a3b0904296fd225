//! Domain layer
//!
//! Pure values describing what a deployment wants from its network edge,
//! with no knowledge of how those wishes are turned into resources.
//!
//! ## Module Organization
//!
//! - `id`: Type-safe logical identifiers with NewType pattern
//! - `network`: CIDR ranges for allow-lists
//! - `policy`: Access policy (IP and country allow-lists)
//! - `route`: Backend routes and their health checks

pub mod id;
pub mod network;
pub mod policy;
pub mod route;

pub use id::{LogicalId, ServiceId};
pub use network::{Cidr, IpVersion};
pub use policy::{AccessPolicy, CountryCode};
pub use route::{
    BackendRoute, HealthCheck, HealthCheckProfile, ResolvedHealthCheck, MAX_PATH_PATTERN_LENGTH,
};
