//! # Edgeplane
//!
//! Edgeplane compiles a web application's network edge into declarative
//! resource descriptions for a provisioning engine: a load balancer whose
//! listener routes URL paths to several backend services, an optional CDN in
//! front of it, and IP and country allow-lists enforced either at the
//! listener or by a firewall attached to the CDN.
//!
//! ## Architecture
//!
//! ```text
//! EdgeConfig ──validate──▶ AccessPolicy ──▶ secondary stack (us-east-1)
//!                                               │ certificate / firewall
//!                                               ▼
//! BackendRoutes ─────────▶ Topology ──────▶ primary stack ──▶ DeploymentPlan
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use edgeplane::{default_backend_routes, DeploymentPlan, EdgeConfig, Result};
//!
//! fn main() -> Result<()> {
//!     let config = EdgeConfig::default();
//!     let plan = DeploymentPlan::assemble(&config, &default_backend_routes()?)?;
//!     println!("{}", plan.base_url);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod edge;
pub mod errors;
pub mod observability;

// Re-export commonly used types and traits
pub use config::{load_config, EdgeConfig};
pub use domain::{AccessPolicy, BackendRoute, HealthCheck, ServiceId};
pub use edge::{default_backend_routes, DeploymentPlan, Topology, TopologyKind};
pub use errors::{EdgeplaneError, Result};
pub use observability::init_logging;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
