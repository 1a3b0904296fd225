//! # Configuration Management
//!
//! Loads an [`EdgeConfig`] from an optional YAML file layered with
//! `EDGEPLANE__`-prefixed environment variables, e.g.
//! `EDGEPLANE__NETWORK__USE_CDN=false` or
//! `EDGEPLANE__ACCESS__ALLOWED_IPV4_CIDRS=10.0.0.0/8,192.168.0.0/16`.

pub mod settings;

pub use settings::{
    AccessConfig, DomainConfig, EdgeConfig, LoadBalancerConfig, NetworkConfig,
    ObservabilityConfig, DEFAULT_SUB_DOMAIN,
};

use std::path::Path;

use crate::errors::Result;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "EDGEPLANE";

const LIST_KEYS: [&str; 3] = [
    "access.allowed_ipv4_cidrs",
    "access.allowed_ipv6_cidrs",
    "access.allowed_country_codes",
];

/// Load configuration from `path` (if it exists) and the environment.
///
/// The returned configuration is not validated; call
/// [`EdgeConfig::validate`] before using it.
pub fn load_config(path: Option<&Path>) -> Result<EdgeConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    let mut environment = config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",");
    for key in LIST_KEYS {
        environment = environment.with_list_parse_key(key);
    }

    let settings = builder.add_source(environment).build()?;
    let config: EdgeConfig = settings.try_deserialize()?;

    tracing::debug!(
        path = ?path,
        region = %config.region,
        use_cdn = config.network.use_cdn,
        "loaded edge configuration"
    );

    Ok(config)
}
