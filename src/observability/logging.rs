//! # Structured Logging
//!
//! Logging setup and span macros built on the tracing ecosystem.
//!
//! `RUST_LOG` always wins over the configured level so a single run can be
//! made noisier without touching the configuration file.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{EdgeConfig, ObservabilityConfig};
use crate::errors::{EdgeplaneError, Result};

/// Create a tracing span around one compilation of a deployment plan
#[macro_export]
macro_rules! plan_span {
    ($topology:expr) => {
        tracing::info_span!(
            "plan",
            topology = %$topology,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($topology:expr, $($field:tt)*) => {
        tracing::info_span!(
            "plan",
            topology = %$topology,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for synthesising a single stack
#[macro_export]
macro_rules! stack_span {
    ($stack:expr, $region:expr) => {
        tracing::debug_span!(
            "stack",
            stack = %$stack,
            region = %$region
        )
    };
    ($stack:expr, $region:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "stack",
            stack = %$stack,
            region = %$region,
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed or the level does not parse.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            EdgeplaneError::config_with_source(
                format!("Invalid log level '{}'", config.log_level),
                Box::new(e),
            )
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logging {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false).with_writer(std::io::stderr)).try_init()
    };

    installed.map_err(|e| {
        EdgeplaneError::config_with_source("Failed to install log subscriber", Box::new(e))
    })
}

/// Log configuration at startup
pub fn log_config_info(config: &EdgeConfig) {
    tracing::info!(
        region = %config.region,
        use_cdn = config.network.use_cdn,
        internal_alb = config.network.is_internal_alb(),
        custom_domain = config.domain.is_configured(),
        ipv4_ranges = config.access.allowed_ipv4_cidrs.as_ref().map_or(0, Vec::len),
        ipv6_ranges = config.access.allowed_ipv6_cidrs.as_ref().map_or(0, Vec::len),
        countries = config.access.allowed_country_codes.as_ref().map_or(0, Vec::len),
        "edgeplane configuration"
    );
}
