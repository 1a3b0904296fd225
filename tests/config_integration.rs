//! Integration tests for configuration management
//!
//! These tests validate that configuration is read from YAML files and
//! `EDGEPLANE__` environment variables, and that conflicting options are
//! rejected before any plan is built.

use edgeplane::{load_config, EdgeplaneError, Result};
use std::env;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

// Use a mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn test_environment_overrides_file() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);

    let file = yaml_file("network:\n  use_cdn: true\nregion: eu-west-1\n");

    env::set_var("EDGEPLANE__NETWORK__USE_CDN", "false");
    env::set_var("EDGEPLANE__ACCESS__ALLOWED_IPV4_CIDRS", "10.0.0.0/8,192.168.0.0/16");
    let result = load_config(Some(file.path()));
    env::remove_var("EDGEPLANE__NETWORK__USE_CDN");
    env::remove_var("EDGEPLANE__ACCESS__ALLOWED_IPV4_CIDRS");

    let config = result?;
    assert_eq!(config.region, "eu-west-1");
    assert!(!config.network.use_cdn);
    assert_eq!(
        config.access.allowed_ipv4_cidrs,
        Some(vec!["10.0.0.0/8".to_string(), "192.168.0.0/16".to_string()])
    );
    config.validate()?;

    Ok(())
}

#[test]
fn test_sub_domain_without_domain_is_conflict() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);

    let file = yaml_file("domain:\n  sub_domain: dify\n");
    let config = load_config(Some(file.path())).unwrap();

    let err = config.validate().unwrap_err();
    assert!(matches!(err, EdgeplaneError::Conflict { .. }));
    assert!(err.to_string().contains("'domain.sub_domain' and 'domain.domain_name'"));
    assert!(!err.is_retryable());
}

#[test]
fn test_imported_vpc_conflicts() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);

    let file = yaml_file("network:\n  vpc_id: vpc-123\n  use_nat_instance: true\n");
    let err = load_config(Some(file.path())).unwrap().validate().unwrap_err();
    assert!(err.to_string().contains("network.use_nat_instance"));
}

#[test]
fn test_cdn_with_internal_alb_is_conflict() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);

    let file = yaml_file("network:\n  internal_alb: false\n");
    let err = load_config(Some(file.path())).unwrap().validate().unwrap_err();
    assert!(err.to_string().contains("network.internal_alb"));
}

#[test]
fn test_malformed_entries_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);

    let file = yaml_file("access:\n  allowed_ipv4_cidrs:\n    - 2001:db8::/32\n");
    let err = load_config(Some(file.path())).unwrap().validate().unwrap_err();
    assert!(matches!(err, EdgeplaneError::Validation { .. }));

    let file = yaml_file("access:\n  allowed_country_codes:\n    - usa\n");
    let err = load_config(Some(file.path())).unwrap().validate().unwrap_err();
    assert!(matches!(err, EdgeplaneError::Validation { .. }));
}

#[test]
fn test_malformed_yaml_is_config_error() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);

    let file = yaml_file("network: [unclosed\n");
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(matches!(err, EdgeplaneError::Config { .. }));
}
