//! Default backend registrations
//!
//! The application's three services, in the order their rules must be
//! evaluated. The API owns specific prefixes and comes first; the web
//! front-end owns the catch-all and comes last.

use crate::domain::{BackendRoute, HealthCheck, ServiceId};
use crate::errors::Result;

pub const API_PORT: u16 = 5001;
pub const EXTENSION_PORT: u16 = 5002;
pub const WEB_PORT: u16 = 3000;

pub fn api_route() -> Result<BackendRoute> {
    route("Api", API_PORT, "/health", &["/console/api", "/api", "/v1", "/files"])
}

pub fn extension_route() -> Result<BackendRoute> {
    route("Extension", EXTENSION_PORT, "/health/check", &["/e"])
}

pub fn web_route() -> Result<BackendRoute> {
    route("Web", WEB_PORT, "/", &["/"])
}

/// API, extension, web
pub fn default_backend_routes() -> Result<Vec<BackendRoute>> {
    Ok(vec![api_route()?, extension_route()?, web_route()?])
}

fn route(id: &str, port: u16, health_path: &str, paths: &[&str]) -> Result<BackendRoute> {
    Ok(BackendRoute::new(
        ServiceId::new(id)?,
        port,
        HealthCheck::http(health_path),
        paths.iter().map(|p| p.to_string()).collect(),
    ))
}
