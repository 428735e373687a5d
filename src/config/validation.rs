//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, size limit > 0)
//! - Check the upstream host is usable by the plain-HTTP client
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a deserialized configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match url::Url::parse(&config.upstream.api_host) {
        Ok(url) if url.scheme() != "http" => errors.push(ValidationError::new(
            "upstream.api_host",
            format!("scheme '{}' is not supported, use http", url.scheme()),
        )),
        Ok(url) if url.host_str().is_none() => errors.push(ValidationError::new(
            "upstream.api_host",
            "must include a host",
        )),
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new(
            "upstream.api_host",
            format!("'{}' is not a URL: {}", config.upstream.api_host, e),
        )),
    }

    if !config.upstream.layout_service_route.starts_with('/') {
        errors.push(ValidationError::new(
            "upstream.layout_service_route",
            "must start with '/'",
        ));
    }

    if config.upstream.api_key.trim().is_empty() {
        errors.push(ValidationError::new("upstream.api_key", "must not be empty"));
    }

    if config.limits.max_response_size_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.max_response_size_bytes",
            "must be greater than zero",
        ));
    }

    for (field, value) in [
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("timeouts.render_secs", config.timeouts.render_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
