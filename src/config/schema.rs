//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.
//! Hooks (functions) are not part of the file format; see `crate::hooks`.

use serde::{Deserialize, Serialize};

/// Default upper bound for a buffered upstream body (10 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE_BYTES: usize = 10 * 1024 * 1024;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Backend content service settings.
    pub upstream: UpstreamConfig,

    /// Path rewrite exclusions.
    pub rewrite: RewriteConfig,

    /// Response buffering limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Backend content service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Host to proxy to (e.g., "http://cd.example.com").
    pub api_host: String,

    /// Path of the layout service endpoint on the upstream.
    pub layout_service_route: String,

    /// API key sent with every layout service request.
    pub api_key: String,

    /// Extra query string appended to layout service requests (e.g., "sc_site=mysite").
    pub qs_params: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_host: "http://localhost:8080".to_string(),
            layout_service_route: "/sitecore/api/layout/render/jss".to_string(),
            api_key: String::new(),
            qs_params: None,
        }
    }
}

/// Rewrite exclusion configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RewriteConfig {
    /// Route prefixes proxied without rewriting or rendering (case-insensitive).
    /// Mutually exclusive with an exclude predicate hook.
    pub exclude_routes: Option<Vec<String>>,
}

/// Buffering limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Upstream bodies larger than this are rejected.
    pub max_response_size_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_response_size_bytes: DEFAULT_MAX_RESPONSE_SIZE_BYTES,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Maximum time the renderer may take to complete, in seconds.
    pub render_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 60,
            render_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit proxy diagnostics (request/response heads, rewrite decisions) at debug level.
    pub debug: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
