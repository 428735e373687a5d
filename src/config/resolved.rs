//! Resolved (normalized, immutable) configuration.
//!
//! Built exactly once at startup from the file config plus the registered
//! hooks, then shared as `Arc<ResolvedConfig>`. Nothing on the request path
//! mutates it.

use std::sync::Arc;
use std::time::Duration;

use axum::http::uri::{Authority, Scheme};
use axum::http::Uri;

use crate::config::schema::ProxyConfig;
use crate::error::ConfigurationError;
use crate::hooks::ProxyHooks;
use crate::routing::matcher::ExclusionRule;

/// Normalized view of the configuration used on the request path.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub upstream_scheme: Scheme,
    pub upstream_authority: Authority,
    /// Path of `api_host` without the trailing slash; prepended to every upstream path.
    pub upstream_path_prefix: String,
    pub layout_service_route: String,
    pub api_key: String,
    pub qs_params: Option<String>,
    /// The single exclusion mechanism, if any.
    pub exclusion: Option<ExclusionRule>,
    pub max_response_size_bytes: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub render_timeout: Duration,
    /// A layout data transform hook is registered.
    pub transforms_layout_data: bool,
}

impl ResolvedConfig {
    /// Normalize the configuration. Fails when both exclusion mechanisms are configured
    /// or when a limit or timeout is zero.
    pub fn resolve(config: &ProxyConfig, hooks: &ProxyHooks) -> Result<Self, ConfigurationError> {
        for (field, value) in [
            ("limits.max_response_size_bytes", config.limits.max_response_size_bytes as u64),
            ("timeouts.connect_secs", config.timeouts.connect_secs),
            ("timeouts.request_secs", config.timeouts.request_secs),
            ("timeouts.render_secs", config.timeouts.render_secs),
        ] {
            if value == 0 {
                return Err(ConfigurationError::ZeroLimit { field });
            }
        }

        let exclusion = match (&config.rewrite.exclude_routes, &hooks.exclude_predicate) {
            (Some(_), Some(_)) => return Err(ConfigurationError::ConflictingExclusionRules),
            (Some(routes), None) => Some(ExclusionRule::prefixes(routes)),
            (None, Some(predicate)) => Some(ExclusionRule::Predicate(Arc::clone(predicate))),
            (None, None) => None,
        };

        let api_host = &config.upstream.api_host;
        let invalid_host = |reason: String| ConfigurationError::InvalidApiHost {
            host: api_host.clone(),
            reason,
        };
        let uri: Uri = api_host.parse().map_err(|e| invalid_host(format!("{e}")))?;
        let upstream_authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| invalid_host("missing host".to_string()))?;
        let upstream_scheme = uri.scheme().cloned().unwrap_or(Scheme::HTTP);
        let upstream_path_prefix = uri.path().trim_end_matches('/').to_string();

        let qs_params = config
            .upstream
            .qs_params
            .as_deref()
            .map(|qs| qs.trim_start_matches(['?', '&']))
            .filter(|qs| !qs.is_empty())
            .map(str::to_string);

        Ok(Self {
            upstream_scheme,
            upstream_authority,
            upstream_path_prefix,
            layout_service_route: config.upstream.layout_service_route.clone(),
            api_key: config.upstream.api_key.clone(),
            qs_params,
            exclusion,
            max_response_size_bytes: config.limits.max_response_size_bytes,
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            render_timeout: Duration::from_secs(config.timeouts.render_secs),
            transforms_layout_data: hooks.transforms_layout_data(),
        })
    }

    /// True if the decoded URL matches the configured exclusion rule.
    pub fn is_excluded(&self, decoded_url: &str) -> bool {
        self.exclusion
            .as_ref()
            .is_some_and(|rule| rule.matches(decoded_url))
    }
}
