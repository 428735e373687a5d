//! Response strategy classification.
//!
//! One ordered decision per request, evaluated against the decoded original URL:
//!
//! | Condition                                                   | Result                   |
//! |-------------------------------------------------------------|--------------------------|
//! | layout route in URL (case-insensitive) and transform hook   | `TransformableLayoutData` |
//! | URL matches the exclusion rule                              | `Pipeable`               |
//! | otherwise                                                   | `RenderTarget`           |

use std::fmt;

use crate::config::ResolvedConfig;
use crate::routing::matcher::decode_url;

/// How the upstream response for a request is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Streamed through untouched, apart from the common header pass.
    Pipeable,
    /// Layout data run through the transform hook and returned as JSON.
    TransformableLayoutData,
    /// Layout data rendered to HTML.
    RenderTarget,
}

impl Classification {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Pipeable => "pipeable",
            Classification::TransformableLayoutData => "layout_data",
            Classification::RenderTarget => "render",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a request by its original (client-facing, possibly encoded) URL.
pub fn classify(request_url: &str, config: &ResolvedConfig) -> Classification {
    let decoded = decode_url(request_url);

    if is_transformable_layout_request(&decoded, config) {
        Classification::TransformableLayoutData
    } else if config.is_excluded(&decoded) {
        Classification::Pipeable
    } else {
        Classification::RenderTarget
    }
}

/// True when the URL targets the layout service and a transform hook is registered.
pub fn is_transformable_layout_request(decoded_url: &str, config: &ResolvedConfig) -> bool {
    config.transforms_layout_data
        && decoded_url
            .to_lowercase()
            .contains(&config.layout_service_route.to_lowercase())
}
