//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated)
//!     → resolved.rs (+ registered hooks: normalize once, reject conflicts)
//!     → Arc<ResolvedConfig> shared by every request
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Normalization happens once at startup, never on the request path

pub mod loader;
pub mod resolved;
pub mod schema;
pub mod validation;

pub use resolved::ResolvedConfig;
pub use schema::{
    LimitsConfig, ListenerConfig, ObservabilityConfig, ProxyConfig, RewriteConfig, TimeoutConfig,
    UpstreamConfig,
};
