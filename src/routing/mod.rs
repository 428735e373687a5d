//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request URL
//!     → matcher.rs (decode once, evaluate the exclusion rule)
//!     → rewriter.rs (backend path for the upstream call)
//!     → classifier.rs (strategy for the upstream response)
//! ```
//!
//! # Design Decisions
//! - Exclusion rules are resolved at startup, immutable at runtime
//! - No regex in hot path (prefix and substring matching only)
//! - Deterministic: same URL and config always yield the same path and strategy

pub mod classifier;
pub mod matcher;
pub mod rewriter;

pub use classifier::{classify, Classification};
pub use matcher::ExclusionRule;
pub use rewriter::{
    rewrite_request_path, DefaultPathRewriter, RequestPathRewriter, RouteRewriteResult,
    RouteUrlParser,
};
