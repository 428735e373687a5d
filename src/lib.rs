//! Layout rendering proxy library.
//!
//! Sits in front of a headless content service, rewrites application routes
//! into layout service calls, and turns the JSON layout responses into
//! passthrough bytes, transformed JSON, or server-rendered HTML.

pub mod config;
pub mod error;
pub mod hooks;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod render;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use config::ResolvedConfig;
pub use error::{ConfigurationError, HookError, ProxyError};
pub use hooks::{HookContext, ProxyHooks};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{ErrorResponseOverride, ResponseInfo};
pub use render::{AppRenderer, DocumentShellRenderer, RenderCompletion, RenderResult};
pub use routing::{classify, Classification, RouteRewriteResult};
