//! User-supplied hooks.
//!
//! Hooks are functions, so they are registered in code rather than in the
//! TOML config. Every hook is optional; the builder methods accept plain
//! closures and box them once.
//!
//! # Design Decisions
//! - Async hooks get owned snapshots (`HookContext`) and return `'static` futures
//! - `set_headers` is synchronous and the only hook allowed to mutate the outgoing head
//! - A failing hook returns `HookError`; the pipeline routes it to the error responder
//! - Strategy handlers replace a whole strategy and report `ProxyError` like the built-in ones

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};

use crate::config::ResolvedConfig;
use crate::error::{HookError, ProxyError, ProxyResult};
use crate::http::request::ParsedRequest;
use crate::http::response::{OutgoingResponse, ProxyResponseSnapshot, ServerResponseSnapshot};
use crate::pipeline::fallback::ErrorResponseOverride;
use crate::pipeline::ResponseInfo;
use crate::render::RenderResult;
use crate::routing::classifier::Classification;
use crate::routing::matcher::ExcludePredicate;
use crate::routing::rewriter::{RequestPathRewriter, RouteRewriteResult, RouteUrlParser};

/// Snapshots shared with async hooks.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub request: Arc<ParsedRequest>,
    pub proxy_response: Arc<ProxyResponseSnapshot>,
    pub server_response: Arc<ServerResponseSnapshot>,
}

pub type TransformLayoutDataFn =
    Arc<dyn Fn(Value, HookContext) -> BoxFuture<'static, Result<Value, HookError>> + Send + Sync>;

pub type CreateViewBagFn = Arc<
    dyn Fn(Arc<Value>, HookContext) -> BoxFuture<'static, Result<Map<String, Value>, HookError>>
        + Send
        + Sync,
>;

pub type TransformSsrContentFn =
    Arc<dyn Fn(RenderResult, HookContext) -> BoxFuture<'static, Result<String, HookError>> + Send + Sync>;

pub type SetHeadersFn = Arc<
    dyn Fn(&ParsedRequest, &mut OutgoingResponse, &ProxyResponseSnapshot) -> Result<(), HookError>
        + Send
        + Sync,
>;

pub type OnErrorFn = Arc<
    dyn Fn(
            Arc<ProxyError>,
            Arc<ProxyResponseSnapshot>,
        ) -> BoxFuture<'static, Result<ErrorResponseOverride, HookError>>
        + Send
        + Sync,
>;

/// Chooses the strategy for an upstream response.
pub type ResponseClassifierFn = Arc<
    dyn Fn(&ParsedRequest, &ProxyResponseSnapshot, &ResolvedConfig) -> Classification + Send + Sync,
>;

/// Builds the response for a buffered strategy from the (transformed) layout data.
pub type ResponseHandlerFn =
    Arc<dyn Fn(Value, HookContext) -> BoxFuture<'static, ProxyResult<ResponseInfo>> + Send + Sync>;

/// All optional hooks for one proxy instance.
#[derive(Clone, Default)]
pub struct ProxyHooks {
    pub(crate) exclude_predicate: Option<ExcludePredicate>,
    pub(crate) route_parser: Option<RouteUrlParser>,
    pub(crate) path_rewriter: Option<Arc<dyn RequestPathRewriter>>,
    pub(crate) transform_layout_data: Option<TransformLayoutDataFn>,
    pub(crate) create_view_bag: Option<CreateViewBagFn>,
    pub(crate) transform_ssr_content: Option<TransformSsrContentFn>,
    pub(crate) set_headers: Option<SetHeadersFn>,
    pub(crate) on_error: Option<OnErrorFn>,
    pub(crate) classify_response: Option<ResponseClassifierFn>,
    pub(crate) pipeable_handler: Option<SetHeadersFn>,
    pub(crate) layout_data_handler: Option<ResponseHandlerFn>,
    pub(crate) ssr_handler: Option<ResponseHandlerFn>,
}

impl ProxyHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide per URL whether to bypass rewriting. Mutually exclusive with `rewrite.exclude_routes`.
    pub fn exclude_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.exclude_predicate = Some(Arc::new(predicate));
        self
    }

    /// Translate an application route into a backend item route, language and extra query.
    pub fn parse_route_url<F>(mut self, parser: F) -> Self
    where
        F: Fn(&str) -> Result<Option<RouteRewriteResult>, HookError> + Send + Sync + 'static,
    {
        self.route_parser = Some(Arc::new(parser));
        self
    }

    /// Replace the default request path rewriter.
    pub fn path_rewriter<R>(mut self, rewriter: R) -> Self
    where
        R: RequestPathRewriter + 'static,
    {
        self.path_rewriter = Some(Arc::new(rewriter));
        self
    }

    /// Rewrite layout data once, for both layout-data responses and rendering.
    pub fn transform_layout_data<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Value, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HookError>> + Send + 'static,
    {
        self.transform_layout_data = Some(Arc::new(move |data, ctx| hook(data, ctx).boxed()));
        self
    }

    /// Add fields to the view bag handed to the renderer.
    pub fn create_view_bag<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<Value>, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Map<String, Value>, HookError>> + Send + 'static,
    {
        self.create_view_bag = Some(Arc::new(move |data, ctx| hook(data, ctx).boxed()));
        self
    }

    /// Rewrite the rendered HTML before it is written.
    pub fn transform_ssr_content<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RenderResult, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, HookError>> + Send + 'static,
    {
        self.transform_ssr_content = Some(Arc::new(move |result, ctx| hook(result, ctx).boxed()));
        self
    }

    /// Mutate the outgoing response head just before it is written.
    pub fn set_headers<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ParsedRequest, &mut OutgoingResponse, &ProxyResponseSnapshot) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.set_headers = Some(Arc::new(hook));
        self
    }

    /// Override status and/or content of error responses.
    pub fn on_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<ProxyError>, Arc<ProxyResponseSnapshot>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ErrorResponseOverride, HookError>> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |error, upstream| hook(error, upstream).boxed()));
        self
    }

    /// Replace the response classifier. `routing::classify` is the default decision.
    pub fn classify_response<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&ParsedRequest, &ProxyResponseSnapshot, &ResolvedConfig) -> Classification
            + Send
            + Sync
            + 'static,
    {
        self.classify_response = Some(Arc::new(classifier));
        self
    }

    /// Edit the head of a pipeable response before it is finalized and streamed.
    pub fn pipeable_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ParsedRequest, &mut OutgoingResponse, &ProxyResponseSnapshot) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.pipeable_handler = Some(Arc::new(handler));
        self
    }

    /// Replace the response built for transformable layout data requests.
    pub fn layout_data_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProxyResult<ResponseInfo>> + Send + 'static,
    {
        self.layout_data_handler = Some(Arc::new(move |data, ctx| handler(data, ctx).boxed()));
        self
    }

    /// Replace server-side rendering for render targets.
    pub fn ssr_handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Value, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProxyResult<ResponseInfo>> + Send + 'static,
    {
        self.ssr_handler = Some(Arc::new(move |data, ctx| handler(data, ctx).boxed()));
        self
    }

    /// True when a layout data transform is registered.
    pub fn transforms_layout_data(&self) -> bool {
        self.transform_layout_data.is_some()
    }
}

impl fmt::Debug for ProxyHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyHooks")
            .field("exclude_predicate", &self.exclude_predicate.is_some())
            .field("route_parser", &self.route_parser.is_some())
            .field("path_rewriter", &self.path_rewriter.is_some())
            .field("transform_layout_data", &self.transform_layout_data.is_some())
            .field("create_view_bag", &self.create_view_bag.is_some())
            .field("transform_ssr_content", &self.transform_ssr_content.is_some())
            .field("set_headers", &self.set_headers.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("classify_response", &self.classify_response.is_some())
            .field("pipeable_handler", &self.pipeable_handler.is_some())
            .field("layout_data_handler", &self.layout_data_handler.is_some())
            .field("ssr_handler", &self.ssr_handler.is_some())
            .finish()
    }
}
