//! Application rendering.
//!
//! # Data Flow
//! ```text
//! layout data (Arc<Value>) + view bag
//!     → AppRenderer::render(completion, route, data, view bag)
//!     → renderer calls RenderCompletion::complete exactly once (sync or from a task)
//!     → invoker.rs validates the completion and derives status + headers
//! ```
//!
//! # Design Decisions
//! - The completion token is consumed by value, so it cannot be called twice
//! - A token dropped without being called is a contract violation, not a hang
//! - The invoker bounds the wait with the configured render timeout

pub mod invoker;
pub mod shell;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::HookError;

pub use invoker::{render_app, RenderOutput};
pub use shell::DocumentShellRenderer;

/// What a renderer produces for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderResult {
    pub html: String,
    /// Status override; must be a valid HTTP status code.
    pub status: Option<u16>,
    /// Redirect target; implies 302 when `status` is unset.
    pub redirect: Option<String>,
}

impl RenderResult {
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_redirect(mut self, location: impl Into<String>) -> Self {
        self.redirect = Some(location.into());
        self
    }
}

/// Raw `(error, result)` pair as handed back by a renderer.
pub(crate) type Completion = (Option<HookError>, Option<RenderResult>);

/// Single-use completion handle given to a renderer.
#[derive(Debug)]
pub struct RenderCompletion {
    tx: oneshot::Sender<Completion>,
}

impl RenderCompletion {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Completion>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Report the outcome of a render. Supply an error, a result, or both (the error wins).
    pub fn complete(self, error: Option<HookError>, result: Option<RenderResult>) {
        // The receiver is gone only when the request was abandoned.
        if self.tx.send((error, result)).is_err() {
            tracing::debug!("Render completed after the request was abandoned");
        }
    }

    /// Report a successful render.
    pub fn ok(self, result: RenderResult) {
        self.complete(None, Some(result));
    }

    /// Report a failed render.
    pub fn fail(self, error: impl Into<HookError>) {
        self.complete(Some(error.into()), None);
    }
}

/// An application renderer.
///
/// `route` is the original request URL. Implementations may complete inline
/// or hand the completion to a spawned task.
pub trait AppRenderer: Send + Sync {
    fn render(
        &self,
        completion: RenderCompletion,
        route: String,
        layout_data: Arc<Value>,
        view_bag: Value,
    );
}

impl<F> AppRenderer for F
where
    F: Fn(RenderCompletion, String, Arc<Value>, Value) + Send + Sync,
{
    fn render(
        &self,
        completion: RenderCompletion,
        route: String,
        layout_data: Arc<Value>,
        view_bag: Value,
    ) {
        self(completion, route, layout_data, view_bag)
    }
}
