//! Server-side rendering strategy.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{ProxyError, ProxyResult};
use crate::hooks::{HookContext, ProxyHooks};
use crate::pipeline::ResponseInfo;
use crate::render::{render_app, AppRenderer, RenderOutput};

/// Render the app and apply the `transform_ssr_content` hook to the HTML.
pub async fn response_info(
    layout_data: Value,
    ctx: &HookContext,
    renderer: &dyn AppRenderer,
    hooks: &ProxyHooks,
    render_timeout: Duration,
) -> ProxyResult<ResponseInfo> {
    let RenderOutput {
        result,
        status_code,
        headers,
    } = render_app(Arc::new(layout_data), ctx, renderer, hooks, render_timeout).await?;

    let content = match &hooks.transform_ssr_content {
        Some(transform) => transform(result, ctx.clone())
            .await
            .map_err(|e| ProxyError::hook("transform_ssr_content", e))?,
        None => result.html,
    };

    Ok(ResponseInfo {
        content,
        status_code,
        headers,
    })
}
