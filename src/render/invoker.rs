//! Render invocation.
//!
//! Bridges layout data to an [`AppRenderer`], turns its completion into a
//! single `Result`, and derives the response status and headers.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use serde_json::{json, Value};

use crate::error::{ProxyError, ProxyResult};
use crate::hooks::{HookContext, ProxyHooks};
use crate::render::{AppRenderer, Completion, RenderCompletion, RenderResult};

const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// A validated render plus the response head derived from it.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub result: RenderResult,
    pub status_code: StatusCode,
    pub headers: HeaderMap,
}

/// Render the route for the current request.
///
/// The status preference is the renderer's status, then the upstream status.
pub async fn render_app(
    layout_data: Arc<Value>,
    ctx: &HookContext,
    renderer: &dyn AppRenderer,
    hooks: &ProxyHooks,
    render_timeout: Duration,
) -> ProxyResult<RenderOutput> {
    tracing::debug!(
        request_id = %ctx.request.request_id(),
        route = %ctx.request.url,
        "Rendering app"
    );

    let view_bag = build_view_bag(&layout_data, ctx, hooks).await?;

    let (completion, rx) = RenderCompletion::channel();
    renderer.render(completion, ctx.request.url.clone(), layout_data, view_bag);

    let completion = match tokio::time::timeout(render_timeout, rx).await {
        Ok(Ok(completion)) => completion,
        Ok(Err(_)) => {
            return Err(ProxyError::RenderContractViolation(
                "render function dropped its completion without calling it",
            ))
        }
        Err(_) => return Err(ProxyError::RenderTimeout(render_timeout.as_secs())),
    };

    let result = validate_completion(completion)?;
    finish_render(result, ctx.proxy_response.status)
}

/// Default view bag merged with the user hook's fields; user fields win.
async fn build_view_bag(
    layout_data: &Arc<Value>,
    ctx: &HookContext,
    hooks: &ProxyHooks,
) -> ProxyResult<Value> {
    let mut view_bag = json!({
        "statusCode": ctx.proxy_response.status.as_u16(),
        "dictionary": {},
    });

    if let Some(create_view_bag) = &hooks.create_view_bag {
        let custom = create_view_bag(Arc::clone(layout_data), ctx.clone())
            .await
            .map_err(|e| ProxyError::hook("create_view_bag", e))?;
        if let Value::Object(fields) = &mut view_bag {
            fields.extend(custom);
        }
    }

    Ok(view_bag)
}

fn validate_completion((error, result): Completion) -> ProxyResult<RenderResult> {
    match (error, result) {
        (None, None) => Err(ProxyError::RenderContractViolation(
            "render function did not return a result or an error",
        )),
        (Some(error), _) => Err(ProxyError::hook("render", error)),
        (None, Some(result)) if result.html.is_empty() => Err(ProxyError::RenderContractViolation(
            "render function returned a result but its html was empty",
        )),
        (None, Some(result)) => Ok(result),
    }
}

fn finish_render(mut result: RenderResult, upstream_status: StatusCode) -> ProxyResult<RenderOutput> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));

    if let Some(location) = result.redirect.as_deref().filter(|l| !l.is_empty()) {
        let location = HeaderValue::from_str(location).map_err(|_| {
            ProxyError::RenderContractViolation("render redirect is not a valid location header")
        })?;
        headers.insert(header::LOCATION, location);
        if result.status.is_none() {
            result.status = Some(StatusCode::FOUND.as_u16());
        }
    }

    let status_code = match result.status {
        Some(code) => StatusCode::from_u16(code).map_err(|_| {
            ProxyError::RenderContractViolation("render status is not a valid HTTP status code")
        })?,
        None => upstream_status,
    };

    Ok(RenderOutput {
        result,
        status_code,
        headers,
    })
}
