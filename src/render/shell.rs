//! Built-in document shell renderer.
//!
//! Emits a minimal HTML document that embeds the layout data and view bag as
//! a JSON state block for a client-side application to hydrate from. Used by
//! the binary when no application renderer is linked in.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::render::{AppRenderer, RenderCompletion, RenderResult};

/// Element ID of the embedded state block.
pub const STATE_ELEMENT_ID: &str = "__JSS_STATE__";

/// Renders an HTML shell around the serialized layout data.
#[derive(Debug, Clone)]
pub struct DocumentShellRenderer {
    app_script: Option<String>,
}

impl DocumentShellRenderer {
    pub fn new() -> Self {
        Self { app_script: None }
    }

    /// Reference a client bundle from the generated document.
    pub fn with_app_script(mut self, src: impl Into<String>) -> Self {
        self.app_script = Some(src.into());
        self
    }

    fn document(&self, layout_data: &Value, view_bag: &Value) -> Result<String, serde_json::Error> {
        let route = &layout_data["sitecore"]["route"];
        let title = route["displayName"]
            .as_str()
            .or_else(|| route["name"].as_str())
            .unwrap_or_default();
        let lang = layout_data["sitecore"]["context"]["language"]
            .as_str()
            .unwrap_or("en");

        let state = serde_json::to_string(&json!({
            "layoutData": layout_data,
            "viewBag": view_bag,
        }))?;

        let script = self
            .app_script
            .as_deref()
            .map(|src| format!("<script src=\"{}\" defer></script>", escape_html(src)))
            .unwrap_or_default();

        Ok(format!(
            "<!DOCTYPE html>\n<html lang=\"{lang}\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{title}</title>\n{script}\n</head>\n<body>\n<div id=\"root\"></div>\n\
             <script type=\"application/json\" id=\"{STATE_ELEMENT_ID}\">{state}</script>\n\
             </body>\n</html>\n",
            lang = escape_html(lang),
            title = escape_html(title),
            state = escape_script_json(&state),
        ))
    }
}

impl Default for DocumentShellRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl AppRenderer for DocumentShellRenderer {
    fn render(
        &self,
        completion: RenderCompletion,
        _route: String,
        layout_data: Arc<Value>,
        view_bag: Value,
    ) {
        match self.document(&layout_data, &view_bag) {
            Ok(html) => completion.ok(RenderResult::html(html)),
            Err(e) => completion.fail(e),
        }
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// JSON inside a script element must not be able to close it.
fn escape_script_json(json: &str) -> String {
    json.replace("</", "<\\/").replace("<!--", "<\\!--")
}
