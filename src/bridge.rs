//! Node bridge. Renders JSON schemas with the reference renderer.

use napi_derive::napi;

use crate::config::InterpreterConfig;
use crate::error::Error;
use crate::renderer::NoComponents;
use crate::tree::TreeRenderer;
use crate::view::SchemaView;

fn to_napi(err: Error) -> napi::Error {
    napi::Error::from_reason(err.to_string())
}

fn mount(schema_json: &str, config_json: Option<&str>) -> napi::Result<SchemaView<TreeRenderer>> {
    let config = match config_json {
        Some(json) => InterpreterConfig::from_json(json).map_err(to_napi)?,
        None => InterpreterConfig::default(),
    };
    SchemaView::from_json(schema_json, TreeRenderer, NoComponents, config).map_err(to_napi)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[napi]
pub fn interpreter_bridge() -> String {
    "Schema Interpreter Native Bridge Connected".to_string()
}

/// Renders `schema_json` once and returns the rendered tree as JSON
/// (`null` when the root is omitted).
#[napi]
pub fn render_schema_native(schema_json: String, config_json: Option<String>) -> napi::Result<String> {
    let view = mount(&schema_json, config_json.as_deref())?;
    let tree = view.render().map_err(to_napi)?;
    serde_json::to_string(&tree)
        .map_err(|e| napi::Error::from_reason(format!("Serialize error: {}", e)))
}

/// Renders `schema_json` once and returns its markup.
#[napi]
pub fn render_schema_html_native(
    schema_json: String,
    config_json: Option<String>,
) -> napi::Result<String> {
    let view = mount(&schema_json, config_json.as_deref())?;
    Ok(view
        .render()
        .map_err(to_napi)?
        .map(|node| node.to_html())
        .unwrap_or_default())
}
