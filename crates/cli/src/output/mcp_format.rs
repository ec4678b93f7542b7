//! Shared between the CLI's `--mcp` flag and [`crate::mcp_server`]'s tool
//! responses: wraps a [`SearchResult`] in the MCP `content` block shape.

use mantic_core::SearchResult;
use serde_json::{json, Value};

/// `{"content": [{"type": "text", "text": "<json>"}]}`, the shape an MCP
/// client expects back from a tool call.
pub fn content_blocks(result: &SearchResult) -> Value {
    let text = serde_json::to_string_pretty(result).unwrap_or_default();
    json!({ "content": [{ "type": "text", "text": text }] })
}

pub fn render(result: &SearchResult) -> String {
    serde_json::to_string_pretty(&content_blocks(result)).unwrap_or_default()
}
