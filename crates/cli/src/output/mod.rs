//! Output formatters (§6) — the CLI's only presentation-layer concern.
//! `mantic-core` returns a plain [`mantic_core::SearchResult`]; everything
//! below turns it into bytes for a terminal or an agent.

mod json;
mod list;
mod markdown;
mod mcp_format;

pub use mcp_format::content_blocks;

use mantic_core::SearchResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Files,
    Markdown,
    Mcp,
}

pub fn render(format: OutputFormat, result: &SearchResult, quiet: bool) -> String {
    match format {
        OutputFormat::Json => json::render(result),
        OutputFormat::Files => list::render(result, quiet),
        OutputFormat::Markdown => markdown::render(result),
        OutputFormat::Mcp => mcp_format::render(result),
    }
}
