//! Stdio JSON-RPC agent-protocol server (§6) — exposes the same core
//! pipeline the CLI uses, over newline-delimited JSON-RPC on stdin/stdout.
//! Hand-rolled dispatch, not an SDK: one request in, one response out,
//! notifications (no `id`) produce no reply.

use mantic_core::pipeline::{SearchOptions, TypeFilter};
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const PROTOCOL_VERSION: &str = "2024-11-05";

fn tool_definitions() -> Value {
    json!([
        {
            "name": "search_files",
            "description": "Rank repository files by structural relevance to a natural-language query",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "path": {"type": "string"},
                    "type_filter": {"type": "string", "enum": ["code", "config", "test"]},
                    "impact": {"type": "boolean"},
                    "session": {"type": "string"}
                },
                "required": ["query"]
            }
        },
        {
            "name": "analyze_intent",
            "description": "Classify a query's intent category and extract referenced entities",
            "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}
        },
        {
            "name": "session_start",
            "description": "Start a new search session",
            "inputSchema": {
                "type": "object",
                "properties": {"path": {"type": "string"}, "name": {"type": "string"}, "intent": {"type": "string"}}
            }
        },
        {
            "name": "session_list",
            "description": "List known sessions, most recently active first",
            "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}}}
        },
        {
            "name": "session_info",
            "description": "Fetch full state for one session",
            "inputSchema": {
                "type": "object",
                "properties": {"path": {"type": "string"}, "session": {"type": "string"}},
                "required": ["session"]
            }
        },
        {
            "name": "session_end",
            "description": "Mark a session ended",
            "inputSchema": {
                "type": "object",
                "properties": {"path": {"type": "string"}, "session": {"type": "string"}},
                "required": ["session"]
            }
        },
        {
            "name": "session_record_view",
            "description": "Record that the agent viewed a set of files in this session, merging view counts, timestamps, first-seen relevance scores, and blast radii",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "session": {"type": "string"},
                    "files": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "path": {"type": "string"},
                                "relevance_score": {"type": "number"},
                                "blast_radius": {"type": "string", "enum": ["small", "medium", "large", "critical"]}
                            },
                            "required": ["path"]
                        }
                    }
                },
                "required": ["session", "files"]
            }
        },
    ])
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

fn resolve_root(args: &Value) -> PathBuf {
    arg_str(args, "path")
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

async fn call_search_files(args: &Value) -> Result<Value, String> {
    let query = arg_str(args, "query").ok_or("missing 'query'")?.to_string();
    let type_filter = match arg_str(args, "type_filter") {
        Some("code") => Some(TypeFilter::Code),
        Some("config") => Some(TypeFilter::Config),
        Some("test") => Some(TypeFilter::Test),
        _ => None,
    };
    let options = SearchOptions {
        root: resolve_root(args),
        query,
        type_filter,
        include_generated: false,
        impact: args.get("impact").and_then(|v| v.as_bool()).unwrap_or(false),
        session_id: arg_str(args, "session").map(str::to_string),
    };
    let result = mantic_core::search(options).await.map_err(|e| e.to_string())?;
    Ok(crate::output::content_blocks(&result))
}

async fn call_analyze_intent(args: &Value) -> Result<Value, String> {
    let query = arg_str(args, "query").ok_or("missing 'query'")?;
    let analysis = mantic_core::intent::analyze(query);
    let text = serde_json::to_string_pretty(&analysis).map_err(|e| e.to_string())?;
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

async fn call_session_start(args: &Value) -> Result<Value, String> {
    let root = resolve_root(args);
    let name = arg_str(args, "name").map(str::to_string);
    let intent = arg_str(args, "intent").map(str::to_string);
    let session = mantic_core::session::start(&root, name, intent).map_err(|e| e.to_string())?;
    let text = serde_json::to_string_pretty(&session.meta).map_err(|e| e.to_string())?;
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

async fn call_session_list(args: &Value) -> Result<Value, String> {
    let root = resolve_root(args);
    let sessions = mantic_core::session::list(&root);
    let text = serde_json::to_string_pretty(&sessions).map_err(|e| e.to_string())?;
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

async fn call_session_info(args: &Value) -> Result<Value, String> {
    let root = resolve_root(args);
    let id = arg_str(args, "session").ok_or("missing 'session'")?;
    let session = mantic_core::session::load(&root, id).map_err(|e| e.to_string())?;
    let text = serde_json::to_string_pretty(&session).map_err(|e| e.to_string())?;
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

async fn call_session_end(args: &Value) -> Result<Value, String> {
    let root = resolve_root(args);
    let id = arg_str(args, "session").ok_or("missing 'session'")?;
    let session = mantic_core::session::end(&root, id).map_err(|e| e.to_string())?;
    let text = serde_json::to_string_pretty(&session.meta).map_err(|e| e.to_string())?;
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

fn parse_blast_radius(value: Option<&str>) -> Option<mantic_core::types::BlastRadiusBucket> {
    use mantic_core::types::BlastRadiusBucket;
    match value {
        Some("small") => Some(BlastRadiusBucket::Small),
        Some("medium") => Some(BlastRadiusBucket::Medium),
        Some("large") => Some(BlastRadiusBucket::Large),
        Some("critical") => Some(BlastRadiusBucket::Critical),
        _ => None,
    }
}

async fn call_session_record_view(args: &Value) -> Result<Value, String> {
    let root = resolve_root(args);
    let id = arg_str(args, "session").ok_or("missing 'session'")?;
    let views: Vec<mantic_core::types::FileView> = args
        .get("files")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|entry| {
                    let path = entry.get("path").and_then(|v| v.as_str())?.to_string();
                    let relevance_score = entry.get("relevance_score").and_then(|v| v.as_f64()).unwrap_or(0.0);
                    let blast_radius = parse_blast_radius(entry.get("blast_radius").and_then(|v| v.as_str()));
                    Some(mantic_core::types::FileView { path, relevance_score, blast_radius })
                })
                .collect()
        })
        .unwrap_or_default();
    let session = mantic_core::session::record_file_views(&root, id, &views).map_err(|e| e.to_string())?;
    let text = serde_json::to_string_pretty(&session.meta).map_err(|e| e.to_string())?;
    Ok(json!({ "content": [{ "type": "text", "text": text }] }))
}

async fn dispatch_tool_call(name: &str, args: &Value) -> Result<Value, String> {
    match name {
        "search_files" => call_search_files(args).await,
        "analyze_intent" => call_analyze_intent(args).await,
        "session_start" => call_session_start(args).await,
        "session_list" => call_session_list(args).await,
        "session_info" => call_session_info(args).await,
        "session_end" => call_session_end(args).await,
        "session_record_view" => call_session_record_view(args).await,
        other => Err(format!("unknown tool '{other}'")),
    }
}

fn error_response(id: Value, code: i64, message: String) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

fn success_response(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

/// Handle one parsed JSON-RPC request, returning `None` for notifications
/// (requests without an `id`), which never get a response.
async fn dispatch_jsonrpc(request: Value) -> Option<Value> {
    let id = request.get("id").cloned();
    let method = request.get("method").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let params = request.get("params").cloned().unwrap_or(Value::Null);

    let Some(id) = id else {
        tracing::debug!(%method, "ignoring notification");
        return None;
    };

    let response = match method.as_str() {
        "initialize" => success_response(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": { "name": "mantic", "version": env!("CARGO_PKG_VERSION") }
            }),
        ),
        "tools/list" => success_response(id, json!({ "tools": tool_definitions() })),
        "tools/call" => {
            let name = params.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let arguments = params.get("arguments").cloned().unwrap_or(json!({}));
            match dispatch_tool_call(&name, &arguments).await {
                Ok(result) => success_response(id, result),
                Err(message) => error_response(id, -32000, message),
            }
        }
        other => error_response(id, -32601, format!("method not found: {other}")),
    };
    Some(response)
}

/// Run the stdio server loop until stdin closes (§6).
pub async fn run() -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let request: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(err) => {
                let response = error_response(Value::Null, -32700, format!("parse error: {err}"));
                stdout.write_all(response.to_string().as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
                continue;
            }
        };

        if let Some(response) = dispatch_jsonrpc(request).await {
            stdout.write_all(response.to_string().as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}
