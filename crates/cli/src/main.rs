//! Mantic CLI — structural code search for AI coding agents (§6).
//!
//! Thin shell around `mantic-core`: parses arguments, resolves the project
//! root, runs the pipeline, and formats the result. No search logic lives
//! here.

mod mcp_server;
mod output;

use clap::{ArgGroup, Parser, Subcommand};
use mantic_core::pipeline::{SearchOptions, TypeFilter};
use output::OutputFormat;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mantic", version, about = "Structural code search for AI coding agents")]
#[command(group(ArgGroup::new("format").args(["json", "files", "markdown", "mcp"])))]
#[command(group(ArgGroup::new("type_filter").args(["code", "config", "test"])))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Free-text query, e.g. `mantic "fix the login session bug"`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    query: Vec<String>,

    /// Project root (default: current directory)
    #[arg(short = 'p', long)]
    path: Option<PathBuf>,

    /// Suppress scores/reasons, print only matching paths
    #[arg(short = 'q', long)]
    quiet: bool,

    #[arg(long)]
    json: bool,
    #[arg(long)]
    files: bool,
    #[arg(long)]
    markdown: bool,
    #[arg(long)]
    mcp: bool,

    #[arg(long)]
    code: bool,
    #[arg(long)]
    config: bool,
    #[arg(long)]
    test: bool,

    /// Include generated files (excluded by default)
    #[arg(long)]
    include_generated: bool,

    /// Attach dependency-graph impact analysis to each result
    #[arg(long)]
    impact: bool,

    /// Bias results toward an existing session's view history
    #[arg(long)]
    session: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage search sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Run the stdio MCP agent-protocol server
    Server,
}

#[derive(Subcommand)]
enum SessionAction {
    /// Start a new session
    Start {
        name: Option<String>,
        #[arg(short = 'i', long)]
        intent: Option<String>,
        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
    },
    /// List known sessions, most recently active first
    List {
        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
    },
    /// Show full state for one session
    Info {
        id: String,
        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
    },
    /// Mark a session ended
    End {
        id: Option<String>,
        #[arg(short = 'p', long)]
        path: Option<PathBuf>,
    },
}

fn resolve_root(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let root = path.unwrap_or_else(|| PathBuf::from("."));
    Ok(root.canonicalize()?)
}

fn output_format(cli: &Cli) -> OutputFormat {
    if cli.files {
        OutputFormat::Files
    } else if cli.markdown {
        OutputFormat::Markdown
    } else if cli.mcp {
        OutputFormat::Mcp
    } else {
        OutputFormat::Json
    }
}

fn type_filter(cli: &Cli) -> Option<TypeFilter> {
    if cli.code {
        Some(TypeFilter::Code)
    } else if cli.config {
        Some(TypeFilter::Config)
    } else if cli.test {
        Some(TypeFilter::Test)
    } else {
        None
    }
}

async fn run_search(cli: Cli) -> anyhow::Result<i32> {
    let root = resolve_root(cli.path.clone())?;
    if cli.query.is_empty() {
        anyhow::bail!("no query given; usage: mantic <query...>");
    }
    let query = cli.query.join(" ");
    let format = output_format(&cli);
    let filter = type_filter(&cli);

    let options = SearchOptions {
        root,
        query,
        type_filter: filter,
        include_generated: cli.include_generated,
        impact: cli.impact,
        session_id: cli.session.clone(),
    };

    let result = mantic_core::search(options).await?;
    println!("{}", output::render(format, &result, cli.quiet));
    // Zero results is a successful outcome, not a failure (§6).
    Ok(0)
}

fn run_session_command(action: SessionAction) -> anyhow::Result<i32> {
    match action {
        SessionAction::Start { name, intent, path } => {
            let root = resolve_root(path)?;
            let session = mantic_core::session::start(&root, name, intent)?;
            println!("{}", serde_json::to_string_pretty(&session.meta)?);
        }
        SessionAction::List { path } => {
            let root = resolve_root(path)?;
            let sessions = mantic_core::session::list(&root);
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionAction::Info { id, path } => {
            let root = resolve_root(path)?;
            let session = mantic_core::session::load(&root, &id)?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionAction::End { id, path } => {
            let root = resolve_root(path)?;
            let id = match id {
                Some(id) => id,
                None => {
                    let sessions = mantic_core::session::list(&root);
                    sessions
                        .into_iter()
                        .find(|s| s.status == mantic_core::types::SessionStatus::Active)
                        .map(|s| s.id)
                        .ok_or_else(|| anyhow::anyhow!("no active session to end"))?
                }
            };
            let session = mantic_core::session::end(&root, &id)?;
            println!("{}", serde_json::to_string_pretty(&session.meta)?);
        }
    }
    Ok(0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("mantic=warn".parse().unwrap()))
        .with_target(false)
        .init();

    let mut cli = Cli::parse();
    let command = cli.command.take();

    let exit_code = match command {
        Some(Commands::Session { action }) => run_session_command(action)?,
        Some(Commands::Server) => {
            mcp_server::run().await?;
            0
        }
        None => run_search(cli).await?,
    };

    std::process::exit(exit_code);
}
