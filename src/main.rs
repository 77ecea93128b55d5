use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use toolhub::config::Config;
use toolhub::hub::{ActiveSet, Hub, HubRequest};
use toolhub::models;
use toolhub::tools::manifest::ToolManifest;
use toolhub::tools::{Tool, ToolRegistry};
use toolhub::usage::{FileUsageLog, NoopUsageLog, UsageLog};
use toolhub::ToolFetcher;

#[derive(Parser, Debug)]
#[command(name = "toolhub", version, about = "Tool retrieval-and-dispatch hub for LLM agents")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tool manifest (overrides `tools_manifest` from the config)
    #[arg(short, long)]
    tools: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the registered tools
    Tools,
    /// Search the registry the way the model would
    Search {
        /// What you need a tool for
        query: String,
        /// Number of tools to return (clamped to 1..=50)
        #[arg(short)]
        k: Option<usize>,
    },
    /// Call a tool by exact name
    Call {
        /// Tool name
        name: String,
        /// JSON-encoded tool input
        #[arg(default_value = "")]
        input: String,
    },
    /// Answer a question with the configured model, using tool_hub
    Ask {
        /// The user query
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    let cli = Cli::parse();
    let home = toolhub::toolhub_home();
    let config_path = cli.config.unwrap_or_else(|| home.join("config.yaml"));

    let mut cfg = Config::load_or_default(&config_path).await?;
    if cfg.hub.index_path.is_none() {
        cfg.hub.index_path = Some(home.join("index.db").to_string_lossy().to_string());
    }

    let manifest_path = cli
        .tools
        .or_else(|| cfg.tools_manifest.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| home.join("tools.yaml"));
    let tools = load_tools(&manifest_path).await?;

    let usage: Arc<dyn UsageLog> = match cfg.hub.usage_log_path {
        Some(ref p) => Arc::new(FileUsageLog::new(p)),
        None => Arc::new(NoopUsageLog),
    };
    let embedder = cfg.hub.embedder()?;

    match cli.command {
        Command::Tools => {
            let registry = ToolRegistry::new(tools)?;
            println!("{}", serde_json::to_string_pretty(&registry.list())?);
            Ok(())
        }
        Command::Search { query, k } => {
            let hub = Hub::build(tools, embedder, &cfg.hub)
                .await?
                .with_usage_log(usage);
            let mut active = ActiveSet::new();
            println!("{}", hub.handle(&mut active, HubRequest::search(query, k)).await);
            Ok(())
        }
        Command::Call { name, input } => {
            let hub = Hub::build(tools, embedder, &cfg.hub)
                .await?
                .with_usage_log(usage);
            let mut active = ActiveSet::new();
            println!("{}", hub.handle(&mut active, HubRequest::call(name, input)).await);
            Ok(())
        }
        Command::Ask { query } => {
            let model_cfg = cfg.model.as_ref().with_context(|| {
                format!("no `model` section in {}", config_path.display())
            })?;
            let provider = models::build_provider(model_cfg)?;
            let mut fetcher = ToolFetcher::new(cfg.hub.clone(), embedder).with_usage_log(usage);
            fetcher.set_up(provider, tools).await?;
            let (reply, surfaced) = fetcher.process_query(&query).await?;
            info!(tools = ?surfaced, "tools surfaced");
            println!("{reply}");
            fetcher.tear_down();
            Ok(())
        }
    }
}

async fn load_tools(path: &Path) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        info!(path = %path.display(), "no tool manifest, registry is empty");
        return Ok(Vec::new());
    }
    let manifest = ToolManifest::load(path).await?;
    Ok(manifest.into_tools())
}
