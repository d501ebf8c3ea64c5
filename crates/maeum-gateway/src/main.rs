//! maeum - local AI coding assistant gateway

use clap::Parser;
use maeum_core::MaeumConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "maeum", about = "Local agentic coding assistant", version)]
struct Args {
    /// Port for the IDE surface (localhost only)
    #[arg(long)]
    port: Option<u16>,

    /// Workspace root the assistant operates in
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Base URL of the LLM backend
    #[arg(long)]
    backend_url: Option<String>,

    /// Skip the initial workspace indexing pass
    #[arg(long)]
    no_index: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = MaeumConfig::from_env();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(workspace) = args.workspace {
        config.workspace_root = workspace.canonicalize()?;
    }
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }

    info!("workspace: {}", config.workspace_root.display());
    info!("backend:   {}", config.backend_url);

    let state = maeum_gateway::build_state(config);

    if !args.no_index {
        let indexed = state.index.build(false).await;
        info!("workspace index ready: {} files", indexed);
    }

    maeum_gateway::server::serve(state).await
}
