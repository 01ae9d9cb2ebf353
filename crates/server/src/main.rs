use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use relay_core::ProxyConfig;
use relay_mcp::McpServer;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod api;
mod state;

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "mcp-relay")]
#[command(about = "Expose REST API endpoints as MCP tools", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "RELAY_CONFIG", default_value = "relay.toml")]
    config: PathBuf,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// How MCP clients connect
    #[arg(short, long, value_enum, default_value_t = Transport::Sse)]
    transport: Transport,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Transport {
    /// HTTP with Server-Sent Events
    Sse,
    /// Newline-delimited JSON-RPC on stdin/stdout
    Stdio,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.transport);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("MCP relay failed: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(transport: Transport) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mcp_relay=info,relay_core=info,relay_mcp=info,tower_http=info".into()
            }),
        )
        .with_target(false);

    // stdout belongs to the protocol when serving over stdio
    match transport {
        Transport::Stdio => builder.with_writer(std::io::stderr).init(),
        Transport::Sse => builder.with_file(true).with_line_number(true).init(),
    }
}

async fn run(args: Args) -> Result<()> {
    let config = ProxyConfig::load(&args.config).with_context(|| {
        format!("Failed to load configuration from {}", args.config.display())
    })?;

    tracing::info!("Starting {} MCP relay", config.name);

    let server = Arc::new(McpServer::from_config(&config)?);

    match args.transport {
        Transport::Stdio => server.serve_stdio().await,
        Transport::Sse => {
            let addr = format!("{}:{}", args.host, args.port);
            api::serve(&addr, AppState::new(server)).await
        }
    }
}
