//! Layout rendering proxy (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                  LAYOUT RENDER PROXY                  │
//!                        │                                                       │
//!   Client Request       │  ┌─────────┐    ┌───────────┐    ┌───────────────┐   │
//!   ─────────────────────┼─▶│  http   │───▶│  routing  │───▶│ hyper client  │───┼──▶ Content
//!                        │  │ server  │    │ rewriter  │    │  (upstream)   │   │    Service
//!                        │  └─────────┘    └───────────┘    └───────┬───────┘   │
//!                        │                                          │           │
//!                        │                                          ▼           │
//!   Client Response      │  ┌──────────┐   ┌──────────────┐  ┌───────────────┐  │
//!   ◀────────────────────┼──│ finalize │◀──│ render /     │◀─│  classifier   │  │
//!                        │  │          │   │ layout data  │  │  + collector  │  │
//!                        │  └──────────┘   └──────────────┘  └───────────────┘  │
//!                        │                                                       │
//!                        │  config · hooks · observability · lifecycle           │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use layout_render_proxy::config::loader::{load_config, ConfigError};
use layout_render_proxy::config::validation::validate_config;
use layout_render_proxy::observability::{logging, metrics};
use layout_render_proxy::{DocumentShellRenderer, HttpServer, ProxyConfig, ProxyHooks, Shutdown};

#[derive(Parser)]
#[command(name = "layout-render-proxy")]
#[command(about = "Proxy that renders layout service responses into HTML", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Force debug logging for the proxy
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = ProxyConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };
    if cli.debug {
        config.observability.debug = true;
    }

    logging::init_logging(&config.observability);
    tracing::info!("layout-render-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        api_host = %config.upstream.api_host,
        layout_service_route = %config.upstream.layout_service_route,
        request_timeout_secs = config.timeouts.request_secs,
        render_timeout_secs = config.timeouts.render_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = HttpServer::new(&config, ProxyHooks::new(), DocumentShellRenderer::new())?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
