// Copyright 2026 The Parapet Project
// SPDX-License-Identifier: Apache-2.0

use chatrelay::backend::{AdkBackend, AgentBackend, ReqwestHttpSender};
use chatrelay::config::{self, ConfigSource};
use chatrelay::proxy;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "chatrelay", about = "Agent SSE to AI data stream relay")]
struct Cli {
    /// Path to the chatrelay.yaml config file
    #[arg(long, default_value = "chatrelay.yaml", env = "CHATRELAY_CONFIG")]
    config: String,

    /// Port to listen on
    #[arg(long, default_value_t = proxy::BIND_ADDR.1, env = "CHATRELAY_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let addr = SocketAddr::from((proxy::BIND_ADDR.0, cli.port));
    tracing::info!(%addr, "chatrelay starting");

    let source = config::FileSource::new(&cli.config);
    let config = match config::load_config(&source) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            tracing::error!(source = %source.describe(), "failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        version = %config.version,
        backend = %config.backend.run_url(),
        app_name = %config.backend.app_name,
        partial_policy = %config.stream.partial_policy,
        config_hash = %config.config_hash,
        "config loaded"
    );

    let sender = match ReqwestHttpSender::from_config(&config.backend) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };
    let backend: Arc<dyn AgentBackend> =
        Arc::new(AdkBackend::new(sender, config.backend.clone()));

    let app = proxy::build_router(backend, config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind to address");

    tracing::info!(%addr, "chatrelay listening");

    axum::serve(listener, app)
        .await
        .expect("server error");
}
