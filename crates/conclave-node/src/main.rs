//! # Conclave Node
//!
//! The main entry point for running a Conclave node.

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use conclave_node::observability::init_logging;
use conclave_node::{create_router, AppState, NodeConfig};
use conclave_provider::{ProviderError, ProviderPool, ProviderReply, ProviderRequest};
use conclave_types::CouncilMember;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Conclave Node - AI council proxy
#[derive(Parser, Debug)]
#[command(name = "conclave-node")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// API listen address (overrides config)
    #[arg(long)]
    addr: Option<SocketAddr>,

    /// Log level (overrides config)
    #[arg(long)]
    log_level: Option<String>,
}

/// Development stand-in for the provider pool.
///
/// Real provider HTTP clients live outside this service; local runs
/// answer every member call with a canned echo so the full lifecycle is
/// exercisable end to end.
struct EchoPool;

#[async_trait]
impl ProviderPool for EchoPool {
    async fn complete(
        &self,
        member: &CouncilMember,
        request: &ProviderRequest,
    ) -> Result<ProviderReply, ProviderError> {
        let prompt = request
            .messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(ProviderReply {
            content: format!("[{}] echo: {}", member.model, prompt),
            prompt_tokens: (prompt.len() / 4) as u32,
            completion_tokens: (prompt.len() / 4) as u32,
            cost_usd: 0.0,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = if args.config.exists() {
        NodeConfig::from_file(&args.config)?
    } else {
        NodeConfig::from_env()?
    };
    if let Some(addr) = args.addr {
        config.addr = addr;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config.logging.level, config.logging.format == "json");
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "Starting Conclave node"
    );

    // The default council: the built-in "default" preset seeds the
    // active config bundle.
    let default_preset = conclave_config::builtin_presets()
        .into_iter()
        .find(|p| p.name == "default")
        .expect("default preset must exist");
    let bundle = conclave_config::ConfigBundle {
        council: default_preset.council,
        deliberation: default_preset.deliberation,
        synthesis: default_preset.synthesis,
        performance: Default::default(),
        transparency: Default::default(),
        devils_advocate: Some(Default::default()),
    };

    tracing::warn!("No provider integration configured; using the echo pool");
    let state = AppState::build(&config, Arc::new(EchoPool), bundle)?;

    // Background sweepers: stream TTL, registry TTL, idempotency TTL.
    let _stream_sweeper = conclave_stream::start_sweeper(state.hub.clone());
    let registry = state.registry.clone();
    let idempotency = state.idempotency.clone();
    let _store_sweeper = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5 * 60));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let reclaimed = registry.sweep() + idempotency.sweep();
            if reclaimed > 0 {
                tracing::debug!(reclaimed = reclaimed, "Store sweep reclaimed entries");
            }
        }
    });

    let router = create_router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "API server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    tracing::info!("Shutting down...");
    state.hub.shutdown();

    Ok(())
}
