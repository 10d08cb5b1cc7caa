//! emofuse-ai - Multimodal Emotion Fusion Service
//!
//! Serves `/analyze` (video URL → fused emotion), `/analyze-text`,
//! `/health` and `/events` (SSE).
//!
//! Startup order: CLI args → bootstrap TOML → tracing → adapters →
//! orchestrator → HTTP server.

use anyhow::{Context, Result};
use clap::Parser;
use emofuse_ai::analyzers::{GeminiTextAnalyzer, HttpClassifier, YtDlpAcquirer};
use emofuse_ai::fusion::{FusionWeights, RemainderPolicy};
use emofuse_ai::types::Modality;
use emofuse_ai::workflow::FusionOrchestrator;
use emofuse_ai::AppState;
use emofuse_common::config::{self, TomlConfig};
use emofuse_common::events::EventBus;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Lifecycle events buffered per SSE subscriber
const EVENT_BUS_CAPACITY: usize = 100;

/// Command-line arguments for emofuse-ai
#[derive(Parser, Debug)]
#[command(name = "emofuse-ai")]
#[command(about = "Multimodal emotion fusion service")]
#[command(version)]
struct Args {
    /// Bootstrap TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "EMOFUSE_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config)
    #[arg(short, long, env = "EMOFUSE_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (toml_config, config_origin) = config::load_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = &toml_config.logging.level;
                format!("emofuse_ai={level},emofuse_common={level},tower_http=info").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config_origin.log();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        built = env!("BUILD_TIMESTAMP"),
        profile = env!("BUILD_PROFILE"),
        "Starting emofuse-ai"
    );

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let orchestrator = build_orchestrator(&toml_config, event_bus.clone())?;
    let state = AppState::new(Arc::new(orchestrator), event_bus);
    let app = emofuse_ai::build_router(state);

    let bind = args.bind.unwrap_or_else(|| toml_config.bind_address.clone());
    let port = args.port.unwrap_or(toml_config.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wire adapters from configuration
///
/// Unconfigured analyzers are skipped; their modality is reported as
/// unavailable on every request.
fn build_orchestrator(toml_config: &TomlConfig, event_bus: EventBus) -> Result<FusionOrchestrator> {
    let fusion = &toml_config.fusion;
    let weights = FusionWeights::new(fusion.text, fusion.video, fusion.audio)
        .context("Invalid [fusion] weights")?;
    let remainder = RemainderPolicy::from_config(fusion).context("Invalid [fusion] remainder policy")?;

    info!(
        text = weights.get(Modality::Text),
        video = weights.get(Modality::Video),
        audio = weights.get(Modality::Audio),
        remainder = %fusion.remainder,
        "Fusion weights configured"
    );

    let acquirer = YtDlpAcquirer::new(&toml_config.acquisition, toml_config.temp_dir.clone())?;
    let mut orchestrator = FusionOrchestrator::new(Arc::new(acquirer), weights, remainder)
        .with_event_bus(event_bus);

    match config::resolve_api_key(toml_config) {
        Some(api_key) => {
            let analyzer = GeminiTextAnalyzer::new(&toml_config.text_analyzer, api_key)?;
            orchestrator = orchestrator.with_analyzer(Arc::new(analyzer));
        }
        None => warn!(
            "No text analyzer API key ({} or [text_analyzer] api_key); text modality unavailable",
            config::API_KEY_ENV_VAR
        ),
    }

    for (modality, section) in [
        (Modality::Video, &toml_config.video_classifier),
        (Modality::Audio, &toml_config.audio_classifier),
    ] {
        match section {
            Some(section) => {
                let classifier = HttpClassifier::new(modality, section)?;
                info!(modality = %modality, endpoint = %section.endpoint, "Classifier configured");
                orchestrator = orchestrator.with_analyzer(Arc::new(classifier));
            }
            None => warn!(modality = %modality, "No classifier endpoint configured; modality unavailable"),
        }
    }

    Ok(orchestrator)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
