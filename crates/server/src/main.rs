use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use framefuse_core::{
    load_config,
    moderation::{Classifier, NoopClassifier},
    streaming::ProcessSpawner,
    tools::ProcessToolRunner,
    validate_config,
    workflow::MediaStageExecutor,
    ProcessorRegistry, ToolBridge, WorkflowEngine,
};
use framefuse_server::{create_router, AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let json = std::env::var("FRAMEFUSE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

async fn run() -> Result<()> {
    init_logging();

    // Determine config path
    let config_path = std::env::var("FRAMEFUSE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Temp root: {:?}", config.temp.root);

    // Codec tools
    let runner = Arc::new(ProcessToolRunner::new(config.tools.clone()));
    if let Err(e) = runner.validate().await {
        // Live sessions fed over WebSocket still work without ffmpeg.
        warn!("Codec tools unavailable, workflows will fail: {}", e);
    }
    let bridge = ToolBridge::new(runner, config.tools.clone(), config.output.clone());

    // Processing capabilities
    let pipeline = Arc::new(
        ProcessorRegistry::with_builtins()
            .build_pipeline(&config.execution.processors)
            .context("Failed to build processing pipeline")?,
    );
    info!("Processing pipeline: {:?}", pipeline.names());

    let classifier: Arc<dyn Classifier> = Arc::new(NoopClassifier);
    info!("Using classifier: {}", classifier.name());

    let executor = MediaStageExecutor::new(
        &config,
        bridge,
        Arc::clone(&pipeline),
        Arc::clone(&classifier),
    );
    let engine = Arc::new(WorkflowEngine::new(Arc::new(executor)));
    let spawner = Arc::new(ProcessSpawner::new(config.tools.ffmpeg_path.clone()));

    let state = Arc::new(AppState::new(
        config.clone(),
        engine,
        pipeline,
        classifier,
        spawner,
    ));

    // Create router
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&state)))
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM), then stop the running
/// workflow and close every session so in-flight requests can finish.
async fn shutdown_signal(state: Arc<AppState>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Server shutting down...");
    if state.engine().stop() {
        info!("Stop requested for running workflow");
    }
    state.sessions().close_all();
}
