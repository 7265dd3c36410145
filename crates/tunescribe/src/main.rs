use anyhow::{Context, Result};
use clap::Parser;
use scribeconf::ScribeConfig;
use std::path::PathBuf;
use tunescribe::{telemetry, web, Converter};

/// Songs and prompts in, MIDI JSON out
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file, replacing ./tunescribe.toml in the search order
    #[arg(short, long, env = "TUNESCRIBE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides bind.http_port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Scratch root for per-request audio and MIDI files
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// OTLP gRPC endpoint for trace export (e.g., "127.0.0.1:4317")
    #[arg(long)]
    otlp_endpoint: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, sources) = ScribeConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        config.bind.http_port = port;
    }
    if let Some(dir) = cli.scratch_dir {
        config.paths.scratch_dir = dir;
    }
    if let Some(endpoint) = cli.otlp_endpoint {
        config.telemetry.otlp_endpoint = endpoint;
    }

    if cli.print_config {
        print!("{}", config.to_toml());
        return Ok(());
    }

    let telemetry = telemetry::init(&config.telemetry).context("Failed to initialize telemetry")?;

    for file in &sources.files {
        tracing::info!("Loaded config: {}", file.display());
    }
    if !sources.env_overrides.is_empty() {
        tracing::info!("Env overrides: {}", sources.env_overrides.join(", "));
    }

    let converter = Converter::from_config(&config).context("Failed to set up converter")?;
    if !converter.generation_configured() {
        tracing::warn!("No music API key configured; prompt conversion will be refused");
    }

    let addr = config.bind.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("🎵 tunescribe listening on http://{}", addr);
    tracing::info!("   Prompt: POST http://{}/convert-from-prompt", addr);
    tracing::info!("   Upload: POST http://{}/convert-from-upload", addr);
    tracing::info!("   Health: GET http://{}/health", addr);
    tracing::info!("   Scratch: {}", config.paths.scratch_dir.display());
    tracing::info!("   Transcriber: {}", config.transcription.command);

    let app = web::router(web::AppState::new(converter), &config.limits);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    telemetry.shutdown();
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to set up SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down gracefully..."),
    }
}
