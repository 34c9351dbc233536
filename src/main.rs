//! Ollama request interceptor.
//!
//! A transparent HTTP proxy in front of a local inference server. Every
//! request is forwarded unmodified to the upstream, the response is streamed
//! back, and the whole exchange is written to `<log>/<id>-<path>.json`.
//!
//! ```text
//!     Client ──▶ ┌──────────────────────────────┐ ──▶ Upstream (Ollama)
//!                │  http::server  (id, buffer)  │
//!     Client ◀── │  http::response (stream+tee) │ ◀──
//!                └──────────────┬───────────────┘
//!                               ▼
//!                capture::sink (one JSON file per exchange)
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use ollama_interceptor::config::schema::parse_bind_address;
use ollama_interceptor::config::{
    load_config, validate_config, ConfigError, InterceptorConfig, ObservabilityConfig,
};
use ollama_interceptor::http::HttpServer;
use ollama_interceptor::lifecycle::{startup, Shutdown};
use ollama_interceptor::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "ollama-interceptor", version)]
#[command(about = "Transparent logging proxy for a local inference server")]
struct Args {
    /// Target base URL to forward requests to [default: http://localhost:11434]
    #[arg(long)]
    target: Option<String>,

    /// Directory to save the exchange logs [default: ./logs]
    #[arg(long)]
    log: Option<PathBuf>,

    /// Address to listen on, e.g. :11435, 127.0.0.1:11435 or localhost:11435 [default: :11435]
    #[arg(long)]
    listen: Option<String>,

    /// Optional TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    fn resolve_config(&self) -> Result<InterceptorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => InterceptorConfig::default(),
        };

        if let Some(target) = &self.target {
            config.upstream.target = target.clone();
        }
        if let Some(log) = &self.log {
            config.capture.log_dir = log.clone();
        }
        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    logging::init_logging(&config.observability);

    // Still single-threaded here: the runtime is built below.
    startup::clear_proxy_env();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: InterceptorConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        target = %config.upstream.target,
        log_dir = %config.capture.log_dir.display(),
        listen = %config.listener.bind_address,
        "ollama-interceptor starting"
    );

    if let Err(e) = startup::prepare_log_dir(&config.capture.log_dir) {
        tracing::error!(
            path = %config.capture.log_dir.display(),
            error = %e,
            "Failed to create logs directory"
        );
        return Err(e.into());
    }

    let addr = config.listener.bind_target();
    let listener = match TcpListener::bind(addr.as_str()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to bind listener");
            return Err(e.into());
        }
    };

    if config.observability.metrics_enabled {
        match parse_bind_address(&config.observability.metrics_address) {
            Ok(metrics_addr) => {
                if let Err(e) = metrics::init_metrics(metrics_addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(e) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    error = %e,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
