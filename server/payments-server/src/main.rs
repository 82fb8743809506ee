use anyhow::Context;
use clap::Parser;
use std::{env, net::SocketAddr, path::PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payments_server::{create_app, AppConfig, PaymentsServer};

/// Payments engine HTTP server
#[derive(Parser, Debug)]
#[command(name = "payments-server")]
#[command(about = "Payment authorization and reconciliation HTTP API server")]
struct Args {
    /// Server bind address, overriding the configuration file
    #[arg(long, env = "PAYMENTS_HOST")]
    host: Option<String>,

    /// Server port, overriding the configuration file
    #[arg(short, long, env = "PAYMENTS_PORT")]
    port: Option<u16>,

    /// Configuration file path (yaml, toml or json)
    #[arg(short, long, env = "PAYMENTS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON logs regardless of environment
    #[arg(long, env = "PAYMENTS_JSON_LOGS")]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    init_tracing(args.verbose, args.json_logs);

    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Starting payments server");

    let server = PaymentsServer::from_config(&config).await?;
    let audit = server.service.audit().clone();
    let app = create_app(server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.server.host, config.server.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "Payments server listening");
    info!("Health check available at: http://{addr}/health");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    if let Err(e) = audit.flush().await {
        warn!(error = %e, "Audit log did not drain before shutdown");
    }
    info!("Payments server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

fn init_tracing(verbose: bool, json_logs: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let is_production = env::var("PAYMENTS_ENV").is_ok_and(|v| v == "production");

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("payments_server={level},payments_service={level},secrets_service={level},audit={level},tower_http=info,reqwest=info")
            .into()
    });

    if json_logs || is_production {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .json(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_timer(ChronoUtc::rfc_3339()),
            )
            .init();
    }
}
