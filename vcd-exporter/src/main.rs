/**
 * VCD EXPORTER - process entry point
 *
 * Loads .env, the CLI and the target store (YAML file, or VCD_* environment
 * variables when no file is given), registers the scrape telemetry in the
 * default prometheus registry and serves the router until Ctrl-C.
 */

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vcd_exporter::collector::{Collector, DEFAULT_SCRAPE_TIMEOUT};
use vcd_exporter::config::TargetStore;
use vcd_exporter::http::{self, AppState, ScrapeTelemetry};
use vcd_exporter::vcd::client::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
use vcd_exporter::vcd::VcdConnector;

#[derive(Debug, Parser)]
#[command(name = "vcd-exporter", version, about = "VMware Cloud Director exporter for Prometheus")]
struct Cli {
    /// YAML file mapping section names to vCD credentials.
    #[arg(short, long, env = "VCD_EXPORTER_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, env = "VCD_EXPORTER_PORT", default_value_t = 9274)]
    port: u16,

    /// Upper bound for one /vcd request, login and logout included, in seconds.
    #[arg(long, env = "VCD_SCRAPE_TIMEOUT", default_value_t = DEFAULT_SCRAPE_TIMEOUT.as_secs())]
    scrape_timeout: u64,

    /// Seconds allowed for connecting to a vCD host.
    #[arg(long, env = "VCD_CONNECT_TIMEOUT", default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    connect_timeout: u64,

    /// Seconds allowed for a single vCD API call.
    #[arg(long, env = "VCD_REQUEST_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT.as_secs())]
    request_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vcd_exporter=info")),
        )
        .init();

    let cli = Cli::parse();

    let store = match &cli.config {
        Some(path) => TargetStore::from_file(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => TargetStore::from_env(),
    };
    if store.is_empty() {
        bail!("no vCD target configured: pass --config or set VCD_USER/VCD_ORG/VCD_PASSWORD/VCD_HOST");
    }
    info!(sections = ?store.sections(), "targets loaded");

    let registry = prometheus::default_registry().clone();
    let telemetry = ScrapeTelemetry::register(&registry).context("failed to register exporter metrics")?;

    let connector = VcdConnector::new(
        Duration::from_secs(cli.connect_timeout),
        Duration::from_secs(cli.request_timeout),
    );
    let collector = Collector::new(Arc::new(store), connector)
        .with_timeout(Duration::from_secs(cli.scrape_timeout));
    let app = http::build_router(AppState {
        collector: Arc::new(collector),
        telemetry,
        registry,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("shutting down");
        })
        .await
        .context("server error")?;
    Ok(())
}
