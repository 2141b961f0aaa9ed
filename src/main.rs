use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use portfolio_site::chat::session::spawn_idle_sweep;
use portfolio_site::config::SiteConfig;
use portfolio_site::notify::{NotifyConfig, notifier_from_config};
use portfolio_site::server::{SESSION_MAX_IDLE, SESSION_SWEEP_INTERVAL, SiteServices, build_router};
use portfolio_site::store::{Database, LibSqlBackend};

/// Console logging, plus a daily rolling file when `LOG_DIR` is set.
/// The returned guard must live as long as the process.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "site.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage (SMTP, lead endpoint)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    let config = SiteConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("Portfolio site v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   HTTP: http://0.0.0.0:{}", config.port);
    eprintln!("   Chat WS: ws://0.0.0.0:{}/ws/chat", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Notifications ────────────────────────────────────────────────────
    let notify_config = NotifyConfig::from_env();
    match notify_config {
        Some(ref n) => eprintln!("   Notify: {} via {}:{}", n.to_address, n.smtp_host, n.smtp_port),
        None => eprintln!("   Notify: disabled (SMTP_HOST not set)"),
    }
    let notifier = notifier_from_config(notify_config);

    // ── Chat + routes ────────────────────────────────────────────────────
    let services = SiteServices::from_config(&config, db, notifier)
        .context("Failed to set up lead hand-off")?;
    eprintln!(
        "   Chat leads: {}",
        config.chat.lead_endpoint.as_deref().unwrap_or("local database")
    );
    eprintln!(
        "   Admin API: {}\n",
        if services.admin.is_enabled() { "enabled" } else { "disabled" }
    );

    let _sweep_handle = spawn_idle_sweep(
        Arc::clone(&services.registry),
        SESSION_SWEEP_INTERVAL,
        SESSION_MAX_IDLE,
    );

    let app = build_router(&services, &config.cors_origins);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Site server started");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
