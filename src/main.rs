use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use onboarding_wizard::config::ServerConfig;
use onboarding_wizard::onboarding::{OnboardingController, app};
use onboarding_wizard::store::{Database, LibSqlBackend};

/// Console logging always; a daily log file too when `log_dir` is set.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(config: &ServerConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "onboarding.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let _log_guard = init_tracing(&config)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.listen_addr(),
        db = %config.db_path.display(),
        "Starting onboarding service"
    );
    if config.allow_plaintext_login {
        tracing::warn!("Plaintext credential fallback is enabled");
    }

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("opening database at {}", config.db_path.display()))?,
    );

    let controller = Arc::new(OnboardingController::new(
        db,
        config.controller_settings(),
    ));

    // Create the default configuration before serving.
    let stored = controller.get_config().await?;
    tracing::info!(config = ?stored.config, version = stored.version, "Onboarding config loaded");

    let listener = tokio::net::TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("binding {}", config.listen_addr()))?;
    tracing::info!(addr = %config.listen_addr(), "HTTP server listening");

    axum::serve(listener, app(controller))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
