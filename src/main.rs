use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use intake_bot::config::{BusinessConfig, ServerConfig};
use intake_bot::intake::IntakeManager;
use intake_bot::routes::{AppState, intake_routes};
use intake_bot::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server_config = ServerConfig::from_env()?;

    // Keep the guard alive for the life of the process so buffered file
    // logs are flushed on exit.
    let _log_guard = init_tracing(&server_config);

    let business = Arc::new(BusinessConfig::from_env());

    eprintln!("🛞 Intake bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Business: {}", business.name);
    eprintln!("   Timezone: {}", business.timezone);
    eprintln!("   Database: {}", server_config.db_path.display());
    eprintln!("   Webhook:  http://{}/whatsapp", server_config.listen_addr());

    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&server_config.db_path)
            .await
            .context("failed to open database")?,
    );

    let manager = Arc::new(IntakeManager::new(db, Arc::clone(&business)));
    let app = intake_routes(AppState { manager });

    let listener = tokio::net::TcpListener::bind(server_config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", server_config.listen_addr()))?;
    tracing::info!(addr = %server_config.listen_addr(), "Intake server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Intake server stopped");
    Ok(())
}

/// Console logging, plus a daily rolling file when a log dir is configured.
fn init_tracing(config: &ServerConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "intake-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
