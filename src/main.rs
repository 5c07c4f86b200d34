use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use banking_dashboard::application::seed_demo_data;
use banking_dashboard::infrastructure::logging::cleanup_old_logs;
use banking_dashboard::infrastructure::shutdown::cancel_on_ctrl_c;
use banking_dashboard::infrastructure::{init_logging, AppConfig, ChangeNotifier, LoggingConfig};
use banking_dashboard::{build_state, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let logging = LoggingConfig {
        log_dir: config.log_dir.clone(),
        enable_file: config.log_to_file,
        ..LoggingConfig::default()
    }
    .with_level(&config.log_level);
    let max_files = logging.max_files;
    let _guards = init_logging(logging).context("failed to initialize logging")?;
    if config.log_to_file {
        let removed = cleanup_old_logs(&config.log_dir, max_files)?;
        if removed > 0 {
            info!(removed, "Removed old log files");
        }
    }

    info!("Starting banking dashboard service");

    let state = build_state();
    if config.seed_demo_data {
        seed_demo_data(&state.users, &state.accounts, &state.cards)
            .await
            .context("failed to load demo data")?;
    }

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());
    tokio::spawn(log_change_events(state.notifier.clone(), shutdown.child_token()));

    let app = create_router(state);
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    let server_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Trace every registry change. Stands in for a downstream consumer.
async fn log_change_events(notifier: std::sync::Arc<ChangeNotifier>, token: CancellationToken) {
    let mut events = notifier.subscribe();
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            received = events.recv() => match received {
                Ok(envelope) => info!(
                    sequence = envelope.sequence,
                    event_type = envelope.event.event_type(),
                    resource_id = envelope.event.resource_id(),
                    "Change event"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Change event log lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    }
    debug!("Change event logger stopped");
}
