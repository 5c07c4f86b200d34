use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancel `token` when the process receives Ctrl-C.
///
/// Every background loop (pollers, the HTTP server, the change-event logger)
/// watches a child of the same token, so one signal stops them all.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        token.cancel();
                    }
                    Err(e) => error!("Failed to listen for shutdown signal: {}", e),
                }
            }
            _ = token.cancelled() => {}
        }
    });
}
