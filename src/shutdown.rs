//! Graceful shutdown.
//!
//! SIGINT (Ctrl+C) and SIGTERM cancel a [`CancellationToken`]; the pipeline
//! checks it between items, so the item in flight is always finished and
//! recorded first. A second signal force-exits with status 130.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Resolves on the next shutdown signal.
#[cfg(unix)]
async fn next_signal(sigterm: &mut Option<tokio::signal::unix::Signal>) {
    match sigterm {
        Some(term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        None => {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Install signal handlers and return the token they cancel.
pub(crate) fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let count = Arc::new(AtomicU32::new(0));

    let handler_token = token.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut sigterm = {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(s) => Some(s),
                Err(e) => {
                    tracing::warn!("Could not register SIGTERM handler: {}", e);
                    None
                }
            }
        };

        loop {
            #[cfg(unix)]
            next_signal(&mut sigterm).await;

            #[cfg(not(unix))]
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("Could not listen for Ctrl+C");
                return;
            }

            let prev = count.fetch_add(1, Ordering::SeqCst);
            if prev == 0 {
                tracing::info!("Received shutdown signal, finishing the current item...");
                tracing::info!("Press Ctrl+C again to force exit");
                handler_token.cancel();
            } else {
                tracing::warn!("Force exit requested");
                std::process::exit(130);
            }
        }
    });

    token
}
