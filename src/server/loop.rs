// Server loop module
// Accepts connections until shutdown, then drains the ones still open

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;

use super::connection::{accept_connection, wait_for_shutdown};
use crate::config::AppState;
use crate::logger;

/// Interval at which the open connection count is checked while draining
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Accept connections until `shutdown` flips to `true`.
///
/// The listener is closed as soon as shutdown starts. Open connections get
/// `performance.shutdown_grace_period` seconds to finish their responses.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: watch::Receiver<bool>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));
    let closing = wait_for_shutdown(shutdown.clone());
    tokio::pin!(closing);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            &shutdown,
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }
            () = &mut closing => break,
        }
    }

    drop(listener);
    logger::log_shutdown_started(active_connections.load(Ordering::SeqCst));

    let grace = Duration::from_secs(state.config.performance.shutdown_grace_period);
    let remaining = drain_connections(&active_connections, grace).await;
    logger::log_shutdown_complete(remaining);
}

/// Wait until no connection is open or `grace` has elapsed; returns the count still open
async fn drain_connections(active: &AtomicUsize, grace: Duration) -> usize {
    let deadline = Instant::now() + grace;
    loop {
        let open = active.load(Ordering::SeqCst);
        if open == 0 || Instant::now() >= deadline {
            return open;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}
