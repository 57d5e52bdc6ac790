//! Accept loop.
//!
//! # Responsibilities
//! - Accept connections until shutdown is signalled
//! - Spawn one task per connection, carrying its permit and tracker guard
//! - Drain in-flight connections on shutdown, bounded by `drain_secs`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::Instrument;

use super::handler::ConnectionHandler;
use crate::net::{ConnectionId, ConnectionTracker, Listener, ListenerError};

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// The TLS-terminating proxy server.
pub struct ProxyServer {
    handler: Arc<ConnectionHandler>,
    tracker: ConnectionTracker,
    drain_timeout: Duration,
}

impl ProxyServer {
    pub fn new(handler: ConnectionHandler, drain_timeout: Duration) -> Self {
        Self {
            handler: Arc::new(handler),
            tracker: ConnectionTracker::new(),
            drain_timeout,
        }
    }

    /// Serve until `shutdown` fires, then drain.
    ///
    /// The listening socket is closed before draining starts, so no new
    /// connection is accepted once shutdown begins.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                upstream = %self.handler.upstream().target(),
                "Proxy accepting connections"
            );
        }

        let mut next_id: u64 = 0;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping accept loop");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer, permit)) => {
                            next_id += 1;
                            let id = ConnectionId::from(next_id);
                            let guard = self.tracker.track(id);
                            let handler = Arc::clone(&self.handler);
                            let span = tracing::info_span!(
                                "connection",
                                connection_id = %id,
                                peer_addr = %peer
                            );

                            tokio::spawn(
                                async move {
                                    handler.handle(stream, peer, id).await;
                                    drop(guard);
                                    drop(permit);
                                }
                                .instrument(span),
                            );
                        }
                        Err(ListenerError::Closed) => return Err(ListenerError::Closed),
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            }
        }

        drop(listener);
        self.drain().await;
        Ok(())
    }

    async fn drain(&self) {
        let active = self.tracker.active_count();
        if active == 0 {
            tracing::info!("No connections in flight");
            return;
        }

        tracing::info!(
            active_connections = active,
            drain_secs = self.drain_timeout.as_secs(),
            "Draining connections"
        );
        match tokio::time::timeout(self.drain_timeout, self.tracker.wait_idle()).await {
            Ok(()) => tracing::info!("All connections drained"),
            Err(_) => tracing::warn!(
                abandoned = self.tracker.active_count(),
                "Drain timeout elapsed, abandoning connections"
            ),
        }
    }
}
