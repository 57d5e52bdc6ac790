//! TLS-terminating reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌───────────────────────────────────────────────────────┐
//!                    │                     HTTPS PROXY                       │
//!                    │                                                       │
//!   TLS client       │  ┌──────────┐   ┌──────────┐   ┌──────────┐           │
//!   ─────────────────┼─▶│   net    │──▶│ handler  │──▶│  filter  │           │
//!                    │  │ listener │   │ (1 req)  │   │hop-by-hop│           │
//!                    │  │  + TLS   │   └──────────┘   └────┬─────┘           │
//!                    │  └──────────┘                       │                 │
//!                    │                                     ▼                 │
//!   Response         │  ┌──────────┐                 ┌──────────┐            │
//!   ◀────────────────┼──│  relay   │◀────────────────│ upstream │◀───────────┼── plaintext
//!   Connection: close│  │          │                 │  client  │            │   upstream
//!                    │  └──────────┘                 └──────────┘            │
//!                    │                                                       │
//!                    │   config · lifecycle · observability · resilience     │
//!                    └───────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use https_proxy::cli::Args;
use https_proxy::lifecycle::{prepare, wait_for_signal, Shutdown};
use https_proxy::observability::{init_logging, init_metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = args.resolve()?;

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "https-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_host = %config.upstream.host,
        upstream_port = config.upstream.port,
        max_connections = config.listener.max_connections,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        "Configuration loaded"
    );

    let (server, listener) = match prepare(&config).await {
        Ok(prepared) => prepared,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e.into());
        }
    };

    if config.observability.metrics_enabled {
        // Validation already checked the address when metrics are enabled.
        let addr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match wait_for_signal().await {
                Ok(signal) => {
                    tracing::info!(signal, "Initiating graceful shutdown");
                    shutdown.trigger();
                }
                Err(e) => tracing::error!(error = %e, "Failed to install signal handler"),
            }
        });
    }

    server.run(listener, stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
