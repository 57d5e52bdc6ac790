//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate the final configuration (file plus command-line overrides)
//! - Load the TLS credential once
//! - Build the upstream client and connection handler
//! - Bind the listener last, so traffic only arrives when everything is ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal and happens before listening

use thiserror::Error;

use crate::config::{validate_config, ConfigError, ProxyConfig};
use crate::net::{load_tls_acceptor, Listener, ListenerError, TlsError};
use crate::proxy::{ConnectionHandler, ProxyServer, UpstreamClient, UpstreamTarget};

/// Any failure that prevents the proxy from listening.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Build the server and bind its listener.
pub async fn prepare(config: &ProxyConfig) -> Result<(ProxyServer, Listener), StartupError> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let acceptor = load_tls_acceptor(&config.listener.tls)?;
    let upstream = UpstreamClient::new(
        UpstreamTarget::from(&config.upstream),
        config.timeouts.upstream(),
        config.limits.clone(),
    );
    let handler = ConnectionHandler::new(
        acceptor,
        upstream,
        config.timeouts.clone(),
        config.limits.clone(),
    );
    let server = ProxyServer::new(handler, config.timeouts.drain());

    let listener = Listener::bind(&config.listener).await?;
    Ok((server, listener))
}
