//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check that addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// Smallest head limit that still fits ordinary browser requests.
const MIN_HEADER_BYTES: usize = 1024;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("upstream.host must not be empty")]
    EmptyUpstreamHost,

    #[error("upstream.port must not be 0")]
    ZeroUpstreamPort,

    #[error("{0} must not be empty")]
    EmptyPath(&'static str),

    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    #[error("limits.max_header_bytes must be at least {min} (got {value})")]
    HeaderLimitTooSmall { min: usize, value: usize },
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::Zero("listener.max_connections"));
    }
    if config.listener.tls.cert_path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("listener.tls.cert_path"));
    }
    if config.listener.tls.key_path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyPath("listener.tls.key_path"));
    }

    if config.upstream.host.trim().is_empty() {
        errors.push(ValidationError::EmptyUpstreamHost);
    }
    if config.upstream.port == 0 {
        errors.push(ValidationError::ZeroUpstreamPort);
    }

    let timeouts = [
        ("timeouts.handshake_secs", config.timeouts.handshake_secs),
        ("timeouts.request_read_secs", config.timeouts.request_read_secs),
        ("timeouts.upstream_secs", config.timeouts.upstream_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if config.limits.max_header_bytes < MIN_HEADER_BYTES {
        errors.push(ValidationError::HeaderLimitTooSmall {
            min: MIN_HEADER_BYTES,
            value: config.limits.max_header_bytes,
        });
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("limits.max_body_bytes"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
