//! Upstream client.
//!
//! # Responsibilities
//! - Open a fresh plaintext connection to the fixed upstream per exchange
//! - Send the forwarded request and read the complete response
//! - Bound the whole exchange by one deadline
//!
//! # Design Decisions
//! - No pooling and no retry: exactly one attempt per downstream request
//! - The upstream socket lives inside `exchange`, so it is released on
//!   success, error and timeout alike (the timed-out future is dropped)

use bytes::{BufMut, Bytes, BytesMut};
use http::Method;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::{LimitsConfig, UpstreamConfig};
use crate::http::headers::write_line;
use crate::http::{Headers, HttpError, Response, WireReader};
use crate::resilience::with_deadline;

/// Fixed upstream (host, port). Immutable for the server's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    host: String,
    port: u16,
}

impl UpstreamTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` suitable for a `Host` header.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl From<&UpstreamConfig> for UpstreamTarget {
    fn from(config: &UpstreamConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authority())
    }
}

/// Why an upstream exchange failed. Every variant maps to 502.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// TCP connect failed (refused, unreachable, DNS failure).
    #[error("cannot connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    /// Deadline elapsed before the full response arrived.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Transport failed mid-exchange.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Upstream sent something that is not a valid HTTP response.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Response exceeded the configured limits.
    #[error("response too large: {0}")]
    TooLarge(String),
}

impl UpstreamError {
    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Connect { .. } => "connect",
            UpstreamError::Timeout(_) => "timeout",
            UpstreamError::Io(_) => "io",
            UpstreamError::Malformed(_) => "malformed",
            UpstreamError::TooLarge(_) => "too_large",
        }
    }
}

impl From<HttpError> for UpstreamError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Io(e) => UpstreamError::Io(e),
            HttpError::ConnectionClosed => {
                UpstreamError::Malformed("connection closed before a response was sent".into())
            }
            e @ (HttpError::HeadTooLarge { .. } | HttpError::BodyTooLarge { .. }) => {
                UpstreamError::TooLarge(e.to_string())
            }
            e => UpstreamError::Malformed(e.to_string()),
        }
    }
}

/// Client for the single fixed upstream.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    target: UpstreamTarget,
    deadline: Duration,
    limits: LimitsConfig,
}

impl UpstreamClient {
    pub fn new(target: UpstreamTarget, deadline: Duration, limits: LimitsConfig) -> Self {
        Self {
            target,
            deadline,
            limits,
        }
    }

    pub fn target(&self) -> &UpstreamTarget {
        &self.target
    }

    /// Send one request upstream and return the complete response.
    ///
    /// `headers` must already be filtered for hop-by-hop names.
    pub async fn forward(
        &self,
        method: &Method,
        path: &str,
        headers: &Headers,
        body: Option<&Bytes>,
    ) -> Result<Response, UpstreamError> {
        let request = encode_request(method, path, headers, body, &self.target);
        with_deadline(self.deadline, self.exchange(method, &request))
            .await
            .map_err(|elapsed| UpstreamError::Timeout(elapsed.0))?
    }

    async fn exchange(&self, method: &Method, request: &[u8]) -> Result<Response, UpstreamError> {
        let stream = TcpStream::connect((self.target.host(), self.target.port()))
            .await
            .map_err(|source| UpstreamError::Connect {
                target: self.target.to_string(),
                source,
            })?;
        let _ = stream.set_nodelay(true);

        let mut reader = WireReader::new(stream);
        reader.get_mut().write_all(request).await?;
        reader.get_mut().flush().await?;

        let response = Response::read_from(&mut reader, method, &self.limits).await?;
        tracing::trace!(
            upstream = %self.target,
            status = response.status().as_u16(),
            body_bytes = response.body().len(),
            "Upstream response read"
        );
        Ok(response)
    }
}

/// Serialize a forwarded request.
///
/// Adds `Host` when the client sent none, `Content-Length` when a body is
/// present without one (chunked bodies arrive here decoded), and always
/// ends the head with `Connection: close`.
pub fn encode_request(
    method: &Method,
    path: &str,
    headers: &Headers,
    body: Option<&Bytes>,
    upstream: &UpstreamTarget,
) -> BytesMut {
    let body_len = body.map_or(0, |b| b.len());
    let mut buf = BytesMut::with_capacity(512 + body_len);

    buf.put_slice(method.as_str().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(path.as_bytes());
    buf.put_slice(b" HTTP/1.1\r\n");

    headers.write_to(&mut buf);
    if !headers.contains("host") {
        write_line(&mut buf, "Host", upstream.authority().as_bytes());
    }
    if body.is_some() && !headers.contains("content-length") {
        write_line(&mut buf, "Content-Length", body_len.to_string().as_bytes());
    }
    write_line(&mut buf, "Connection", b"close");
    buf.put_slice(b"\r\n");

    if let Some(body) = body {
        buf.put_slice(body);
    }
    buf
}
