//! Per-connection exchange handler.
//!
//! # Responsibilities
//! - Complete the TLS handshake within its deadline
//! - Read exactly one request (answering `Expect: 100-continue`)
//! - Forward it through the header filter and upstream client
//! - Relay the response or an error response, then close
//!
//! # Design Decisions
//! - Every failure is contained in its connection; nothing propagates to
//!   the accept loop
//! - The transport is owned by this task and released on every path

use std::net::SocketAddr;
use std::time::Instant;

use http::StatusCode;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;

use super::filter::outbound_headers;
use super::relay;
use super::upstream::UpstreamClient;
use crate::config::{LimitsConfig, TimeoutConfig};
use crate::http::{BodyKind, HttpError, HttpResult, Request, RequestHead, WireReader};
use crate::net::{ConnectionId, ConnectionLifecycle, ConnectionState};
use crate::observability::metrics;
use crate::resilience::with_deadline;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Shared, read-only state used by every connection task.
#[derive(Clone)]
pub struct ConnectionHandler {
    acceptor: TlsAcceptor,
    upstream: UpstreamClient,
    timeouts: TimeoutConfig,
    limits: LimitsConfig,
}

impl ConnectionHandler {
    pub fn new(
        acceptor: TlsAcceptor,
        upstream: UpstreamClient,
        timeouts: TimeoutConfig,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            acceptor,
            upstream,
            timeouts,
            limits,
        }
    }

    pub fn upstream(&self) -> &UpstreamClient {
        &self.upstream
    }

    /// Serve one accepted TCP connection to completion.
    pub async fn handle(&self, stream: TcpStream, peer: SocketAddr, id: ConnectionId) {
        let _ = stream.set_nodelay(true);

        let tls = match with_deadline(self.timeouts.handshake(), self.acceptor.accept(stream)).await {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => {
                metrics::record_handshake_failure();
                tracing::debug!(peer_addr = %peer, error = %e, "TLS handshake failed");
                return;
            }
            Err(elapsed) => {
                metrics::record_handshake_failure();
                tracing::debug!(peer_addr = %peer, error = %elapsed, "TLS handshake timed out");
                return;
            }
        };

        let mut conn = ConnectionLifecycle::accepted(id);
        let mut reader = WireReader::new(tls);
        self.exchange(&mut conn, &mut reader).await;
        conn.advance(ConnectionState::Closed);
    }

    async fn exchange<S>(&self, conn: &mut ConnectionLifecycle, reader: &mut WireReader<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let read = with_deadline(self.timeouts.request_read(), read_request(reader, &self.limits)).await;
        let request = match read {
            Ok(Ok(request)) => request,
            Ok(Err(err)) => return reject(reader, err).await,
            Err(elapsed) => {
                tracing::debug!(error = %elapsed, "Request read timed out");
                return;
            }
        };
        conn.advance(ConnectionState::RequestRead);
        let started = Instant::now();

        conn.advance(ConnectionState::Forwarding);
        let (encoded, status) = self.forward(&request).await;

        let method = request.method();
        match relay::send(reader.get_mut(), &encoded).await {
            Ok(()) => {
                conn.advance(ConnectionState::ResponseWritten);
                let elapsed = started.elapsed();
                metrics::record_exchange(method.as_str(), status.as_u16(), elapsed);
                tracing::info!(
                    method = %method,
                    path = %request.target(),
                    status = status.as_u16(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Exchange complete"
                );
            }
            Err(e) => {
                tracing::warn!(
                    method = %method,
                    path = %request.target(),
                    error = %e,
                    "Failed to write response"
                );
            }
        }
    }

    /// Run the upstream leg and encode whatever goes back downstream.
    async fn forward(&self, request: &Request) -> (bytes::BytesMut, StatusCode) {
        let mut headers = outbound_headers(request.headers());
        if request.framing() == BodyKind::Chunked {
            // The body is forwarded decoded; a client Content-Length would lie.
            headers.retain(|entry| !entry.is("content-length"));
        }

        let result = self
            .upstream
            .forward(request.method(), request.target(), &headers, request.body())
            .await;

        match result {
            Ok(response) => (
                relay::encode_response(&response, request.method()),
                response.status(),
            ),
            Err(err) => {
                metrics::record_upstream_error(err.kind());
                tracing::warn!(
                    upstream = %self.upstream.target(),
                    kind = err.kind(),
                    error = %err,
                    "Upstream exchange failed"
                );
                let reason = format!("Upstream error: {}", err);
                (
                    relay::encode_error(StatusCode::BAD_GATEWAY, &reason, &err.to_string()),
                    StatusCode::BAD_GATEWAY,
                )
            }
        }
    }
}

/// Read one complete request, sending `100 Continue` when the client asks
/// for it before a non-empty body.
///
/// A declared length above `max_body_bytes` fails before any interim
/// response is written.
pub async fn read_request<S>(reader: &mut WireReader<S>, limits: &LimitsConfig) -> HttpResult<Request>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = RequestHead::read_from(reader, limits).await?;
    let framing = head.body_kind()?;
    if let BodyKind::Length(len) = framing {
        if len > limits.max_body_bytes as u64 {
            return Err(HttpError::BodyTooLarge {
                max: limits.max_body_bytes,
            });
        }
    }
    let has_body = !matches!(framing, BodyKind::None | BodyKind::Length(0));
    if has_body && head.expects_continue() {
        let stream = reader.get_mut();
        stream.write_all(CONTINUE).await?;
        stream.flush().await?;
    }
    head.read_body(reader, limits).await
}

/// Answer a malformed request with its 4xx, or close silently when there is
/// nothing worth answering.
async fn reject<S>(reader: &mut WireReader<S>, err: HttpError)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(status) = err.status() else {
        tracing::debug!(error = %err, "Connection closed before a complete request");
        return;
    };

    tracing::info!(status = status.as_u16(), error = %err, "Rejecting request");
    let reason = status.canonical_reason().unwrap_or("Bad Request");
    let encoded = relay::encode_error(status, reason, &err.to_string());
    if let Err(e) = relay::send(reader.get_mut(), &encoded).await {
        tracing::debug!(error = %e, "Failed to write error response");
    }
}
