//! Response relay.
//!
//! # Responsibilities
//! - Serialize the upstream response for the downstream client
//! - Keep every `Set-Cookie` entry on its own line
//! - Own framing and closure: upstream `Connection`/`Transfer-Encoding`
//!   are dropped and exactly one `Connection: close` is appended
//! - Produce 4xx/502 error responses
//!
//! # Header Emission Order
//! ```text
//! status line
//! every upstream entry except Connection / Transfer-Encoding / Set-Cookie
//! every Set-Cookie entry, one line each, in upstream order
//! Content-Length (only when the upstream body was chunked or close-delimited)
//! Connection: close
//! ```

use bytes::{BufMut, BytesMut};
use http::{Method, StatusCode};
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::http::headers::write_line;
use crate::http::response::status_allows_body;
use crate::http::{BodyKind, Response};

const MAX_REASON_LEN: usize = 256;

/// Serialize an upstream response for the downstream connection.
pub fn encode_response(response: &Response, request_method: &Method) -> BytesMut {
    let body = response.body();
    let mut buf = BytesMut::with_capacity(512 + body.len());
    write_status_line(&mut buf, response.status(), response.reason());

    let reframed = matches!(response.framing(), BodyKind::Chunked | BodyKind::UntilClose);
    for entry in response.headers() {
        if entry.is("transfer-encoding")
            || entry.is("connection")
            || entry.is("set-cookie")
            || (reframed && entry.is("content-length"))
        {
            continue;
        }
        write_line(&mut buf, entry.name(), entry.value());
    }
    for cookie in response.headers().iter().filter(|e| e.is("set-cookie")) {
        write_line(&mut buf, cookie.name(), cookie.value());
    }

    if reframed && *request_method != Method::HEAD && status_allows_body(response.status()) {
        write_line(&mut buf, "Content-Length", body.len().to_string().as_bytes());
    }
    write_line(&mut buf, "Connection", b"close");
    buf.put_slice(b"\r\n");
    buf.put_slice(body);
    buf
}

/// Serialize a proxy-generated error response with a one-line text body.
pub fn encode_error(status: StatusCode, reason: &str, detail: &str) -> BytesMut {
    let body = format!("{}\n", sanitize(detail));
    let mut buf = BytesMut::with_capacity(256 + body.len());
    write_status_line(&mut buf, status, reason);
    write_line(&mut buf, "Content-Type", b"text/plain; charset=utf-8");
    write_line(&mut buf, "Content-Length", body.len().to_string().as_bytes());
    write_line(&mut buf, "Connection", b"close");
    buf.put_slice(b"\r\n");
    buf.put_slice(body.as_bytes());
    buf
}

/// Write a fully encoded response and close the write side.
pub async fn send<W>(stream: &mut W, encoded: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(encoded).await?;
    stream.flush().await?;
    stream.shutdown().await
}

fn write_status_line(buf: &mut BytesMut, status: StatusCode, reason: &str) {
    buf.put_slice(b"HTTP/1.1 ");
    buf.put_slice(status.as_str().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(sanitize(reason).as_bytes());
    buf.put_slice(b"\r\n");
}

/// Make text safe for a status line or one-line body: control characters
/// become spaces and the result is length-limited.
fn sanitize(text: &str) -> String {
    text.chars()
        .take(MAX_REASON_LEN)
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
