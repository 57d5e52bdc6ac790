//! Upstream response parsing.

use bytes::Bytes;
use http::{Method, StatusCode};
use tokio::io::AsyncRead;

use super::codec::{BodyKind, WireReader, MAX_HEADERS};
use super::error::{HttpError, HttpResult};
use super::headers::Headers;
use crate::config::LimitsConfig;

/// A complete response read from the upstream.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    reason: String,
    headers: Headers,
    body: Bytes,
    framing: BodyKind,
}

impl Response {
    /// Build a response directly (used by tests and error paths).
    pub fn new(status: StatusCode, reason: impl Into<String>, headers: Headers, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            status,
            reason: reason.into(),
            headers,
            framing: BodyKind::Length(body.len() as u64),
            body,
        }
    }

    /// Read one final response, skipping interim `1xx` responses.
    ///
    /// `request_method` decides whether a body can follow (`HEAD` never
    /// has one).
    pub async fn read_from<S>(
        reader: &mut WireReader<S>,
        request_method: &Method,
        limits: &LimitsConfig,
    ) -> HttpResult<Self>
    where
        S: AsyncRead + Unpin,
    {
        let head = loop {
            let head = reader.read_head(limits.max_header_bytes, parse_head).await?;
            if head.status.is_informational() && head.status != StatusCode::SWITCHING_PROTOCOLS {
                tracing::trace!(status = head.status.as_u16(), "Skipping interim response");
                continue;
            }
            break head;
        };

        let framing = head.body_kind(request_method)?;
        let body = reader
            .read_body(framing, limits.max_body_bytes)
            .await?
            .unwrap_or_default();

        Ok(Self {
            status: head.status,
            reason: head.reason,
            headers: head.headers,
            body,
            framing,
        })
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase as sent by the upstream (may be empty).
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Response headers in wire order.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Decoded response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// How the upstream delimited the body.
    pub fn framing(&self) -> BodyKind {
        self.framing
    }
}

/// Whether a response with this status can carry a body at all.
pub fn status_allows_body(status: StatusCode) -> bool {
    !(status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED)
}

struct ResponseHead {
    status: StatusCode,
    reason: String,
    headers: Headers,
}

impl ResponseHead {
    fn body_kind(&self, request_method: &Method) -> HttpResult<BodyKind> {
        if *request_method == Method::HEAD || !status_allows_body(self.status) {
            return Ok(BodyKind::None);
        }
        if self.headers.has_transfer_encoding() {
            if self.headers.is_chunked() {
                return Ok(BodyKind::Chunked);
            }
            return Err(HttpError::Parse("unsupported transfer coding".into()));
        }
        Ok(match self.headers.content_length()? {
            Some(len) => BodyKind::Length(len),
            None => BodyKind::UntilClose,
        })
    }
}

fn parse_head(buf: &[u8]) -> HttpResult<Option<(ResponseHead, usize)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut resp = httparse::Response::new(&mut headers);

    let consumed = match resp.parse(buf) {
        Ok(httparse::Status::Complete(consumed)) => consumed,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => {
            return Err(HttpError::TooManyHeaders { max: MAX_HEADERS })
        }
        Err(e) => return Err(e.into()),
    };

    let code = resp.code.unwrap_or_default();
    let status = StatusCode::from_u16(code)
        .map_err(|_| HttpError::Parse(format!("invalid status code {}", code)))?;

    Ok(Some((
        ResponseHead {
            status,
            reason: raw_reason(buf),
            headers: Headers::from(&*resp.headers),
        },
        consumed,
    )))
}

/// Reason phrase taken from the status line bytes.
///
/// httparse reports an empty reason when the phrase carries obs-text, so the
/// phrase is cut from the raw line instead and decoded lossily.
fn raw_reason(buf: &[u8]) -> String {
    let start = buf.iter().position(|&b| b != b'\r' && b != b'\n').unwrap_or(0);
    let buf = &buf[start..];
    let line_end = buf
        .iter()
        .position(|&b| b == b'\n')
        .unwrap_or(buf.len());
    let line = buf[..line_end].strip_suffix(b"\r").unwrap_or(&buf[..line_end]);
    let reason = line
        .splitn(3, |&b| b == b' ')
        .nth(2)
        .unwrap_or_default();
    String::from_utf8_lossy(reason).into_owned()
}
