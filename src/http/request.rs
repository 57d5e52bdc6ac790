//! Downstream request parsing.
//!
//! A request is read in two steps so the handler can answer
//! `Expect: 100-continue` between the head and the body.

use bytes::Bytes;
use http::Method;
use tokio::io::AsyncRead;

use super::codec::{BodyKind, WireReader, MAX_HEADERS};
use super::error::{HttpError, HttpResult};
use super::headers::Headers;
use crate::config::LimitsConfig;

/// Request line and headers of a downstream request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    target: String,
    minor_version: u8,
    headers: Headers,
}

impl RequestHead {
    /// Read and parse a request head.
    pub async fn read_from<S>(reader: &mut WireReader<S>, limits: &LimitsConfig) -> HttpResult<Self>
    where
        S: AsyncRead + Unpin,
    {
        reader.read_head(limits.max_header_bytes, parse_head).await
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request target exactly as sent (path plus query).
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// How the request body is delimited.
    ///
    /// `Transfer-Encoding` takes precedence over `Content-Length`; a request
    /// with neither has no body.
    pub fn body_kind(&self) -> HttpResult<BodyKind> {
        if self.headers.has_transfer_encoding() {
            if self.headers.is_chunked() {
                return Ok(BodyKind::Chunked);
            }
            return Err(HttpError::Parse("unsupported transfer coding".into()));
        }
        Ok(match self.headers.content_length()? {
            Some(len) => BodyKind::Length(len),
            None => BodyKind::None,
        })
    }

    /// Whether the client waits for `100 Continue` before sending its body.
    pub fn expects_continue(&self) -> bool {
        self.minor_version >= 1
            && self
                .headers
                .get_str("expect")
                .map(|v| v.trim().eq_ignore_ascii_case("100-continue"))
                .unwrap_or(false)
    }

    /// Read the body announced by this head and finish the request.
    pub async fn read_body<S>(self, reader: &mut WireReader<S>, limits: &LimitsConfig) -> HttpResult<Request>
    where
        S: AsyncRead + Unpin,
    {
        let framing = self.body_kind()?;
        let body = reader.read_body(framing, limits.max_body_bytes).await?;
        Ok(Request {
            head: self,
            body,
            framing,
        })
    }
}

/// A complete downstream request. Immutable once read.
#[derive(Debug, Clone)]
pub struct Request {
    head: RequestHead,
    body: Option<Bytes>,
    framing: BodyKind,
}

impl Request {
    /// Request method.
    pub fn method(&self) -> &Method {
        self.head.method()
    }

    /// Request target (path plus query).
    pub fn target(&self) -> &str {
        self.head.target()
    }

    /// Request headers.
    pub fn headers(&self) -> &Headers {
        self.head.headers()
    }

    /// Request body, present iff a length or chunked indicator was set.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// How the client delimited the body.
    pub fn framing(&self) -> BodyKind {
        self.framing
    }
}

fn parse_head(buf: &[u8]) -> HttpResult<Option<(RequestHead, usize)>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let consumed = match req.parse(buf) {
        Ok(httparse::Status::Complete(consumed)) => consumed,
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(httparse::Error::TooManyHeaders) => {
            return Err(HttpError::TooManyHeaders { max: MAX_HEADERS })
        }
        Err(e) => return Err(e.into()),
    };

    let method = req.method.unwrap_or_default();
    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| HttpError::InvalidMethod(method.to_string()))?;
    let target = req.path.unwrap_or("/").to_string();
    let minor_version = req.version.unwrap_or(1);

    Ok(Some((
        RequestHead {
            method,
            target,
            minor_version,
            headers: Headers::from(&*req.headers),
        },
        consumed,
    )))
}
