//! Buffered HTTP/1.x message reader.
//!
//! `WireReader` owns the read side of a transport together with whatever
//! bytes were read past the current message element. Heads are parsed by
//! the caller-supplied parser (`httparse` based, see `request.rs` and
//! `response.rs`); bodies are read according to their [`BodyKind`].

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::{HttpError, HttpResult};

/// Maximum number of header lines accepted in one message head.
pub const MAX_HEADERS: usize = 100;

/// Longest chunk-size or trailer line accepted.
const MAX_CHUNK_LINE: usize = 4096;

const READ_CHUNK: usize = 8 * 1024;

/// How the body of a message is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// No body at all.
    None,
    /// Exactly this many bytes follow the head.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// Everything until the peer closes (responses only).
    UntilClose,
}

/// Buffered reader for HTTP/1.x messages.
#[derive(Debug)]
pub struct WireReader<S> {
    stream: S,
    buf: BytesMut,
}

impl<S: AsyncRead + Unpin> WireReader<S> {
    /// Wrap a transport.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Access the wrapped transport (used to write on the same connection).
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Bytes read from the transport but not consumed yet.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    async fn fill(&mut self) -> HttpResult<usize> {
        self.buf.reserve(READ_CHUNK);
        Ok(self.stream.read_buf(&mut self.buf).await?)
    }

    /// Read until `parse` recognises a complete head.
    ///
    /// `parse` returns `Ok(None)` while the head is incomplete and
    /// `Ok(Some((head, consumed)))` once it is complete.
    pub async fn read_head<T, F>(&mut self, max_bytes: usize, mut parse: F) -> HttpResult<T>
    where
        F: FnMut(&[u8]) -> HttpResult<Option<(T, usize)>>,
    {
        loop {
            if !self.buf.is_empty() {
                if let Some((head, consumed)) = parse(&self.buf)? {
                    if consumed > max_bytes {
                        return Err(HttpError::HeadTooLarge { max: max_bytes });
                    }
                    self.buf.advance(consumed);
                    return Ok(head);
                }
            }
            if self.buf.len() >= max_bytes {
                return Err(HttpError::HeadTooLarge { max: max_bytes });
            }
            if self.fill().await? == 0 {
                return Err(if self.buf.is_empty() {
                    HttpError::ConnectionClosed
                } else {
                    HttpError::Incomplete("message head")
                });
            }
        }
    }

    /// Read a body delimited by `kind`. `None` is returned only for
    /// [`BodyKind::None`].
    pub async fn read_body(&mut self, kind: BodyKind, max_bytes: usize) -> HttpResult<Option<Bytes>> {
        match kind {
            BodyKind::None => Ok(None),
            BodyKind::Length(len) => self.read_exact(len, max_bytes).await.map(Some),
            BodyKind::Chunked => self.read_chunked(max_bytes).await.map(Some),
            BodyKind::UntilClose => self.read_to_close(max_bytes).await.map(Some),
        }
    }

    async fn read_exact(&mut self, len: u64, max_bytes: usize) -> HttpResult<Bytes> {
        let len = usize::try_from(len)
            .ok()
            .filter(|len| *len <= max_bytes)
            .ok_or(HttpError::BodyTooLarge { max: max_bytes })?;
        while self.buf.len() < len {
            if self.fill().await? == 0 {
                return Err(HttpError::Incomplete("body"));
            }
        }
        Ok(self.buf.split_to(len).freeze())
    }

    async fn read_chunked(&mut self, max_bytes: usize) -> HttpResult<Bytes> {
        let mut body = BytesMut::new();
        loop {
            let line = self.read_line(MAX_CHUNK_LINE).await?;
            let size = parse_chunk_size(&line)?;
            if size == 0 {
                break;
            }
            let remaining = max_bytes.saturating_sub(body.len());
            if size > remaining {
                return Err(HttpError::BodyTooLarge { max: max_bytes });
            }
            let chunk = self.read_exact(size as u64, remaining).await?;
            body.extend_from_slice(&chunk);
            if !self.read_line(0).await?.is_empty() {
                return Err(HttpError::InvalidChunk("missing CRLF after chunk data".into()));
            }
        }
        // Trailer section; trailers are hop-by-hop and dropped.
        while !self.read_line(MAX_CHUNK_LINE).await?.is_empty() {}
        Ok(body.freeze())
    }

    async fn read_to_close(&mut self, max_bytes: usize) -> HttpResult<Bytes> {
        loop {
            if self.buf.len() > max_bytes {
                return Err(HttpError::BodyTooLarge { max: max_bytes });
            }
            if self.fill().await? == 0 {
                return Ok(self.buf.split().freeze());
            }
        }
    }

    /// Read one line, stripping the terminating CRLF (or bare LF).
    async fn read_line(&mut self, max_len: usize) -> HttpResult<Bytes> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                if pos > max_len + 1 {
                    return Err(HttpError::InvalidChunk("line too long".into()));
                }
                let mut line = self.buf.split_to(pos + 1);
                line.truncate(pos);
                if line.last() == Some(&b'\r') {
                    line.truncate(pos - 1);
                }
                return Ok(line.freeze());
            }
            if self.buf.len() > max_len + 1 {
                return Err(HttpError::InvalidChunk("line too long".into()));
            }
            if self.fill().await? == 0 {
                return Err(HttpError::Incomplete("chunked body"));
            }
        }
    }
}

/// Parse a chunk-size line, ignoring chunk extensions.
fn parse_chunk_size(line: &[u8]) -> HttpResult<usize> {
    let size = line.split(|&b| b == b';').next().unwrap_or_default();
    let size = std::str::from_utf8(size)
        .map_err(|_| HttpError::InvalidChunk("chunk size is not ASCII".into()))?
        .trim_matches(|c| c == ' ' || c == '\t');
    if size.is_empty() || size.len() > 16 {
        return Err(HttpError::InvalidChunk(format!("bad chunk size {:?}", size)));
    }
    let size = u64::from_str_radix(size, 16)
        .map_err(|_| HttpError::InvalidChunk(format!("bad chunk size {:?}", size)))?;
    usize::try_from(size).map_err(|_| HttpError::InvalidChunk("chunk size overflows".into()))
}
