//! Ordered, case-preserving header multimap.
//!
//! Entries are kept exactly as they appeared on the wire: original name
//! casing, original order, one entry per header line. Lookups compare names
//! case-insensitively. Nothing is ever coalesced, so a response carrying
//! several `Set-Cookie` lines keeps one entry per cookie.

use bytes::{BufMut, BytesMut};

use super::error::{HttpError, HttpResult};

/// A single header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    name: String,
    value: Vec<u8>,
}

impl HeaderEntry {
    /// Create an entry from a name and raw value.
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Header name with its original casing.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw header value.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Header value as text, if it is valid UTF-8.
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.value).ok()
    }

    /// Case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered header list that may contain duplicate names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<HeaderEntry>,
}

impl Headers {
    /// Create an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, keeping any existing entries with the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.push(HeaderEntry::new(name, value));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.iter().find(|e| e.is(name)).map(|e| e.value())
    }

    /// First value for `name` as text.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.is(name))
            .and_then(|e| e.value_str())
    }

    /// Every value for `name`, in wire order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a [u8]> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.is(name))
            .map(|e| e.value())
    }

    /// Whether at least one entry named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.is(name))
    }

    /// Keep only entries for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&HeaderEntry) -> bool) {
        self.entries.retain(keep);
    }

    /// Iterate entries in wire order.
    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.entries.iter()
    }

    /// Number of entries (not distinct names).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared body length.
    ///
    /// Repeated or comma-separated `Content-Length` values are accepted only
    /// when they all agree.
    pub fn content_length(&self) -> HttpResult<Option<u64>> {
        let mut length: Option<u64> = None;
        for raw in self.get_all("content-length") {
            let text = std::str::from_utf8(raw)
                .map_err(|_| HttpError::InvalidContentLength("not UTF-8".into()))?;
            for part in text.split(',') {
                let part = part.trim();
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(HttpError::InvalidContentLength(part.to_string()));
                }
                let value: u64 = part
                    .parse()
                    .map_err(|_| HttpError::InvalidContentLength(part.to_string()))?;
                match length {
                    Some(existing) if existing != value => {
                        return Err(HttpError::InvalidContentLength(format!(
                            "conflicting values {} and {}",
                            existing, value
                        )));
                    }
                    _ => length = Some(value),
                }
            }
        }
        Ok(length)
    }

    /// Whether any `Transfer-Encoding` entry is present.
    pub fn has_transfer_encoding(&self) -> bool {
        self.contains("transfer-encoding")
    }

    /// Whether `chunked` is the only transfer coding applied.
    ///
    /// Any other coding, alone or stacked with `chunked`, is unsupported.
    pub fn is_chunked(&self) -> bool {
        let mut codings = self
            .get_all("transfer-encoding")
            .flat_map(|raw| raw.split(|&b| b == b','))
            .map(|coding| coding.trim_ascii())
            .filter(|coding| !coding.is_empty())
            .peekable();
        codings.peek().is_some() && codings.all(|coding| coding.eq_ignore_ascii_case(b"chunked"))
    }

    /// Serialize every entry as `Name: value\r\n`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        for entry in &self.entries {
            write_line(buf, entry.name(), entry.value());
        }
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a HeaderEntry;
    type IntoIter = std::slice::Iter<'a, HeaderEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<HeaderEntry> for Headers {
    fn from_iter<I: IntoIterator<Item = HeaderEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl From<&[httparse::Header<'_>]> for Headers {
    fn from(parsed: &[httparse::Header<'_>]) -> Self {
        parsed
            .iter()
            .map(|h| HeaderEntry::new(h.name, h.value))
            .collect()
    }
}

/// Write one header line.
pub(crate) fn write_line(buf: &mut BytesMut, name: &str, value: &[u8]) {
    buf.reserve(name.len() + value.len() + 4);
    buf.put_slice(name.as_bytes());
    buf.put_slice(b": ");
    buf.put_slice(value);
    buf.put_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Headers {
        let mut headers = Headers::new();
        headers.push("Host", "localhost:8443");
        headers.push("Set-Cookie", "a=1");
        headers.push("X-Custom", "one");
        headers.push("set-cookie", "b=2;Expires=Wed, 09 Jun 2025 10:18:14 GMT");
        headers
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let headers = sample();
        assert_eq!(headers.get("HOST"), Some(&b"localhost:8443"[..]));
        assert_eq!(headers.get_str("x-custom"), Some("one"));
        assert!(headers.contains("SET-COOKIE"));
        assert!(!headers.contains("cookie"));
    }

    #[test]
    fn duplicates_are_kept_in_order() {
        let headers = sample();
        let cookies: Vec<_> = headers.get_all("Set-Cookie").collect();
        assert_eq!(
            cookies,
            vec![
                &b"a=1"[..],
                &b"b=2;Expires=Wed, 09 Jun 2025 10:18:14 GMT"[..]
            ]
        );
        assert_eq!(headers.len(), 4);
    }

    #[test]
    fn write_preserves_casing() {
        let mut buf = BytesMut::new();
        sample().write_to(&mut buf);
        assert_eq!(
            &buf[..],
            &b"Host: localhost:8443\r\nSet-Cookie: a=1\r\nX-Custom: one\r\nset-cookie: b=2;Expires=Wed, 09 Jun 2025 10:18:14 GMT\r\n"[..]
        );
    }

    #[test]
    fn content_length_parsing() {
        let mut headers = Headers::new();
        assert_eq!(headers.content_length().unwrap(), None);

        headers.push("Content-Length", "42");
        assert_eq!(headers.content_length().unwrap(), Some(42));

        headers.push("content-length", "42, 42");
        assert_eq!(headers.content_length().unwrap(), Some(42));

        headers.push("Content-Length", "7");
        assert!(matches!(
            headers.content_length(),
            Err(HttpError::InvalidContentLength(_))
        ));
    }

    #[test]
    fn content_length_rejects_signs_and_garbage() {
        for bad in ["-1", "+5", "abc", ""] {
            let mut headers = Headers::new();
            headers.push("Content-Length", bad);
            assert!(headers.content_length().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn chunked_detection_rejects_other_codings() {
        let mut headers = Headers::new();
        assert!(!headers.is_chunked());

        headers.push("Transfer-Encoding", "Chunked");
        assert!(headers.is_chunked());

        for codings in ["gzip, chunked", "chunked, gzip", "identity", " , "] {
            let mut headers = Headers::new();
            headers.push("Transfer-Encoding", codings);
            assert!(!headers.is_chunked(), "accepted {:?}", codings);
            assert!(headers.has_transfer_encoding());
        }

        let mut split = Headers::new();
        split.push("Transfer-Encoding", "gzip");
        split.push("transfer-encoding", "chunked");
        assert!(!split.is_chunked());
    }
}
