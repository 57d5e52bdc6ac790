//! Hop-by-hop header filtering.
//!
//! Hop-by-hop headers describe a single transport leg and are never
//! forwarded. Everything else is end-to-end and passes through untouched.

use crate::http::Headers;

/// Headers that only apply to one transport leg (compared case-insensitively).
pub const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "proxy-authorization",
    "proxy-authenticate",
];

/// Whether `name` is in the fixed hop-by-hop set.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Header set to send upstream for the given downstream headers.
///
/// Drops exactly the hop-by-hop names; every other entry is kept with its
/// original casing, value, order and multiplicity.
pub fn outbound_headers(inbound: &Headers) -> Headers {
    inbound
        .iter()
        .filter(|entry| !is_hop_by_hop(entry.name()))
        .cloned()
        .collect()
}
