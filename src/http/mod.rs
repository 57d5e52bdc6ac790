//! HTTP/1.x wire codec.
//!
//! # Data Flow
//! ```text
//! TLS stream (downstream) / TCP stream (upstream)
//!     → codec.rs (buffered reads: heads, bodies, chunked decoding)
//!     → request.rs (downstream request head + body)
//!     → response.rs (upstream response, interim 1xx skipped)
//!     → headers.rs (ordered, case-preserving multimap)
//! ```
//!
//! # Design Decisions
//! - Headers are never coalesced: one entry per wire line, original casing
//! - Bodies are fully buffered (one exchange per connection, no streaming)
//! - All reads are bounded by `LimitsConfig`

pub mod codec;
pub mod error;
pub mod headers;
pub mod request;
pub mod response;

pub use codec::{BodyKind, WireReader};
pub use error::{HttpError, HttpResult};
pub use headers::{HeaderEntry, Headers};
pub use request::{Request, RequestHead};
pub use response::Response;
