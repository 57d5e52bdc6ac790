//! Reverse proxy core.
//!
//! # Data Flow
//! ```text
//! server.rs (accept loop, one task per connection)
//!     → handler.rs (TLS handshake, read one request)
//!     → filter.rs (drop hop-by-hop headers)
//!     → upstream.rs (fresh plaintext connection, one attempt, deadline)
//!     → relay.rs (Set-Cookie lines kept apart, Connection: close)
//!     → connection closed
//! ```
//!
//! # Design Decisions
//! - One exchange per connection; no keep-alive on either leg
//! - Upstream failures become 502 responses, never listener errors

pub mod filter;
pub mod handler;
pub mod relay;
pub mod server;
pub mod upstream;

pub use filter::{is_hop_by_hop, outbound_headers, HOP_BY_HOP};
pub use handler::ConnectionHandler;
pub use server::ProxyServer;
pub use upstream::{UpstreamClient, UpstreamError, UpstreamTarget};
