//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limit)
//!     → tls.rs (acceptor built once at startup)
//!     → connection.rs (lifecycle tracking, state machine)
//!     → Hand off to proxy::handler
//!
//! Connection States:
//!     Accepted → RequestRead → Forwarding → ResponseWritten → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - TLS is mandatory; there is no plaintext listener

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionLifecycle, ConnectionState, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
pub use tls::{load_tls_acceptor, TlsError};
