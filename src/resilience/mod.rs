//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (one deadline for connect + send + full response)
//!     → On failure: surfaced immediately as an upstream error (502)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No retries: one upstream attempt per exchange, bodies are never replayed

pub mod timeouts;

pub use timeouts::{with_deadline, DeadlineExceeded};
