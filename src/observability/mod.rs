//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Connection handler, listener, startup:
//!     → logging.rs (structured log events, one line per exchange)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Connection ID flows through every event of a connection
//! - Metrics are cheap and disabled unless configured

pub mod logging;
pub mod metrics;

pub use self::logging::{init_logging, LoggingError};
pub use self::metrics::init_metrics;
