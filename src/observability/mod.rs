//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline + http host produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (rewrite counters and latency histogram)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - `RUST_LOG` always wins over the configured level
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
