//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pollers produce:
//!     → logging.rs (one structured event per attempt)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → stderr
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```

pub mod logging;
pub mod metrics;
