//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe attempt finished:
//!     → retries.rs (converged? failed? budget left?)
//!     → backoff.rs (how long to sleep before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Every wait is explicit and configurable
//! - Policies are pure so the loops stay trivially testable

pub mod backoff;
pub mod retries;
