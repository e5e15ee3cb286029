//! Reachability verification subsystem.
//!
//! # Data Flow
//! ```text
//! SSH layer (ssh.rs):
//!     ansible ping via the bastion
//!     → classify report lines per host
//!     → retry policy decides: converged / failed / exhausted / retry
//!
//! Load balancer layer (round_robin.rs):
//!     GET http://<lb>:<port>/
//!     → extract "Serving from <id>"
//!     → first repeated id closes the cycle
//!     → diff against the inventory roster
//! ```
//!
//! # Design Decisions
//! - Both loops are strictly sequential: one probe in flight at a time
//! - Transient probe failures never abort a loop
//! - Neither loop can be cancelled from inside; callers wrap them

pub mod round_robin;
pub mod ssh;

pub use round_robin::{check_via_load_balancer, BackendIdPattern, LbClient, LbConvergenceDetector, LbError, LbReport, RoundRobinCycle};
pub use ssh::{ReachabilityOutcome, ReachabilitySnapshot, SshReachabilityPoller};
