//! Process lifecycle for the CLI.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     Ctrl-C / SIGTERM → abort the running verification loop
//! ```
//!
//! # Design Decisions
//! - The loops expose no cancellation of their own; they are raced against
//!   the signal future and dropped on interrupt
//! - Dropping a probe mid-flight kills the child process (`kill_on_drop`)

pub mod signals;

pub use signals::{run_until_interrupted, shutdown_signal, Interrupted};
