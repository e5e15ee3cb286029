//! External probe plumbing.
//!
//! # Data Flow
//! ```text
//! health::ssh poller
//!     → ansible.rs (build ping / playbook argv)
//!     → runner.rs (spawn process, capture output)
//!     → stdout handed back for parsing
//! ```
//!
//! # Design Decisions
//! - Non-zero exit alone is not an error: ansible exits non-zero whenever a
//!   host is unreachable, and the report is still on stdout
//! - A non-zero exit with no report at all is `ProbeError::Failed`
//! - The runner is a trait so pollers run against scripted output in tests

pub mod ansible;
pub mod runner;

use std::time::Duration;

use thiserror::Error;

pub use ansible::AnsibleRunner;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner, ScriptedRunner};

/// Failure to obtain a probe result at all.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {code:?} without a host report: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP probe failed: {0}")]
    Http(String),
}
