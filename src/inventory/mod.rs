//! Ansible inventory parsing.
//!
//! # Data Flow
//! ```text
//! hosts file (INI)
//!     → parser.rs (sections → ordered host keys)
//!     → Inventory (group name → HostRoster)
//!     → roster.rs (normalized names for comparison)
//! ```
//!
//! # Design Decisions
//! - Group headers are case-sensitive and host keys keep their case
//! - `=` is the only key/value delimiter; values are ignored
//! - A missing group is a hard error, never an empty roster

pub mod parser;
pub mod roster;

use thiserror::Error;

pub use parser::{load_roster, Inventory};
pub use roster::{normalize_host, Host, HostRoster};

/// Errors raised while reading an inventory.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("failed to read inventory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: host entry before any [group] header")]
    MissingSectionHeader { line: usize },

    #[error("line {line}: group '{group}' declared twice")]
    DuplicateGroup { group: String, line: usize },

    #[error("line {line}: host '{host}' listed twice in group '{group}'")]
    DuplicateHost { group: String, host: String, line: usize },

    #[error("Group '{0}' not found in inventory")]
    GroupNotFound(String),
}
