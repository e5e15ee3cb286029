//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → VerifyConfig (validated, immutable)
//!     → CLI flags override individual fields
//!     → handed by reference to pollers and runners
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::VerifyConfig;
pub use schema::{AnsibleConfig, BackoffKind, InventoryConfig, LbProbeConfig, ObservabilityConfig, SshPollConfig};
