//! Bastion / load balancer / web pool topology verification library

pub mod cloud;
pub mod config;
pub mod health;
pub mod inventory;
pub mod lifecycle;
pub mod observability;
pub mod probe;
pub mod resilience;

pub use config::schema::VerifyConfig;
pub use health::{ReachabilityOutcome, SshReachabilityPoller};
pub use lifecycle::run_until_interrupted;
