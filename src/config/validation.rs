//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, ports valid)
//! - Check that the load balancer endpoint forms a valid URL
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: VerifyConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use crate::config::schema::VerifyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("ssh_poll.max_delay_secs ({max}) is below ssh_poll.interval_secs ({interval})")]
    DelayBelowInterval { max: u64, interval: u64 },

    #[error("lb_probe endpoint '{0}' is not a valid URL")]
    InvalidEndpoint(String),

    #[error("unknown log level '{0}'")]
    InvalidLogLevel(String),

    #[error("metrics address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check every semantic constraint and collect all violations.
pub fn validate_config(config: &VerifyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.ssh_poll.group.trim().is_empty() {
        errors.push(ValidationError::Empty("ssh_poll.group"));
    }
    if config.lb_probe.group.trim().is_empty() {
        errors.push(ValidationError::Empty("lb_probe.group"));
    }
    if config.ansible.status_group.trim().is_empty() {
        errors.push(ValidationError::Empty("ansible.status_group"));
    }
    if config.lb_probe.marker.trim().is_empty() {
        errors.push(ValidationError::Empty("lb_probe.marker"));
    }
    if config.inventory.inventory_path.as_os_str().is_empty() {
        errors.push(ValidationError::Empty("inventory.inventory_path"));
    }

    if config.lb_probe.port == 0 {
        errors.push(ValidationError::Zero("lb_probe.port"));
    }
    if config.lb_probe.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("lb_probe.request_timeout_secs"));
    }
    if config.ssh_poll.max_delay_secs < config.ssh_poll.interval_secs {
        errors.push(ValidationError::DelayBelowInterval {
            max: config.ssh_poll.max_delay_secs,
            interval: config.ssh_poll.interval_secs,
        });
    }

    let endpoint = format!("http://{}:{}/", config.lb_probe.address, config.lb_probe.port);
    if config.lb_probe.address.trim().is_empty() || url::Url::parse(&endpoint).is_err() {
        errors.push(ValidationError::InvalidEndpoint(endpoint));
    }

    if config.observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::InvalidLogLevel(config.observability.log_level.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
