//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the verifier.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct VerifyConfig {
    /// Inventory and SSH routing files shared by every probe.
    pub inventory: InventoryConfig,

    /// SSH reachability polling.
    pub ssh_poll: SshPollConfig,

    /// Load balancer round-robin probing.
    pub lb_probe: LbProbeConfig,

    /// Ansible executables and groups.
    pub ansible: AnsibleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Inventory file locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// INI inventory describing host groups.
    pub inventory_path: PathBuf,

    /// SSH client config routing hosts through the bastion.
    pub ssh_config_path: PathBuf,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            inventory_path: PathBuf::from("hosts"),
            ssh_config_path: PathBuf::from("ssh_config"),
        }
    }
}

/// Delay growth between SSH probe attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay every attempt.
    #[default]
    Fixed,
    /// Doubling delay with jitter, capped at `max_delay_secs`.
    Exponential,
}

/// SSH reachability poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SshPollConfig {
    /// Host group passed to the ping module.
    pub group: String,

    /// Delay between attempts in seconds.
    pub interval_secs: u64,

    /// Attempts allowed to report zero reachable hosts before giving up.
    pub grace_attempts: u32,

    /// Total attempt budget (0 = unbounded).
    pub max_attempts: u32,

    /// Delay growth strategy.
    pub backoff: BackoffKind,

    /// Cap for exponential backoff in seconds.
    pub max_delay_secs: u64,
}

impl SshPollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Default for SshPollConfig {
    fn default() -> Self {
        Self {
            group: "all".to_string(),
            interval_secs: 5,
            grace_attempts: 3,
            max_attempts: 0,
            backoff: BackoffKind::Fixed,
            max_delay_secs: 60,
        }
    }
}

/// Load balancer probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LbProbeConfig {
    /// Load balancer public address (IP or hostname).
    pub address: String,

    /// Load balancer frontend port.
    pub port: u16,

    /// Inventory group holding the expected backends.
    pub group: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Delay between requests in milliseconds.
    pub poll_interval_ms: u64,

    /// Wall-clock budget for observing a full cycle (0 = unbounded).
    pub max_wait_secs: u64,

    /// Text preceding the backend identifier in the response body.
    pub marker: String,
}

impl LbProbeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Option<Duration> {
        (self.max_wait_secs > 0).then(|| Duration::from_secs(self.max_wait_secs))
    }
}

impl Default for LbProbeConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 5000,
            group: "webservers".to_string(),
            request_timeout_secs: 3,
            poll_interval_ms: 500,
            max_wait_secs: 0,
            marker: "Serving from".to_string(),
        }
    }
}

/// Ansible command configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnsibleConfig {
    /// Ad-hoc command binary used for the ping module.
    pub ping_binary: String,

    /// Playbook binary.
    pub playbook_binary: String,

    /// Group probed by the one-shot host status check.
    pub status_group: String,
}

impl Default for AnsibleConfig {
    fn default() -> Self {
        Self {
            ping_binary: "ansible".to_string(),
            playbook_binary: "ansible-playbook".to_string(),
            status_group: "webservers".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
