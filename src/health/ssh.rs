//! SSH reachability polling.
//!
//! # Responsibilities
//! - Run the ansible ping module against a host group
//! - Classify each `<host> | SUCCESS` / `<host> | UNREACHABLE` report line
//! - Retry until the fleet converges, nothing answers, or the budget runs out
//!
//! # Design Decisions
//! - A probe that cannot run, or exits non-zero without a single report
//!   line, counts as zero reachable and never converges
//! - Lines without a `host | STATUS` shape are ignored (JSON bodies, warnings)
//! - One structured log event per attempt

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tokio::time;

use crate::config::SshPollConfig;
use crate::observability::metrics;
use crate::probe::{AnsibleRunner, CommandOutput, CommandRunner, ProbeError};
use crate::resilience::retries::{Decision, RetryPolicy};

/// Per-host classification for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeResult {
    Reachable,
    Unreachable,
}

static REPORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*?) \| \s*(SUCCESS|UNREACHABLE)").expect("report line pattern is valid")
});

/// Classify a single line of ping output.
pub fn classify_line(line: &str) -> Option<(&str, ProbeResult)> {
    let caps = REPORT_LINE.captures(line)?;
    let host = caps.get(1)?.as_str().trim();
    if host.is_empty() {
        return None;
    }

    match caps.get(2)?.as_str() {
        "SUCCESS" => Some((host, ProbeResult::Reachable)),
        _ => Some((host, ProbeResult::Unreachable)),
    }
}

/// Turn ping output into a snapshot.
///
/// A non-zero exit is normal when hosts are unreachable, but only while the
/// report still names hosts; an empty report from a failed run is an error.
pub fn read_report(program: &str, output: &CommandOutput) -> Result<ReachabilitySnapshot, ProbeError> {
    let snapshot = ReachabilitySnapshot::parse(&output.stdout);
    if !output.success() && snapshot.is_empty() {
        return Err(ProbeError::Failed {
            program: program.to_string(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(snapshot)
}

/// Tallies from one ping attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReachabilitySnapshot {
    pub reachable: Vec<String>,
    pub unreachable: Vec<String>,
}

impl ReachabilitySnapshot {
    /// Build a snapshot from ping stdout, in report order.
    pub fn parse(stdout: &str) -> Self {
        let mut snapshot = Self::default();
        for (host, result) in stdout.lines().filter_map(classify_line) {
            match result {
                ProbeResult::Reachable => snapshot.reachable.push(host.to_string()),
                ProbeResult::Unreachable => snapshot.unreachable.push(host.to_string()),
            }
        }
        snapshot
    }

    pub fn reachable_count(&self) -> usize {
        self.reachable.len()
    }

    pub fn unreachable_count(&self) -> usize {
        self.unreachable.len()
    }

    /// No host reported either way.
    pub fn is_empty(&self) -> bool {
        self.reachable.is_empty() && self.unreachable.is_empty()
    }

    /// Status of a host in this snapshot, if it reported at all.
    pub fn status_of(&self, host: &str) -> Option<ProbeResult> {
        if self.unreachable.iter().any(|h| h == host) {
            Some(ProbeResult::Unreachable)
        } else if self.reachable.iter().any(|h| h == host) {
            Some(ProbeResult::Reachable)
        } else {
            None
        }
    }
}

/// Terminal result of [`SshReachabilityPoller::wait_until_reachable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReachabilityOutcome {
    /// No host reported unreachable.
    AllReachable { attempts: u32, snapshot: ReachabilitySnapshot },
    /// Still nothing reachable once the grace period ended.
    NoneReachable { attempts: u32, snapshot: ReachabilitySnapshot },
    /// Attempt budget spent with part of the fleet still unreachable.
    Partial { attempts: u32, snapshot: ReachabilitySnapshot },
}

impl ReachabilityOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::AllReachable { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::AllReachable { attempts, .. }
            | Self::NoneReachable { attempts, .. }
            | Self::Partial { attempts, .. } => *attempts,
        }
    }

    pub fn snapshot(&self) -> &ReachabilitySnapshot {
        match self {
            Self::AllReachable { snapshot, .. }
            | Self::NoneReachable { snapshot, .. }
            | Self::Partial { snapshot, .. } => snapshot,
        }
    }
}

/// Polls a host group over SSH until it converges.
pub struct SshReachabilityPoller<R> {
    ansible: AnsibleRunner<R>,
    group: String,
    policy: RetryPolicy,
}

impl<R: CommandRunner> SshReachabilityPoller<R> {
    pub fn new(ansible: AnsibleRunner<R>, config: &SshPollConfig) -> Self {
        Self {
            ansible,
            group: config.group.clone(),
            policy: RetryPolicy::from_config(config),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ansible(&self) -> &AnsibleRunner<R> {
        &self.ansible
    }

    /// Probe until the group converges or the policy gives up.
    pub async fn wait_until_reachable(&self) -> ReachabilityOutcome {
        let mut attempt: u32 = 0;
        loop {
            let report = self
                .ansible
                .ping(&self.group)
                .await
                .and_then(|output| read_report(self.ansible.ping_binary(), &output));
            let (completed, snapshot) = match report {
                Ok(snapshot) => (true, snapshot),
                Err(e) => {
                    tracing::warn!(group = %self.group, error = %e, "Reachability probe could not run");
                    (false, ReachabilitySnapshot::default())
                }
            };

            let reachable = snapshot.reachable_count();
            let unreachable = snapshot.unreachable_count();
            tracing::info!(attempt, reachable, unreachable, "Reachability probe completed");

            let attempts = attempt + 1;
            match self.policy.decide(attempt, completed, reachable, unreachable) {
                Decision::Converged => {
                    metrics::record_ssh_probe("converged", reachable, unreachable);
                    tracing::info!(attempts, "All hosts are reachable");
                    return ReachabilityOutcome::AllReachable { attempts, snapshot };
                }
                Decision::Failed => {
                    metrics::record_ssh_probe("failed", reachable, unreachable);
                    tracing::error!(attempts, "No reachable hosts found");
                    return ReachabilityOutcome::NoneReachable { attempts, snapshot };
                }
                Decision::Exhausted => {
                    metrics::record_ssh_probe("exhausted", reachable, unreachable);
                    tracing::warn!(attempts, unreachable_hosts = ?snapshot.unreachable, "Retry budget exhausted with hosts still unreachable");
                    return ReachabilityOutcome::Partial { attempts, snapshot };
                }
                Decision::RetryAfter(delay) => {
                    metrics::record_ssh_probe("retry", reachable, unreachable);
                    tracing::info!(delay_secs = delay.as_secs_f64(), "Retrying");
                    time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One-shot status of `group`, without retrying.
    pub async fn hosts_status(&self, group: &str) -> Result<ReachabilitySnapshot, ProbeError> {
        let output = self.ansible.ping(group).await?;
        let snapshot = read_report(self.ansible.ping_binary(), &output)?;
        tracing::info!(
            group,
            reachable = snapshot.reachable_count(),
            unreachable = snapshot.unreachable_count(),
            "Host status collected"
        );
        Ok(snapshot)
    }
}
