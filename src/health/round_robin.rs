//! Load balancer round-robin convergence detection.
//!
//! # Responsibilities
//! - Repeatedly GET the load balancer's front page
//! - Extract the self-reported backend id (`Serving from <id>`)
//! - Stop at the first repeated id: one full rotation has been observed
//! - Diff the rotation against the inventory roster
//!
//! # Design Decisions
//! - Timeouts, transport errors and bodies without an id are skipped
//! - Fixed delay between requests regardless of outcome
//! - Optional wall-clock budget; exhausting it is an error, not a report

use std::collections::BTreeSet;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tokio::time::{self, Instant};
use url::Url;

use crate::config::LbProbeConfig;
use crate::inventory::{load_roster, normalize_host, HostRoster, InventoryError};
use crate::observability::metrics;
use crate::probe::ProbeError;

/// Errors from load balancer convergence detection.
#[derive(Debug, Error)]
pub enum LbError {
    #[error("invalid load balancer endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("invalid backend marker: {0}")]
    Marker(#[from] regex::Error),

    #[error("no full round-robin cycle after {waited:?} ({} backends seen)", .observed.len())]
    Timeout { waited: Duration, observed: Vec<String> },
}

/// Compiled `<marker> <id>` matcher; `<id>` is the following non-whitespace run.
#[derive(Debug, Clone)]
pub struct BackendIdPattern {
    regex: Regex,
}

impl BackendIdPattern {
    pub fn new(marker: &str) -> Result<Self, LbError> {
        let pattern = format!(r"{} (\S+)", regex::escape(marker));
        Ok(Self {
            regex: Regex::new(&pattern)?,
        })
    }

    pub fn extract<'a>(&self, body: &'a str) -> Option<&'a str> {
        self.regex.captures(body)?.get(1).map(|m| m.as_str())
    }
}

/// Distinct backend ids in first-seen order, closed at the first repeat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoundRobinCycle {
    members: Vec<String>,
    closed: bool,
}

impl RoundRobinCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id. Returns true when this observation closes the cycle.
    ///
    /// Observations after the cycle closed are ignored.
    pub fn observe(&mut self, id: &str) -> bool {
        if self.closed {
            return false;
        }
        if self.members.iter().any(|m| m == id) {
            self.closed = true;
            return true;
        }
        self.members.push(id.to_string());
        false
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn normalized(&self) -> BTreeSet<String> {
        self.members.iter().map(|m| normalize_host(m)).collect()
    }
}

/// Which expected backends answered through the balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LbReport {
    /// Ids in the order the balancer served them.
    pub cycle: Vec<String>,
    /// Normalized ids observed.
    pub reachable: BTreeSet<String>,
    /// Normalized roster entries never observed.
    pub unreachable: BTreeSet<String>,
    /// HTTP requests issued.
    pub probes: u32,
}

impl LbReport {
    pub fn from_cycle(cycle: &RoundRobinCycle, expected: &HostRoster, probes: u32) -> Self {
        let reachable = cycle.normalized();
        let unreachable = expected.normalized().difference(&reachable).cloned().collect();
        Self {
            cycle: cycle.members().to_vec(),
            reachable,
            unreachable,
            probes,
        }
    }

    pub fn all_reachable(&self) -> bool {
        self.unreachable.is_empty()
    }
}

/// A single request against the balancer, returning the body text.
pub trait HttpProbe: Send + Sync {
    fn fetch(&self) -> impl Future<Output = Result<String, ProbeError>> + Send;
}

/// reqwest-backed probe of `http://<address>:<port>/`.
#[derive(Debug, Clone)]
pub struct LbClient {
    client: reqwest::Client,
    url: Url,
    timeout: Duration,
}

impl LbClient {
    pub fn new(config: &LbProbeConfig) -> Result<Self, LbError> {
        let endpoint = format!("http://{}:{}/", config.address, config.port);
        let url = Url::parse(&endpoint).map_err(|source| LbError::InvalidEndpoint { endpoint, source })?;
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            url,
            timeout: config.request_timeout(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl HttpProbe for LbClient {
    async fn fetch(&self) -> Result<String, ProbeError> {
        let response = self
            .client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, self.timeout))?;
        response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(e, self.timeout))
    }
}

fn classify_reqwest_error(e: reqwest::Error, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout(timeout)
    } else {
        ProbeError::Http(e.to_string())
    }
}

/// Polls the balancer until one full rotation has been seen.
pub struct LbConvergenceDetector<P> {
    probe: P,
    pattern: BackendIdPattern,
    poll_interval: Duration,
    max_wait: Option<Duration>,
}

impl<P: HttpProbe> LbConvergenceDetector<P> {
    pub fn new(probe: P, config: &LbProbeConfig) -> Result<Self, LbError> {
        Ok(Self {
            probe,
            pattern: BackendIdPattern::new(&config.marker)?,
            poll_interval: config.poll_interval(),
            max_wait: config.max_wait(),
        })
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Poll until an id repeats. Returns the cycle and the number of requests.
    pub async fn observe_cycle(&self) -> Result<(RoundRobinCycle, u32), LbError> {
        let started = Instant::now();
        let mut cycle = RoundRobinCycle::new();
        let mut probes: u32 = 0;

        loop {
            if let Some(max_wait) = self.max_wait {
                let waited = started.elapsed();
                if waited >= max_wait {
                    tracing::error!(waited_secs = waited.as_secs_f64(), observed = ?cycle.members(), "Gave up waiting for a full round-robin cycle");
                    return Err(LbError::Timeout {
                        waited,
                        observed: cycle.members().to_vec(),
                    });
                }
            }

            probes += 1;
            match self.probe.fetch().await {
                Ok(body) => match self.pattern.extract(&body) {
                    Some(id) => {
                        metrics::record_lb_probe("served");
                        if cycle.observe(id) {
                            tracing::info!(backend = id, probes, cycle = ?cycle.members(), "Round-robin cycle closed");
                            metrics::record_lb_backends(cycle.len());
                            return Ok((cycle, probes));
                        }
                        tracing::debug!(backend = id, seen = cycle.len(), "New backend observed");
                        metrics::record_lb_backends(cycle.len());
                    }
                    None => {
                        metrics::record_lb_probe("unrecognized");
                        tracing::debug!("Response carried no backend id");
                    }
                },
                Err(ProbeError::Timeout(t)) => {
                    metrics::record_lb_probe("timeout");
                    tracing::debug!(timeout_secs = t.as_secs_f64(), "Load balancer request timed out");
                }
                Err(e) => {
                    metrics::record_lb_probe("error");
                    tracing::debug!(error = %e, "Load balancer request failed");
                }
            }

            time::sleep(self.poll_interval).await;
        }
    }

    /// Observe one rotation and diff it against `expected`.
    pub async fn detect(&self, expected: &HostRoster) -> Result<LbReport, LbError> {
        let (cycle, probes) = self.observe_cycle().await?;
        let report = LbReport::from_cycle(&cycle, expected, probes);
        if report.all_reachable() {
            tracing::info!(reachable = ?report.reachable, "All backends served through the load balancer");
        } else {
            tracing::warn!(unreachable = ?report.unreachable, "Backends missing from the round-robin cycle");
        }
        Ok(report)
    }
}

/// Load the expected roster, then verify it through the balancer.
///
/// The roster is read before any request is issued, so a missing group
/// fails immediately.
pub async fn check_via_load_balancer(config: &LbProbeConfig, inventory_path: &Path) -> Result<LbReport, LbError> {
    let expected = load_roster(inventory_path, &config.group)?;
    let client = LbClient::new(config)?;
    tracing::info!(url = %client.url(), group = %config.group, expected = expected.len(), "Probing load balancer");
    LbConvergenceDetector::new(client, config)?.detect(&expected).await
}
