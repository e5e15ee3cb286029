//! stack-verify
//!
//! Verifies a bastion / load balancer / web pool deployment end to end.
//!
//! # Architecture Overview
//!
//! ```text
//!   stack-verify wait-ssh ──▶ probe::AnsibleRunner ──ansible ping──▶ bastion ──▶ hosts
//!          │                        │
//!          │                        ▼
//!          │               health::ssh (retry policy)
//!          │
//!   stack-verify check-lb ──▶ health::round_robin ──GET /──▶ load balancer ──▶ web pool
//!          │                        │
//!          │                        ▼
//!          │               inventory roster diff
//!          │
//!   cross-cutting: config (TOML + flags), observability (tracing, metrics),
//!                  lifecycle (Ctrl-C aborts the running loop)
//! ```
//!
//! Exit status: 0 when verification passed, 1 when it completed with
//! unreachable hosts, 130 when interrupted. Setup errors are returned.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use stack_verify::config::validation::validate_config;
use stack_verify::config::{load_or_default, ConfigError, VerifyConfig};
use stack_verify::health::{check_via_load_balancer, LbReport, ReachabilityOutcome, ReachabilitySnapshot, SshReachabilityPoller};
use stack_verify::lifecycle::{run_until_interrupted, shutdown_signal};
use stack_verify::observability;
use stack_verify::probe::{AnsibleRunner, ProcessRunner};

#[derive(Parser)]
#[command(name = "stack-verify")]
#[command(about = "Verify SSH and load balancer reachability of a deployed topology", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print reports as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Ansible inventory file.
    #[arg(short, long, global = true)]
    inventory: Option<PathBuf>,

    /// SSH config routing hosts through the bastion.
    #[arg(long, global = true)]
    ssh_config: Option<PathBuf>,

    /// Log level when RUST_LOG is unset.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ping a host group until every host answers over SSH
    WaitSsh {
        #[arg(short, long)]
        group: Option<String>,
        /// Give up after this many probes (0 = never).
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Ping a host group once and list reachable and unreachable hosts
    HostsStatus {
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Observe one round-robin cycle through the load balancer
    CheckLb {
        #[command(flatten)]
        lb: LbArgs,
    },
    /// Run an ansible playbook against the inventory
    Playbook {
        playbook: PathBuf,
        /// Comma-separated tags to limit the run.
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// wait-ssh, then check-lb
    Verify {
        #[arg(long)]
        max_attempts: Option<u32>,
        #[command(flatten)]
        lb: LbArgs,
    },
}

#[derive(clap::Args)]
struct LbArgs {
    /// Load balancer address.
    #[arg(short, long)]
    address: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    /// Inventory group expected behind the balancer.
    #[arg(long)]
    lb_group: Option<String>,
    /// Give up after this many seconds (0 = never).
    #[arg(long)]
    max_wait: Option<u64>,
}

impl LbArgs {
    fn apply(&self, config: &mut VerifyConfig) {
        if let Some(address) = &self.address {
            config.lb_probe.address = address.clone();
        }
        if let Some(port) = self.port {
            config.lb_probe.port = port;
        }
        if let Some(group) = &self.lb_group {
            config.lb_probe.group = group.clone();
        }
        if let Some(max_wait) = self.max_wait {
            config.lb_probe.max_wait_secs = max_wait;
        }
    }
}

fn apply_overrides(cli: &Cli, config: &mut VerifyConfig) -> Result<(), ConfigError> {
    if let Some(inventory) = &cli.inventory {
        config.inventory.inventory_path = inventory.clone();
    }
    if let Some(ssh_config) = &cli.ssh_config {
        config.inventory.ssh_config_path = ssh_config.clone();
    }
    if let Some(level) = &cli.log_level {
        config.observability.log_level = level.clone();
    }

    match &cli.command {
        Commands::WaitSsh { group, max_attempts } => {
            if let Some(group) = group {
                config.ssh_poll.group = group.clone();
            }
            if let Some(max) = max_attempts {
                config.ssh_poll.max_attempts = *max;
            }
        }
        Commands::HostsStatus { group } => {
            if let Some(group) = group {
                config.ansible.status_group = group.clone();
            }
        }
        Commands::CheckLb { lb } => lb.apply(config),
        Commands::Verify { max_attempts, lb } => {
            if let Some(max) = max_attempts {
                config.ssh_poll.max_attempts = *max;
            }
            lb.apply(config);
        }
        Commands::Playbook { .. } => {}
    }

    validate_config(config).map_err(ConfigError::Validation)
}

#[derive(Serialize)]
struct VerifyReport<'a> {
    ssh: &'a ReachabilityOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    load_balancer: Option<&'a LbReport>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_or_default(cli.config.as_deref())?;
    apply_overrides(&cli, &mut config)?;

    observability::logging::init(&config.observability.log_level);
    tracing::info!(
        inventory = %config.inventory.inventory_path.display(),
        ssh_config = %config.inventory.ssh_config_path.display(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    match run_until_interrupted(run(&cli, &config), shutdown_signal()).await {
        Ok(result) => result,
        Err(interrupted) => {
            tracing::warn!("{interrupted}");
            Ok(ExitCode::from(130))
        }
    }
}

async fn run(cli: &Cli, config: &VerifyConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let ansible = AnsibleRunner::new(ProcessRunner, &config.inventory, &config.ansible);

    match &cli.command {
        Commands::WaitSsh { .. } => {
            let poller = SshReachabilityPoller::new(ansible, &config.ssh_poll);
            let outcome = poller.wait_until_reachable().await;
            if cli.json {
                print_json(&outcome)?;
            } else {
                print_outcome(&outcome);
            }
            Ok(exit_code(outcome.is_success()))
        }
        Commands::HostsStatus { .. } => {
            let poller = SshReachabilityPoller::new(ansible, &config.ssh_poll);
            let snapshot = poller.hosts_status(&config.ansible.status_group).await?;
            if cli.json {
                print_json(&snapshot)?;
            } else {
                print_snapshot(&snapshot);
            }
            Ok(exit_code(snapshot.unreachable.is_empty()))
        }
        Commands::CheckLb { .. } => {
            let report = check_via_load_balancer(&config.lb_probe, &config.inventory.inventory_path).await?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_lb_report(&report);
            }
            Ok(exit_code(report.all_reachable()))
        }
        Commands::Playbook { playbook, tags } => {
            let output = ansible.run_playbook(playbook, tags).await?;
            if cli.json {
                print_json(&serde_json::json!({ "playbook": playbook, "code": output.code, "success": output.success() }))?;
            } else {
                print!("{}", output.stdout);
                eprint!("{}", output.stderr);
            }
            Ok(exit_code(output.success()))
        }
        Commands::Verify { .. } => {
            let poller = SshReachabilityPoller::new(ansible, &config.ssh_poll);
            let outcome = poller.wait_until_reachable().await;
            let report = if outcome.is_success() {
                Some(check_via_load_balancer(&config.lb_probe, &config.inventory.inventory_path).await?)
            } else {
                tracing::error!("Skipping load balancer check, SSH layer did not converge");
                None
            };

            if cli.json {
                print_json(&VerifyReport {
                    ssh: &outcome,
                    load_balancer: report.as_ref(),
                })?;
            } else {
                print_outcome(&outcome);
                if let Some(report) = &report {
                    print_lb_report(report);
                }
            }
            Ok(exit_code(report.is_some_and(|r| r.all_reachable())))
        }
    }
}

fn exit_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome(outcome: &ReachabilityOutcome) {
    let verdict = match outcome {
        ReachabilityOutcome::AllReachable { .. } => "all hosts reachable",
        ReachabilityOutcome::NoneReachable { .. } => "no hosts reachable",
        ReachabilityOutcome::Partial { .. } => "some hosts unreachable",
    };
    println!("SSH: {verdict} after {} attempt(s)", outcome.attempts());
    print_snapshot(outcome.snapshot());
}

fn print_snapshot(snapshot: &ReachabilitySnapshot) {
    println!("  reachable ({}): {}", snapshot.reachable_count(), snapshot.reachable.join(", "));
    println!("  unreachable ({}): {}", snapshot.unreachable_count(), snapshot.unreachable.join(", "));
}

fn print_lb_report(report: &LbReport) {
    println!("Load balancer: cycle {} after {} request(s)", report.cycle.join(" → "), report.probes);
    let join = |set: &std::collections::BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(", ");
    println!("  reachable ({}): {}", report.reachable.len(), join(&report.reachable));
    println!("  unreachable ({}): {}", report.unreachable.len(), join(&report.unreachable));
}
