//! Best-effort removal of everything a deployment tag created.
//!
//! Every step looks its resource up by name; a missing resource is skipped,
//! a failing delete is logged and recorded, and teardown moves on.

use serde::Serialize;

use crate::cloud::provision::ResourceNames;
use crate::cloud::{CloudResult, ComputeApi, NetworkApi};

/// What teardown did, per resource name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub deleted: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<(String, String)>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, name: String, result: CloudResult<()>) {
        match result {
            Ok(()) => {
                tracing::info!(resource = %name, "Deleted");
                self.deleted.push(name);
            }
            Err(e) => {
                tracing::error!(resource = %name, error = %e, "Delete failed");
                self.failures.push((name, e.to_string()));
            }
        }
    }

    fn skip(&mut self, name: String) {
        tracing::info!(resource = %name, "Not found, skipping");
        self.skipped.push(name);
    }

    fn lookup<T>(&mut self, name: &str, result: CloudResult<Option<T>>) -> Option<T> {
        match result {
            Ok(Some(found)) => Some(found),
            Ok(None) => {
                self.skip(name.to_string());
                None
            }
            Err(e) => {
                tracing::error!(resource = %name, error = %e, "Lookup failed");
                self.failures.push((name.to_string(), e.to_string()));
                None
            }
        }
    }
}

/// Delete the deployment tagged `tag`.
///
/// ```text
/// servers (name contains tag) → unattached floating IPs
///     → router interface → router → subnet → network
///     → security groups → keypair
/// ```
pub fn teardown<C>(cloud: &C, tag: &str) -> TeardownReport
where
    C: NetworkApi + ComputeApi,
{
    let names = ResourceNames::new(tag);
    let mut report = TeardownReport::default();
    tracing::info!(tag, "Tearing down deployment");

    delete_servers(cloud, tag, &mut report);
    delete_floating_ips(cloud, &mut report);
    delete_router(cloud, &names, &mut report);

    let subnet_name = names.subnet();
    if let Some(subnet) = report.lookup(&subnet_name, cloud.find_subnet(&subnet_name)) {
        report.record(subnet_name, cloud.delete_subnet(&subnet.id));
    }

    let network_name = names.network();
    if let Some(network) = report.lookup(&network_name, cloud.find_network(&network_name)) {
        report.record(network_name, cloud.delete_network(&network.id));
    }

    for name in [names.webservers_group(), names.haproxy_group(), names.bastion_group()] {
        if let Some(group) = report.lookup(&name, cloud.find_security_group(&name)) {
            report.record(name, cloud.delete_security_group(&group.id));
        }
    }

    let keypair_name = names.keypair();
    if report.lookup(&keypair_name, cloud.find_keypair(&keypair_name)).is_some() {
        let result = cloud.delete_keypair(&keypair_name);
        report.record(keypair_name, result);
    }

    tracing::info!(
        tag,
        deleted = report.deleted.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        "Teardown finished"
    );
    report
}

fn delete_servers<C: ComputeApi>(compute: &C, tag: &str, report: &mut TeardownReport) {
    let servers = match compute.servers() {
        Ok(servers) => servers,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list servers");
            report.failures.push(("servers".to_string(), e.to_string()));
            return;
        }
    };
    for server in servers.into_iter().filter(|s| s.name.contains(tag)) {
        report.record(server.name, compute.delete_server(&server.id));
    }
}

fn delete_floating_ips<N: NetworkApi>(net: &N, report: &mut TeardownReport) {
    let floating_ips = match net.floating_ips() {
        Ok(ips) => ips,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list floating IPs");
            report.failures.push(("floating_ips".to_string(), e.to_string()));
            return;
        }
    };
    for fip in floating_ips.into_iter().filter(|f| f.port_id.is_none()) {
        report.record(fip.address, net.delete_floating_ip(&fip.id));
    }
}

fn delete_router<N: NetworkApi>(net: &N, names: &ResourceNames, report: &mut TeardownReport) {
    let router_name = names.router();
    let Some(router) = report.lookup(&router_name, net.find_router(&router_name)) else {
        return;
    };

    let subnet_name = names.subnet();
    if let Ok(Some(subnet)) = net.find_subnet(&subnet_name) {
        if let Err(e) = net.remove_router_interface(&router.id, &subnet.id) {
            tracing::error!(router = %router_name, subnet = %subnet_name, error = %e, "Failed to remove router interface");
            report.failures.push((format!("{router_name}/{subnet_name}"), e.to_string()));
        } else {
            tracing::info!(router = %router_name, subnet = %subnet_name, "Removed router interface");
        }
    }

    report.record(router_name, net.delete_router(&router.id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::provision::{provision_topology, TopologyPlan, EXTERNAL_NETWORK};
    use crate::cloud::InMemoryCloud;

    fn provisioned() -> InMemoryCloud {
        let cloud = InMemoryCloud::with_external_network(EXTERNAL_NETWORK);
        provision_topology(&cloud, &TopologyPlan::new("lab", "ssh-ed25519 AAAA test")).unwrap();
        cloud
    }

    #[test]
    fn test_teardown_removes_everything() {
        let cloud = provisioned();
        let report = teardown(&cloud, "lab");

        assert!(report.is_clean(), "{:?}", report.failures);
        assert!(cloud.servers().unwrap().is_empty());
        assert_eq!(cloud.network_names(), [EXTERNAL_NETWORK]);
        assert!(cloud.security_group_names().is_empty());
        assert!(cloud.find_keypair("labkeypair").unwrap().is_none());
        assert!(cloud.floating_ips().unwrap().is_empty());
        assert!(report.deleted.contains(&"lab_dev3".to_string()));
    }

    #[test]
    fn test_teardown_continues_after_failure() {
        let cloud = provisioned();
        cloud.fail_delete_of("lab-haproxy-sg");
        cloud.fail_delete_of("lab_dev2");

        let report = teardown(&cloud, "lab");

        let failed: Vec<&str> = report.failures.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(failed, ["lab_dev2", "lab-haproxy-sg"]);
        assert_eq!(cloud.security_group_names(), ["lab-haproxy-sg"]);
        assert!(cloud.find_keypair("labkeypair").unwrap().is_none());
        assert!(cloud.find_server("lab_dev2").unwrap().is_some());
    }

    #[test]
    fn test_teardown_of_empty_cloud_skips() {
        let cloud = InMemoryCloud::new();
        let report = teardown(&cloud, "lab");

        assert!(report.deleted.is_empty());
        assert!(report.is_clean());
        assert_eq!(report.skipped.len(), 7);
    }

    #[test]
    fn test_other_tags_untouched() {
        let cloud = provisioned();
        provision_topology(&cloud, &TopologyPlan::new("prod", "ssh-ed25519 AAAA other")).unwrap();

        teardown(&cloud, "lab");

        let remaining: Vec<String> = cloud.servers().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(remaining, ["prod_bastion", "prod_haproxy", "prod_dev1", "prod_dev2", "prod_dev3"]);
        assert!(cloud.find_network("prodnetwork").unwrap().is_some());
    }
}
