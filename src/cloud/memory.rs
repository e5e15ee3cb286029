//! In-memory cloud for tests and dry runs.
//!
//! Records every create call and lets tests inject delete failures by
//! resource name, making teardown error paths deterministic.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use crate::cloud::{
    CloudError, CloudResult, ComputeApi, FloatingIp, IngressRule, Keypair, Network, NetworkApi, Port, Router,
    SecurityGroup, Server, ServerSpec, Subnet, SubnetSpec,
};

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    networks: Vec<Network>,
    subnets: Vec<Subnet>,
    routers: Vec<Router>,
    security_groups: Vec<SecurityGroup>,
    rules: BTreeMap<String, Vec<IngressRule>>,
    keypairs: Vec<Keypair>,
    servers: Vec<Server>,
    ports: Vec<Port>,
    floating_ips: Vec<FloatingIp>,
    create_calls: Vec<String>,
    fail_deletes: BTreeSet<String>,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn record(&mut self, kind: &str, name: &str) {
        self.create_calls.push(format!("{kind}:{name}"));
    }

    fn check_delete(&self, name: &str) -> CloudResult<()> {
        if self.fail_deletes.contains(name) {
            Err(CloudError::Api(format!("delete of '{name}' rejected")))
        } else {
            Ok(())
        }
    }
}

fn not_found(kind: &'static str, name: &str) -> CloudError {
    CloudError::NotFound {
        kind,
        name: name.to_string(),
    }
}

/// Thread-safe fake implementing [`NetworkApi`] and [`ComputeApi`].
#[derive(Debug, Default)]
pub struct InMemoryCloud {
    state: Mutex<State>,
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cloud that already has a provider network named `name`.
    pub fn with_external_network(name: &str) -> Self {
        let cloud = Self::new();
        {
            let mut state = cloud.lock();
            let id = state.id("net");
            state.networks.push(Network {
                id,
                name: name.to_string(),
            });
        }
        cloud
    }

    /// Make every delete of the resource named `name` fail.
    pub fn fail_delete_of(&self, name: &str) {
        self.lock().fail_deletes.insert(name.to_string());
    }

    /// Every create call as `kind:name`, in order.
    pub fn create_calls(&self) -> Vec<String> {
        self.lock().create_calls.clone()
    }

    /// Ingress rules attached to a security group.
    pub fn rules_of(&self, group_id: &str) -> Vec<IngressRule> {
        self.lock().rules.get(group_id).cloned().unwrap_or_default()
    }

    /// Pre-allocate an unattached floating IP.
    pub fn add_floating_ip(&self, address: &str) -> FloatingIp {
        let mut state = self.lock();
        let fip = FloatingIp {
            id: state.id("fip"),
            address: address.to_string(),
            port_id: None,
        };
        state.floating_ips.push(fip.clone());
        fip
    }

    pub fn network_names(&self) -> Vec<String> {
        self.lock().networks.iter().map(|n| n.name.clone()).collect()
    }

    pub fn security_group_names(&self) -> Vec<String> {
        self.lock().security_groups.iter().map(|g| g.name.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl NetworkApi for InMemoryCloud {
    fn find_network(&self, name: &str) -> CloudResult<Option<Network>> {
        Ok(self.lock().networks.iter().find(|n| n.name == name).cloned())
    }

    fn create_network(&self, name: &str) -> CloudResult<Network> {
        let mut state = self.lock();
        state.record("network", name);
        let network = Network {
            id: state.id("net"),
            name: name.to_string(),
        };
        state.networks.push(network.clone());
        Ok(network)
    }

    fn delete_network(&self, id: &str) -> CloudResult<()> {
        let mut state = self.lock();
        let network = state.networks.iter().find(|n| n.id == id).cloned().ok_or_else(|| not_found("network", id))?;
        state.check_delete(&network.name)?;
        if state.subnets.iter().any(|s| s.network_id == id) {
            return Err(CloudError::Api(format!("network '{}' still has subnets", network.name)));
        }
        state.networks.retain(|n| n.id != id);
        Ok(())
    }

    fn find_subnet(&self, name: &str) -> CloudResult<Option<Subnet>> {
        Ok(self.lock().subnets.iter().find(|s| s.name == name).cloned())
    }

    fn create_subnet(&self, spec: &SubnetSpec) -> CloudResult<Subnet> {
        let mut state = self.lock();
        if !state.networks.iter().any(|n| n.id == spec.network_id) {
            return Err(not_found("network", &spec.network_id));
        }
        state.record("subnet", &spec.name);
        let subnet = Subnet {
            id: state.id("subnet"),
            name: spec.name.clone(),
            network_id: spec.network_id.clone(),
            cidr: spec.cidr.clone(),
            gateway_ip: spec.gateway_ip.clone(),
            dns_nameservers: spec.dns_nameservers.clone(),
        };
        state.subnets.push(subnet.clone());
        Ok(subnet)
    }

    fn delete_subnet(&self, id: &str) -> CloudResult<()> {
        let mut state = self.lock();
        let subnet = state.subnets.iter().find(|s| s.id == id).cloned().ok_or_else(|| not_found("subnet", id))?;
        state.check_delete(&subnet.name)?;
        if state.routers.iter().any(|r| r.subnet_ids.iter().any(|s| s == id)) {
            return Err(CloudError::Api(format!("subnet '{}' still attached to a router", subnet.name)));
        }
        state.subnets.retain(|s| s.id != id);
        Ok(())
    }

    fn find_router(&self, name: &str) -> CloudResult<Option<Router>> {
        Ok(self.lock().routers.iter().find(|r| r.name == name).cloned())
    }

    fn create_router(&self, name: &str) -> CloudResult<Router> {
        let mut state = self.lock();
        state.record("router", name);
        let router = Router {
            id: state.id("router"),
            name: name.to_string(),
            external_network_id: None,
            subnet_ids: Vec::new(),
        };
        state.routers.push(router.clone());
        Ok(router)
    }

    fn set_router_gateway(&self, router_id: &str, network_id: &str) -> CloudResult<Router> {
        let mut state = self.lock();
        let router = state
            .routers
            .iter_mut()
            .find(|r| r.id == router_id)
            .ok_or_else(|| not_found("router", router_id))?;
        router.external_network_id = Some(network_id.to_string());
        Ok(router.clone())
    }

    fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> CloudResult<()> {
        let mut state = self.lock();
        let router = state
            .routers
            .iter_mut()
            .find(|r| r.id == router_id)
            .ok_or_else(|| not_found("router", router_id))?;
        if !router.subnet_ids.iter().any(|s| s == subnet_id) {
            router.subnet_ids.push(subnet_id.to_string());
        }
        Ok(())
    }

    fn remove_router_interface(&self, router_id: &str, subnet_id: &str) -> CloudResult<()> {
        let mut state = self.lock();
        let router = state
            .routers
            .iter_mut()
            .find(|r| r.id == router_id)
            .ok_or_else(|| not_found("router", router_id))?;
        let before = router.subnet_ids.len();
        router.subnet_ids.retain(|s| s != subnet_id);
        if router.subnet_ids.len() == before {
            return Err(not_found("router interface", subnet_id));
        }
        Ok(())
    }

    fn delete_router(&self, id: &str) -> CloudResult<()> {
        let mut state = self.lock();
        let router = state.routers.iter().find(|r| r.id == id).cloned().ok_or_else(|| not_found("router", id))?;
        state.check_delete(&router.name)?;
        state.routers.retain(|r| r.id != id);
        Ok(())
    }

    fn find_security_group(&self, name: &str) -> CloudResult<Option<SecurityGroup>> {
        Ok(self.lock().security_groups.iter().find(|g| g.name == name).cloned())
    }

    fn create_security_group(&self, name: &str, description: &str) -> CloudResult<SecurityGroup> {
        let mut state = self.lock();
        state.record("security_group", name);
        let group = SecurityGroup {
            id: state.id("sg"),
            name: name.to_string(),
            description: description.to_string(),
        };
        state.security_groups.push(group.clone());
        Ok(group)
    }

    fn create_ingress_rule(&self, group_id: &str, rule: &IngressRule) -> CloudResult<()> {
        let mut state = self.lock();
        if !state.security_groups.iter().any(|g| g.id == group_id) {
            return Err(not_found("security group", group_id));
        }
        state.rules.entry(group_id.to_string()).or_default().push(rule.clone());
        Ok(())
    }

    fn delete_security_group(&self, id: &str) -> CloudResult<()> {
        let mut state = self.lock();
        let group = state
            .security_groups
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| not_found("security group", id))?;
        state.check_delete(&group.name)?;
        state.security_groups.retain(|g| g.id != id);
        state.rules.remove(id);
        Ok(())
    }

    fn ports_for_device(&self, device_id: &str) -> CloudResult<Vec<Port>> {
        Ok(self.lock().ports.iter().filter(|p| p.device_id == device_id).cloned().collect())
    }

    fn floating_ips(&self) -> CloudResult<Vec<FloatingIp>> {
        Ok(self.lock().floating_ips.clone())
    }

    fn create_floating_ip(&self, external_network_id: &str) -> CloudResult<FloatingIp> {
        let mut state = self.lock();
        if !state.networks.iter().any(|n| n.id == external_network_id) {
            return Err(not_found("network", external_network_id));
        }
        let octet = state.floating_ips.len() + 10;
        let fip = FloatingIp {
            id: state.id("fip"),
            address: format!("203.0.113.{octet}"),
            port_id: None,
        };
        state.record("floating_ip", &fip.address);
        state.floating_ips.push(fip.clone());
        Ok(fip)
    }

    fn attach_floating_ip(&self, floating_ip_id: &str, port_id: &str) -> CloudResult<FloatingIp> {
        let mut state = self.lock();
        let fip = state
            .floating_ips
            .iter_mut()
            .find(|f| f.id == floating_ip_id)
            .ok_or_else(|| not_found("floating ip", floating_ip_id))?;
        fip.port_id = Some(port_id.to_string());
        Ok(fip.clone())
    }

    fn delete_floating_ip(&self, id: &str) -> CloudResult<()> {
        let mut state = self.lock();
        let fip = state
            .floating_ips
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| not_found("floating ip", id))?;
        state.check_delete(&fip.address)?;
        state.floating_ips.retain(|f| f.id != id);
        Ok(())
    }
}

impl ComputeApi for InMemoryCloud {
    fn find_keypair(&self, name: &str) -> CloudResult<Option<Keypair>> {
        Ok(self.lock().keypairs.iter().find(|k| k.name == name).cloned())
    }

    fn create_keypair(&self, name: &str, public_key: &str) -> CloudResult<Keypair> {
        let mut state = self.lock();
        state.record("keypair", name);
        let keypair = Keypair {
            id: name.to_string(),
            name: name.to_string(),
            public_key: public_key.to_string(),
        };
        state.keypairs.push(keypair.clone());
        Ok(keypair)
    }

    fn delete_keypair(&self, name: &str) -> CloudResult<()> {
        let mut state = self.lock();
        state.check_delete(name)?;
        state.keypairs.retain(|k| k.name != name);
        Ok(())
    }

    fn find_server(&self, name: &str) -> CloudResult<Option<Server>> {
        Ok(self.lock().servers.iter().find(|s| s.name == name).cloned())
    }

    fn create_server(&self, spec: &ServerSpec) -> CloudResult<Server> {
        let mut state = self.lock();
        if !state.networks.iter().any(|n| n.id == spec.network_id) {
            return Err(not_found("network", &spec.network_id));
        }
        state.record("server", &spec.name);
        let host = state.servers.len() + 10;
        let server = Server {
            id: state.id("server"),
            name: spec.name.clone(),
            network_id: spec.network_id.clone(),
            private_ip: format!("192.168.0.{host}"),
            security_groups: vec![spec.security_group.clone()],
        };
        let port = Port {
            id: state.id("port"),
            device_id: server.id.clone(),
        };
        state.ports.push(port);
        state.servers.push(server.clone());
        Ok(server)
    }

    fn servers(&self) -> CloudResult<Vec<Server>> {
        Ok(self.lock().servers.clone())
    }

    fn delete_server(&self, id: &str) -> CloudResult<()> {
        let mut state = self.lock();
        let server = state.servers.iter().find(|s| s.id == id).cloned().ok_or_else(|| not_found("server", id))?;
        state.check_delete(&server.name)?;
        let port_ids: Vec<String> = state.ports.iter().filter(|p| p.device_id == id).map(|p| p.id.clone()).collect();
        for fip in state.floating_ips.iter_mut() {
            if fip.port_id.as_ref().is_some_and(|p| port_ids.contains(p)) {
                fip.port_id = None;
            }
        }
        state.ports.retain(|p| p.device_id != id);
        state.servers.retain(|s| s.id != id);
        Ok(())
    }
}
