//! Create-or-get provisioning of the bastion / haproxy / webserver topology.
//!
//! Every step looks its resource up by name first, so re-running a
//! partially failed provisioning picks up where it stopped.

use std::collections::BTreeMap;
use std::path::Path;

use crate::cloud::security::{ensure_security_groups, SecurityGroups};
use crate::cloud::{
    CloudError, CloudResult, ComputeApi, Keypair, Network, NetworkApi, Router, Server, ServerSpec, Subnet,
    SubnetSpec,
};

pub const SUBNET_CIDR: &str = "192.168.0.0/24";
pub const GATEWAY_IP: &str = "192.168.0.1";
pub const DNS_NAMESERVER: &str = "8.8.8.8";
pub const EXTERNAL_NETWORK: &str = "ext-net";
pub const DEFAULT_IMAGE: &str = "Ubuntu 20.04 Focal Fossa x86_64";
pub const DEFAULT_FLAVOR: &str = "1C-4GB-100GB";

pub const HAPROXY_USER_DATA: &str = "#!/bin/bash
apt update
apt install -y nginx haproxy
";

pub const WEBSERVER_USER_DATA: &str = "#!/bin/bash
apt update
apt install -y python3 python3-pip snmpd python3-flask
";

/// Resource naming convention for one deployment tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNames {
    tag: String,
}

impl ResourceNames {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn network(&self) -> String {
        format!("{}network", self.tag)
    }

    pub fn subnet(&self) -> String {
        format!("{}subnet", self.tag)
    }

    pub fn router(&self) -> String {
        format!("{}router", self.tag)
    }

    pub fn keypair(&self) -> String {
        format!("{}keypair", self.tag)
    }

    pub fn bastion_group(&self) -> String {
        format!("{}-bastion-sg", self.tag)
    }

    pub fn haproxy_group(&self) -> String {
        format!("{}-haproxy-sg", self.tag)
    }

    pub fn webservers_group(&self) -> String {
        format!("{}-webservers-sg", self.tag)
    }

    pub fn bastion(&self) -> String {
        format!("{}_bastion", self.tag)
    }

    pub fn haproxy(&self) -> String {
        format!("{}_haproxy", self.tag)
    }

    /// Web server `index`, counting from 1.
    pub fn webserver(&self, index: usize) -> String {
        format!("{}_dev{}", self.tag, index)
    }
}

/// Network, subnet and router of one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkStack {
    pub network: Network,
    pub subnet: Subnet,
    pub router: Router,
}

/// Everything needed to provision a deployment.
#[derive(Debug, Clone)]
pub struct TopologyPlan {
    pub names: ResourceNames,
    pub webserver_count: usize,
    pub image: String,
    pub flavor: String,
    pub public_key: String,
    pub external_network: String,
}

impl TopologyPlan {
    pub fn new(tag: &str, public_key: impl Into<String>) -> Self {
        Self {
            names: ResourceNames::new(tag),
            webserver_count: 3,
            image: DEFAULT_IMAGE.to_string(),
            flavor: DEFAULT_FLAVOR.to_string(),
            public_key: public_key.into(),
            external_network: EXTERNAL_NETWORK.to_string(),
        }
    }
}

/// Result of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub keypair: Keypair,
    pub network: NetworkStack,
    pub security_groups: SecurityGroups,
    pub bastion: Server,
    pub haproxy: Server,
    pub webservers: Vec<Server>,
    pub bastion_ip: String,
    pub haproxy_ip: String,
}

impl Topology {
    /// SSH target address per host: the bastion by its public address,
    /// everything else by private address behind the jump host.
    pub fn host_addresses(&self) -> BTreeMap<String, String> {
        let mut addresses = BTreeMap::new();
        addresses.insert(self.bastion.name.clone(), self.bastion_ip.clone());
        addresses.insert(self.haproxy.name.clone(), self.haproxy.private_ip.clone());
        for server in &self.webservers {
            addresses.insert(server.name.clone(), server.private_ip.clone());
        }
        addresses
    }
}

/// Read an OpenSSH public key, trimmed.
pub fn read_public_key(path: &Path) -> CloudResult<String> {
    std::fs::read_to_string(path)
        .map(|key| key.trim().to_string())
        .map_err(|source| CloudError::Io {
            path: path.display().to_string(),
            source,
        })
}

pub fn ensure_keypair<C: ComputeApi>(compute: &C, names: &ResourceNames, public_key: &str) -> CloudResult<Keypair> {
    let name = names.keypair();
    if let Some(existing) = compute.find_keypair(&name)? {
        tracing::info!(keypair = %name, "Keypair already exists");
        return Ok(existing);
    }
    let keypair = compute.create_keypair(&name, public_key)?;
    tracing::info!(keypair = %name, "Keypair created");
    Ok(keypair)
}

/// Network + subnet + router with gateway and subnet interface.
///
/// Gateway and interface are only configured when the router is created.
pub fn ensure_network<N: NetworkApi>(
    net: &N,
    names: &ResourceNames,
    external_network: &str,
) -> CloudResult<NetworkStack> {
    let network_name = names.network();
    let network = match net.find_network(&network_name)? {
        Some(network) => {
            tracing::info!(network = %network_name, "Network already exists");
            network
        }
        None => {
            let network = net.create_network(&network_name)?;
            tracing::info!(network = %network_name, "Network created");
            network
        }
    };

    let subnet_name = names.subnet();
    let subnet = match net.find_subnet(&subnet_name)? {
        Some(subnet) => {
            tracing::info!(subnet = %subnet_name, "Subnet already exists");
            subnet
        }
        None => {
            let subnet = net.create_subnet(&SubnetSpec {
                name: subnet_name.clone(),
                network_id: network.id.clone(),
                cidr: SUBNET_CIDR.to_string(),
                gateway_ip: GATEWAY_IP.to_string(),
                dns_nameservers: vec![DNS_NAMESERVER.to_string()],
            })?;
            tracing::info!(subnet = %subnet_name, cidr = SUBNET_CIDR, "Subnet created");
            subnet
        }
    };

    let router_name = names.router();
    let router = match net.find_router(&router_name)? {
        Some(router) => {
            tracing::info!(router = %router_name, "Router already exists");
            router
        }
        None => {
            let mut router = net.create_router(&router_name)?;
            tracing::info!(router = %router_name, "Router created");

            if let Some(ext) = net.find_network(external_network)? {
                router = net.set_router_gateway(&router.id, &ext.id)?;
                tracing::info!(router = %router_name, external = external_network, "Router connected to external network");
            } else {
                tracing::warn!(router = %router_name, external = external_network, "External network not found, router has no gateway");
            }

            net.add_router_interface(&router.id, &subnet.id)?;
            router.subnet_ids.push(subnet.id.clone());
            tracing::info!(router = %router_name, subnet = %subnet_name, "Router interface added");
            router
        }
    };

    Ok(NetworkStack { network, subnet, router })
}

pub fn ensure_server<C: ComputeApi>(compute: &C, spec: &ServerSpec) -> CloudResult<Server> {
    if let Some(existing) = compute.find_server(&spec.name)? {
        tracing::info!(server = %spec.name, "Server already exists");
        return Ok(existing);
    }
    let server = compute.create_server(spec)?;
    tracing::info!(server = %spec.name, "Server created");
    Ok(server)
}

/// Public address for `server`: the one already attached, else a free
/// floating IP, else a newly allocated one.
pub fn ensure_floating_ip<N: NetworkApi>(net: &N, server: &Server, external_network: &str) -> CloudResult<String> {
    let port = net
        .ports_for_device(&server.id)?
        .into_iter()
        .next()
        .ok_or_else(|| CloudError::NoPorts(server.name.clone()))?;

    let floating_ips = net.floating_ips()?;
    if let Some(attached) = floating_ips.iter().find(|f| f.port_id.as_deref() == Some(port.id.as_str())) {
        tracing::info!(server = %server.name, address = %attached.address, "Floating IP already associated");
        return Ok(attached.address.clone());
    }

    let floating_ip = match floating_ips.into_iter().find(|f| f.port_id.is_none()) {
        Some(free) => {
            tracing::info!(server = %server.name, address = %free.address, "Reusing existing floating IP");
            free
        }
        None => {
            let ext = net
                .find_network(external_network)?
                .ok_or_else(|| CloudError::NoExternalNetwork(external_network.to_string()))?;
            let created = net.create_floating_ip(&ext.id)?;
            tracing::info!(address = %created.address, "Created new floating IP");
            created
        }
    };

    let attached = net.attach_floating_ip(&floating_ip.id, &port.id)?;
    tracing::info!(server = %server.name, address = %attached.address, "Assigned floating IP");
    Ok(attached.address)
}

/// Provision the full topology, reusing whatever already exists.
pub fn provision_topology<C>(cloud: &C, plan: &TopologyPlan) -> CloudResult<Topology>
where
    C: NetworkApi + ComputeApi,
{
    let names = &plan.names;
    tracing::info!(tag = names.tag(), webservers = plan.webserver_count, "Provisioning topology");

    let keypair = ensure_keypair(cloud, names, &plan.public_key)?;
    let network = ensure_network(cloud, names, &plan.external_network)?;
    let security_groups = ensure_security_groups(cloud, names)?;

    let spec = |name: String, group: &str, user_data: &str| ServerSpec {
        name,
        image: plan.image.clone(),
        flavor: plan.flavor.clone(),
        network_id: network.network.id.clone(),
        keypair: keypair.id.clone(),
        security_group: group.to_string(),
        user_data: user_data.to_string(),
    };

    let bastion = ensure_server(cloud, &spec(names.bastion(), &security_groups.bastion.name, ""))?;
    let haproxy = ensure_server(
        cloud,
        &spec(names.haproxy(), &security_groups.haproxy.name, HAPROXY_USER_DATA),
    )?;
    let webservers = (1..=plan.webserver_count)
        .map(|i| {
            ensure_server(
                cloud,
                &spec(names.webserver(i), &security_groups.webservers.name, WEBSERVER_USER_DATA),
            )
        })
        .collect::<CloudResult<Vec<_>>>()?;

    let bastion_ip = ensure_floating_ip(cloud, &bastion, &plan.external_network)?;
    let haproxy_ip = ensure_floating_ip(cloud, &haproxy, &plan.external_network)?;

    Ok(Topology {
        keypair,
        network,
        security_groups,
        bastion,
        haproxy,
        webservers,
        bastion_ip,
        haproxy_ip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::InMemoryCloud;

    #[test]
    fn test_names_follow_convention() {
        let names = ResourceNames::new("lab");
        assert_eq!(names.network(), "labnetwork");
        assert_eq!(names.keypair(), "labkeypair");
        assert_eq!(names.haproxy_group(), "lab-haproxy-sg");
        assert_eq!(names.webserver(2), "lab_dev2");
    }

    #[test]
    fn test_network_created_once() {
        let cloud = InMemoryCloud::with_external_network(EXTERNAL_NETWORK);
        let names = ResourceNames::new("lab");

        let first = ensure_network(&cloud, &names, EXTERNAL_NETWORK).unwrap();
        let second = ensure_network(&cloud, &names, EXTERNAL_NETWORK).unwrap();

        assert_eq!(first.network, second.network);
        assert_eq!(first.subnet, second.subnet);
        assert_eq!(first.router.id, second.router.id);
        assert_eq!(cloud.create_calls(), ["network:labnetwork", "subnet:labsubnet", "router:labrouter"]);
        assert!(first.router.external_network_id.is_some());
        assert_eq!(first.router.subnet_ids, [first.subnet.id.clone()]);
        assert_eq!(first.subnet.cidr, SUBNET_CIDR);
    }

    #[test]
    fn test_router_without_external_network() {
        let cloud = InMemoryCloud::new();
        let stack = ensure_network(&cloud, &ResourceNames::new("lab"), EXTERNAL_NETWORK).unwrap();
        assert_eq!(stack.router.external_network_id, None);
    }

    #[test]
    fn test_keypair_create_or_get() {
        let cloud = InMemoryCloud::new();
        let names = ResourceNames::new("lab");
        let a = ensure_keypair(&cloud, &names, "ssh-ed25519 AAAA first").unwrap();
        let b = ensure_keypair(&cloud, &names, "ssh-ed25519 AAAA second").unwrap();
        assert_eq!(a, b);
        assert_eq!(b.public_key, "ssh-ed25519 AAAA first");
    }

    #[test]
    fn test_floating_ip_prefers_free_address() {
        let cloud = InMemoryCloud::with_external_network(EXTERNAL_NETWORK);
        let free = cloud.add_floating_ip("198.51.100.7");
        let stack = ensure_network(&cloud, &ResourceNames::new("lab"), EXTERNAL_NETWORK).unwrap();
        let server = cloud
            .create_server(&ServerSpec {
                name: "lab_bastion".into(),
                image: DEFAULT_IMAGE.into(),
                flavor: DEFAULT_FLAVOR.into(),
                network_id: stack.network.id,
                keypair: "labkeypair".into(),
                security_group: "lab-bastion-sg".into(),
                user_data: String::new(),
            })
            .unwrap();

        let address = ensure_floating_ip(&cloud, &server, EXTERNAL_NETWORK).unwrap();
        assert_eq!(address, free.address);
        let again = ensure_floating_ip(&cloud, &server, EXTERNAL_NETWORK).unwrap();
        assert_eq!(again, free.address);
        assert_eq!(cloud.floating_ips().unwrap().len(), 1);
    }

    #[test]
    fn test_floating_ip_needs_external_network() {
        let cloud = InMemoryCloud::new();
        let net = cloud.create_network("n").unwrap();
        let server = cloud
            .create_server(&ServerSpec {
                name: "s".into(),
                image: String::new(),
                flavor: String::new(),
                network_id: net.id,
                keypair: String::new(),
                security_group: String::new(),
                user_data: String::new(),
            })
            .unwrap();

        let err = ensure_floating_ip(&cloud, &server, EXTERNAL_NETWORK).unwrap_err();
        assert!(matches!(err, CloudError::NoExternalNetwork(_)));
    }
}
