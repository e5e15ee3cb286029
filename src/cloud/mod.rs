//! Cloud collaborator interfaces.
//!
//! # Data Flow
//! ```text
//! Provisioning (provision.rs, security.rs):
//!     find by name → reuse, else create
//!     → network stack, security groups, servers, floating IPs
//!
//! Teardown (teardown.rs):
//!     find by name → delete, log and continue on failure
//!
//! Credentials (credentials.rs):
//!     openrc file → CloudCredentials (no process environment mutation)
//! ```
//!
//! # Design Decisions
//! - Capabilities split into narrow traits (network vs compute)
//! - Lookups return `Option`; absence is not an error
//! - `memory.rs` implements both traits for tests and dry runs

pub mod credentials;
pub mod memory;
pub mod provision;
pub mod security;
pub mod teardown;

use thiserror::Error;

pub use credentials::CloudCredentials;
pub use memory::InMemoryCloud;
pub use provision::{provision_topology, ResourceNames, Topology, TopologyPlan};
pub use teardown::{teardown, TeardownReport};

/// Errors surfaced by cloud collaborators.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("no ports found on server '{0}'")]
    NoPorts(String),

    #[error("external network '{0}' not found")]
    NoExternalNetwork(String),

    #[error("cloud API error: {0}")]
    Api(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type CloudResult<T> = Result<T, CloudError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub cidr: String,
    pub gateway_ip: String,
    pub dns_nameservers: Vec<String>,
}

/// Arguments for subnet creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSpec {
    pub name: String,
    pub network_id: String,
    pub cidr: String,
    pub gateway_ip: String,
    pub dns_nameservers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Router {
    pub id: String,
    pub name: String,
    pub external_network_id: Option<String>,
    pub subnet_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// IP protocol of a security group rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Where rule traffic may originate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    Cidr(String),
    Group(String),
}

/// An IPv4 ingress rule on a single port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub port: u16,
    pub source: RuleSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keypair {
    pub id: String,
    pub name: String,
    pub public_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub private_ip: String,
    pub security_groups: Vec<String>,
}

/// Arguments for server creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSpec {
    pub name: String,
    pub image: String,
    pub flavor: String,
    pub network_id: String,
    pub keypair: String,
    pub security_group: String,
    pub user_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub id: String,
    pub device_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingIp {
    pub id: String,
    pub address: String,
    pub port_id: Option<String>,
}

/// Network-side capabilities.
pub trait NetworkApi {
    fn find_network(&self, name: &str) -> CloudResult<Option<Network>>;
    fn create_network(&self, name: &str) -> CloudResult<Network>;
    fn delete_network(&self, id: &str) -> CloudResult<()>;

    fn find_subnet(&self, name: &str) -> CloudResult<Option<Subnet>>;
    fn create_subnet(&self, spec: &SubnetSpec) -> CloudResult<Subnet>;
    fn delete_subnet(&self, id: &str) -> CloudResult<()>;

    fn find_router(&self, name: &str) -> CloudResult<Option<Router>>;
    fn create_router(&self, name: &str) -> CloudResult<Router>;
    fn set_router_gateway(&self, router_id: &str, network_id: &str) -> CloudResult<Router>;
    fn add_router_interface(&self, router_id: &str, subnet_id: &str) -> CloudResult<()>;
    fn remove_router_interface(&self, router_id: &str, subnet_id: &str) -> CloudResult<()>;
    fn delete_router(&self, id: &str) -> CloudResult<()>;

    fn find_security_group(&self, name: &str) -> CloudResult<Option<SecurityGroup>>;
    fn create_security_group(&self, name: &str, description: &str) -> CloudResult<SecurityGroup>;
    fn create_ingress_rule(&self, group_id: &str, rule: &IngressRule) -> CloudResult<()>;
    fn delete_security_group(&self, id: &str) -> CloudResult<()>;

    fn ports_for_device(&self, device_id: &str) -> CloudResult<Vec<Port>>;
    fn floating_ips(&self) -> CloudResult<Vec<FloatingIp>>;
    fn create_floating_ip(&self, external_network_id: &str) -> CloudResult<FloatingIp>;
    fn attach_floating_ip(&self, floating_ip_id: &str, port_id: &str) -> CloudResult<FloatingIp>;
    fn delete_floating_ip(&self, id: &str) -> CloudResult<()>;
}

/// Compute-side capabilities.
pub trait ComputeApi {
    fn find_keypair(&self, name: &str) -> CloudResult<Option<Keypair>>;
    fn create_keypair(&self, name: &str, public_key: &str) -> CloudResult<Keypair>;
    fn delete_keypair(&self, name: &str) -> CloudResult<()>;

    fn find_server(&self, name: &str) -> CloudResult<Option<Server>>;
    /// Create a server and wait until it is active.
    fn create_server(&self, spec: &ServerSpec) -> CloudResult<Server>;
    fn servers(&self) -> CloudResult<Vec<Server>>;
    fn delete_server(&self, id: &str) -> CloudResult<()>;
}
