//! Security group definitions for the bastion / haproxy / webserver tiers.
//!
//! ```text
//! bastion-sg     tcp/22   from 0.0.0.0/0
//! haproxy-sg     tcp/5000 from 0.0.0.0/0
//!                udp/6000 from 0.0.0.0/0
//!                tcp/22   from bastion-sg
//! webservers-sg  udp/161  from haproxy-sg
//!                tcp/5000 from haproxy-sg
//!                tcp/22   from bastion-sg
//! ```
//!
//! Rules are only written when a group is created; an existing group is
//! returned untouched.

use crate::cloud::provision::ResourceNames;
use crate::cloud::{CloudResult, IngressRule, NetworkApi, Protocol, RuleSource, SecurityGroup};

pub const SSH_PORT: u16 = 22;
pub const SNMP_PORT: u16 = 161;
pub const APP_PORT: u16 = 5000;
pub const STATS_PORT: u16 = 6000;

const ANYWHERE: &str = "0.0.0.0/0";

/// Where a templated rule's traffic comes from, before group ids are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Anywhere,
    GroupNamed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTemplate {
    pub protocol: Protocol,
    pub port: u16,
    pub source: SourceRef,
}

impl RuleTemplate {
    fn new(protocol: Protocol, port: u16, source: SourceRef) -> Self {
        Self { protocol, port, source }
    }
}

/// The three tier groups of one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroups {
    pub bastion: SecurityGroup,
    pub haproxy: SecurityGroup,
    pub webservers: SecurityGroup,
}

pub fn bastion_rules() -> Vec<RuleTemplate> {
    vec![RuleTemplate::new(Protocol::Tcp, SSH_PORT, SourceRef::Anywhere)]
}

pub fn haproxy_rules(names: &ResourceNames) -> Vec<RuleTemplate> {
    vec![
        RuleTemplate::new(Protocol::Tcp, APP_PORT, SourceRef::Anywhere),
        RuleTemplate::new(Protocol::Udp, STATS_PORT, SourceRef::Anywhere),
        RuleTemplate::new(Protocol::Tcp, SSH_PORT, SourceRef::GroupNamed(names.bastion_group())),
    ]
}

pub fn webserver_rules(names: &ResourceNames) -> Vec<RuleTemplate> {
    vec![
        RuleTemplate::new(Protocol::Udp, SNMP_PORT, SourceRef::GroupNamed(names.haproxy_group())),
        RuleTemplate::new(Protocol::Tcp, APP_PORT, SourceRef::GroupNamed(names.haproxy_group())),
        RuleTemplate::new(Protocol::Tcp, SSH_PORT, SourceRef::GroupNamed(names.bastion_group())),
    ]
}

/// Create-or-get a security group, writing `rules` only on creation.
///
/// Rules referencing a group that does not exist are skipped with an error log.
pub fn ensure_group<N: NetworkApi>(
    net: &N,
    name: &str,
    description: &str,
    rules: &[RuleTemplate],
) -> CloudResult<SecurityGroup> {
    if let Some(existing) = net.find_security_group(name)? {
        tracing::info!(group = name, "Security group already exists");
        return Ok(existing);
    }

    let group = net.create_security_group(name, description)?;
    tracing::info!(group = name, "Created security group");

    for template in rules {
        let source = match &template.source {
            SourceRef::Anywhere => RuleSource::Cidr(ANYWHERE.to_string()),
            SourceRef::GroupNamed(source_name) => match net.find_security_group(source_name)? {
                Some(source_group) => RuleSource::Group(source_group.id),
                None => {
                    tracing::error!(group = name, source = %source_name, port = template.port, "Source security group not found, skipping rule");
                    continue;
                }
            },
        };
        let rule = IngressRule {
            protocol: template.protocol,
            port: template.port,
            source,
        };
        net.create_ingress_rule(&group.id, &rule)?;
    }

    Ok(group)
}

/// Ensure all three tier groups, in dependency order.
pub fn ensure_security_groups<N: NetworkApi>(net: &N, names: &ResourceNames) -> CloudResult<SecurityGroups> {
    let bastion = ensure_group(
        net,
        &names.bastion_group(),
        "Security group for bastion host allowing SSH",
        &bastion_rules(),
    )?;
    let haproxy = ensure_group(
        net,
        &names.haproxy_group(),
        "HAProxy security group with TCP/UDP and restricted SSH access",
        &haproxy_rules(names),
    )?;
    let webservers = ensure_group(
        net,
        &names.webservers_group(),
        "Security group for web servers with HAProxy and Bastion access",
        &webserver_rules(names),
    )?;
    Ok(SecurityGroups {
        bastion,
        haproxy,
        webservers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::InMemoryCloud;

    #[test]
    fn test_rules_reference_group_ids() {
        let cloud = InMemoryCloud::new();
        let names = ResourceNames::new("lab");
        let groups = ensure_security_groups(&cloud, &names).unwrap();

        let bastion_rules = cloud.rules_of(&groups.bastion.id);
        assert_eq!(bastion_rules.len(), 1);
        assert_eq!(bastion_rules[0].source, RuleSource::Cidr(ANYWHERE.into()));

        let web_rules = cloud.rules_of(&groups.webservers.id);
        assert_eq!(web_rules.len(), 3);
        assert_eq!(web_rules[0].protocol, Protocol::Udp);
        assert_eq!(web_rules[0].source, RuleSource::Group(groups.haproxy.id.clone()));
        assert_eq!(web_rules[2].source, RuleSource::Group(groups.bastion.id.clone()));
    }

    #[test]
    fn test_missing_source_group_skips_rule() {
        let cloud = InMemoryCloud::new();
        let names = ResourceNames::new("lab");
        let haproxy = ensure_group(&cloud, &names.haproxy_group(), "", &haproxy_rules(&names)).unwrap();

        let rules = cloud.rules_of(&haproxy.id);
        assert_eq!(rules.len(), 2);
        assert!(rules.iter().all(|r| matches!(r.source, RuleSource::Cidr(_))));
    }

    #[test]
    fn test_existing_group_is_reused() {
        let cloud = InMemoryCloud::new();
        let names = ResourceNames::new("lab");
        let first = ensure_security_groups(&cloud, &names).unwrap();
        let second = ensure_security_groups(&cloud, &names).unwrap();

        assert_eq!(first, second);
        assert_eq!(cloud.security_group_names().len(), 3);
        assert_eq!(cloud.rules_of(&first.haproxy.id).len(), 3);
    }
}
