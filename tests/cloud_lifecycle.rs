//! Provision, re-provision and tear down against the in-memory cloud.

use stack_verify::cloud::provision::{read_public_key, EXTERNAL_NETWORK};
use stack_verify::cloud::{
    provision_topology, teardown, CloudCredentials, ComputeApi, InMemoryCloud, NetworkApi, TopologyPlan,
};

mod common;

fn plan(tag: &str) -> TopologyPlan {
    let (_dir, key_path) = common::write_temp_file("id_ed25519.pub", "ssh-ed25519 AAAAC3Nza lab@workstation\n");
    TopologyPlan::new(tag, read_public_key(&key_path).unwrap())
}

#[test]
fn test_provisioning_is_idempotent() {
    let cloud = InMemoryCloud::with_external_network(EXTERNAL_NETWORK);

    let first = provision_topology(&cloud, &plan("lab")).unwrap();
    let calls_after_first = cloud.create_calls();
    let second = provision_topology(&cloud, &plan("lab")).unwrap();

    assert_eq!(first, second);
    assert_eq!(cloud.create_calls(), calls_after_first);
    assert_eq!(cloud.servers().unwrap().len(), 5);
    assert_eq!(cloud.floating_ips().unwrap().len(), 2);
    assert_eq!(first.keypair.public_key, "ssh-ed25519 AAAAC3Nza lab@workstation");
}

#[test]
fn test_topology_layout() {
    let cloud = InMemoryCloud::with_external_network(EXTERNAL_NETWORK);
    let topology = provision_topology(&cloud, &plan("lab")).unwrap();

    let names: Vec<&str> = topology.webservers.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["lab_dev1", "lab_dev2", "lab_dev3"]);
    assert_eq!(topology.bastion.security_groups, ["lab-bastion-sg"]);
    assert_eq!(topology.webservers[0].security_groups, ["lab-webservers-sg"]);
    assert_ne!(topology.bastion_ip, topology.haproxy_ip);

    let addresses = topology.host_addresses();
    assert_eq!(addresses.len(), 5);
    assert_eq!(addresses["lab_bastion"], topology.bastion_ip);
    assert_eq!(addresses["lab_dev1"], topology.webservers[0].private_ip);
    assert!(addresses["lab_haproxy"].starts_with("192.168.0."));
}

#[test]
fn test_teardown_then_reprovision() {
    let cloud = InMemoryCloud::with_external_network(EXTERNAL_NETWORK);
    provision_topology(&cloud, &plan("lab")).unwrap();

    let report = teardown(&cloud, "lab");
    assert!(report.is_clean(), "{:?}", report.failures);
    assert!(cloud.find_router("labrouter").unwrap().is_none());
    assert!(cloud.find_keypair("labkeypair").unwrap().is_none());

    let again = provision_topology(&cloud, &plan("lab")).unwrap();
    assert_eq!(again.webservers.len(), 3);
    assert!(cloud.find_network("labnetwork").unwrap().is_some());
}

#[test]
fn test_failed_router_delete_does_not_stop_teardown() {
    let cloud = InMemoryCloud::with_external_network(EXTERNAL_NETWORK);
    provision_topology(&cloud, &plan("lab")).unwrap();
    cloud.fail_delete_of("labrouter");

    let report = teardown(&cloud, "lab");

    let failed: Vec<&str> = report.failures.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(failed, ["labrouter"]);
    assert!(cloud.find_router("labrouter").unwrap().is_some());
    assert!(cloud.find_network("labnetwork").unwrap().is_none());
    assert!(report.deleted.contains(&"lab-bastion-sg".to_string()));
    assert!(report.deleted.contains(&"labkeypair".to_string()));
}

#[test]
fn test_credentials_from_openrc_file() {
    let (_dir, path) = common::write_temp_file(
        "openrc.sh",
        "export OS_AUTH_URL=https://keystone.example.net:5000/v3\n\
         export OS_USERNAME=student\n\
         export OS_PASSWORD=hunter2\n\
         export OS_PROJECT_NAME=lab\n",
    );

    let creds = CloudCredentials::load(&path).unwrap();
    assert_eq!(creds.username, "student");
    assert_eq!(creds.region_name, None);
}
