//! Host rosters.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Replace the cloud naming separator with the one backends echo back.
///
/// Cloud servers are named `tag-dev1` style while the web application
/// reports `tag_dev1`; both forms compare equal after normalization.
pub fn normalize_host(name: &str) -> String {
    name.replace('-', "_")
}

/// A logical target host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn normalized(&self) -> String {
        normalize_host(&self.0)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The ordered, unique hosts of one inventory group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRoster {
    group: String,
    hosts: Vec<Host>,
}

impl HostRoster {
    /// Build a roster, keeping the first occurrence of any repeated name.
    pub fn new<I, S>(group: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut roster = Self {
            group: group.into(),
            hosts: Vec::new(),
        };
        for name in names {
            roster.insert(Host::new(name));
        }
        roster
    }

    /// Append a host. Returns false if the name was already present.
    pub(crate) fn insert(&mut self, host: Host) -> bool {
        if self.hosts.contains(&host) {
            return false;
        }
        self.hosts.push(host);
        true
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.hosts.iter().any(|h| h.name() == name)
    }

    /// Normalized names, ready to diff against observed backend ids.
    pub fn normalized(&self) -> BTreeSet<String> {
        self.hosts.iter().map(Host::normalized).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_matches_echoed_name() {
        assert_eq!(normalize_host("web-1"), "web_1");
        assert_eq!(normalize_host("web_1"), "web_1");
        assert_eq!(normalize_host("lab-a-dev-2"), "lab_a_dev_2");
    }

    #[test]
    fn test_roster_keeps_order_and_uniqueness() {
        let roster = HostRoster::new("webservers", ["c", "a", "c", "b"]);
        let names: Vec<_> = roster.hosts().iter().map(Host::name).collect();
        assert_eq!(names, ["c", "a", "b"]);
        assert_eq!(roster.len(), 3);
        assert!(roster.contains("a"));
        assert!(!roster.contains("d"));
    }

    #[test]
    fn test_normalized_set() {
        let roster = HostRoster::new("webservers", ["lab-dev1", "lab_dev2"]);
        let expected: BTreeSet<String> = ["lab_dev1", "lab_dev2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(roster.normalized(), expected);
    }
}
