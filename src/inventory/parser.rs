//! INI inventory parser.
//!
//! Accepts the subset of the INI dialect Ansible inventories use:
//! `[group]` headers, bare host keys, optional `key=value` pairs and
//! `#` / `;` comment lines.

use std::fs;
use std::path::Path;

use crate::inventory::roster::{Host, HostRoster};
use crate::inventory::InventoryError;

/// Parsed inventory: groups in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    groups: Vec<HostRoster>,
}

impl Inventory {
    /// Read and parse an inventory file.
    pub fn load(path: &Path) -> Result<Self, InventoryError> {
        let content = fs::read_to_string(path).map_err(|source| InventoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse inventory text.
    pub fn parse(content: &str) -> Result<Self, InventoryError> {
        let mut groups: Vec<HostRoster> = Vec::new();

        for (idx, raw) in content.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Some(header) = section_header(line) {
                if groups.iter().any(|g| g.group() == header) {
                    return Err(InventoryError::DuplicateGroup {
                        group: header.to_string(),
                        line: line_no,
                    });
                }
                groups.push(HostRoster::new(header, Vec::<String>::new()));
                continue;
            }

            let Some(current) = groups.last_mut() else {
                return Err(InventoryError::MissingSectionHeader { line: line_no });
            };

            let key = match line.split_once('=') {
                Some((key, _value)) => key.trim(),
                None => line,
            };
            if !current.insert(Host::new(key)) {
                return Err(InventoryError::DuplicateHost {
                    group: current.group().to_string(),
                    host: key.to_string(),
                    line: line_no,
                });
            }
        }

        Ok(Self { groups })
    }

    /// Roster of the named group.
    pub fn group(&self, name: &str) -> Result<&HostRoster, InventoryError> {
        self.groups
            .iter()
            .find(|g| g.group() == name)
            .ok_or_else(|| InventoryError::GroupNotFound(name.to_string()))
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(HostRoster::group)
    }
}

/// Load one group's roster straight from an inventory file.
pub fn load_roster(path: &Path, group: &str) -> Result<HostRoster, InventoryError> {
    Inventory::load(path)?.group(group).cloned()
}

/// Everything between the leading `[` and the last `]`, so a trailing
/// comment after the header is dropped and inner brackets are kept.
fn section_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?;
    let end = inner.rfind(']')?;
    let name = inner[..end].trim();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOSTS: &str = "\
[Bastion]
lab_bastion

[haproxy]
lab_haproxy

[webservers]
lab-dev1
lab-dev2
lab-dev3

[all:vars]
ansible_user=ubuntu
";

    #[test]
    fn test_parse_generated_inventory() {
        let inventory = Inventory::parse(HOSTS).unwrap();
        let names: Vec<_> = inventory.group_names().collect();
        assert_eq!(names, ["Bastion", "haproxy", "webservers", "all:vars"]);

        let web = inventory.group("webservers").unwrap();
        assert_eq!(web.len(), 3);
        assert!(web.contains("lab-dev2"));

        let vars = inventory.group("all:vars").unwrap();
        assert!(vars.contains("ansible_user"));
    }

    #[test]
    fn test_group_lookup_is_case_sensitive() {
        let inventory = Inventory::parse(HOSTS).unwrap();
        assert!(inventory.group("Bastion").is_ok());
        assert!(matches!(
            inventory.group("bastion"),
            Err(InventoryError::GroupNotFound(g)) if g == "bastion"
        ));
    }

    #[test]
    fn test_comments_and_values_ignored() {
        let inventory = Inventory::parse("# fleet\n[web]\n; old host\nweb-1 ansible_host = 10.0.0.4\nweb-2\n").unwrap();
        let web = inventory.group("web").unwrap();
        assert_eq!(web.hosts()[0].name(), "web-1 ansible_host");
        assert!(web.contains("web-2"));
    }

    #[test]
    fn test_header_spans_to_last_bracket() {
        let inventory = Inventory::parse("[web] # front\nweb-1\n[a]b]\nweb-2\n").unwrap();
        assert_eq!(inventory.group_names().collect::<Vec<_>>(), ["web", "a]b"]);
        assert!(inventory.group("a]b").unwrap().contains("web-2"));
    }

    #[test]
    fn test_host_before_header_rejected() {
        let err = Inventory::parse("web-1\n[web]\n").unwrap_err();
        assert!(matches!(err, InventoryError::MissingSectionHeader { line: 1 }));
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = Inventory::parse("[web]\nweb-1\nweb-1\n").unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateHost { line: 3, .. }));

        let err = Inventory::parse("[web]\n[db]\n[web]\n").unwrap_err();
        assert!(matches!(err, InventoryError::DuplicateGroup { line: 3, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_roster(Path::new("/nonexistent/hosts"), "webservers").unwrap_err();
        assert!(matches!(err, InventoryError::Io { .. }));
    }
}
