//! Ansible command construction.
//!
//! Both commands route SSH through the bastion by handing the generated
//! SSH client config to `--ssh-common-args`.

use std::path::{Path, PathBuf};

use crate::config::{AnsibleConfig, InventoryConfig};
use crate::probe::runner::{CommandOutput, CommandRunner, ProcessRunner};
use crate::probe::ProbeError;

/// Runs ansible ad-hoc pings and playbooks against one inventory.
#[derive(Debug)]
pub struct AnsibleRunner<R = ProcessRunner> {
    runner: R,
    inventory: PathBuf,
    ssh_config: PathBuf,
    ping_binary: String,
    playbook_binary: String,
}

impl<R: CommandRunner> AnsibleRunner<R> {
    pub fn new(runner: R, inventory: &InventoryConfig, ansible: &AnsibleConfig) -> Self {
        Self {
            runner,
            inventory: inventory.inventory_path.clone(),
            ssh_config: inventory.ssh_config_path.clone(),
            ping_binary: ansible.ping_binary.clone(),
            playbook_binary: ansible.playbook_binary.clone(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn ping_binary(&self) -> &str {
        &self.ping_binary
    }

    fn ssh_common_args(&self) -> String {
        format!("-F {}", self.ssh_config.display())
    }

    /// `ansible <group> --ssh-common-args "-F <cfg>" -i <inventory> -m ping`
    pub fn ping_args(&self, group: &str) -> Vec<String> {
        vec![
            group.to_string(),
            "--ssh-common-args".to_string(),
            self.ssh_common_args(),
            "-i".to_string(),
            self.inventory.display().to_string(),
            "-m".to_string(),
            "ping".to_string(),
        ]
    }

    /// `ansible-playbook -i <inventory> --ssh-common-args "-F <cfg>" <playbook> [--tags a,b]`
    pub fn playbook_args(&self, playbook: &Path, tags: &[String]) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            self.inventory.display().to_string(),
            "--ssh-common-args".to_string(),
            self.ssh_common_args(),
            playbook.display().to_string(),
        ];
        if !tags.is_empty() {
            args.push("--tags".to_string());
            args.push(tags.join(","));
        }
        args
    }

    /// Ping every host in `group` once.
    pub async fn ping(&self, group: &str) -> Result<CommandOutput, ProbeError> {
        self.runner.run(&self.ping_binary, &self.ping_args(group)).await
    }

    /// Run a playbook, optionally limited to `tags`.
    pub async fn run_playbook(&self, playbook: &Path, tags: &[String]) -> Result<CommandOutput, ProbeError> {
        tracing::info!(playbook = %playbook.display(), ?tags, "Running playbook");
        let output = self
            .runner
            .run(&self.playbook_binary, &self.playbook_args(playbook, tags))
            .await?;
        if output.success() {
            tracing::info!(playbook = %playbook.display(), "Playbook finished");
        } else {
            tracing::warn!(playbook = %playbook.display(), code = ?output.code, "Playbook failed");
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::runner::ScriptedRunner;

    fn runner() -> AnsibleRunner<ScriptedRunner> {
        let inventory = InventoryConfig {
            inventory_path: "hosts".into(),
            ssh_config_path: "lab_config".into(),
        };
        AnsibleRunner::new(ScriptedRunner::repeating(""), &inventory, &AnsibleConfig::default())
    }

    #[tokio::test]
    async fn test_ping_command_line() {
        let ansible = runner();
        ansible.ping("webservers").await.unwrap();

        let calls = ansible.runner().calls();
        assert_eq!(
            calls[0],
            ["ansible", "webservers", "--ssh-common-args", "-F lab_config", "-i", "hosts", "-m", "ping"]
        );
    }

    #[test]
    fn test_playbook_without_tags() {
        let args = runner().playbook_args(Path::new("site.yml"), &[]);
        assert_eq!(args, ["-i", "hosts", "--ssh-common-args", "-F lab_config", "site.yml"]);
    }

    #[test]
    fn test_playbook_tags_joined() {
        let tags = vec!["haproxy".to_string(), "flask".to_string()];
        let args = runner().playbook_args(Path::new("site.yml"), &tags);
        assert_eq!(&args[5..], ["--tags", "haproxy,flask"]);
    }
}
