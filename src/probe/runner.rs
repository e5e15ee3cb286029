//! Command runner abstraction for executing probe commands.
//!
//! `CommandRunner` is the trait pollers use to execute system commands.
//! `ProcessRunner` is the production implementation backed by `tokio::process`.
//! `ScriptedRunner` is the test double that records calls and returns preset outputs.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use tokio::process::Command;

use crate::probe::ProbeError;

/// Captured result of one process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A clean exit with the given stdout.
    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Trait for executing a program with arguments.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<CommandOutput, ProbeError>> + Send;
}

/// Production runner that spawns the program directly (no shell).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ProbeError> {
        tracing::debug!(program, ?args, "Spawning probe command");
        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProbeError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Test-double runner that records invocations and replays preset results.
///
/// Once the script is exhausted the last entry is replayed forever, so a
/// poller can be driven through any number of identical iterations.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    script: Mutex<VecDeque<Result<CommandOutput, String>>>,
    last: Mutex<Option<Result<CommandOutput, String>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(script: Vec<Result<CommandOutput, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Runner whose every invocation prints `stdout`.
    pub fn repeating(stdout: &str) -> Self {
        Self::new(vec![Ok(CommandOutput::stdout(stdout))])
    }

    /// Each recorded invocation as `[program, args...]`.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn next(&self) -> Result<CommandOutput, String> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = script.pop_front() {
            *last = Some(entry);
        }
        last.clone().unwrap_or_else(|| Ok(CommandOutput::default()))
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, ProbeError> {
        if let Ok(mut calls) = self.calls.lock() {
            let mut call = vec![program.to_string()];
            call.extend(args.iter().cloned());
            calls.push(call);
        }

        self.next().map_err(|message| ProbeError::Spawn {
            program: program.to_string(),
            source: std::io::Error::other(message),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_runner_records_commands() {
        let runner = ScriptedRunner::repeating("ok");
        runner.run("ansible", &["all".into()]).await.unwrap();
        runner.run("ansible-playbook", &[]).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ["ansible", "all"]);
        assert_eq!(calls[1], ["ansible-playbook"]);
    }

    #[tokio::test]
    async fn test_scripted_runner_replays_in_order_then_repeats_last() {
        let runner = ScriptedRunner::new(vec![
            Ok(CommandOutput::stdout("first")),
            Err("no such file".into()),
            Ok(CommandOutput::stdout("third")),
        ]);

        assert_eq!(runner.run("p", &[]).await.unwrap().stdout, "first");
        assert!(matches!(runner.run("p", &[]).await, Err(ProbeError::Spawn { .. })));
        assert_eq!(runner.run("p", &[]).await.unwrap().stdout, "third");
        assert_eq!(runner.run("p", &[]).await.unwrap().stdout, "third");
    }

    #[tokio::test]
    async fn test_empty_script_returns_empty_output() {
        let runner = ScriptedRunner::default();
        let output = runner.run("anything", &[]).await.unwrap();
        assert_eq!(output, CommandOutput::default());
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_process_runner_reports_missing_binary() {
        let result = ProcessRunner
            .run("stack-verify-definitely-missing-binary", &[])
            .await;
        assert!(matches!(result, Err(ProbeError::Spawn { .. })));
    }
}
