//! Executor that runs an external command per task.
//!
//! The command receives the task through environment variables:
//!
//! - `AUTOPILOT_TASK_ID`, `AUTOPILOT_SOURCE_ID`, `AUTOPILOT_TASK_TITLE`
//! - `AUTOPILOT_TASK_PRIORITY`, `AUTOPILOT_TASK_ATTEMPT`
//! - `AUTOPILOT_TASK_JSON`: the full task
//!
//! Outcome mapping:
//!
//! - exit 0 → success
//! - any other exit, death by signal, or timeout → retryable failure
//! - the command cannot be started at all → non-retryable failure

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::types::{Task, TaskOutcome};

use super::Executor;

/// Longest stderr tail kept in a failure reason.
const MAX_REASON_LEN: usize = 500;

/// Runs `program args...` for every task.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    program: OsString,
    args: Vec<OsString>,
    timeout: Option<Duration>,
}

impl CommandExecutor {
    pub fn new(program: impl Into<OsString>) -> Self {
        CommandExecutor {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Splits a command line on whitespace into program and arguments.
    ///
    /// Returns `None` for a blank line. No shell quoting is interpreted.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kills the command and reports a retryable failure after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn command_for(&self, task: &Task) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .env("AUTOPILOT_TASK_ID", task.id().to_string())
            .env("AUTOPILOT_SOURCE_ID", task.source_id().as_str())
            .env("AUTOPILOT_TASK_TITLE", task.title())
            .env("AUTOPILOT_TASK_PRIORITY", task.priority().as_str())
            .env("AUTOPILOT_TASK_ATTEMPT", task.attempt().to_string())
            .env(
                "AUTOPILOT_TASK_JSON",
                serde_json::to_string(task).unwrap_or_default(),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Executor for CommandExecutor {
    async fn execute(&self, task: &Task) -> TaskOutcome {
        let child = match self.command_for(task).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(task_id = %task.id(), error = %e, "Failed to start executor command");
                return TaskOutcome::fatal(format!("failed to start command: {e}"));
            }
        };

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                // Dropping the future drops the child, which kills it.
                Err(_) => {
                    return TaskOutcome::retryable(format!("command timed out after {limit:?}"));
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => return TaskOutcome::retryable(format!("failed to wait for command: {e}")),
        };

        if output.status.success() {
            debug!(task_id = %task.id(), "Executor command succeeded");
            return TaskOutcome::Success;
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = tail_chars(stderr.trim(), MAX_REASON_LEN);
        let reason = match output.status.code() {
            Some(code) if tail.is_empty() => format!("command exited with status {code}"),
            Some(code) => format!("command exited with status {code}: {tail}"),
            None => "command terminated by signal".to_string(),
        };
        TaskOutcome::retryable(reason)
    }
}

/// Last `max` characters of `s`.
fn tail_chars(s: &str, max: usize) -> &str {
    let count = s.chars().count();
    if count <= max {
        return s;
    }
    let skip = count - max;
    let start = s.char_indices().nth(skip).map_or(0, |(i, _)| i);
    &s[start..]
}
