//! Shell-backed step executor.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{ChildStdout, Command};
use tracing::{debug, warn};

use crate::runner::{ExecutionContext, StepExecutor, StepOutcome};
use crate::steps::StepDefinition;

/// Lines of stderr kept for the failure message.
const STDERR_TAIL: usize = 5;

/// Exit codes the shell uses for "not executable" and "not found".
const UNRUNNABLE_EXIT_CODES: [i32; 2] = [126, 127];

/// Shell program and the flag that passes it a command string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSpec {
    pub program: String,
    pub flag: String,
}

impl ShellSpec {
    /// `$SHELL` as a login shell, so version managers set up in profiles are
    /// on `PATH`. Falls back to `/bin/sh`.
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            return Self {
                program: std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string()),
                flag: "/C".to_string(),
            };
        }
        Self {
            program: std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string()),
            flag: "-lc".to_string(),
        }
    }

    /// Plain POSIX `sh -c`.
    pub fn posix() -> Self {
        Self {
            program: "/bin/sh".to_string(),
            flag: "-c".to_string(),
        }
    }
}

/// Runs each step's configured shell command.
///
/// - a step without a command succeeds immediately
/// - a command that cannot be spawned, or exits 126/127, is a fatal failure
/// - any other non-zero exit is retryable
/// - cancellation kills the child process
///
/// Each stdout line is forwarded as a progress message.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    commands: HashMap<String, String>,
    shell: ShellSpec,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl CommandExecutor {
    pub fn new(commands: HashMap<String, String>) -> Self {
        Self {
            commands,
            shell: ShellSpec::detect(),
            cwd: None,
            env: HashMap::new(),
        }
    }

    pub fn with_shell(mut self, shell: ShellSpec) -> Self {
        self.shell = shell;
        self
    }

    /// Working directory for every command.
    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Extra environment variable for every command.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Command configured for a step.
    pub fn command_for(&self, step_id: &str) -> Option<&str> {
        self.commands.get(step_id).map(String::as_str)
    }

    fn build(&self, step: &StepDefinition, command: &str, attempt: u32) -> Command {
        let mut cmd = Command::new(&self.shell.program);
        cmd.arg(&self.shell.flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("TRAILHEAD_STEP", &step.id)
            .env("TRAILHEAD_ATTEMPT", attempt.to_string());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

async fn next_line(lines: &mut Option<Lines<BufReader<ChildStdout>>>) -> Option<String> {
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}

fn estimate_percent(step: &StepDefinition, started: Instant) -> u8 {
    if step.estimated_duration == 0 {
        return 50;
    }
    let ratio = started.elapsed().as_secs_f64() / step.estimated_duration as f64;
    (ratio * 100.0).clamp(1.0, 95.0) as u8
}

#[async_trait]
impl StepExecutor for CommandExecutor {
    async fn execute(&self, step: &StepDefinition, ctx: ExecutionContext) -> StepOutcome {
        let Some(command) = self.command_for(&step.id) else {
            ctx.progress.report(100, "nothing to run");
            return StepOutcome::Success;
        };

        debug!("Spawning `{}` for '{}'", command, step.id);
        let started = Instant::now();
        let mut child = match self.build(step, command, ctx.attempt).spawn() {
            Ok(child) => child,
            Err(e) => {
                return StepOutcome::FatalFailure(format!(
                    "failed to start {}: {}",
                    self.shell.program, e
                ))
            }
        };
        ctx.progress.report(0, command);

        let stderr_tail = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail = VecDeque::with_capacity(STDERR_TAIL);
                while let Ok(Some(line)) = lines.next_line().await {
                    if tail.len() == STDERR_TAIL {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
                tail.into_iter().collect::<Vec<_>>().join("\n")
            })
        });
        let mut stdout = child.stdout.take().map(|s| BufReader::new(s).lines());

        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill `{}`: {}", command, e);
                    }
                    return StepOutcome::FatalFailure("cancelled".to_string());
                }
                line = next_line(&mut stdout) => match line {
                    Some(line) => ctx.progress.report(estimate_percent(step, started), line),
                    None => break,
                },
            }
        }

        let status = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill `{}`: {}", command, e);
                }
                return StepOutcome::FatalFailure("cancelled".to_string());
            }
            status = child.wait() => status,
        };

        let stderr = match stderr_tail {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        match status {
            Ok(status) if status.success() => {
                ctx.progress.report(100, "done");
                StepOutcome::Success
            }
            Ok(status) => {
                let detail = if stderr.is_empty() {
                    String::new()
                } else {
                    format!(": {}", stderr)
                };
                match status.code() {
                    Some(code) if UNRUNNABLE_EXIT_CODES.contains(&code) => {
                        StepOutcome::FatalFailure(format!("exit code {}{}", code, detail))
                    }
                    Some(code) => {
                        StepOutcome::RetryableFailure(format!("exit code {}{}", code, detail))
                    }
                    None => StepOutcome::RetryableFailure(format!("terminated by signal{}", detail)),
                }
            }
            Err(e) => StepOutcome::RetryableFailure(format!("failed to wait for command: {}", e)),
        }
    }
}
