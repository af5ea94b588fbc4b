//! Process supervisor: one agent invocation from spawn to exit.
//!
//! Per iteration the supervisor moves through `NotStarted → Running →
//! {Succeeded, Failed, Interrupted}`. While running it drains the child's
//! stdout and stderr line by line through the classify/reduce pipeline, a
//! sequential scan with no supervisor-side buffering; backpressure comes
//! from the child's own pipes. Success/failure policy lives one level up in
//! the loop runner; nothing is retried here.

use std::process::Stdio;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;

use crate::activity::{ActivityEntry, ActivityLog, extract_summary};
use crate::error::{RalphrError, Result};
use crate::events::classify_line;
use crate::reducer::EventReducer;
use crate::silence::NOTIFY_SILENT_ENV;
use crate::stats::UsageStats;

/// How the agent invocation itself is assembled.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    /// Program name or path, normally `claude`.
    pub program: String,
    /// Turn budget passed through as `--max-turns`.
    pub max_turns: u32,
}

impl AgentCommand {
    /// Build the fixed argument set for one iteration: prompt text via
    /// `-p`, streaming structured output, permission prompts disabled, the
    /// turn budget cap, and the notification-suppression env var.
    fn build(&self, prompt: &str) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("-p")
            .arg(prompt)
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose")
            .arg("--dangerously-skip-permissions")
            .arg("--max-turns")
            .arg(self.max_turns.to_string())
            .env(NOTIFY_SILENT_ENV, "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }
}

/// Terminal state of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationStatus {
    /// Child exited with code 0.
    Succeeded,
    /// Child exited nonzero. A clean termination, not retried.
    Failed,
    /// Interrupt observed mid-stream; the child was asked to terminate.
    Interrupted,
}

/// What one iteration produced.
#[derive(Debug, Clone, Copy)]
pub struct IterationOutcome {
    pub status: IterationStatus,
    /// Whether a completion marker was seen in this iteration's text.
    pub complete: bool,
    /// This iteration's summed usage statistics.
    pub stats: UsageStats,
}

impl IterationOutcome {
    pub fn success(&self) -> bool {
        self.status == IterationStatus::Succeeded
    }
}

/// Drives one agent process per call.
pub struct Supervisor {
    agent: AgentCommand,
    verbose: bool,
}

impl Supervisor {
    pub fn new(agent: AgentCommand, verbose: bool) -> Self {
        Self { agent, verbose }
    }

    /// Run one iteration: spawn the agent, reduce its output stream, await
    /// its exit. The iteration's state lives and dies inside this call;
    /// only the outcome escapes.
    pub async fn run_iteration(
        &self,
        iteration: u32,
        prompt: &str,
        activity: &mut ActivityLog,
        mut interrupt: watch::Receiver<bool>,
    ) -> Result<IterationOutcome> {
        let mut child = self
            .agent
            .build(prompt)
            .spawn()
            .map_err(|e| RalphrError::Agent(format!("failed to spawn {}: {}", self.agent.program, e)))?;
        log::info!(
            "Iteration {}: spawned {} (pid {:?})",
            iteration,
            self.agent.program,
            child.id()
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RalphrError::Agent("child stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RalphrError::Agent("child stderr not captured".to_string()))?;

        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let mut out_done = false;
        let mut err_done = false;
        let mut interrupt_live = true;

        let mut reducer = EventReducer::new(iteration, self.verbose, activity);

        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => match line? {
                    Some(line) => feed(&mut reducer, &line),
                    None => out_done = true,
                },
                line = err_lines.next_line(), if !err_done => match line? {
                    Some(line) => feed(&mut reducer, &line),
                    None => err_done = true,
                },
                changed = interrupt.changed(), if interrupt_live => match changed {
                    Ok(()) if *interrupt.borrow() => {
                        log::warn!("Iteration {}: interrupt received, terminating agent", iteration);
                        request_termination(&child);
                        // Remaining output is discarded; the child's shutdown
                        // is best-effort and not awaited.
                        let state = reducer.finish();
                        flush_narrative(activity, iteration, &state.accumulated_text);
                        return Ok(IterationOutcome {
                            status: IterationStatus::Interrupted,
                            complete: false,
                            stats: state.stats,
                        });
                    }
                    Ok(()) => {}
                    // Sender gone: no interrupt can arrive for the rest of
                    // this iteration.
                    Err(_) => interrupt_live = false,
                },
            }
        }

        let exit = child.wait().await?;
        let state = reducer.finish();
        flush_narrative(activity, iteration, &state.accumulated_text);
        let status = if exit.success() {
            IterationStatus::Succeeded
        } else {
            log::warn!("Iteration {}: agent exited with {}", iteration, exit);
            IterationStatus::Failed
        };

        Ok(IterationOutcome {
            status,
            complete: state.complete,
            stats: state.stats,
        })
    }
}

fn feed(reducer: &mut EventReducer<'_>, line: &str) {
    for event in classify_line(line) {
        reducer.apply(&event);
    }
}

/// Flush the iteration's narrative block once, at iteration end.
fn flush_narrative(activity: &mut ActivityLog, iteration: u32, accumulated_text: &str) {
    let narrative = extract_summary(accumulated_text);
    if !narrative.is_empty() {
        activity.push(ActivityEntry::IterationSummary {
            iter: iteration,
            text: narrative,
        });
    }
}

/// Ask the child to terminate. SIGTERM, not SIGKILL: the agent gets a
/// chance to shut down its own children.
fn request_termination(child: &Child) {
    if let Some(pid) = child.id() {
        if let Err(e) = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            log::debug!("Failed to signal agent pid {}: {}", pid, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn stub_agent(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("agent.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn supervisor_for(path: &PathBuf) -> Supervisor {
        Supervisor::new(
            AgentCommand {
                program: path.display().to_string(),
                max_turns: 50,
            },
            false,
        )
    }

    fn never_interrupted() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn test_succeeded_on_exit_zero() {
        let temp_dir = TempDir::new().unwrap();
        let agent = stub_agent(&temp_dir, "exit 0");
        let (_tx, rx) = never_interrupted();
        let mut log = ActivityLog::new(temp_dir.path().join("activity.md"));

        let outcome = supervisor_for(&agent)
            .run_iteration(1, "prompt", &mut log, rx)
            .await
            .unwrap();

        assert_eq!(outcome.status, IterationStatus::Succeeded);
        assert!(outcome.success());
        assert!(!outcome.complete);
    }

    #[tokio::test]
    async fn test_failed_on_nonzero_exit() {
        let temp_dir = TempDir::new().unwrap();
        let agent = stub_agent(&temp_dir, "exit 7");
        let (_tx, rx) = never_interrupted();
        let mut log = ActivityLog::new(temp_dir.path().join("activity.md"));

        let outcome = supervisor_for(&agent)
            .run_iteration(1, "prompt", &mut log, rx)
            .await
            .unwrap();

        assert_eq!(outcome.status, IterationStatus::Failed);
        assert!(!outcome.success());
    }

    #[tokio::test]
    async fn test_stream_reduced_into_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let agent = stub_agent(
            &temp_dir,
            concat!(
                r#"echo '{"type":"assistant","message":{"content":[{"type":"text","text":"RALPH_COMPLETE"}]}}'"#,
                "\n",
                r#"echo '{"type":"result","cost_usd":0.01,"duration_ms":500,"total_input_tokens":100,"total_output_tokens":50}'"#,
            ),
        );
        let mut log = ActivityLog::new(temp_dir.path().join("activity.md"));
        let (_tx, rx) = never_interrupted();

        let outcome = supervisor_for(&agent)
            .run_iteration(1, "prompt", &mut log, rx)
            .await
            .unwrap();

        assert!(outcome.complete);
        assert_eq!(outcome.stats.cost, 0.01);
        assert_eq!(outcome.stats.duration_ms, 500);
        assert_eq!(log.entries().len(), 2);
        assert!(matches!(log.entries()[0], ActivityEntry::Stats { .. }));
        // The narrative is flushed once, at iteration end.
        match &log.entries()[1] {
            ActivityEntry::IterationSummary { iter, text } => {
                assert_eq!(*iter, 1);
                assert_eq!(text, "RALPH_COMPLETE");
            }
            other => panic!("Expected IterationSummary, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stderr_lines_flow_through_pipeline() {
        let temp_dir = TempDir::new().unwrap();
        let agent = stub_agent(
            &temp_dir,
            concat!(
                r#"echo '{"type":"error","error":{"message":"from stderr"}}' >&2"#,
                "\n",
                "exit 0",
            ),
        );
        let mut log = ActivityLog::new(temp_dir.path().join("activity.md"));
        let (_tx, rx) = never_interrupted();

        supervisor_for(&agent)
            .run_iteration(2, "prompt", &mut log, rx)
            .await
            .unwrap();

        assert_eq!(
            log.entries(),
            &[ActivityEntry::IterationError {
                iter: 2,
                message: "from stderr".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_silence_env_set_on_child() {
        let temp_dir = TempDir::new().unwrap();
        let agent = stub_agent(
            &temp_dir,
            r#"[ "$RALPH_NOTIFY_SILENT" = "1" ] && exit 0 || exit 1"#,
        );
        let mut log = ActivityLog::new(temp_dir.path().join("activity.md"));
        let (_tx, rx) = never_interrupted();

        let outcome = supervisor_for(&agent)
            .run_iteration(1, "prompt", &mut log, rx)
            .await
            .unwrap();

        assert_eq!(outcome.status, IterationStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_agent_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = ActivityLog::new(temp_dir.path().join("activity.md"));
        let supervisor = Supervisor::new(
            AgentCommand {
                program: "/nonexistent/agent-cli".to_string(),
                max_turns: 50,
            },
            false,
        );
        let (_tx, rx) = never_interrupted();

        let result = supervisor
            .run_iteration(1, "prompt", &mut log, rx)
            .await;

        assert!(matches!(result, Err(RalphrError::Agent(_))));
    }

    #[tokio::test]
    async fn test_interrupt_returns_immediately() {
        let temp_dir = TempDir::new().unwrap();
        let agent = stub_agent(
            &temp_dir,
            concat!(
                r#"echo '{"type":"result","cost_usd":0.01}'"#,
                "\n",
                "sleep 30",
            ),
        );
        let mut log = ActivityLog::new(temp_dir.path().join("activity.md"));
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            let _ = tx.send(true);
        });

        let started = std::time::Instant::now();
        let outcome = supervisor_for(&agent)
            .run_iteration(1, "prompt", &mut log, rx)
            .await
            .unwrap();

        assert_eq!(outcome.status, IterationStatus::Interrupted);
        assert!(!outcome.complete);
        // Stats observed before the interrupt are preserved.
        assert_eq!(outcome.stats.cost, 0.01);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }
}
