//! Loop controller: drives N iterations through the supervisor.
//!
//! Iterations run strictly sequentially; the agent is assumed
//! non-reentrant for a shared workspace. The controller owns the run-wide
//! state (global statistics, counters, the activity log) on its single
//! logical thread, so nothing here needs locking. The only asynchronous
//! event is the interrupt signal, observed via a watch channel at the top
//! of each iteration and inside the supervisor's read loop.

use std::path::PathBuf;

use chrono::Local;
use tokio::sync::watch;

use crate::activity::{ActivityEntry, ActivityLog, RunSummary};
use crate::config::{Config, NotifyConfig};
use crate::display;
use crate::error::Result;
use crate::notify;
use crate::silence::SilenceGuard;
use crate::stats::UsageStats;
use crate::supervisor::{AgentCommand, IterationStatus, Supervisor};

/// Everything one run needs, resolved from CLI flags and config.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub iterations: u32,
    /// Full prompt text handed to every iteration.
    pub prompt: String,
    /// Prompt file name as shown in the banner.
    pub prompt_label: String,
    pub stop_on_complete: bool,
    pub verbose: bool,
}

/// Final accounting for a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub completed: u32,
    pub failed: u32,
    pub early_complete: bool,
    pub interrupted: bool,
    pub totals: UsageStats,
}

impl RunReport {
    /// Process exit code: 130 interrupted, 0 early-complete or clean,
    /// 1 when something failed without early completion.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            130
        } else if self.failed > 0 && !self.early_complete {
            1
        } else {
            0
        }
    }
}

/// Drives the whole run.
pub struct LoopRunner {
    options: RunOptions,
    supervisor: Supervisor,
    activity_path: PathBuf,
    notify_config: NotifyConfig,
}

impl LoopRunner {
    pub fn new(options: RunOptions, config: &Config) -> Self {
        let supervisor = Supervisor::new(
            AgentCommand {
                program: config.agent.command.clone(),
                max_turns: config.agent.max_turns,
            },
            options.verbose,
        );
        Self {
            options,
            supervisor,
            activity_path: config.activity.path.clone(),
            notify_config: config.notify.clone(),
        }
    }

    /// Run up to `iterations` agent invocations, persisting the activity
    /// log after every one and again before returning.
    pub async fn run(&self, interrupt: watch::Receiver<bool>) -> Result<RunReport> {
        let marker_dir = self
            .activity_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let _silence = SilenceGuard::acquire(marker_dir)?;

        let mut activity = ActivityLog::new(&self.activity_path);
        let mut report = RunReport::default();

        display::banner(self.options.iterations, &self.options.prompt_label);

        for iteration in 1..=self.options.iterations {
            if *interrupt.borrow() {
                report.interrupted = true;
                break;
            }

            display::iteration_header(iteration, self.options.iterations);
            activity.push(ActivityEntry::IterationStart {
                iter: iteration,
                total: self.options.iterations,
            });

            let (success, complete) = match self
                .supervisor
                .run_iteration(iteration, &self.options.prompt, &mut activity, interrupt.clone())
                .await
            {
                Ok(outcome) => {
                    report.totals.absorb(&outcome.stats);
                    if outcome.status == IterationStatus::Interrupted {
                        report.interrupted = true;
                    }
                    (outcome.success(), outcome.complete)
                }
                Err(e) => {
                    // Iteration-level failure: counted and logged, the loop
                    // moves on to the next iteration.
                    log::error!("Iteration {} failed: {}", iteration, e);
                    display::error_line(&format!("Error running agent: {}", e));
                    activity.push(ActivityEntry::IterationError {
                        iter: iteration,
                        message: e.to_string(),
                    });
                    (false, false)
                }
            };

            if success {
                report.completed += 1;
            } else {
                report.failed += 1;
            }
            activity.push(ActivityEntry::IterationEnd {
                iter: iteration,
                success,
                complete,
            });
            activity.write(&self.snapshot(&report, false))?;

            if report.interrupted {
                display::interrupted_notice();
                break;
            }

            display::iteration_footer(iteration, success);

            if complete && self.options.stop_on_complete {
                display::early_complete_notice();
                report.early_complete = true;
                break;
            }
        }

        let summary = self.snapshot(&report, true);
        activity.write(&summary)?;
        display::summary(
            report.completed,
            report.failed,
            report.early_complete,
            &report.totals,
        );

        if self.notify_config.enabled {
            let (title, message) = notification_text(&report);
            notify::send(&title, &message, self.notify_config.timeout_ms).await;
        }

        log::info!(
            "Run finished: {} completed, {} failed, early_complete={}, interrupted={}",
            report.completed,
            report.failed,
            report.early_complete,
            report.interrupted
        );
        Ok(report)
    }

    fn snapshot(&self, report: &RunReport, finished: bool) -> RunSummary {
        RunSummary {
            completed: report.completed,
            failed: report.failed,
            early_complete: report.early_complete,
            interrupted: report.interrupted,
            totals: report.totals,
            finished_at: finished.then(Local::now),
        }
    }
}

/// Notification title and message; the wording tracks how the run ended.
fn notification_text(report: &RunReport) -> (String, String) {
    let ran = report.completed + report.failed;
    if report.interrupted {
        (
            "Ralph interrupted".to_string(),
            format!("Run stopped by user after {} iteration(s)", ran),
        )
    } else if report.early_complete {
        (
            "Ralph complete".to_string(),
            format!("Completion marker detected after {} iteration(s)", ran),
        )
    } else if report.failed > 0 {
        (
            "Ralph finished with failures".to_string(),
            format!("{} completed, {} failed", report.completed, report.failed),
        )
    } else {
        (
            "Ralph finished".to_string(),
            format!("{} iteration(s) completed", report.completed),
        )
    }
}
