use std::{path::Path, time::Duration};

use crate::{
    script::{
        Script, Stmt, quote,
        stage::{ERROR_MARKER, FINISH_MARKER},
    },
    task::Task,
};

pub const DEFAULT_SUBMIT_COMMAND: &str = "qsub";
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub submit_command: String,
    pub queue: Option<String>,
    pub parallel_env: Option<String>,
    pub threads: Option<u32>,
    pub max_mem: Option<String>,
    /// Seconds between two looks at a task's log. `None` disables polling.
    pub status_check_period: Option<u64>,
    pub poll_timeout: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            submit_command: DEFAULT_SUBMIT_COMMAND.to_string(),
            queue: None,
            parallel_env: None,
            threads: None,
            max_mem: None,
            status_check_period: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl QueueSettings {
    pub fn polling_enabled(&self) -> bool {
        matches!(self.status_check_period, Some(period) if period > 0)
    }

    /// Number of checks before a task counts as timed out, at least one.
    pub fn max_checks(&self) -> Option<u64> {
        let period = self.status_check_period.filter(|&period| period > 0)?;
        let timeout = self.poll_timeout.as_secs().max(1);
        Some(timeout.div_ceil(period).max(1))
    }
}

/// Terminal states of a polled job and the wrapper's exit status for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Completed,
    Failed,
    TimedOut,
}

impl PollOutcome {
    pub fn exit_code(self) -> i32 {
        match self {
            PollOutcome::Completed => 0,
            PollOutcome::Failed => 1,
            PollOutcome::TimedOut => 124,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PollOutcome::Completed => "COMPLETED",
            PollOutcome::Failed => "FAILED",
            PollOutcome::TimedOut => "TIMED_OUT",
        }
    }
}

/// Builds the cluster submission wrappers the master script calls instead of stage scripts.
pub struct QueueAdapter<'a> {
    settings: &'a QueueSettings,
}

impl<'a> QueueAdapter<'a> {
    pub fn new(settings: &'a QueueSettings) -> Self {
        Self { settings }
    }

    /// `prerequisite` marks a task that later work in the master script waits on.
    /// Only those get a polling block, and only when polling is enabled.
    pub fn wrap(&self, task: &Task, prerequisite: bool) -> Script {
        let mut script = Script::bash();
        // A log left over from an earlier run would satisfy the poll before the job starts.
        let log = path_text(&task.log_path);
        script.push(Stmt::command(format!(
            "rm -f {} {} {}",
            quote(&log),
            quote(&path_text(&task.err_path)),
            quote(&format!("{}.queue", log))
        )));
        script.push(Stmt::command(format!(
            "job_id=$({}) || exit 1",
            self.submit_line(task)
        )));
        script.push(Stmt::command(format!(
            "echo \"$(date) SUBMITTED {} as job ${{job_id}}\"",
            task.name
        )));

        if prerequisite {
            if let Some(max_checks) = self.settings.max_checks() {
                script.push(Stmt::Empty);
                script.extend(self.poll_block(task, max_checks));
            }
        }

        script
    }

    fn submit_line(&self, task: &Task) -> String {
        let mut parts = vec![
            self.settings.submit_command.clone(),
            "-terse".to_string(),
            "-N".to_string(),
            quote(&task.name).into_owned(),
        ];

        if let Some(queue) = &self.settings.queue {
            parts.extend(["-q".to_string(), quote(queue).into_owned()]);
        }
        if let Some(pe) = &self.settings.parallel_env {
            let threads = self.settings.threads.unwrap_or(1);
            parts.extend(["-pe".to_string(), quote(pe).into_owned(), threads.to_string()]);
        }
        if let Some(mem) = &self.settings.max_mem {
            parts.extend(["-l".to_string(), format!("h_vmem={}", quote(mem))]);
        }

        let queue_log = format!("{}.queue", path_text(&task.log_path));
        parts.extend([
            "-o".to_string(),
            quote(&queue_log).into_owned(),
            "-j".to_string(),
            "y".to_string(),
            quote(&path_text(&task.script_path)).into_owned(),
        ]);

        parts.join(" ")
    }

    fn poll_block(&self, task: &Task, max_checks: u64) -> Vec<Stmt> {
        let period = self.settings.status_check_period.unwrap_or(1);
        let log = path_text(&task.log_path);
        let log = quote(&log);
        let report = |outcome: PollOutcome| {
            format!(
                "        echo \"$(date) {} {}\"",
                outcome.label(),
                task.name
            )
        };

        vec![
            Stmt::command(format!("period={}", period)),
            Stmt::command(format!("max_checks={}", max_checks)),
            Stmt::command("checks=0"),
            Stmt::command("while true; do"),
            Stmt::command(format!(
                "    if grep -q '{}' {} 2>/dev/null; then",
                ERROR_MARKER, log
            )),
            Stmt::command(report(PollOutcome::Failed)),
            Stmt::command(format!("        exit {}", PollOutcome::Failed.exit_code())),
            Stmt::command("    fi"),
            Stmt::command(format!(
                "    if grep -q '{}' {} 2>/dev/null; then",
                FINISH_MARKER, log
            )),
            Stmt::command(report(PollOutcome::Completed)),
            Stmt::command(format!(
                "        exit {}",
                PollOutcome::Completed.exit_code()
            )),
            Stmt::command("    fi"),
            Stmt::command("    if [ \"$checks\" -ge \"$max_checks\" ]; then"),
            Stmt::command(report(PollOutcome::TimedOut)),
            Stmt::command(format!("        exit {}", PollOutcome::TimedOut.exit_code())),
            Stmt::command("    fi"),
            Stmt::command("    checks=$((checks + 1))"),
            Stmt::command("    sleep \"$period\""),
            Stmt::command("done"),
        ]
    }
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
