use std::path::Path;

use super::{Script, Stmt, quote};
use crate::task::Task;

pub const ERROR_MARKER: &str = "Error Step:";
pub const FINISH_MARKER: &str = "Finish the job execution!";

/// The script a task runs: its command wrapped with the log lines the queue poller looks for.
pub fn stage_script(task: &Task) -> Script {
    let log = display(&task.log_path);
    let err = display(&task.err_path);
    let title = task.title.replace('\'', "");

    let mut script = Script::bash();
    script.push(Stmt::command("set -e"));
    script.push(Stmt::command(format!("exec >{} 2>{}", quote(&log), quote(&err))));
    script.push(Stmt::command(format!(
        "trap 'echo $(date) {} {}' ERR",
        ERROR_MARKER, title
    )));
    script.push(Stmt::Empty);
    script.push(Stmt::command(format!("echo $(date) Begin Step: {}...", title)));
    script.extend(task.command.lines().map(Stmt::command));
    script.push(Stmt::command(format!("echo $(date) {}", FINISH_MARKER)));
    script
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
