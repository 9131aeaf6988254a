use std::{
    fmt,
    io::Error as IoError,
    path::Path,
    process::{ExitStatus, Stdio},
    time::Duration,
};

use tokio::process::Command as TokioCommand;
use tracing::{info, warn};

use crate::error::{PipegenError, Result};

#[derive(Debug)]
pub enum LaunchError {
    Io(IoError),
    Timeout(Duration),
    Failed(ExitStatus),
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaunchError::Io(e) => write!(f, "Failed to run master script: {}", e),
            LaunchError::Timeout(limit) => write!(
                f,
                "Master script timed out after {}",
                humantime::format_duration(*limit)
            ),
            LaunchError::Failed(status) => write!(f, "Master script failed: {}", status),
        }
    }
}

impl std::error::Error for LaunchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaunchError::Io(e) => Some(e),
            LaunchError::Timeout(_) | LaunchError::Failed(_) => None,
        }
    }
}

/// Parses a duration such as `30s`, `5m` or `1h30m`. `0` and empty mean "no limit".
pub fn parse_duration(value: Option<&str>, setting: &str) -> Result<Option<Duration>> {
    let value = match value.map(str::trim) {
        None | Some("") | Some("0") => return Ok(None),
        Some(value) => value,
    };

    value
        .parse::<humantime::Duration>()
        .map(|duration| Some(duration.into()))
        .map_err(|e| {
            PipegenError::Config(format!(
                "invalid duration '{}' for {}: {} (use a format like '5m', '30s', '1h30m')",
                value, setting, e
            ))
        })
}

/// Runs the generated master script with bash, streaming its output, and kills it
/// once `timeout` elapses.
pub async fn launch_script(
    script: &Path,
    timeout: Option<Duration>,
) -> std::result::Result<ExitStatus, LaunchError> {
    let mut cmd = TokioCommand::new("bash");
    cmd.arg(script)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    info!("Launching {}", script.display());
    let mut child = cmd.spawn().map_err(LaunchError::Io)?;

    match timeout {
        Some(limit) => {
            tokio::select! {
                result = child.wait() => result.map_err(LaunchError::Io),
                _ = tokio::time::sleep(limit) => {
                    if let Err(kill_err) = child.kill().await {
                        warn!("Failed to kill timed-out master script: {}", kill_err);
                    }
                    let _ = child.wait().await;
                    Err(LaunchError::Timeout(limit))
                }
            }
        }
        None => child.wait().await.map_err(LaunchError::Io),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_humantime_durations() {
        assert_eq!(
            parse_duration(Some("1h30m"), "poll_timeout").unwrap(),
            Some(Duration::from_secs(5400))
        );
        assert_eq!(parse_duration(Some("0"), "poll_timeout").unwrap(), None);
        assert_eq!(parse_duration(None, "poll_timeout").unwrap(), None);
    }

    #[test]
    fn invalid_duration_names_the_setting() {
        let err = parse_duration(Some("soon"), "launch_timeout").unwrap_err();
        assert!(err.to_string().contains("launch_timeout"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launch_times_out_long_running_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow.sh");
        std::fs::write(&script, "sleep 5\n").unwrap();

        let result = launch_script(&script, Some(Duration::from_millis(200))).await;
        assert!(matches!(result, Err(LaunchError::Timeout(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launch_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        std::fs::write(&script, "exit 3\n").unwrap();

        let status = launch_script(&script, None).await.unwrap();
        assert_eq!(status.code(), Some(3));
    }
}
