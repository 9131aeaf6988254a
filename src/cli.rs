use clap::Parser;

use pipegen::line_ending::LineEnding;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to use
    #[arg(short = 'f', long = "file", default_value = "pipegen.toml")]
    pub file: String,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Override the output directory
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<String>,

    /// Submit stages to the cluster job queue
    #[arg(long = "cluster", conflicts_with = "local")]
    pub cluster: bool,

    /// Run stages as local background processes
    #[arg(long = "local")]
    pub local: bool,

    /// Seconds between job status checks in cluster mode, 0 disables polling
    #[arg(long = "status-check-period")]
    pub status_check_period: Option<u64>,

    /// Give up waiting on a cluster job after this long (e.g., "12h", "90m")
    #[arg(long = "poll-timeout")]
    pub poll_timeout: Option<String>,

    /// Print the master script without writing anything
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Run the master script after a successful build
    #[arg(long = "launch", conflicts_with = "dry_run")]
    pub launch: bool,

    /// Kill the launched master script after this long (e.g., "5m", "30s", "1h30m")
    #[arg(long = "launch-timeout")]
    pub launch_timeout: Option<String>,

    /// Line ending of generated scripts
    #[arg(long = "line-ending", value_enum)]
    pub line_ending: Option<LineEnding>,
}
