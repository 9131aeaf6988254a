use clap::Parser;
use std::process;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;
use pipegen::{
    ExecutionMode, PipegenError, Result, build, load_config,
    util::{LaunchError, launch_script, parse_duration},
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    match run_pipegen(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_pipegen(args: Cli) -> Result<()> {
    let mut config = load_config(&args.file)?;
    let build_config = &mut config.build;

    if let Some(output_dir) = &args.output_dir {
        build_config.output_dir = std::path::absolute(output_dir)?;
    }
    if args.cluster {
        build_config.mode = ExecutionMode::Cluster;
    } else if args.local {
        build_config.mode = ExecutionMode::Local;
    }
    if let Some(period) = args.status_check_period {
        build_config.queue.status_check_period = Some(period).filter(|&period| period > 0);
    }
    if let Some(timeout) = parse_duration(args.poll_timeout.as_deref(), "--poll-timeout")? {
        build_config.queue.poll_timeout = timeout;
    }
    if let Some(line_ending) = args.line_ending {
        build_config.line_ending = line_ending;
    }

    let launch_timeout = parse_duration(
        args.launch_timeout.as_deref().or(config.launch_timeout.as_deref()),
        "launch timeout",
    )?;
    if args.launch && config.build.mode == ExecutionMode::Cluster {
        return Err(PipegenError::Config(
            "--launch is only supported in local mode".to_string(),
        ));
    }

    info!(
        "Building workflow {} in {} mode",
        config.build.workflow, config.build.mode
    );
    let rendered = build(&config.build, &config.commands)?;

    if args.dry_run {
        match rendered.master_script() {
            Some(master) => print!("{}", master),
            None => println!("Dry run mode - no stages selected, nothing would be generated"),
        }
        return Ok(());
    }

    rendered.write()?;

    if args.launch {
        let Some(master) = rendered.master_path.as_deref() else {
            warn!("Nothing to launch");
            return Ok(());
        };
        let status = launch_script(master, launch_timeout).await?;
        if !status.success() {
            return Err(LaunchError::Failed(status).into());
        }
    }

    Ok(())
}
