use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use env_logger::Builder;
use log::{LevelFilter, error};

use iris_tools::cli::{Cli, Command, parse_log_level};
use iris_tools::commands;
use iris_tools::config;
use iris_tools::remote::Cluster;
use iris_tools::ssh_config;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = parse_log_level(level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{level}', defaulting to 'info'");
        LevelFilter::Info
    });
    Builder::from_default_env()
        .filter_level(filter)
        .format_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let cfg = config::load(&cwd, cli.config.as_deref())?;
    let cluster = Cluster::detect(&cfg)?;

    match cli.command {
        Command::DockerConvert(args) => {
            commands::convert(&cluster, &cfg.conversion, &args.into())
        }
        Command::AttachVscode(args) => {
            let ssh_path = ssh_config::resolve_path(cfg.ssh_config.as_deref())?;
            commands::attach(
                &cluster,
                &ssh_path,
                &args.allocation.into(),
                &args.container.into(),
            )?;
            Ok(())
        }
        Command::Run(args) => {
            let job = args.job_command();
            commands::run_job(
                &cluster,
                &cfg.batch_output,
                &args.allocation.into(),
                &args.container.into(),
                &job,
            )
        }
    }
}
