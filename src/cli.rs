use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::styling};
use log::LevelFilter;

use crate::commands::{ConvertRequest, JobCommand, Source};
use crate::request::{AllocationRequest, ContainerRequest};

const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::Green.on_default().bold())
    .usage(styling::AnsiColor::Green.on_default().bold())
    .literal(styling::AnsiColor::Cyan.on_default().bold())
    .placeholder(styling::AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "iris-tools", version)]
#[command(about = "Run Singularity containers on the iris cluster", long_about = None)]
#[command(styles = STYLES)]
pub struct Cli {
    /// Log level: error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Config file. Defaults to .iris-tools.yaml in the current directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a local Docker image, or one from a public registry, to a SIF file on the cluster
    DockerConvert(ConvertArgs),
    /// Allocate a node for VSCode to attach to and add a matching host to your SSH config
    AttachVscode(AttachArgs),
    /// Run a command in a Singularity container, with srun or queued with sbatch
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Whether the tag is local or hosted on a registry. Local images are saved and uploaded first
    #[arg(long, value_enum, default_value_t = Source::Local)]
    pub source: Source,

    /// Local Docker image tag, or a tag of an image hosted on a registry
    #[arg(long)]
    pub tag: String,

    /// Path on the cluster where the SIF file is written
    #[arg(long)]
    pub sif_path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct AllocationArgs {
    /// A name for your SLURM job
    #[arg(long)]
    pub job_name: String,

    /// Time to reserve resources for, e.g. '01:00:00' for one hour
    #[arg(long)]
    pub time: String,

    /// Number of CPU cores to reserve
    #[arg(long)]
    pub cpus: u32,

    /// RAM to reserve, e.g. '16G'
    #[arg(long)]
    pub mem: String,

    /// Number of GPUs to reserve. 0 for none
    #[arg(long)]
    pub gpus: u32,

    /// Additional SLURM argument. Repeat for more
    #[arg(long = "slurm-arg", allow_hyphen_values = true)]
    pub slurm_args: Vec<String>,

    /// Reserve a 32GB V100 GPU. Allocation is often slower on these
    #[arg(long)]
    pub volta32: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ContainerArgs {
    /// Path on the cluster of the Singularity image (SIF file) to run
    #[arg(long)]
    pub singularity_image: String,

    /// Additional Singularity argument. Repeat for more
    #[arg(long = "singularity-arg", allow_hyphen_values = true)]
    pub singularity_args: Vec<String>,

    /// Environment override inside the container, as MYVAR=value. Repeat for more
    #[arg(long = "singularity-env")]
    pub singularity_env: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AttachArgs {
    #[command(flatten)]
    pub allocation: AllocationArgs,

    #[command(flatten)]
    pub container: ContainerArgs,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub allocation: AllocationArgs,

    #[command(flatten)]
    pub container: ContainerArgs,

    /// Queue the job with sbatch instead of blocking in srun until resources are available
    #[arg(long)]
    pub batch: bool,

    /// Command to run inside the container
    pub command: String,

    /// Arguments for the command, e.g. '--batch_size 32'
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command_args: Vec<String>,
}

impl From<ConvertArgs> for ConvertRequest {
    fn from(args: ConvertArgs) -> Self {
        Self {
            tag: args.tag,
            source: args.source,
            sif_path: args.sif_path,
        }
    }
}

impl From<AllocationArgs> for AllocationRequest {
    fn from(args: AllocationArgs) -> Self {
        Self {
            job_name: AllocationRequest::normalize_job_name(&args.job_name),
            time: args.time,
            cpus: args.cpus,
            gpus: args.gpus,
            mem: args.mem,
            slurm_args: args.slurm_args,
            volta32: args.volta32,
        }
    }
}

impl From<ContainerArgs> for ContainerRequest {
    fn from(args: ContainerArgs) -> Self {
        Self {
            image: args.singularity_image,
            extra_args: args.singularity_args,
            env: args.singularity_env,
        }
    }
}

impl RunArgs {
    pub fn job_command(&self) -> JobCommand {
        JobCommand {
            command: self.command.clone(),
            args: self.command_args.clone(),
            batch: self.batch,
        }
    }
}

/// Parse a `--log-level` value.
pub fn parse_log_level(level: &str) -> Option<LevelFilter> {
    match level.to_lowercase().as_str() {
        "error" => Some(LevelFilter::Error),
        "warn" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}
