use anyhow::Result;

use crate::remote::{Cluster, Exec, RunOptions};
use crate::request::{AllocationRequest, ContainerRequest, assemble, bind_args};
use crate::scripts::{self, EXEC_LAUNCHER};

/// The command to run inside the container and how to schedule it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCommand {
    pub command: String,
    pub args: Vec<String>,
    /// Queue with `sbatch` instead of blocking in `srun`.
    pub batch: bool,
}

impl JobCommand {
    /// The command line handed to the launcher script.
    pub fn line(&self) -> String {
        std::iter::once(&self.command)
            .chain(&self.args)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Run `job` in the container on a fresh allocation, binding the user's
/// scratch directory.
pub fn run_job<E: Exec>(
    cluster: &Cluster<E>,
    batch_output: &str,
    alloc: &AllocationRequest,
    container: &ContainerRequest,
    job: &JobCommand,
) -> Result<()> {
    let args = assemble(alloc, container);
    let scratch = cluster.scratch_path()?;
    let container_args: Vec<String> = args
        .singularity
        .into_iter()
        .chain(bind_args(&scratch))
        .collect();

    let launcher = scripts::write_temp(scripts::bundled(EXEC_LAUNCHER)?)?;
    let launcher_path = cluster.stage_tool(launcher.path(), EXEC_LAUNCHER)?;

    let launch = [
        launcher_path,
        container_args.join(" "),
        container.image.clone(),
        job.line(),
    ];
    let argv = scheduler_argv(job.batch, batch_output, &args.slurm, launch);

    // A TTY lets Ctrl-C reach srun so the job is cancelled with the session.
    let opts = RunOptions {
        force_tty: !job.batch,
        ..RunOptions::default()
    };
    cluster.run(&argv, opts)
}

fn scheduler_argv(
    batch: bool,
    batch_output: &str,
    slurm_args: &[String],
    launch: [String; 4],
) -> Vec<String> {
    let scheduler: Vec<String> = if batch {
        vec![
            "sbatch".into(),
            "-N".into(),
            "1".into(),
            format!("--output={batch_output}"),
        ]
    } else {
        vec!["srun".into()]
    };
    scheduler
        .into_iter()
        .chain(slurm_args.iter().cloned())
        .chain(launch)
        .collect()
}
