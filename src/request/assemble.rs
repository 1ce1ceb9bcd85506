use super::types::{AllocationRequest, ContainerRequest};

const GPU_PARTITION: &str = "gpu";
const GPU_CONSTRAINT: &str = "gpu";
const VOLTA32_FEATURE: &str = "volta32";
const NV_FLAG: &str = "--nv";

/// Flat argument lists for the scheduler and the container runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledArgs {
    pub slurm: Vec<String>,
    pub singularity: Vec<String>,
}

/// Map an allocation and a container request to `salloc`/`srun`/`sbatch`
/// flags and `singularity` flags.
pub fn assemble(alloc: &AllocationRequest, container: &ContainerRequest) -> AssembledArgs {
    AssembledArgs {
        slurm: slurm_args(alloc),
        singularity: singularity_args(alloc, container),
    }
}

/// Scheduler flags. GPU partition and constraint flags only appear when GPUs
/// are requested.
pub fn slurm_args(alloc: &AllocationRequest) -> Vec<String> {
    let base = [
        "-c".to_string(),
        alloc.cpus.to_string(),
        format!("--time={}", alloc.time),
        format!("--mem={}", alloc.mem),
        "-J".to_string(),
        alloc.job_name.clone(),
    ];

    let gpu = (alloc.gpus > 0).then(|| {
        let constraint = if alloc.volta32 {
            format!("{GPU_CONSTRAINT},{VOLTA32_FEATURE}")
        } else {
            GPU_CONSTRAINT.to_string()
        };
        [
            "-p".to_string(),
            GPU_PARTITION.to_string(),
            "-G".to_string(),
            alloc.gpus.to_string(),
            "-C".to_string(),
            constraint,
        ]
    });

    base.into_iter()
        .chain(alloc.slurm_args.iter().cloned())
        .chain(gpu.into_iter().flatten())
        .collect()
}

/// Container runtime flags: user extras, GPU passthrough, then environment
/// overrides in input order.
pub fn singularity_args(alloc: &AllocationRequest, container: &ContainerRequest) -> Vec<String> {
    let wants_nv = alloc.gpus > 0 && !container.extra_args.iter().any(|a| a == NV_FLAG);

    container
        .extra_args
        .iter()
        .cloned()
        .chain(wants_nv.then(|| NV_FLAG.to_string()))
        .chain(container.env.iter().map(|var| format!("--env {var}")))
        .collect()
}

/// Bind a host path to the same location inside the container.
pub fn bind_args(path: &str) -> [String; 2] {
    ["--bind".to_string(), format!("{path}:{path}")]
}
