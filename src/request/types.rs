/// Resources to reserve on the cluster for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub job_name: String,
    /// SLURM time limit, e.g. `01:00:00`.
    pub time: String,
    pub cpus: u32,
    pub gpus: u32,
    /// SLURM memory string, e.g. `16G`.
    pub mem: String,
    /// Passed to the scheduler verbatim, after the generated flags.
    pub slurm_args: Vec<String>,
    /// Ask for the 32GB V100 variant.
    pub volta32: bool,
}

impl AllocationRequest {
    /// Job names end up in SSH host aliases and file names, so spaces are
    /// replaced with underscores.
    pub fn normalize_job_name(name: &str) -> String {
        name.replace(' ', "_")
    }
}

/// The Singularity image to run and how to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    /// Path of the SIF file on the cluster.
    pub image: String,
    pub extra_args: Vec<String>,
    /// `NAME=value` overrides.
    pub env: Vec<String>,
}
