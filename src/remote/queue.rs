use anyhow::{Context, Result, bail};
use log::{info, warn};

use super::exec::Exec;
use super::shell::Cluster;
use super::types::RunOptions;

impl<E: Exec> Cluster<E> {
    /// Reserve resources without starting a shell. Blocks until SLURM grants
    /// the allocation.
    pub fn allocate(&self, slurm_args: &[String]) -> Result<()> {
        let argv: Vec<String> = ["salloc".to_string(), "--no-shell".to_string()]
            .into_iter()
            .chain(slurm_args.iter().cloned())
            .collect();
        self.run(&argv, RunOptions::default())
            .context("allocation request failed")
    }

    /// The node granted to the allocation named `job_name`.
    pub fn allocated_node(&self, job_name: &str) -> Result<String> {
        let listing = self.query(&[
            "squeue".into(),
            "--me".into(),
            "-h".into(),
            format!("--name={job_name}"),
            "-o".into(),
            "%R".into(),
        ])?;
        pick_node(job_name, &listing)
    }

    /// Cancel every allocation named `job_name`. Failures are only logged.
    pub fn release(&self, job_name: &str) {
        info!("Releasing allocation {job_name}");
        let argv = vec!["scancel".into(), format!("--name={job_name}")];
        if let Err(e) = self.run(&argv, RunOptions::quiet().unchecked()) {
            warn!("could not release {job_name}: {e:#}");
        }
    }
}

/// Choose the node from `squeue -o %R` output.
///
/// Several lines mean several allocations share the name; the first one wins
/// and the user is warned. A parenthesised entry is a pending reason, not a
/// node.
pub fn pick_node(job_name: &str, listing: &str) -> Result<String> {
    let nodes: Vec<&str> = listing
        .lines()
        .map(|l| l.trim().trim_matches('"'))
        .filter(|l| !l.is_empty())
        .collect();

    let Some(first) = nodes.first() else {
        bail!("no allocation named '{job_name}' found in the queue");
    };
    if nodes.len() > 1 {
        warn!(
            "Detected {} allocations named '{job_name}'. You probably want to cancel some of them \
             to avoid wasting resources: check `squeue --me` and use `scancel` on the extras.",
            nodes.len()
        );
    }
    if first.starts_with('(') {
        bail!("allocation '{job_name}' has no node yet: {first}");
    }
    Ok(first.to_string())
}
