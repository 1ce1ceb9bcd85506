use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{debug, info};

use crate::remote::{Cluster, Exec, RunOptions};
use crate::request::{AllocationRequest, ContainerRequest, assemble, bind_args};
use crate::scripts;
use crate::ssh_config::{self, SshConfig};

/// What `attach` set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachOutcome {
    /// Host alias added to the SSH config.
    pub ssh_host: String,
    pub node: String,
    /// Remote path of the staged attach script.
    pub script_path: String,
}

/// Allocate a node and point a new SSH host at it, so VSCode can attach to a
/// shell inside the container.
///
/// Must run on the local machine: the SSH config being edited is the one
/// VSCode reads.
pub fn attach<E: Exec>(
    cluster: &Cluster<E>,
    ssh_config_path: &Path,
    alloc: &AllocationRequest,
    container: &ContainerRequest,
) -> Result<AttachOutcome> {
    let host = cluster.host().to_string();
    if cluster.on_cluster() {
        bail!("attach-vscode must be run on your local machine, not on the cluster");
    }

    // A missing image would only surface once VSCode tries to attach.
    cluster
        .run(
            &["ls".into(), container.image.clone()],
            RunOptions::default(),
        )
        .with_context(|| {
            format!(
                "{} not found on {host}. If the path looks right, check that `ssh {host}` works",
                container.image
            )
        })?;

    let mut ssh = SshConfig::read(ssh_config_path)?;
    let Some(identity) = ssh
        .host(&host)
        .and_then(|entry| entry.get("identityfile").map(String::from))
    else {
        bail!(
            "no IdentityFile for host {host} in {}. Add one to the {host} entry of your SSH config",
            ssh_config_path.display()
        );
    };
    info!("Will use SSH identity {identity}");

    let args = assemble(alloc, container);
    let scratch = cluster.scratch_path()?;
    let container_args: Vec<String> = args
        .singularity
        .into_iter()
        .chain(bind_args(&scratch))
        .chain([container.image.clone()])
        .collect();

    let script = scripts::render_attach_script(&container_args)?;
    let staged = scripts::write_temp(&script)?;
    let script_path =
        cluster.stage_tool(staged.path(), &format!("vscode_attach_{}.sh", alloc.job_name))?;

    cluster.allocate(&args.slurm)?;
    let node = cluster.allocated_node(&alloc.job_name).with_context(|| {
        format!(
            "cancel the allocation with `ssh {host} scancel --name={}` if it is still queued",
            alloc.job_name
        )
    })?;
    info!("Successful allocation on {node}");

    let ssh_host = format!("{}-vscode", alloc.job_name);
    info!("Updating your SSH settings to allow VSCode to attach to target `{ssh_host}`");
    let values = [
        ("HostName", node.clone()),
        ("ProxyJump", host.clone()),
        ("User", cluster.username()?),
        ("IdentityFile", identity),
        ("RemoteCommand", format!("bash {script_path}")),
    ];
    let before = ssh.render();
    ssh.upsert(&ssh_host, &values)?;
    debug!("SSH config changes:\n{}", ssh_config::diff(&before, &ssh.render()));
    ssh.save()?;

    info!("All done!");
    info!("Attach VSCode to SSH Remote '{ssh_host}'.");
    info!(
        "Don't forget to scancel your job if you're done before it expires: `ssh {host} scancel --name={}`",
        alloc.job_name
    );

    Ok(AttachOutcome {
        ssh_host,
        node,
        script_path,
    })
}
