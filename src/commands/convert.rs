use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{info, warn};

use crate::config::ConversionConfig;
use crate::remote::{Cluster, Exec, RunOptions};

/// Where the Docker image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Source {
    /// An image in the local Docker daemon, saved and uploaded first.
    Local,
    /// An image pulled by Singularity from a registry.
    Registry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertRequest {
    pub tag: String,
    pub source: Source,
    /// Destination of the SIF file on the cluster.
    pub sif_path: PathBuf,
}

/// Turn an image tag into something usable in file and job names.
pub fn sanitize_tag(tag: &str) -> String {
    tag.replace(['/', ':', ' '], "-")
}

/// Build a SIF file from a Docker image on a short-lived allocation.
pub fn convert<E: Exec>(
    cluster: &Cluster<E>,
    cfg: &ConversionConfig,
    req: &ConvertRequest,
) -> Result<()> {
    let tag = sanitize_tag(&req.tag);
    let job_name = format!("docker-conversion-{tag}");

    match req.source {
        Source::Local => {
            let local_tar = Path::new(&cfg.tar_dir).join(format!("{tag}.tar"));
            export_image(cluster, &req.tag, &local_tar)?;

            let remote_tar = req
                .sif_path
                .parent()
                .unwrap_or(Path::new(""))
                .join(format!("{tag}.tar"))
                .display()
                .to_string();
            info!(
                "Uploading {} to cluster path {remote_tar}",
                local_tar.display()
            );
            cluster.upload(&local_tar, &remote_tar)?;

            let built = build_on_allocation(
                cluster,
                cfg,
                &job_name,
                &req.sif_path,
                &format!("docker-archive://{remote_tar}"),
            );
            if built.is_err() {
                warn!(
                    "Keeping {} and {remote_tar} so a retry can reuse them",
                    local_tar.display()
                );
            }
            built?;

            info!(
                "Removing temporary files {} and {}:{remote_tar}",
                local_tar.display(),
                cluster.host()
            );
            cluster.run_local(
                &["rm".into(), local_tar.display().to_string()],
                RunOptions::quiet(),
            )?;
            cluster.run(&["rm".into(), remote_tar], RunOptions::quiet())?;
        }
        Source::Registry => {
            build_on_allocation(
                cluster,
                cfg,
                &job_name,
                &req.sif_path,
                &format!("docker://{}", req.tag),
            )?;
        }
    }

    info!("All done!");
    Ok(())
}

/// `docker save` the image unless a tarball from an earlier run exists.
fn export_image<E: Exec>(cluster: &Cluster<E>, tag: &str, tar: &Path) -> Result<()> {
    info!("Exporting {tag} to {} on your local machine", tar.display());
    if tar.exists() {
        info!(
            "{} already exists, reusing it. Delete it to export the image again.",
            tar.display()
        );
        return Ok(());
    }
    cluster
        .run_local(
            &[
                "docker".into(),
                "save".into(),
                "-o".into(),
                tar.display().to_string(),
                tag.to_string(),
            ],
            RunOptions::default(),
        )
        .with_context(|| format!("failed to export {tag}"))
}

/// Allocate a node, run `singularity build` there, and release the node
/// whatever the outcome.
fn build_on_allocation<E: Exec>(
    cluster: &Cluster<E>,
    cfg: &ConversionConfig,
    job_name: &str,
    sif_path: &Path,
    source_uri: &str,
) -> Result<()> {
    info!("Allocating node to convert image to SIF file");
    cluster.allocate(&allocation_args(cfg, job_name))?;

    let built = cluster.allocated_node(job_name).and_then(|node| {
        info!("Converting {source_uri} to SIF file at {}", sif_path.display());
        let script = format!(
            "module load {} && singularity build {} {source_uri}",
            cfg.singularity_module,
            sif_path.display()
        );
        let argv = cluster.node_argv(&node, &["bash".into(), "-l".into(), "-c".into(), script]);
        cluster.run_local(&argv, RunOptions::default())
    });

    cluster.release(job_name);
    built.context("SIF conversion failed")
}

fn allocation_args(cfg: &ConversionConfig, job_name: &str) -> Vec<String> {
    vec![
        "-J".into(),
        job_name.to_string(),
        "-p".into(),
        cfg.partition.clone(),
        "--qos".into(),
        cfg.qos.clone(),
        "--mem".into(),
        cfg.mem.clone(),
        "-c".into(),
        cfg.cpus.to_string(),
        "-t".into(),
        cfg.time.clone(),
    ]
}
