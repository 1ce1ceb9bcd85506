use std::cell::OnceCell;
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{debug, info};

use crate::config::Config;

use super::exec::{Exec, SystemExec};
use super::types::RunOptions;

/// Runs commands on the cluster login node, from wherever this process is.
///
/// Off the cluster every remote command is forwarded with
/// `ssh <cluster_host>`; on a login node it runs directly.
pub struct Cluster<E = SystemExec> {
    exec: E,
    host: String,
    scratch_root: String,
    tools_dir: String,
    on_cluster: bool,
    user: OnceCell<String>,
}

impl Cluster<SystemExec> {
    /// Build a cluster handle, checking the local hostname once.
    pub fn detect(config: &Config) -> Result<Self> {
        let hostname = hostname::get().context("failed to read the local hostname")?;
        let hostname = hostname.to_string_lossy();
        let on_cluster = is_login_node(&hostname, &config.login_marker);
        debug!("hostname={hostname} on_cluster={on_cluster}");
        Ok(Self::new(SystemExec, config, on_cluster))
    }
}

/// Whether `hostname` belongs to the cluster, judged by `marker`.
pub fn is_login_node(hostname: &str, marker: &str) -> bool {
    !marker.is_empty() && hostname.contains(marker)
}

impl<E: Exec> Cluster<E> {
    pub fn new(exec: E, config: &Config, on_cluster: bool) -> Self {
        Self {
            exec,
            host: config.cluster_host.clone(),
            scratch_root: config.scratch_root.clone(),
            tools_dir: config.tools_dir.clone(),
            on_cluster,
            user: OnceCell::new(),
        }
    }

    pub fn on_cluster(&self) -> bool {
        self.on_cluster
    }

    /// SSH alias of the login node.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn exec(&self) -> &E {
        &self.exec
    }

    /// The command line that runs `argv` on the login node.
    ///
    /// When forwarded over SSH the command is quoted word by word, so the
    /// remote shell sees the same arguments a local run would.
    pub fn remote_argv(&self, argv: &[String], force_tty: bool) -> Vec<String> {
        if self.on_cluster {
            return argv.to_vec();
        }
        ["ssh".to_string()]
            .into_iter()
            .chain(force_tty.then(|| "-t".to_string()))
            .chain([self.host.clone(), shell_words::join(argv)])
            .collect()
    }

    /// The command line that runs `argv` on compute node `node`, jumping
    /// through the login node when needed.
    pub fn node_argv(&self, node: &str, argv: &[String]) -> Vec<String> {
        let jump = (!self.on_cluster).then(|| ["-J".to_string(), self.host.clone()]);
        ["ssh".to_string()]
            .into_iter()
            .chain(jump.into_iter().flatten())
            .chain([
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
                node.to_string(),
                shell_words::join(argv),
            ])
            .collect()
    }

    /// Run on the login node and capture stdout.
    pub fn query(&self, argv: &[String]) -> Result<String> {
        self.exec.output(&self.remote_argv(argv, false))
    }

    /// Run on the login node, streaming output.
    pub fn run(&self, argv: &[String], opts: RunOptions) -> Result<()> {
        self.run_argv(&self.remote_argv(argv, opts.force_tty), opts)
    }

    /// Run on this machine, streaming output.
    pub fn run_local(&self, argv: &[String], opts: RunOptions) -> Result<()> {
        self.run_argv(argv, opts)
    }

    fn run_argv(&self, argv: &[String], opts: RunOptions) -> Result<()> {
        let line = shell_words::join(argv);
        if opts.echo {
            info!("{line}");
        }
        let success = self.exec.status(argv)?;
        if opts.check && !success {
            bail!("`{line}` exited with a non-zero status");
        }
        Ok(())
    }

    /// The user name on the cluster. Asked once, then cached.
    pub fn username(&self) -> Result<String> {
        if let Some(user) = self.user.get() {
            return Ok(user.clone());
        }
        let user = self
            .query(&["whoami".to_string()])
            .context("failed to read the cluster user name")?;
        if user.is_empty() {
            bail!("`whoami` on {} returned nothing", self.host);
        }
        let _ = self.user.set(user.clone());
        Ok(user)
    }

    /// `<scratch_root>/<user>`
    pub fn scratch_path(&self) -> Result<String> {
        Ok(format!(
            "{}/{}",
            self.scratch_root.trim_end_matches('/'),
            self.username()?
        ))
    }

    /// Where helper scripts are staged on the shared filesystem.
    pub fn tools_path(&self) -> Result<String> {
        Ok(format!("{}/{}", self.scratch_path()?, self.tools_dir))
    }

    /// Copy a local file to `remote` on the cluster filesystem.
    pub fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let local = local.display().to_string();
        let argv = if self.on_cluster {
            vec!["/bin/cp".into(), "-fR".into(), local, remote.to_string()]
        } else {
            vec!["scp".into(), local, format!("{}:{remote}", self.host)]
        };
        self.run_local(&argv, RunOptions::default())
            .with_context(|| format!("failed to upload to {remote}"))
    }

    /// Upload `local` into the tools directory as `name` and make it
    /// executable. Returns the remote path.
    pub fn stage_tool(&self, local: &Path, name: &str) -> Result<String> {
        let folder = self.tools_path()?;
        self.run(
            &["mkdir".into(), "-p".into(), folder.clone()],
            RunOptions::default(),
        )?;
        let target = format!("{folder}/{name}");
        self.upload(local, &target)?;
        self.run(
            &["chmod".into(), "u+x".into(), target.clone()],
            RunOptions::quiet(),
        )?;
        Ok(target)
    }
}
