//! End-to-end tests of the three workflows against a recording executor.
//!
//! No process is spawned: every command line is captured so the tests can
//! check what would have been run on the cluster.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;

use iris_tools::commands::{ConvertRequest, JobCommand, Source, attach, convert, run_job};
use iris_tools::config::{Config, ConversionConfig};
use iris_tools::remote::{Cluster, Exec};
use iris_tools::request::{AllocationRequest, ContainerRequest};
use iris_tools::ssh_config::SshConfig;

/// Answers `whoami` and `squeue`, fails any command containing one of
/// `failing`, and records everything.
#[derive(Default)]
struct FakeExec {
    calls: RefCell<Vec<Vec<String>>>,
    squeue: String,
    failing: Vec<&'static str>,
}

impl FakeExec {
    fn with_node(node: &str) -> Self {
        Self {
            squeue: node.to_string(),
            ..Self::default()
        }
    }

    fn failing(mut self, marker: &'static str) -> Self {
        self.failing.push(marker);
        self
    }
}

impl Exec for FakeExec {
    fn output(&self, argv: &[String]) -> Result<String> {
        self.calls.borrow_mut().push(argv.to_vec());
        let line = argv.join(" ");
        if line.contains("whoami") {
            Ok("alice".to_string())
        } else if line.contains("squeue") {
            Ok(self.squeue.clone())
        } else {
            Ok(String::new())
        }
    }

    fn status(&self, argv: &[String]) -> Result<bool> {
        self.calls.borrow_mut().push(argv.to_vec());
        let line = argv.join(" ");
        Ok(!self.failing.iter().any(|f| line.contains(f)))
    }
}

fn lines(cluster: &Cluster<FakeExec>) -> Vec<String> {
    cluster
        .exec()
        .calls
        .borrow()
        .iter()
        .map(|c| c.join(" "))
        .collect()
}

fn ran(cluster: &Cluster<FakeExec>, needle: &str) -> bool {
    ran_all(cluster, &[needle])
}

/// Some single command line contains every needle.
fn ran_all(cluster: &Cluster<FakeExec>, needles: &[&str]) -> bool {
    lines(cluster)
        .iter()
        .any(|l| needles.iter().all(|n| l.contains(n)))
}

fn alloc(gpus: u32) -> AllocationRequest {
    AllocationRequest {
        job_name: "job".into(),
        time: "01:00:00".into(),
        cpus: 4,
        gpus,
        mem: "16G".into(),
        slurm_args: Vec::new(),
        volta32: false,
    }
}

fn container() -> ContainerRequest {
    ContainerRequest {
        image: "/s/img.sif".into(),
        extra_args: Vec::new(),
        env: vec!["A=1".into()],
    }
}

const SSH_CONFIG: &str = "\
Host iris-cluster
    HostName access-iris.uni.lu
    Port 8022
    User alice
    IdentityFile ~/.ssh/id_iris
";

fn ssh_config_file(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("failed to create tempdir");
    let path = dir.path().join("config");
    fs::write(&path, contents).expect("failed to write ssh config");
    (dir, path)
}

// ── attach-vscode ───────────────────────────────────────────────────

#[test]
fn attach_refuses_to_run_on_cluster() {
    let cluster = Cluster::new(FakeExec::with_node("node042"), &Config::default(), true);
    let (_dir, path) = ssh_config_file(SSH_CONFIG);

    let err = attach(&cluster, &path, &alloc(0), &container()).unwrap_err();
    assert!(err.to_string().contains("local machine"));
    assert!(lines(&cluster).is_empty());
}

#[test]
fn attach_allocates_and_writes_ssh_host() {
    let cluster = Cluster::new(FakeExec::with_node("node042"), &Config::default(), false);
    let (_dir, path) = ssh_config_file(SSH_CONFIG);

    let outcome = attach(&cluster, &path, &alloc(1), &container()).unwrap();
    let script = "/scratch/users/alice/iris_singularity_tools/vscode_attach_job.sh";
    assert_eq!(outcome.ssh_host, "job-vscode");
    assert_eq!(outcome.node, "node042");
    assert_eq!(outcome.script_path, script);

    assert!(ran(&cluster, "ssh iris-cluster ls /s/img.sif"));
    assert!(ran_all(
        &cluster,
        &["ssh iris-cluster salloc --no-shell -c 4", "-J job -p gpu -G 1 -C gpu"]
    ));
    assert!(ran(&cluster, &format!("iris-cluster:{script}")));

    let written = SshConfig::read(&path).unwrap();
    let host = written.host("job-vscode").expect("host entry was not written");
    assert_eq!(host.get("HostName"), Some("node042"));
    assert_eq!(host.get("ProxyJump"), Some("iris-cluster"));
    assert_eq!(host.get("User"), Some("alice"));
    assert_eq!(host.get("IdentityFile"), Some("~/.ssh/id_iris"));
    assert_eq!(host.get("RemoteCommand"), Some(format!("bash {script}").as_str()));

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with(SSH_CONFIG));
}

#[test]
fn attach_updates_existing_host() {
    let contents = format!("{SSH_CONFIG}\nHost job-vscode\n    HostName node001\n    User alice\n");
    let cluster = Cluster::new(FakeExec::with_node("node077"), &Config::default(), false);
    let (_dir, path) = ssh_config_file(&contents);

    attach(&cluster, &path, &alloc(0), &container()).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert_eq!(raw.matches("Host job-vscode").count(), 1);
    assert!(raw.contains("HostName node077"));
    assert!(!raw.contains("node001"));
}

#[test]
fn attach_requires_identity_file() {
    let cluster = Cluster::new(FakeExec::with_node("node042"), &Config::default(), false);
    let (_dir, path) = ssh_config_file("Host iris-cluster\n    User alice\n");

    let err = attach(&cluster, &path, &alloc(0), &container()).unwrap_err();
    assert!(err.to_string().contains("IdentityFile"));
    assert!(!ran(&cluster, "salloc"));
}

#[test]
fn attach_stops_when_image_is_missing() {
    let exec = FakeExec::with_node("node042").failing("ls /s/img.sif");
    let cluster = Cluster::new(exec, &Config::default(), false);
    let (_dir, path) = ssh_config_file(SSH_CONFIG);

    let err = attach(&cluster, &path, &alloc(0), &container()).unwrap_err();
    assert!(format!("{err:#}").contains("/s/img.sif not found"));
    assert!(!ran(&cluster, "salloc"));
}

// ── docker-convert ──────────────────────────────────────────────────

fn conversion(tar_dir: &Path) -> ConversionConfig {
    ConversionConfig {
        tar_dir: tar_dir.display().to_string(),
        ..ConversionConfig::default()
    }
}

#[test]
fn registry_conversion_builds_on_allocated_node() {
    let dir = tempfile::tempdir().unwrap();
    let cluster = Cluster::new(FakeExec::with_node("node042"), &Config::default(), false);
    let req = ConvertRequest {
        tag: "ubuntu:22.04".into(),
        source: Source::Registry,
        sif_path: PathBuf::from("/s/ubuntu.sif"),
    };

    convert(&cluster, &conversion(dir.path()), &req).unwrap();

    assert!(ran(
        &cluster,
        "salloc --no-shell -J docker-conversion-ubuntu-22.04 -p interactive"
    ));
    assert!(ran(
        &cluster,
        "ssh -J iris-cluster -o StrictHostKeyChecking=no node042 bash -l -c \
         'module load tools/Singularity && singularity build /s/ubuntu.sif docker://ubuntu:22.04'"
    ));
    assert!(ran_all(&cluster, &["scancel", "docker-conversion-ubuntu-22.04"]));
    assert!(!ran(&cluster, "docker save"));
}

#[test]
fn failed_build_still_releases_allocation() {
    let dir = tempfile::tempdir().unwrap();
    let exec = FakeExec::with_node("node042").failing("singularity build");
    let cluster = Cluster::new(exec, &Config::default(), false);
    let req = ConvertRequest {
        tag: "me/img:1".into(),
        source: Source::Local,
        sif_path: PathBuf::from("/s/img.sif"),
    };

    assert!(convert(&cluster, &conversion(dir.path()), &req).is_err());

    let calls = lines(&cluster);
    let build = calls.iter().position(|l| l.contains("singularity build")).unwrap();
    let release = calls
        .iter()
        .position(|l| l.contains("scancel") && l.contains("docker-conversion-me-img-1"))
        .expect("allocation was not released");
    assert!(release > build);
    assert!(
        !calls
            .iter()
            .any(|l| l.starts_with("rm ") || l.contains("iris-cluster rm "))
    );
}

#[test]
fn local_conversion_exports_uploads_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let cluster = Cluster::new(FakeExec::with_node("node042"), &Config::default(), false);
    let req = ConvertRequest {
        tag: "me/img:1".into(),
        source: Source::Local,
        sif_path: PathBuf::from("/s/img.sif"),
    };

    convert(&cluster, &conversion(dir.path()), &req).unwrap();

    let tar = dir.path().join("me-img-1.tar").display().to_string();
    assert!(ran(&cluster, &format!("docker save -o {tar} me/img:1")));
    assert!(ran(&cluster, &format!("scp {tar} iris-cluster:/s/me-img-1.tar")));
    assert!(ran(&cluster, "docker-archive:///s/me-img-1.tar"));
    assert!(ran(&cluster, &format!("rm {tar}")));
    assert!(ran(&cluster, "ssh iris-cluster rm /s/me-img-1.tar"));
}

#[test]
fn existing_tarball_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("me-img-1.tar"), b"tar").unwrap();
    let cluster = Cluster::new(FakeExec::with_node("node042"), &Config::default(), false);
    let req = ConvertRequest {
        tag: "me/img:1".into(),
        source: Source::Local,
        sif_path: PathBuf::from("/s/img.sif"),
    };

    convert(&cluster, &conversion(dir.path()), &req).unwrap();
    assert!(!ran(&cluster, "docker save"));
    assert!(ran(&cluster, "scp"));
}

// ── run ─────────────────────────────────────────────────────────────

fn job(batch: bool) -> JobCommand {
    JobCommand {
        command: "python".into(),
        args: vec!["train.py".into(), "--epochs".into(), "3".into()],
        batch,
    }
}

#[test]
fn run_blocks_in_srun_with_launcher() {
    let cluster = Cluster::new(FakeExec::default(), &Config::default(), true);

    run_job(&cluster, "%x-%j.out", &alloc(0), &container(), &job(false)).unwrap();

    let calls = cluster.exec().calls.borrow();
    let last = calls.last().unwrap();
    let launcher = "/scratch/users/alice/iris_singularity_tools/singularity_exec.sh";
    assert_eq!(last[0], "srun");
    assert_eq!(
        last[last.len() - 4..],
        [
            launcher,
            "--env A=1 --bind /scratch/users/alice:/scratch/users/alice",
            "/s/img.sif",
            "python train.py --epochs 3",
        ]
    );
}

#[test]
fn run_batch_queues_with_sbatch() {
    let cluster = Cluster::new(FakeExec::default(), &Config::default(), false);

    run_job(&cluster, "out-%j.log", &alloc(2), &container(), &job(true)).unwrap();

    let calls = lines(&cluster);
    let last = calls.last().unwrap();
    assert!(last.starts_with("ssh iris-cluster sbatch -N 1 "));
    assert!(last.contains("out-%j.log"));
    assert!(last.contains("-G 2"));
    assert!(last.contains("'--nv --env A=1 --bind"));
}
