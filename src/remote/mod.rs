// Command execution on the cluster: SSH forwarding, file staging, SLURM queue.

pub mod exec;
pub mod queue;
pub mod shell;
pub mod types;

pub use exec::{Exec, SystemExec};
pub use queue::pick_node;
pub use shell::{Cluster, is_login_node};
pub use types::RunOptions;
