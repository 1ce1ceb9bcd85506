use serde::{Deserialize, Serialize};

/// Settings for the short-lived allocation used by `docker-convert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    pub partition: String,
    pub qos: String,
    pub mem: String,
    pub cpus: u32,
    pub time: String,
    /// Environment module providing `singularity` on compute nodes.
    pub singularity_module: String,
    /// Local directory where exported image tarballs are kept.
    pub tar_dir: String,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            partition: "interactive".to_string(),
            qos: "debug".to_string(),
            mem: "12G".to_string(),
            cpus: 4,
            time: "01:00:00".to_string(),
            singularity_module: "tools/Singularity".to_string(),
            tar_dir: "/tmp".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SSH alias of the cluster login node.
    pub cluster_host: String,
    /// Substring of the local hostname that identifies a login node.
    pub login_marker: String,
    pub scratch_root: String,
    /// Directory under the user's scratch where helper scripts are staged.
    pub tools_dir: String,
    /// SSH client config to read and rewrite. `~/.ssh/config` when unset.
    pub ssh_config: Option<String>,
    pub batch_output: String,
    pub conversion: ConversionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_host: "iris-cluster".to_string(),
            login_marker: "iris-".to_string(),
            scratch_root: "/scratch/users".to_string(),
            tools_dir: "iris_singularity_tools".to_string(),
            ssh_config: None,
            batch_output: "%x-%j.out".to_string(),
            conversion: ConversionConfig::default(),
        }
    }
}
