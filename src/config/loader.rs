use std::path::Path;

use anyhow::{Context, Result, bail};

use super::types::Config;

/// File name looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = ".iris-tools.yaml";

/// Load the configuration.
///
/// An explicit path must exist. Otherwise `.iris-tools.yaml` in `dir` is used
/// if present, falling back to the built-in defaults.
pub fn load(dir: &Path, explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => {
            if !p.is_file() {
                bail!("config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let p = dir.join(CONFIG_FILE_NAME);
            if !p.exists() {
                return Ok(Config::default());
            }
            p
        }
    };
    read(&path)
}

fn read(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&contents)
        .with_context(|| format!("invalid config in {}", path.display()))?;
    Ok(config)
}
