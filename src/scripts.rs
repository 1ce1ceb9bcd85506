// Shell scripts bundled into the binary and staged on the cluster.

use std::io::Write;

use anyhow::{Context, Result, bail};
use include_dir::{Dir, include_dir};
use tempfile::NamedTempFile;

static SCRIPTS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/scripts");

/// Entry point used by the SSH `RemoteCommand` of an attach host.
pub const ATTACH_TEMPLATE: &str = "vscode_attach.template.sh";
/// Runs a command inside a Singularity container under `srun`/`sbatch`.
pub const EXEC_LAUNCHER: &str = "singularity_exec.sh";
/// Token in [`ATTACH_TEMPLATE`] replaced by the container arguments.
pub const ARGUMENTS_PLACEHOLDER: &str = "[ARGUMENTS]";

/// Contents of a bundled script.
pub fn bundled(name: &str) -> Result<&'static str> {
    SCRIPTS
        .get_file(name)
        .and_then(|f| f.contents_utf8())
        .with_context(|| format!("bundled script {name} is missing or not UTF-8"))
}

/// Replace the single [`ARGUMENTS_PLACEHOLDER`] in `template` with `args`
/// joined by spaces. Everything else is kept as is.
pub fn render(template: &str, args: &[String]) -> Result<String> {
    if !template.contains(ARGUMENTS_PLACEHOLDER) {
        bail!("template has no {ARGUMENTS_PLACEHOLDER} placeholder");
    }
    let joined = args.join(" ");
    Ok(template.replacen(ARGUMENTS_PLACEHOLDER, joined.trim(), 1))
}

/// The attach script for the given container arguments.
pub fn render_attach_script(args: &[String]) -> Result<String> {
    render(bundled(ATTACH_TEMPLATE)?, args)
}

/// Write `contents` to a temporary file that is removed on drop.
pub fn write_temp(contents: &str) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("iris_tools_")
        .suffix(".sh")
        .tempfile()
        .context("failed to create a temporary script")?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}
