use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};

/// Runs external programs. `argv[0]` is the program.
pub trait Exec {
    /// Run to completion and return trimmed stdout. A non-zero exit is an error.
    fn output(&self, argv: &[String]) -> Result<String>;

    /// Run with inherited stdio and report whether the program succeeded.
    fn status(&self, argv: &[String]) -> Result<bool>;
}

/// [`Exec`] backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExec;

impl Exec for SystemExec {
    fn output(&self, argv: &[String]) -> Result<String> {
        let (program, args) = split(argv)?;
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("failed to invoke `{program}`, is it installed and on PATH?"))?;

        if !output.status.success() {
            bail!("`{}` failed ({})", shell_words::join(argv), output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn status(&self, argv: &[String]) -> Result<bool> {
        let (program, args) = split(argv)?;
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("failed to invoke `{program}`, is it installed and on PATH?"))?;
        Ok(status.success())
    }
}

fn split(argv: &[String]) -> Result<(&String, &[String])> {
    argv.split_first().context("cannot run an empty command")
}
