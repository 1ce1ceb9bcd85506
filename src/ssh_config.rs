// Line-preserving reader/editor for OpenSSH client configuration files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use similar::TextDiff;

const DEFAULT_INDENT: &str = "    ";

/// Keys whose value is the rest of the line and must not be quoted.
const COMMAND_KEYS: [&str; 3] = ["remotecommand", "proxycommand", "localcommand"];

/// An SSH client config held as its original lines.
///
/// Edits touch only the lines they need; comments, blank lines and other
/// hosts are written back unchanged.
#[derive(Debug, Clone)]
pub struct SshConfig {
    path: PathBuf,
    lines: Vec<String>,
    trailing_newline: bool,
}

/// Options of one `Host` block, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    options: Vec<(String, String)>,
}

impl HostEntry {
    /// First value for `key`, compared case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Span of a `Host` or `Match` block: the header line and everything up to
/// the next header.
struct Block {
    patterns: Vec<String>,
    header: usize,
    end: usize,
}

/// `~/.ssh/config`
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine the home directory")?;
    Ok(home.join(".ssh").join("config"))
}

/// The configured path with a leading `~/` expanded, or [`default_path`].
pub fn resolve_path(configured: Option<&str>) -> Result<PathBuf> {
    let Some(path) = configured else {
        return default_path();
    };
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = dirs::home_dir().context("could not determine the home directory")?;
            Ok(home.join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

impl SshConfig {
    pub fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read SSH config {}", path.display()))?;
        Ok(Self::parse(path.to_path_buf(), &contents))
    }

    pub fn parse(path: PathBuf, contents: &str) -> Self {
        Self {
            path,
            lines: contents.lines().map(String::from).collect(),
            trailing_newline: contents.ends_with('\n'),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every pattern named by a `Host` line.
    pub fn hosts(&self) -> Vec<String> {
        self.blocks().into_iter().flat_map(|b| b.patterns).collect()
    }

    /// The block whose `Host` line names `name` exactly.
    pub fn host(&self, name: &str) -> Option<HostEntry> {
        let block = self.find_block(name)?;
        let options = self.lines[block.header + 1..block.end]
            .iter()
            .filter_map(|l| parse_line(l))
            .collect();
        Some(HostEntry { options })
    }

    /// Update options of an existing host. The first line of each key is
    /// rewritten in place; missing keys are appended to the block.
    pub fn set(&mut self, name: &str, values: &[(&str, String)]) -> Result<()> {
        if self.find_block(name).is_none() {
            bail!("host {name} is not in {}", self.path.display());
        }
        for (key, value) in values {
            // Re-resolve after every edit: inserting shifts the block end.
            let Some(block) = self.find_block(name) else {
                bail!("host {name} disappeared while editing");
            };
            let body = block.header + 1..block.end;

            let existing = body.clone().find(|&i| {
                parse_line(&self.lines[i]).is_some_and(|(k, _)| k.eq_ignore_ascii_case(key))
            });
            if let Some(i) = existing {
                let indent = leading_whitespace(&self.lines[i]).to_string();
                self.lines[i] = format!("{indent}{}", format_option(key, value));
                continue;
            }

            let indent = body
                .clone()
                .find(|&i| parse_line(&self.lines[i]).is_some())
                .map(|i| leading_whitespace(&self.lines[i]).to_string())
                .unwrap_or_else(|| DEFAULT_INDENT.to_string());
            let insert_at = body
                .rev()
                .find(|&i| !self.lines[i].trim().is_empty())
                .map_or(block.header + 1, |i| i + 1);
            self.lines
                .insert(insert_at, format!("{indent}{}", format_option(key, value)));
        }
        Ok(())
    }

    /// Append a new `Host` block at the end of the file.
    pub fn add(&mut self, name: &str, values: &[(&str, String)]) {
        if self.lines.last().is_some_and(|l| !l.trim().is_empty()) {
            self.lines.push(String::new());
        }
        self.lines.push(format!("Host {name}"));
        self.lines.extend(
            values
                .iter()
                .map(|(k, v)| format!("{DEFAULT_INDENT}{}", format_option(k, v))),
        );
        self.trailing_newline = true;
    }

    /// [`set`](Self::set) when the host exists, [`add`](Self::add) otherwise.
    pub fn upsert(&mut self, name: &str, values: &[(&str, String)]) -> Result<()> {
        if self.find_block(name).is_some() {
            self.set(name, values)
        } else {
            self.add(name, values);
            Ok(())
        }
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Write the config back to the file it was read from.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, self.render())
            .with_context(|| format!("failed to write SSH config {}", self.path.display()))
    }

    fn blocks(&self) -> Vec<Block> {
        let mut blocks: Vec<Block> = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            let Some((key, value)) = parse_line(line) else {
                continue;
            };
            let is_host = key.eq_ignore_ascii_case("host");
            if !is_host && !key.eq_ignore_ascii_case("match") {
                continue;
            }
            if let Some(prev) = blocks.last_mut() {
                prev.end = i;
            }
            let patterns = if is_host {
                value.split_whitespace().map(String::from).collect()
            } else {
                Vec::new()
            };
            blocks.push(Block {
                patterns,
                header: i,
                end: self.lines.len(),
            });
        }
        blocks
    }

    fn find_block(&self, name: &str) -> Option<Block> {
        self.blocks()
            .into_iter()
            .find(|b| b.patterns.iter().any(|p| p == name))
    }
}

/// Unified diff between two renderings, for logging.
pub fn diff(before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .header("before", "after")
        .to_string()
}

/// Split a config line into `(key, value)`. Accepts `Key Value` and
/// `Key=Value`; comments and blank lines yield `None`.
fn parse_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, rest) = match trimmed.find(|c: char| c.is_whitespace() || c == '=') {
        Some(i) => trimmed.split_at(i),
        None => (trimmed, ""),
    };
    let rest = rest.trim_start();
    let value = rest.strip_prefix('=').unwrap_or(rest).trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((key.to_string(), value.to_string()))
}

fn format_option(key: &str, value: &str) -> String {
    let is_command = COMMAND_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key));
    if !is_command && value.contains(char::is_whitespace) {
        format!("{key} \"{value}\"")
    } else {
        format!("{key} {value}")
    }
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}
