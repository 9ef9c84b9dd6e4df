//! Version queries against installed tools.

use crate::{CommandSpec, ProcessExecutor};
use regex::Regex;
use semver::Version;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::timeout;

/// Why a tool failed its functional check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum VersionCheckError {
    /// The tool did not answer in time.
    Timeout,
    /// The tool could not be started.
    Spawn(String),
    /// The tool ran but exited unsuccessfully.
    Failed(Option<i32>),
}

impl std::fmt::Display for VersionCheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("version check timed out"),
            Self::Spawn(err) => write!(f, "could not be started: {err}"),
            Self::Failed(code) => write!(f, "version check exited with code {code:?}"),
        }
    }
}

/// Parse a semantic version from CLI output.
///
/// Handles output such as `Homebrew 4.2.0`, `uv 0.4.1 (Homebrew 2024-08-26)`
/// or a bare `2.2.2`.
pub(crate) fn parse_version(output: &str) -> Option<Version> {
    static VERSION_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = VERSION_RE
        .get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").ok())
        .as_ref()?;
    let caps = re.captures(output)?;
    Version::parse(caps.get(0)?.as_str()).ok()
}

/// Run `<program> --version` and require a successful exit.
///
/// Returns the parsed version when the output contains one; a tool that
/// answers successfully without a recognisable version still passes.
pub(crate) async fn check_functional(
    exec: &dyn ProcessExecutor,
    program: &Path,
    limit: Duration,
) -> Result<Option<Version>, VersionCheckError> {
    let cmd = CommandSpec::new(program).arg("--version");
    let output = timeout(limit, exec.run(&cmd))
        .await
        .map_err(|_| VersionCheckError::Timeout)?
        .map_err(|e| VersionCheckError::Spawn(e.to_string()))?;

    if !output.success() {
        return Err(VersionCheckError::Failed(output.code));
    }
    Ok(parse_version(output.text()))
}
