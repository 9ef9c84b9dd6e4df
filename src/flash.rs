//! Invocation of the external flashing tool.
//!
//! The tool is distributed as the `pyhubbledemo` Python package and run
//! through `uv tool run`. Its output is streamed to the terminal; on
//! failure the captured text is scanned for network errors so the caller
//! can print connectivity guidance.

use crate::progress::ProvisionEvent;
use crate::{CommandSpec, HostContext, ProvisionError, StdioMode};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Python package that provides the flashing tool.
pub const TOOL_PACKAGE: &str = "pyhubbledemo";

/// Entry point inside [`TOOL_PACKAGE`].
pub const TOOL_ENTRYPOINT: &str = "hubbledemo";

/// Device name reported when none was given.
pub const DEFAULT_DEVICE_NAME: &str = "your-device";

/// Substrings of tool output that indicate a network failure.
const NETWORK_ERROR_MARKERS: [&str; 4] = [
    "dns error",
    "No such host",
    "client error",
    "Failed to download",
];

/// Credentials and target for one flashing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashRequest {
    /// Organization ID.
    pub org_id: String,
    /// API token. Never logged.
    pub api_token: String,
    /// Board identifier from the catalog.
    pub board_id: String,
    /// Optional name to register the device under.
    pub device_name: Option<String>,
}

impl FlashRequest {
    /// Build a request; an empty device name counts as none.
    pub fn new(
        org_id: impl Into<String>,
        api_token: impl Into<String>,
        board_id: impl Into<String>,
        device_name: Option<String>,
    ) -> Self {
        Self {
            org_id: org_id.into(),
            api_token: api_token.into(),
            board_id: board_id.into(),
            device_name: device_name.filter(|name| !name.trim().is_empty()),
        }
    }

    /// Where a generated hex file goes: `<device name or board>.hex` in `dir`.
    ///
    /// Path separators in the name become `_`, so the file never lands
    /// outside `dir`.
    ///
    /// ```rust
    /// use hubble_install::flash::FlashRequest;
    /// use std::path::Path;
    ///
    /// let req = FlashRequest::new("org", "token", "lp_em_cc2340r5", None);
    /// assert_eq!(req.hex_path(Path::new("/work")), Path::new("/work/lp_em_cc2340r5.hex"));
    /// ```
    pub fn hex_path(&self, dir: &Path) -> PathBuf {
        let stem: String = self
            .device_name
            .as_deref()
            .unwrap_or(&self.board_id)
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        dir.join(format!("{stem}.hex"))
    }

    /// The `uv tool run` command for this request.
    ///
    /// The token is passed as a secret argument so it is masked when the
    /// command is displayed.
    pub fn command(&self, uv: &Path, output: Option<&Path>) -> CommandSpec {
        let mut cmd = CommandSpec::new(uv)
            .args(["tool", "run", "--refresh", "--from", TOOL_PACKAGE, TOOL_ENTRYPOINT])
            .args(["flash", self.board_id.as_str(), "-o", self.org_id.as_str(), "-t"])
            .secret_arg(self.api_token.clone());
        if let Some(name) = &self.device_name {
            cmd = cmd.args(["-n", name.as_str()]);
        }
        if let Some(path) = output {
            cmd = cmd.arg("-f").arg(path.to_string_lossy());
        }
        cmd.env("PYTHONWARNINGS", "ignore").stdio(StdioMode::Tee)
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashResult {
    /// The board was flashed directly and registered under this name.
    DeviceName(String),
    /// A hex file was written for a separate programming tool.
    HexFilePath(PathBuf),
}

/// Shell syntax used in the proxy hints of the remediation block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlavor {
    /// `export VAR=value`
    Posix,
    /// `$env:VAR = 'value'`
    PowerShell,
}

impl ShellFlavor {
    fn set_var(&self, key: &str, value: &str) -> String {
        match self {
            Self::Posix => format!("export {key}={value}"),
            Self::PowerShell => format!("$env:{key} = '{value}'"),
        }
    }
}

/// Whether tool output looks like a network failure.
pub fn is_network_failure(output: &str) -> bool {
    NETWORK_ERROR_MARKERS
        .iter()
        .any(|marker| output.contains(marker))
}

/// Connectivity checklist appended to network-related failures.
pub fn network_remediation(shell: ShellFlavor) -> String {
    let proxy = "http://proxy.company.com:8080";
    format!(
        "Network connectivity error: the flashing tool failed to download required files.\n\
         \n\
         Possible causes:\n\
         \x20 - Network connectivity issues\n\
         \x20 - Corporate firewall or proxy blocking GitHub\n\
         \x20 - DNS resolution problems\n\
         \x20 - Antivirus or security software blocking downloads\n\
         \n\
         Troubleshooting steps:\n\
         \x20 1. Check your internet connection\n\
         \x20 2. Try accessing https://github.com in a browser\n\
         \x20 3. If behind a corporate firewall, configure proxy settings:\n\
         \x20      {}\n\
         \x20      {}\n\
         \x20 4. Temporarily disable antivirus/firewall and try again\n\
         \x20 5. Try again in a few minutes (GitHub may be temporarily unavailable)",
        shell.set_var("HTTP_PROXY", proxy),
        shell.set_var("HTTPS_PROXY", proxy),
    )
}

/// Run the flashing tool.
///
/// With `output` set, the tool writes a hex file there instead of
/// programming a connected board.
pub async fn run(
    ctx: &HostContext,
    uv: &Path,
    request: &FlashRequest,
    output: Option<&Path>,
    shell: ShellFlavor,
) -> Result<FlashResult, ProvisionError> {
    let board = request.board_id.clone();
    ctx.report(match output {
        Some(_) => ProvisionEvent::GeneratingHexFile { board },
        None => ProvisionEvent::Flashing { board },
    });

    let cmd = request.command(uv, output);
    debug!(%cmd, "Running flashing tool");
    let result = ctx.exec.run(&cmd).await.map_err(|e| ProvisionError::ExternalToolFailed {
        message: format!("failed to start the flashing tool: {e}"),
        exit_code: None,
        network_remediation: None,
        fix: "Run the installer again so uv can be reinstalled".to_string(),
    })?;

    if !result.success() {
        let captured = format!("{}\n{}", result.stdout, result.stderr);
        let network = is_network_failure(&captured);
        return Err(ProvisionError::ExternalToolFailed {
            message: match output {
                Some(_) => format!("hex file generation failed (exit code {:?})", result.code),
                None => format!("flash command failed (exit code {:?})", result.code),
            },
            exit_code: result.code,
            network_remediation: network.then(|| network_remediation(shell)),
            fix: if network {
                "Fix network access and run the installer again".to_string()
            } else {
                "See the tool output above for details".to_string()
            },
        });
    }

    info!(board = %request.board_id, "Flashing tool finished");
    Ok(match output {
        Some(path) => FlashResult::HexFilePath(path.to_path_buf()),
        None => FlashResult::DeviceName(
            request
                .device_name
                .clone()
                .unwrap_or_else(|| DEFAULT_DEVICE_NAME.to_string()),
        ),
    })
}
