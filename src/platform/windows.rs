//! Windows installer: Chocolatey, direct vendor downloads, reboot detection.
//!
//! Freshly installed tools are rarely visible to the running process on
//! Windows, so every lookup here goes through a multi-stage locator, and a
//! pending reboot is surfaced as [`ProvisionError::RebootRequired`] instead
//! of letting an install fail in confusing ways.

use super::{flash_with, Platform, PlatformInstaller};
use crate::bootstrap::{ManagerBootstrap, Privilege};
use crate::dependency::MissingDependency;
use crate::flash::{FlashRequest, FlashResult};
use crate::install::prereq::{check_prerequisites, DependencyProbe};
use crate::install::silent::SilentInstall;
use crate::install::{install_all, Concurrency, InstallRecipe, InstallStep};
use crate::locate::{ExecutableLocator, LocateStrategy};
use crate::{CommandSpec, Dependency, HostContext, ProvisionError, StdioMode};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DEFAULT_CHOCOLATEY_ROOT: &str = r"C:\ProgramData\chocolatey";

const CHOCOLATEY_INSTALL: &str = "Set-ExecutionPolicy Bypass -Scope Process -Force; \
     [System.Net.ServicePointManager]::SecurityProtocol = \
     [System.Net.ServicePointManager]::SecurityProtocol -bor 3072; \
     iex ((New-Object System.Net.WebClient).DownloadString('https://community.chocolatey.org/install.ps1'))";

const NRFUTIL_URL: &str = "https://developer.nordicsemi.com/.pc-tools/nrfutil/x64-win/nrfutil.exe";

const JLINK_INSTALLER_URL: &str = "https://www.segger.com/downloads/jlink/JLink_Windows_V794l.exe";

const JLINK_DOWNLOAD_PAGE: &str = "https://www.segger.com/downloads/jlink/";

const JLINK_PATHS: [&str; 2] = [
    r"C:\Program Files\SEGGER\JLink\JLink.exe",
    r"C:\Program Files (x86)\SEGGER\JLink\JLink.exe",
];

const PENDING_REBOOT_PROBE: &str = r#"
$reasons = @()
if (Test-Path 'HKLM:\SOFTWARE\Microsoft\Windows\CurrentVersion\Component Based Servicing\RebootPending') {
    $reasons += "Component Based Servicing"
}
if (Test-Path 'HKLM:\SOFTWARE\Microsoft\Windows\CurrentVersion\WindowsUpdate\Auto Update\RebootRequired') {
    $reasons += "Windows Update"
}
$pfro = Get-ItemProperty 'HKLM:\SYSTEM\CurrentControlSet\Control\Session Manager' -Name 'PendingFileRenameOperations' -ErrorAction SilentlyContinue
if ($pfro -and $pfro.PendingFileRenameOperations) {
    $reasons += "Pending File Rename Operations"
}
$active = Get-ItemProperty 'HKLM:\SYSTEM\CurrentControlSet\Control\ComputerName\ActiveComputerName' -ErrorAction SilentlyContinue
$pending = Get-ItemProperty 'HKLM:\SYSTEM\CurrentControlSet\Control\ComputerName\ComputerName' -ErrorAction SilentlyContinue
if ($active -and $pending -and ($active.ComputerName -ne $pending.ComputerName)) {
    $reasons += "Computer Rename"
}
if ($reasons.Count -gt 0) {
    Write-Output "REBOOT_PENDING:$($reasons -join ',')"
} else {
    Write-Output "NO_REBOOT"
}
"#;

/// Installs through Chocolatey and vendor downloads, one at a time.
#[derive(Debug)]
pub struct WindowsInstaller {
    ctx: HostContext,
    choco_root: PathBuf,
    choco: ManagerBootstrap,
}

impl WindowsInstaller {
    /// Create an installer bound to `ctx`.
    ///
    /// The Chocolatey root is read from `ChocolateyInstall`, falling back
    /// to the default install location.
    pub fn new(ctx: HostContext) -> Self {
        let choco_root = ctx
            .env
            .var("ChocolateyInstall")
            .map_or_else(|| PathBuf::from(DEFAULT_CHOCOLATEY_ROOT), PathBuf::from);
        let choco = chocolatey(&choco_root);
        Self {
            ctx,
            choco_root,
            choco,
        }
    }

    fn local_app_data(&self) -> Option<PathBuf> {
        self.ctx.env.var("LOCALAPPDATA").map(PathBuf::from).or_else(|| {
            self.ctx
                .env
                .home_dir()
                .map(|home| home.join("AppData").join("Local"))
        })
    }

    fn nrfutil_dir(&self) -> Option<PathBuf> {
        self.local_app_data()
            .map(|dir| dir.join("hubble").join("nrfutil"))
    }

    /// uv: search path, Chocolatey shims, Chocolatey lib query, then
    /// per-user install locations.
    fn uv_locator(&self) -> ExecutableLocator {
        let mut common = Vec::new();
        if let Some(dir) = self.ctx.env.var("LOCALAPPDATA") {
            common.push(Path::new(dir).join("Programs").join("uv").join("uv.exe"));
        }
        if let Some(dir) = self.ctx.env.var("USERPROFILE") {
            common.push(Path::new(dir).join(".local").join("bin").join("uv.exe"));
        }
        let lib = self.choco_root.join("lib");
        let query = format!(
            "$uvLib = Get-ChildItem -Path \"{}\" -Filter \"uv*\" -Directory | Select-Object -First 1; \
             if ($uvLib) {{ $uvExe = Get-ChildItem -Path $uvLib.FullName -Filter \"uv.exe\" -Recurse | Select-Object -First 1; \
             if ($uvExe) {{ Write-Output $uvExe.FullName }} }}",
            lib.display()
        );
        ExecutableLocator::new("uv")
            .with_file_name("uv.exe")
            .then(LocateStrategy::Directory(self.choco_root.join("bin")))
            .then(LocateStrategy::ManagerQuery(powershell(&query)))
            .then(LocateStrategy::Candidates(common))
    }

    fn locator(&self, dependency: Dependency) -> ExecutableLocator {
        match dependency {
            Dependency::Uv => self.uv_locator(),
            Dependency::Nrfutil => {
                let locator = ExecutableLocator::new("nrfutil").with_file_name("nrfutil.exe");
                match self.nrfutil_dir() {
                    Some(dir) => locator.then(LocateStrategy::Directory(dir)),
                    None => locator,
                }
            }
            _ => ExecutableLocator::new("JLink")
                .with_file_name("JLink.exe")
                .then(LocateStrategy::Candidates(jlink_paths())),
        }
    }

    fn recipe(&self, dependency: Dependency) -> Result<InstallRecipe, ProvisionError> {
        let probe = self.locator(dependency);
        let recipe = match dependency {
            Dependency::Uv => {
                let install = CommandSpec::new(self.choco_root.join("bin").join("choco.exe"))
                    .args(["install", "uv", "-y"])
                    .stdio(StdioMode::Inherit);
                let tools_query = format!(
                    "$d = Get-ChildItem -Path \"{}\" -Directory | Where-Object Name -Like \"uv*\" | Select-Object -First 1; \
                     if ($d) {{ Join-Path $d.FullName \"tools\" }}",
                    self.choco_root.join("lib").display()
                );
                InstallRecipe::new(dependency, probe, InstallStep::Command(install))
                    .reboot_aware()
                    .with_path_dirs(vec![self.choco_root.join("bin")])
                    .with_path_query(powershell(&tools_query))
            }
            Dependency::Nrfutil => {
                let dir = self.nrfutil_dir().ok_or_else(|| ProvisionError::Io {
                    message: "LOCALAPPDATA is not set".to_string(),
                    fix: "Run the installer from a normal user session".to_string(),
                })?;
                let step = InstallStep::Binary {
                    url: NRFUTIL_URL.to_string(),
                    dest: dir.join("nrfutil.exe"),
                };
                InstallRecipe::new(dependency, probe, step)
            }
            _ => {
                let installer = SilentInstall {
                    url: JLINK_INSTALLER_URL.to_string(),
                    installer_file: "JLink_Installer.exe".to_string(),
                    primary_flags: vec!["/S".to_string(), "/ACCEPTLICENSE=yes".to_string()],
                    fallback_flags: vec![
                        "/q".to_string(),
                        "/norestart".to_string(),
                        "ACCEPTLICENSE=yes".to_string(),
                    ],
                    expected_paths: jlink_paths(),
                    manual_url: JLINK_DOWNLOAD_PAGE.to_string(),
                };
                InstallRecipe::new(dependency, probe, InstallStep::SilentInstaller(installer))
            }
        };
        Ok(recipe)
    }

    /// Fail with `RebootRequired` when Windows reports a pending restart.
    ///
    /// A probe that cannot run is treated as "no reboot pending".
    async fn check_pending_reboot(&self) -> Result<(), ProvisionError> {
        let probe = powershell(PENDING_REBOOT_PROBE);
        let output = match self.ctx.exec.run(&probe).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                debug!(code = ?output.code, "Pending reboot probe failed");
                return Ok(());
            }
            Err(e) => {
                warn!(error = %e, "Pending reboot probe could not run");
                return Ok(());
            }
        };
        match parse_reboot_probe(&output.stdout) {
            Some(reasons) => Err(ProvisionError::reboot(format!(
                "pending reboot detected ({reasons})"
            ))),
            None => Ok(()),
        }
    }
}

fn powershell(script: &str) -> CommandSpec {
    CommandSpec::new("powershell").args(["-NoProfile", "-NonInteractive", "-Command", script])
}

fn jlink_paths() -> Vec<PathBuf> {
    JLINK_PATHS.iter().map(PathBuf::from).collect()
}

fn chocolatey(root: &Path) -> ManagerBootstrap {
    let bin = root.join("bin");
    ManagerBootstrap {
        name: "Chocolatey",
        locator: ExecutableLocator::new("choco")
            .with_file_name("choco.exe")
            .then(LocateStrategy::Directory(bin.clone())),
        install: CommandSpec::new("powershell")
            .args([
                "-NoProfile",
                "-ExecutionPolicy",
                "Bypass",
                "-Command",
                CHOCOLATEY_INSTALL,
            ])
            .stdio(StdioMode::Inherit),
        shim_dirs: vec![bin],
        privilege: Privilege::Administrator,
        manual_url: "https://chocolatey.org/install",
    }
}

/// Reasons listed by the pending-reboot probe, if any.
fn parse_reboot_probe(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.strip_prefix("REBOOT_PENDING:"))
        .map(str::to_string)
}

#[async_trait]
impl PlatformInstaller for WindowsInstaller {
    fn name(&self) -> &'static str {
        "Windows"
    }

    fn platform(&self) -> Platform {
        Platform::Windows
    }

    async fn check_prerequisites(
        &self,
        deps: &[Dependency],
    ) -> Result<Vec<MissingDependency>, ProvisionError> {
        let probes = deps
            .iter()
            .map(|&dep| DependencyProbe::new(dep, self.locator(dep)))
            .collect();
        check_prerequisites(&self.ctx, Some(&self.choco), probes)
            .await
            .into_result()
    }

    async fn install_package_manager(&self) -> Result<(), ProvisionError> {
        self.choco.ensure(&self.ctx).await.map(|_| ())
    }

    async fn install_dependencies(&self, deps: &[Dependency]) -> Result<(), ProvisionError> {
        self.choco.ensure(&self.ctx).await?;
        Privilege::Administrator.acquire(&self.ctx).await?;
        self.check_pending_reboot().await?;

        let recipes = deps
            .iter()
            .map(|&dep| self.recipe(dep))
            .collect::<Result<Vec<_>, _>>()?;
        install_all(&self.ctx, recipes, Concurrency::Sequential).await
    }

    async fn flash_board(&self, request: &FlashRequest) -> Result<FlashResult, ProvisionError> {
        flash_with(&self.ctx, &self.uv_locator(), request, false, Platform::Windows.shell()).await
    }

    async fn generate_hex_file(
        &self,
        request: &FlashRequest,
    ) -> Result<FlashResult, ProvisionError> {
        flash_with(&self.ctx, &self.uv_locator(), request, true, Platform::Windows.shell()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reboot_probe() {
        assert_eq!(
            parse_reboot_probe("REBOOT_PENDING:Windows Update,Computer Rename\r\n"),
            Some("Windows Update,Computer Rename".to_string())
        );
        assert_eq!(parse_reboot_probe("NO_REBOOT\r\n"), None);
        assert_eq!(parse_reboot_probe(""), None);
    }

    #[test]
    fn test_chocolatey_bootstrap_uses_root() {
        let choco = chocolatey(Path::new(r"D:\choco"));
        assert_eq!(choco.privilege, Privilege::Administrator);
        assert_eq!(choco.shim_dirs, vec![Path::new(r"D:\choco").join("bin")]);
        assert!(choco
            .install
            .args
            .iter()
            .any(|a| a.contains("community.chocolatey.org/install.ps1")));
    }
}
