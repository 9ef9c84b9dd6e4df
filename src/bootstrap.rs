//! Package manager bootstrap and privilege elevation.

use crate::locate::ExecutableLocator;
use crate::progress::ProvisionEvent;
use crate::version::check_functional;
use crate::{CommandSpec, HostContext, ProvisionError, StdioMode};
use semver::Version;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// How elevated privilege is obtained on a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// `sudo`, with the credential cached for the session after one prompt.
    SudoSession,
    /// The process itself must already run as Administrator.
    Administrator,
}

impl Privilege {
    /// Make sure privilege is held, prompting at most once.
    ///
    /// For [`Privilege::SudoSession`] a non-interactive `sudo -n true` is
    /// tried first so that an already cached credential never causes a
    /// prompt. Later `sudo` calls in the same session reuse the credential.
    pub async fn acquire(&self, ctx: &HostContext) -> Result<(), ProvisionError> {
        match self {
            Self::SudoSession => {
                let probe = CommandSpec::new("sudo")
                    .args(["-n", "true"])
                    .stdio(StdioMode::Silent);
                if matches!(ctx.exec.run(&probe).await, Ok(output) if output.success()) {
                    debug!("sudo credential already cached");
                    return Ok(());
                }

                ctx.report(ProvisionEvent::PrivilegePrompt);
                let prompt = CommandSpec::new("sudo").arg("-v").stdio(StdioMode::Inherit);
                match ctx.exec.run(&prompt).await {
                    Ok(output) if output.success() => Ok(()),
                    Ok(output) => Err(sudo_failed(format!("sudo -v exited with code {:?}", output.code))),
                    Err(e) => Err(sudo_failed(e.to_string())),
                }
            }
            Self::Administrator => {
                let probe = CommandSpec::new("net")
                    .arg("session")
                    .stdio(StdioMode::Silent);
                match ctx.exec.run(&probe).await {
                    Ok(output) if output.success() => Ok(()),
                    _ => Err(ProvisionError::PrivilegeRequired {
                        message: "this installer is not running as Administrator".to_string(),
                        fix: "Right-click the executable and select 'Run as administrator'"
                            .to_string(),
                    }),
                }
            }
        }
    }
}

fn sudo_failed(message: String) -> ProvisionError {
    ProvisionError::PrivilegeRequired {
        message: format!("failed to obtain sudo access: {message}"),
        fix: "Run the installer again and enter your password when prompted, \
              or ask an administrator to grant you sudo rights"
            .to_string(),
    }
}

/// A package manager that was found and answered a version query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerStatus {
    /// Path of the manager executable.
    pub path: PathBuf,
    /// Version it reported, if one could be parsed.
    pub version: Option<Version>,
}

/// Everything needed to make a platform package manager usable.
#[derive(Debug, Clone)]
pub struct ManagerBootstrap {
    /// Display name (e.g. "Homebrew").
    pub name: &'static str,
    /// How to find the manager's executable.
    pub locator: ExecutableLocator,
    /// Official install command.
    pub install: CommandSpec,
    /// Directories the installer may create; the first existing one is
    /// prepended to the search path after installation.
    pub shim_dirs: Vec<PathBuf>,
    /// Privilege the install command needs.
    pub privilege: Privilege,
    /// Where to get manual install instructions.
    pub manual_url: &'static str,
}

impl ManagerBootstrap {
    /// The manager, if it is present and answers `--version` successfully.
    ///
    /// Presence alone is not enough: a half-removed install leaves a
    /// binary that fails to run.
    pub async fn ready(&self, ctx: &HostContext) -> Option<ManagerStatus> {
        let located = self.locator.find(ctx.exec.as_ref(), &ctx.env).await?;
        match check_functional(ctx.exec.as_ref(), &located.path, ctx.options.version_timeout).await {
            Ok(version) => {
                if located.strategy > 0 {
                    if let Some(dir) = located.path.parent() {
                        ctx.env.prepend_if_absent(dir);
                    }
                }
                Some(ManagerStatus {
                    path: located.path,
                    version,
                })
            }
            Err(e) => {
                warn!(manager = self.name, error = %e, "Package manager present but not functional");
                None
            }
        }
    }

    /// Install the manager unless it is already present and functional.
    ///
    /// Idempotent: when the manager is ready this runs only the presence and
    /// version queries and performs no install side effects.
    pub async fn ensure(&self, ctx: &HostContext) -> Result<ManagerStatus, ProvisionError> {
        if let Some(status) = self.ready(ctx).await {
            ctx.report(ProvisionEvent::PackageManagerReady {
                manager: self.name.to_string(),
                version: status.version.as_ref().map(ToString::to_string),
            });
            return Ok(status);
        }

        self.privilege.acquire(ctx).await?;

        ctx.report(ProvisionEvent::InstallingPackageManager {
            manager: self.name.to_string(),
        });
        info!(manager = self.name, "Installing package manager");
        let output = ctx
            .exec
            .run(&self.install)
            .await
            .map_err(|e| self.failed(format!("failed to start installer: {e}")))?;
        if !output.success() {
            return Err(self.failed(format!(
                "installer exited with code {:?}",
                output.code
            )));
        }

        if let Some(dir) = self.shim_dirs.iter().find(|dir| dir.is_dir()) {
            ctx.env.prepend_if_absent(dir);
        }

        let status = self.ready(ctx).await.ok_or_else(|| {
            self.failed(format!(
                "installation completed but {} is not found or not functioning",
                self.locator.name()
            ))
        })?;

        ctx.report(ProvisionEvent::PackageManagerInstalled {
            manager: self.name.to_string(),
        });
        Ok(status)
    }

    fn failed(&self, message: String) -> ProvisionError {
        ProvisionError::PackageManagerBootstrapFailed {
            manager: self.name.to_string(),
            message,
            fix: format!(
                "Install {} manually from {}, then open a new terminal and run the installer again",
                self.name, self.manual_url
            ),
        }
    }
}
