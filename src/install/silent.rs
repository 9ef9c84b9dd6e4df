//! Unattended vendor installers.
//!
//! Vendor installers on Windows differ in the flags they accept for silent
//! operation. [`SilentInstall`] tries a primary flag set, then an alternate
//! one, and then waits for the installed binary to show up on disk.

use crate::progress::ProvisionEvent;
use crate::{CommandSpec, Dependency, HostContext, ProvisionError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A vendor installer to download and run without interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SilentInstall {
    /// Installer download URL.
    pub url: String,
    /// File name to save the installer as.
    pub installer_file: String,
    /// Flags tried first.
    pub primary_flags: Vec<String>,
    /// Flags tried when the primary set fails.
    pub fallback_flags: Vec<String>,
    /// Locations the installed binary may appear at, checked in order.
    pub expected_paths: Vec<PathBuf>,
    /// Page with manual download instructions.
    pub manual_url: String,
}

impl SilentInstall {
    /// Download the installer into a scratch directory, run it, and wait for
    /// one of [`expected_paths`](Self::expected_paths) to exist.
    ///
    /// The scratch directory is removed when this returns, whether or not
    /// the install succeeded. On success the binary's directory is
    /// prepended to the search path and its path is returned.
    pub async fn run(
        &self,
        ctx: &HostContext,
        dependency: Dependency,
    ) -> Result<PathBuf, ProvisionError> {
        let scratch = tempfile::Builder::new()
            .prefix("hubble-installer-")
            .tempdir()
            .map_err(|e| ProvisionError::io("failed to create temporary directory", e))?;
        let installer = scratch.path().join(&self.installer_file);

        ctx.report(ProvisionEvent::Downloading {
            url: self.url.clone(),
        });
        ctx.fetcher.fetch(&self.url, &installer).await?;

        let mut reboot_pending = false;
        let first = self.attempt(ctx, &installer, &self.primary_flags).await;
        match first {
            Ok(reboot) => reboot_pending = reboot,
            Err(first_error) => {
                warn!(%dependency, error = %first_error, "Silent install failed, trying alternate flags");
                ctx.report(ProvisionEvent::RetryingSilentInstall);
                match self.attempt(ctx, &installer, &self.fallback_flags).await {
                    Ok(reboot) => reboot_pending = reboot,
                    Err(second_error) => {
                        return Err(ProvisionError::DependencyInstallFailed {
                            dependency,
                            message: format!(
                                "installer failed with both methods: {first_error}; {second_error}"
                            ),
                            exit_code: None,
                            fix: self.manual_fix(),
                        });
                    }
                }
            }
        }

        ctx.report(ProvisionEvent::Verifying { dependency });
        let found = self.wait_for_binary(ctx).await?;
        if let Some(dir) = found.parent() {
            ctx.env.prepend_if_absent(dir);
        }
        info!(%dependency, path = %found.display(), "Vendor install verified");

        if reboot_pending {
            return Err(ProvisionError::reboot(format!(
                "installation of {dependency} requires a system reboot"
            )));
        }
        Ok(found)
    }

    /// Run the installer once. `Ok(true)` means it succeeded but asked for a reboot.
    async fn attempt(
        &self,
        ctx: &HostContext,
        installer: &Path,
        flags: &[String],
    ) -> Result<bool, String> {
        let cmd = CommandSpec::new(installer).args(flags.iter().cloned());
        debug!(%cmd, "Running vendor installer");
        let output = ctx.exec.run(&cmd).await.map_err(|e| e.to_string())?;
        if output.requires_reboot() {
            return Ok(true);
        }
        if output.success() {
            Ok(false)
        } else {
            Err(format!("exited with code {:?}", output.code))
        }
    }

    async fn wait_for_binary(&self, ctx: &HostContext) -> Result<PathBuf, ProvisionError> {
        // A zero interval still yields to the runtime between checks.
        let interval = ctx.options.poll_interval.max(MIN_POLL_INTERVAL);
        let started = Instant::now();
        let deadline = started + ctx.options.poll_timeout;
        loop {
            if let Some(path) = self.expected_paths.iter().find(|p| p.is_file()) {
                return Ok(path.clone());
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }
        Err(ProvisionError::InstallVerificationTimeout {
            expected: self.expected_paths.clone(),
            waited: started.elapsed(),
            fix: self.manual_fix(),
        })
    }

    fn manual_fix(&self) -> String {
        format!(
            "Download and run the installer manually from {}, then run this installer again",
            self.manual_url
        )
    }
}
