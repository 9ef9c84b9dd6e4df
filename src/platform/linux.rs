//! Linux installer.
//!
//! The distribution's package manager is only detected, never used: uv
//! comes from its official install script, nrfutil from `uv tool install`,
//! and J-Link must be installed by hand because of SEGGER's license terms.

use super::{flash_with, PackageManagerKind, Platform, PlatformInstaller};
use crate::dependency::MissingDependency;
use crate::flash::{FlashRequest, FlashResult};
use crate::install::prereq::{check_prerequisites, DependencyProbe, LicenseRestriction};
use crate::install::{install_all, Concurrency, InstallRecipe, InstallStep};
use crate::locate::{ExecutableLocator, LocateStrategy};
use crate::progress::ProvisionEvent;
use crate::{CommandSpec, Dependency, HostContext, ProvisionError, StdioMode};
use async_trait::async_trait;
use std::path::PathBuf;

const UV_INSTALL_SCRIPT: &str = "curl -LsSf https://astral.sh/uv/install.sh | sh";

const JLINK_DOWNLOAD_URL: &str = "https://www.segger.com/downloads/jlink/";

/// Where the SEGGER packages put their binaries.
const JLINK_INSTALL_DIR: &str = "/opt/SEGGER/JLink";

/// Installs per-user tools and refuses to proceed without J-Link.
#[derive(Debug)]
pub struct LinuxInstaller {
    ctx: HostContext,
    kind: PackageManagerKind,
}

impl LinuxInstaller {
    /// Create an installer bound to `ctx`, detecting the package manager.
    pub fn new(ctx: HostContext) -> Self {
        let kind = PackageManagerKind::detect_linux(&ctx.env);
        Self { ctx, kind }
    }

    /// The detected package manager.
    pub fn package_manager(&self) -> PackageManagerKind {
        self.kind
    }

    fn supported(&self) -> Result<(), ProvisionError> {
        match self.kind {
            PackageManagerKind::Unknown => Err(ProvisionError::unsupported_package_manager()),
            _ => Ok(()),
        }
    }

    /// Per-user bin directories the uv installer may use, newest layout first.
    fn user_bin_dirs(&self) -> Vec<PathBuf> {
        self.ctx
            .env
            .home_dir()
            .map(|home| vec![home.join(".local").join("bin"), home.join(".cargo").join("bin")])
            .unwrap_or_default()
    }

    fn locator(&self, dependency: Dependency) -> ExecutableLocator {
        let name = dependency.executable_name();
        let candidates = match dependency {
            Dependency::SeggerJlink => vec![PathBuf::from(JLINK_INSTALL_DIR).join(name)],
            _ => self.user_bin_dirs().into_iter().map(|dir| dir.join(name)).collect(),
        };
        ExecutableLocator::new(name).then(LocateStrategy::Candidates(candidates))
    }

    fn probe(&self, dependency: Dependency) -> DependencyProbe {
        let probe = DependencyProbe::new(dependency, self.locator(dependency));
        match dependency {
            Dependency::SeggerJlink => probe.restricted(jlink_restriction()),
            _ => probe,
        }
    }

    fn recipe(&self, dependency: Dependency) -> InstallRecipe {
        let step = match dependency {
            Dependency::Nrfutil => CommandSpec::new("uv").args(["tool", "install", "nrfutil"]),
            _ => CommandSpec::new("sh").args(["-c", UV_INSTALL_SCRIPT]),
        };
        InstallRecipe::new(
            dependency,
            self.locator(dependency),
            InstallStep::Command(step.stdio(StdioMode::Inherit)),
        )
        .with_path_dirs(self.user_bin_dirs())
    }
}

fn jlink_restriction() -> LicenseRestriction {
    LicenseRestriction {
        download_url: JLINK_DOWNLOAD_URL,
        install_commands: vec![
            "sudo dpkg -i JLink_Linux_*.deb".to_string(),
            "sudo dnf install JLink_Linux_*.rpm".to_string(),
            "sudo yum install JLink_Linux_*.rpm".to_string(),
        ],
    }
}

#[async_trait]
impl PlatformInstaller for LinuxInstaller {
    fn name(&self) -> &'static str {
        "Linux"
    }

    fn platform(&self) -> Platform {
        Platform::Linux
    }

    async fn check_prerequisites(
        &self,
        deps: &[Dependency],
    ) -> Result<Vec<MissingDependency>, ProvisionError> {
        self.supported()?;
        let probes = deps.iter().map(|&dep| self.probe(dep)).collect();
        check_prerequisites(&self.ctx, None, probes).await.into_result()
    }

    async fn install_package_manager(&self) -> Result<(), ProvisionError> {
        self.supported()?;
        self.ctx.report(ProvisionEvent::PackageManagerReady {
            manager: self.kind.to_string(),
            version: None,
        });
        Ok(())
    }

    async fn install_dependencies(&self, deps: &[Dependency]) -> Result<(), ProvisionError> {
        self.supported()?;

        let (restricted, installable): (Vec<Dependency>, Vec<Dependency>) = deps
            .iter()
            .copied()
            .partition(|dep| *dep == Dependency::SeggerJlink);

        for dependency in restricted {
            let located = self
                .locator(dependency)
                .find(self.ctx.exec.as_ref(), &self.ctx.env)
                .await;
            match located {
                Some(_) => self.ctx.report(ProvisionEvent::AlreadyInstalled { dependency }),
                None => return Err(jlink_restriction().error(dependency)),
            }
        }

        let recipes = installable.into_iter().map(|dep| self.recipe(dep)).collect();
        install_all(&self.ctx, recipes, Concurrency::Sequential).await
    }

    async fn flash_board(&self, request: &FlashRequest) -> Result<FlashResult, ProvisionError> {
        let uv = self.locator(Dependency::Uv);
        flash_with(&self.ctx, &uv, request, false, Platform::Linux.shell()).await
    }

    async fn generate_hex_file(
        &self,
        request: &FlashRequest,
    ) -> Result<FlashResult, ProvisionError> {
        let uv = self.locator(Dependency::Uv);
        flash_with(&self.ctx, &uv, request, true, Platform::Linux.shell()).await
    }
}
