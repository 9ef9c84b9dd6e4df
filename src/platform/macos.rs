//! macOS installer: Homebrew plus concurrent dependency installs.

use super::{flash_with, Platform, PlatformInstaller};
use crate::bootstrap::{ManagerBootstrap, Privilege};
use crate::dependency::MissingDependency;
use crate::flash::{FlashRequest, FlashResult};
use crate::install::prereq::{check_prerequisites, DependencyProbe};
use crate::install::{install_all, Concurrency, InstallRecipe, InstallStep};
use crate::locate::{ExecutableLocator, LocateStrategy};
use crate::{CommandSpec, Dependency, HostContext, ProcessEnv, ProvisionError, StdioMode};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

const HOMEBREW_INSTALL: &str =
    r#"/bin/bash -c "$(curl -fsSL https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh)""#;

/// Homebrew prefixes: Apple Silicon first, then Intel.
const BREW_BIN_DIRS: [&str; 2] = ["/opt/homebrew/bin", "/usr/local/bin"];

/// Installs through Homebrew, running independent installs concurrently.
#[derive(Debug)]
pub struct MacOsInstaller {
    ctx: HostContext,
    brew: ManagerBootstrap,
    brew_dirs: Vec<PathBuf>,
}

impl MacOsInstaller {
    /// Create an installer bound to `ctx`.
    ///
    /// A `HOMEBREW_PREFIX` in the environment replaces the standard prefixes.
    pub fn new(ctx: HostContext) -> Self {
        let brew_dirs = brew_bin_dirs(&ctx.env);
        Self {
            brew: homebrew(&brew_dirs),
            brew_dirs,
            ctx,
        }
    }

    fn user_bin(&self, name: &str) -> Vec<PathBuf> {
        self.ctx
            .env
            .home_dir()
            .map(|home| {
                vec![
                    home.join(".local").join("bin").join(name),
                    home.join(".cargo").join("bin").join(name),
                ]
            })
            .unwrap_or_default()
    }

    fn locator(&self, dependency: Dependency) -> ExecutableLocator {
        let name = dependency.executable_name();
        self.brew_dirs
            .iter()
            .fold(ExecutableLocator::new(name), |locator, dir| {
                locator.then(LocateStrategy::Directory(dir.clone()))
            })
            .then(LocateStrategy::Candidates(self.user_bin(name)))
    }

    fn recipe(&self, dependency: Dependency) -> InstallRecipe {
        let probe = self.locator(dependency);
        match dependency {
            Dependency::Nrfutil => {
                let step = CommandSpec::new("uv")
                    .args(["tool", "install", "nrfutil"])
                    .stdio(StdioMode::Inherit);
                let tool_bin = self
                    .ctx
                    .env
                    .home_dir()
                    .map(|home| vec![home.join(".local").join("bin")])
                    .unwrap_or_default();
                InstallRecipe::new(dependency, probe, InstallStep::Command(step))
                    .with_path_dirs(tool_bin)
            }
            // segger-jlink is a cask with a license prompt and a sudo step.
            Dependency::SeggerJlink => {
                let step = CommandSpec::new("brew")
                    .args(["install", "segger-jlink"])
                    .stdio(StdioMode::Inherit);
                InstallRecipe::new(dependency, probe, InstallStep::Command(step))
            }
            _ => {
                let step = CommandSpec::new("brew")
                    .arg("install")
                    .arg(dependency.to_string());
                InstallRecipe::new(dependency, probe, InstallStep::Command(step))
            }
        }
    }
}

fn brew_bin_dirs(env: &ProcessEnv) -> Vec<PathBuf> {
    match env.var("HOMEBREW_PREFIX") {
        Some(prefix) if !prefix.is_empty() => vec![Path::new(prefix).join("bin")],
        _ => BREW_BIN_DIRS.iter().map(PathBuf::from).collect(),
    }
}

fn homebrew(bin_dirs: &[PathBuf]) -> ManagerBootstrap {
    let shim_dirs = bin_dirs.to_vec();
    let locator = shim_dirs
        .iter()
        .fold(ExecutableLocator::new("brew"), |locator, dir| {
            locator.then(LocateStrategy::Directory(dir.clone()))
        });
    ManagerBootstrap {
        name: "Homebrew",
        locator,
        install: CommandSpec::new("/bin/bash")
            .args(["-c", HOMEBREW_INSTALL])
            .env("NONINTERACTIVE", "1")
            .stdio(StdioMode::Inherit),
        shim_dirs,
        privilege: Privilege::SudoSession,
        manual_url: "https://brew.sh",
    }
}

#[async_trait]
impl PlatformInstaller for MacOsInstaller {
    fn name(&self) -> &'static str {
        "macOS"
    }

    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    async fn check_prerequisites(
        &self,
        deps: &[Dependency],
    ) -> Result<Vec<MissingDependency>, ProvisionError> {
        let probes = deps
            .iter()
            .map(|&dep| DependencyProbe::new(dep, self.locator(dep)))
            .collect();
        check_prerequisites(&self.ctx, Some(&self.brew), probes)
            .await
            .into_result()
    }

    async fn install_package_manager(&self) -> Result<(), ProvisionError> {
        self.brew.ensure(&self.ctx).await.map(|_| ())
    }

    async fn install_dependencies(&self, deps: &[Dependency]) -> Result<(), ProvisionError> {
        self.brew.ensure(&self.ctx).await?;

        let recipes: Vec<InstallRecipe> = deps.iter().map(|&dep| self.recipe(dep)).collect();

        // One prompt before the tasks start, so no two of them race for the terminal.
        let mut absent = false;
        for recipe in &recipes {
            if recipe.probe.find(self.ctx.exec.as_ref(), &self.ctx.env).await.is_none() {
                absent = true;
                break;
            }
        }
        if absent {
            Privilege::SudoSession.acquire(&self.ctx).await?;
        } else {
            debug!("All requested dependencies already present");
        }

        install_all(&self.ctx, recipes, Concurrency::Parallel).await
    }

    async fn flash_board(&self, request: &FlashRequest) -> Result<FlashResult, ProvisionError> {
        let uv = self.locator(Dependency::Uv);
        flash_with(&self.ctx, &uv, request, false, Platform::MacOs.shell()).await
    }

    async fn generate_hex_file(
        &self,
        request: &FlashRequest,
    ) -> Result<FlashResult, ProvisionError> {
        let uv = self.locator(Dependency::Uv);
        flash_with(&self.ctx, &uv, request, true, Platform::MacOs.shell()).await
    }
}
