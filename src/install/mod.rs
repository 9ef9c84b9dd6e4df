//! Dependency installation.
//!
//! Each platform describes how to install a dependency as an
//! [`InstallRecipe`]; [`install_all`] runs the recipes either one after the
//! other or as concurrent waves.
//!
//! # Example
//!
//! ```rust,no_run
//! use hubble_install::install::{install_all, Concurrency, InstallRecipe, InstallStep};
//! use hubble_install::{progress, CommandSpec, Dependency, ExecutableLocator, HostContext, InstallOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ctx = HostContext::system(InstallOptions::default(), progress::silent()).unwrap();
//!     let uv = InstallRecipe::new(
//!         Dependency::Uv,
//!         ExecutableLocator::new("uv"),
//!         InstallStep::Command(CommandSpec::new("brew").args(["install", "uv"])),
//!     );
//!     if let Err(e) = install_all(&ctx, vec![uv], Concurrency::Parallel).await {
//!         eprintln!("{e}\n{}", e.fix_suggestion());
//!     }
//! }
//! ```

pub mod fetch;
pub mod prereq;
pub mod silent;

use crate::locate::{ExecutableLocator, Located};
use crate::progress::ProvisionEvent;
use crate::version::check_functional;
use crate::{CommandSpec, Dependency, HostContext, ProvisionError};
use silent::SilentInstall;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// The mechanism that installs one dependency.
#[derive(Debug, Clone)]
pub enum InstallStep {
    /// Run a command: a package manager install, `uv tool install`, or an
    /// official remote install script.
    Command(CommandSpec),
    /// Download a standalone binary to `dest`, then check that it runs.
    Binary {
        /// HTTPS URL of the binary.
        url: String,
        /// Where to store it.
        dest: PathBuf,
    },
    /// Download and run a vendor installer without user interaction.
    SilentInstaller(SilentInstall),
}

/// How one dependency is detected, installed and made visible.
#[derive(Debug, Clone)]
pub struct InstallRecipe {
    /// The dependency.
    pub dependency: Dependency,
    /// Presence check, run before and after installing.
    pub probe: ExecutableLocator,
    /// Install mechanism.
    pub step: InstallStep,
    /// Directories to prepend to the search path after installing, if they exist.
    pub path_dirs: Vec<PathBuf>,
    /// Command printing a directory to prepend after installing.
    pub path_query: Option<CommandSpec>,
    /// Treat the installer's reboot exit code as `RebootRequired`.
    pub reboot_aware: bool,
}

impl InstallRecipe {
    /// A recipe with no search-path updates.
    pub fn new(dependency: Dependency, probe: ExecutableLocator, step: InstallStep) -> Self {
        Self {
            dependency,
            probe,
            step,
            path_dirs: Vec::new(),
            path_query: None,
            reboot_aware: false,
        }
    }

    /// Prepend these directories after installing.
    pub fn with_path_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.path_dirs = dirs;
        self
    }

    /// Ask this command for a directory to prepend after installing.
    pub fn with_path_query(mut self, query: CommandSpec) -> Self {
        self.path_query = Some(query);
        self
    }

    /// Map the reboot exit code to `RebootRequired`.
    pub fn reboot_aware(mut self) -> Self {
        self.reboot_aware = true;
        self
    }

    fn failed(&self, message: String, exit_code: Option<i32>) -> ProvisionError {
        let fix = match &self.step {
            InstallStep::Command(cmd) => {
                format!("See the output above, then try running '{cmd}' manually")
            }
            InstallStep::Binary { url, .. } => format!("Download {url} manually"),
            InstallStep::SilentInstaller(installer) => {
                format!("Download and run the installer manually from {}", installer.manual_url)
            }
        };
        ProvisionError::DependencyInstallFailed {
            dependency: self.dependency,
            message,
            exit_code,
            fix,
        }
    }
}

/// Whether recipes may run at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// One at a time, in dependency order; stops at the first failure.
    Sequential,
    /// Independent recipes run concurrently; dependents run in a later wave.
    Parallel,
}

/// Install every recipe whose dependency is not already present.
///
/// With [`Concurrency::Parallel`] each wave is a task group: every task runs
/// to completion even if a sibling fails, failures are collected on a
/// channel sized to the wave, and the first one is returned after the join.
/// A failed wave prevents later waves from starting.
pub async fn install_all(
    ctx: &HostContext,
    mut recipes: Vec<InstallRecipe>,
    concurrency: Concurrency,
) -> Result<(), ProvisionError> {
    recipes.sort_by_key(|recipe| recipe.dependency);
    recipes.dedup_by_key(|recipe| recipe.dependency);

    match concurrency {
        Concurrency::Sequential => {
            for recipe in &recipes {
                install_one(ctx, recipe).await?;
            }
            Ok(())
        }
        Concurrency::Parallel => {
            for wave in waves(recipes) {
                run_wave(ctx, wave).await?;
            }
            Ok(())
        }
    }
}

/// Split recipes so that no recipe shares a wave with one it requires.
fn waves(mut pending: Vec<InstallRecipe>) -> Vec<Vec<InstallRecipe>> {
    let mut result = Vec::new();
    while !pending.is_empty() {
        let waiting: HashSet<Dependency> = pending.iter().map(|r| r.dependency).collect();
        let (ready, blocked): (Vec<_>, Vec<_>) = pending.into_iter().partition(|recipe| {
            recipe
                .dependency
                .requires()
                .map_or(true, |required| !waiting.contains(&required))
        });
        if ready.is_empty() {
            // Unreachable with acyclic requirements; run the rest together.
            result.push(blocked);
            break;
        }
        result.push(ready);
        pending = blocked;
    }
    result
}

async fn run_wave(ctx: &HostContext, wave: Vec<InstallRecipe>) -> Result<(), ProvisionError> {
    debug!(size = wave.len(), "Starting install wave");
    let (tx, mut rx) = mpsc::channel(wave.len().max(1));
    let mut tasks = JoinSet::new();

    for recipe in wave {
        let ctx = ctx.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            if let Err(e) = install_one(&ctx, &recipe).await {
                // Capacity equals the wave size, so this never waits.
                let _ = tx.send(e).await;
            }
        });
    }
    drop(tx);

    let mut crashed = None;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "Install task did not complete");
            crashed.get_or_insert(e.to_string());
        }
    }

    if let Some(first) = rx.recv().await {
        return Err(first);
    }
    match crashed {
        Some(message) => Err(ProvisionError::Io {
            message: format!("install task failed: {message}"),
            fix: "Run the installer again".to_string(),
        }),
        None => Ok(()),
    }
}

/// Install one dependency unless its probe already finds it.
pub(crate) async fn install_one(
    ctx: &HostContext,
    recipe: &InstallRecipe,
) -> Result<(), ProvisionError> {
    let dependency = recipe.dependency;
    if let Some(found) = recipe.probe.find(ctx.exec.as_ref(), &ctx.env).await {
        expose(ctx, &found);
        ctx.report(ProvisionEvent::AlreadyInstalled { dependency });
        return Ok(());
    }

    ctx.report(ProvisionEvent::Installing { dependency });
    info!(%dependency, "Installing dependency");

    match &recipe.step {
        InstallStep::Command(cmd) => {
            let output = ctx
                .exec
                .run(cmd)
                .await
                .map_err(|e| recipe.failed(format!("failed to run '{cmd}': {e}"), None))?;
            if recipe.reboot_aware && output.requires_reboot() {
                return Err(ProvisionError::reboot(format!(
                    "installation of {dependency} requires a system reboot"
                )));
            }
            if !output.success() {
                return Err(recipe.failed(
                    format!("'{cmd}' exited with code {:?}", output.code),
                    output.code,
                ));
            }
        }
        InstallStep::Binary { url, dest } => {
            if let Some(dir) = dest.parent() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| ProvisionError::io("failed to create install directory", e))?;
            }
            ctx.report(ProvisionEvent::Downloading { url: url.clone() });
            ctx.fetcher.fetch(url, dest).await?;
            make_executable(dest)?;
            if let Some(dir) = dest.parent() {
                ctx.env.prepend_if_absent(dir);
            }
            check_functional(ctx.exec.as_ref(), dest, ctx.options.version_timeout)
                .await
                .map_err(|e| {
                    recipe.failed(format!("download completed but binary did not run: {e}"), None)
                })?;
        }
        InstallStep::SilentInstaller(installer) => {
            installer.run(ctx, dependency).await?;
        }
    }

    update_search_path(ctx, recipe).await;

    let found = recipe.probe.locate(ctx.exec.as_ref(), &ctx.env).await?;
    expose(ctx, &found);
    ctx.report(ProvisionEvent::Installed { dependency });
    Ok(())
}

async fn update_search_path(ctx: &HostContext, recipe: &InstallRecipe) {
    for dir in recipe.path_dirs.iter().filter(|dir| dir.is_dir()) {
        ctx.env.prepend_if_absent(dir);
    }
    let Some(query) = &recipe.path_query else {
        return;
    };
    match ctx.exec.run(query).await {
        Ok(output) if output.success() => {
            let dir = output.stdout.lines().map(str::trim).find(|l| !l.is_empty());
            if let Some(dir) = dir.map(PathBuf::from).filter(|dir| dir.is_dir()) {
                ctx.env.prepend_if_absent(dir);
            }
        }
        Ok(output) => debug!(code = ?output.code, "Search path query failed"),
        Err(e) => debug!(error = %e, "Search path query could not run"),
    }
}

/// Make a tool found outside the search path visible to later steps.
fn expose(ctx: &HostContext, found: &Located) {
    if found.strategy > 0 {
        if let Some(dir) = found.path.parent() {
            ctx.env.prepend_if_absent(dir);
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &std::path::Path) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| ProvisionError::io("failed to mark download executable", e))
}

#[cfg(not(unix))]
fn make_executable(_path: &std::path::Path) -> Result<(), ProvisionError> {
    Ok(())
}
