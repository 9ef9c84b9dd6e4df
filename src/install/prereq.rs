//! Prerequisite checking.
//!
//! [`check_prerequisites`] reports which requested dependencies are absent
//! from the host. It only looks; it never installs anything or changes the
//! search path.

use crate::bootstrap::ManagerBootstrap;
use crate::dependency::MissingDependency;
use crate::locate::ExecutableLocator;
use crate::{Dependency, HostContext, ProvisionError};
use futures::future::join_all;
use tracing::debug;

/// A dependency whose license forbids automated download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRestriction {
    /// Vendor download page.
    pub download_url: &'static str,
    /// Manual install commands, one per package format.
    pub install_commands: Vec<String>,
}

impl LicenseRestriction {
    /// The error reported when the restricted dependency is absent.
    pub fn error(&self, dependency: Dependency) -> ProvisionError {
        let commands = self
            .install_commands
            .iter()
            .map(|cmd| format!("  {cmd}"))
            .collect::<Vec<_>>()
            .join("\n");
        ProvisionError::LicenseRestrictedDependency {
            dependency,
            download_url: self.download_url.to_string(),
            install_commands: self.install_commands.clone(),
            fix: format!(
                "Due to license restrictions {dependency} must be downloaded manually.\n\
                 1. Download the package for your distribution from {}\n\
                 2. Install it with one of:\n{commands}\n\
                 3. Run this installer again",
                self.download_url
            ),
        }
    }
}

/// How one dependency is detected.
#[derive(Debug, Clone)]
pub struct DependencyProbe {
    /// The dependency.
    pub dependency: Dependency,
    /// Presence check.
    pub locator: ExecutableLocator,
    /// Set when the dependency cannot be installed automatically.
    pub restriction: Option<LicenseRestriction>,
}

impl DependencyProbe {
    /// A probe with no license restriction.
    pub fn new(dependency: Dependency, locator: ExecutableLocator) -> Self {
        Self {
            dependency,
            locator,
            restriction: None,
        }
    }

    /// Mark the dependency as license-restricted.
    pub fn restricted(mut self, restriction: LicenseRestriction) -> Self {
        self.restriction = Some(restriction);
        self
    }
}

/// Outcome of a prerequisite check.
#[derive(Debug)]
pub enum PrerequisiteState {
    /// No check has run yet.
    Unchecked,
    /// Everything requested is present.
    Complete,
    /// Some dependencies are absent but can be installed.
    Missing(Vec<MissingDependency>),
    /// A license-restricted dependency is absent; nothing can proceed.
    Blocked(ProvisionError),
}

impl PrerequisiteState {
    /// Whether installation may start from this state.
    pub fn can_proceed(&self) -> bool {
        matches!(self, Self::Complete | Self::Missing(_))
    }

    /// Convert to the result shape returned by the platform installers.
    pub fn into_result(self) -> Result<Vec<MissingDependency>, ProvisionError> {
        match self {
            Self::Unchecked | Self::Complete => Ok(Vec::new()),
            Self::Missing(missing) => Ok(missing),
            Self::Blocked(err) => Err(err),
        }
    }
}

/// Check which of `probes` are absent, plus the package manager if given.
///
/// All presence checks run concurrently. The output does not depend on
/// the order of `probes`: dependencies are reported in install order, each
/// at most once, after the package manager. A missing license-restricted
/// dependency moves the check to [`PrerequisiteState::Blocked`].
pub async fn check_prerequisites(
    ctx: &HostContext,
    manager: Option<&ManagerBootstrap>,
    mut probes: Vec<DependencyProbe>,
) -> PrerequisiteState {
    probes.sort_by_key(|probe| probe.dependency);
    probes.dedup_by_key(|probe| probe.dependency);

    let exec = ctx.exec.as_ref();
    let env = ctx.env.as_ref();
    let manager_found = async {
        match manager {
            Some(manager) => manager.locator.find(exec, env).await.is_some(),
            None => true,
        }
    };
    let found = join_all(probes.iter().map(|probe| probe.locator.find(exec, env)));
    let (manager_found, found) = futures::join!(manager_found, found);

    let mut missing = Vec::new();
    if let (Some(manager), false) = (manager, manager_found) {
        missing.push(MissingDependency::not_installed(manager.name));
    }
    for (probe, found) in probes.iter().zip(found) {
        if found.is_some() {
            continue;
        }
        if let Some(restriction) = &probe.restriction {
            debug!(dependency = %probe.dependency, "License-restricted dependency missing");
            return PrerequisiteState::Blocked(restriction.error(probe.dependency));
        }
        missing.push(MissingDependency::not_installed(probe.dependency.to_string()));
    }

    if missing.is_empty() {
        PrerequisiteState::Complete
    } else {
        PrerequisiteState::Missing(missing)
    }
}
