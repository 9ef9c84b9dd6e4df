//! Progress reporting for provisioning operations.
//!
//! The installers never print. They report discrete [`ProvisionEvent`]s to
//! a callback supplied by the caller, which decides how to render them.

use crate::Dependency;
use std::sync::Arc;

/// A status update emitted while provisioning.
///
/// # Example
///
/// ```rust
/// use hubble_install::{Dependency, ProvisionEvent};
///
/// fn on_event(event: ProvisionEvent) {
///     match &event {
///         ProvisionEvent::Installing { dependency } => println!("Installing {dependency}..."),
///         ProvisionEvent::Installed { dependency } => println!("{dependency} installed"),
///         other => println!("{}", other.description()),
///     }
/// }
///
/// on_event(ProvisionEvent::Installing { dependency: Dependency::Uv });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProvisionEvent {
    /// Elevated privilege is about to be requested from the user.
    PrivilegePrompt,
    /// The package manager is already present and functional.
    PackageManagerReady {
        /// Display name of the manager.
        manager: String,
        /// Version reported by the manager, if one could be parsed.
        version: Option<String>,
    },
    /// The package manager is being installed.
    InstallingPackageManager {
        /// Display name of the manager.
        manager: String,
    },
    /// The package manager was installed.
    PackageManagerInstalled {
        /// Display name of the manager.
        manager: String,
    },
    /// A dependency was found and will not be reinstalled.
    AlreadyInstalled {
        /// The dependency.
        dependency: Dependency,
    },
    /// A dependency install has started.
    Installing {
        /// The dependency.
        dependency: Dependency,
    },
    /// A file download has started.
    Downloading {
        /// The URL being fetched.
        url: String,
    },
    /// A vendor installer did not accept its first flag dialect.
    RetryingSilentInstall,
    /// Waiting for a vendor installer's files to appear.
    Verifying {
        /// The dependency.
        dependency: Dependency,
    },
    /// A dependency install finished.
    Installed {
        /// The dependency.
        dependency: Dependency,
    },
    /// The external tool is flashing a board.
    Flashing {
        /// The board identifier.
        board: String,
    },
    /// The external tool is generating a hex file.
    GeneratingHexFile {
        /// The board identifier.
        board: String,
    },
}

impl ProvisionEvent {
    /// A short human-readable description of the event.
    pub fn description(&self) -> String {
        match self {
            Self::PrivilegePrompt => "Administrator access required for installation".to_string(),
            Self::PackageManagerReady { manager, version } => match version {
                Some(version) => format!("{manager} {version} already installed"),
                None => format!("{manager} already installed"),
            },
            Self::InstallingPackageManager { manager } => {
                format!("Installing {manager} (this may take a few minutes)...")
            }
            Self::PackageManagerInstalled { manager } => format!("{manager} installed successfully"),
            Self::AlreadyInstalled { dependency } => format!("{dependency} already installed"),
            Self::Installing { dependency } => format!("Installing {dependency}..."),
            Self::Downloading { url } => format!("Downloading from {url}..."),
            Self::RetryingSilentInstall => {
                "First installation method failed, trying alternative...".to_string()
            }
            Self::Verifying { dependency } => format!("Verifying {dependency} installation..."),
            Self::Installed { dependency } => format!("{dependency} installed successfully"),
            Self::Flashing { board } => format!("Flashing board: {board}"),
            Self::GeneratingHexFile { board } => format!("Generating hex file for board: {board}"),
        }
    }

    /// Whether the event marks a completed step.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::PackageManagerReady { .. }
                | Self::PackageManagerInstalled { .. }
                | Self::AlreadyInstalled { .. }
                | Self::Installed { .. }
        )
    }
}

/// Shared callback receiving [`ProvisionEvent`]s.
pub type ProgressFn = Arc<dyn Fn(ProvisionEvent) + Send + Sync>;

/// A callback that drops every event.
pub fn silent() -> ProgressFn {
    Arc::new(|_| {})
}
