//! Error types for provisioning operations.
//!
//! Every variant carries an actionable fix suggestion so the caller can print
//! a short diagnosis followed by concrete remediation steps before exiting.

use crate::{Dependency, PackageManagerKind};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while provisioning the host.
///
/// # Example
///
/// ```rust
/// use hubble_install::ProvisionError;
///
/// fn handle_error(error: ProvisionError) {
///     eprintln!("Provisioning failed: {}", error);
///     eprintln!("To fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// The host operating system is not one of macOS, Linux or Windows.
    #[error("Unsupported platform: {os}")]
    UnsupportedPlatform {
        /// The operating system identifier reported by the host.
        os: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// No supported Linux package manager (apt, dnf, yum) was detected.
    #[error("Unsupported Linux distribution: no apt, dnf or yum found")]
    UnsupportedPackageManager {
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Elevated privilege could not be obtained.
    #[error("Administrator privileges required: {message}")]
    PrivilegeRequired {
        /// What was attempted.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The platform package manager could not be installed or is not functional.
    #[error("Failed to set up {manager}: {message}")]
    PackageManagerBootstrapFailed {
        /// Display name of the package manager (e.g. "Homebrew").
        manager: String,
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Installing a dependency failed.
    #[error("Failed to install {dependency}: {message}")]
    DependencyInstallFailed {
        /// The dependency being installed.
        dependency: Dependency,
        /// Description of the failure.
        message: String,
        /// Exit code of the installer, if it ran.
        exit_code: Option<i32>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The operation succeeded but the host must restart before the tool is usable.
    ///
    /// Callers must not retry immediately on this signal.
    #[error("System reboot required: {message}")]
    RebootRequired {
        /// What triggered the reboot requirement.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An executable could not be found after every lookup strategy was exhausted.
    #[error("Could not locate the '{name}' executable")]
    ExecutableNotFound {
        /// The executable name that was searched for.
        name: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A dependency cannot be installed automatically because of its license terms.
    #[error("{dependency} was not found and must be installed manually")]
    LicenseRestrictedDependency {
        /// The restricted dependency.
        dependency: Dependency,
        /// Where the vendor distributes the package.
        download_url: String,
        /// Manual install commands, one per Linux package format.
        install_commands: Vec<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The external flashing tool exited unsuccessfully.
    #[error("{message}{}", remediation_suffix(.network_remediation))]
    ExternalToolFailed {
        /// Description of the failure.
        message: String,
        /// Exit code of the tool, if it ran.
        exit_code: Option<i32>,
        /// Remediation block appended when the failure looks network-related.
        network_remediation: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Downloading a vendor binary failed.
    #[error("Download of {url} failed: {message}")]
    Download {
        /// The URL that was requested.
        url: String,
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A vendor installer finished but its binary never appeared.
    #[error("Installation completed but none of {expected:?} appeared after {waited:?}")]
    InstallVerificationTimeout {
        /// Paths that were polled.
        expected: Vec<PathBuf>,
        /// How long the poll waited.
        waited: Duration,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A local I/O operation failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },
}

fn remediation_suffix(block: &Option<String>) -> String {
    block
        .as_deref()
        .map(|block| format!("\n\n{block}"))
        .unwrap_or_default()
}

impl ProvisionError {
    /// Get an actionable suggestion for fixing this error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use hubble_install::ProvisionError;
    ///
    /// let error = ProvisionError::RebootRequired {
    ///     message: "installation of uv requires a system reboot".to_string(),
    ///     fix: "Reboot your computer and run the installer again".to_string(),
    /// };
    /// assert!(error.fix_suggestion().contains("Reboot"));
    /// ```
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::UnsupportedPlatform { fix, .. } => fix,
            Self::UnsupportedPackageManager { fix } => fix,
            Self::PrivilegeRequired { fix, .. } => fix,
            Self::PackageManagerBootstrapFailed { fix, .. } => fix,
            Self::DependencyInstallFailed { fix, .. } => fix,
            Self::RebootRequired { fix, .. } => fix,
            Self::ExecutableNotFound { fix, .. } => fix,
            Self::LicenseRestrictedDependency { fix, .. } => fix,
            Self::ExternalToolFailed { fix, .. } => fix,
            Self::Download { fix, .. } => fix,
            Self::InstallVerificationTimeout { fix, .. } => fix,
            Self::Io { fix, .. } => fix,
        }
    }

    /// Whether this error means "succeeded, but the host must restart".
    pub fn is_reboot_required(&self) -> bool {
        matches!(self, Self::RebootRequired { .. })
    }

    pub(crate) fn io(context: &str, err: std::io::Error) -> Self {
        let fix = if err.kind() == std::io::ErrorKind::PermissionDenied {
            "Check file permissions or re-run with elevated privileges".to_string()
        } else {
            "Check available disk space and try again".to_string()
        };
        Self::Io {
            message: format!("{context}: {err}"),
            fix,
        }
    }

    pub(crate) fn reboot(message: impl Into<String>) -> Self {
        Self::RebootRequired {
            message: message.into(),
            fix: "Reboot your computer, then run the installer again".to_string(),
        }
    }

    pub(crate) fn unsupported_package_manager() -> Self {
        Self::UnsupportedPackageManager {
            fix: format!(
                "Only Linux distributions using {} are supported",
                PackageManagerKind::supported_linux_names().join(", ")
            ),
        }
    }

    pub(crate) fn executable_not_found(name: &str) -> Self {
        Self::ExecutableNotFound {
            name: name.to_string(),
            fix: "The search path has not been refreshed in this session. \
                  Close this terminal, open a new one and run the installer again. \
                  If that doesn't work, reboot your computer and run it again."
                .to_string(),
        }
    }
}
