//! Logical dependencies a board toolchain may require.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// A named external tool required before flashing can proceed.
///
/// Variants are declared in install order: a dependency never requires one
/// declared after it. Sorting a list of dependencies therefore yields an
/// order in which they can be installed sequentially.
///
/// # Example
///
/// ```rust
/// use hubble_install::Dependency;
///
/// let dep: Dependency = "segger-jlink".parse().unwrap();
/// assert_eq!(dep, Dependency::SeggerJlink);
/// assert_eq!(dep.to_string(), "segger-jlink");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumIter,
    strum::Display,
    strum::EnumString,
)]
#[non_exhaustive]
pub enum Dependency {
    /// Astral's `uv`, used to run the Python flashing tool.
    #[strum(serialize = "uv")]
    #[serde(rename = "uv")]
    Uv,
    /// Nordic's `nrfutil` command line tool.
    #[strum(serialize = "nrfutil")]
    #[serde(rename = "nrfutil")]
    Nrfutil,
    /// SEGGER J-Link software and drivers.
    #[strum(serialize = "segger-jlink")]
    #[serde(rename = "segger-jlink")]
    SeggerJlink,
}

impl Dependency {
    /// The executable whose presence proves the dependency is installed.
    ///
    /// ```rust
    /// use hubble_install::Dependency;
    ///
    /// assert_eq!(Dependency::Uv.executable_name(), "uv");
    /// assert_eq!(Dependency::SeggerJlink.executable_name(), "JLinkExe");
    /// ```
    pub fn executable_name(&self) -> &'static str {
        match self {
            Self::Uv => "uv",
            Self::Nrfutil => "nrfutil",
            Self::SeggerJlink => "JLinkExe",
        }
    }

    /// Another dependency that must be installed before this one.
    pub fn requires(&self) -> Option<Dependency> {
        match self {
            Self::Nrfutil => Some(Self::Uv),
            Self::Uv | Self::SeggerJlink => None,
        }
    }

    /// Iterator over all known dependencies, in install order.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

/// Why a dependency was reported as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyStatus {
    /// Nothing was found on the search path or in any fallback location.
    NotInstalled,
}

impl DependencyStatus {
    /// Human-readable status for display.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NotInstalled => "Not installed",
        }
    }
}

impl std::fmt::Display for DependencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A dependency reported missing by a prerequisite check.
///
/// `name` is either a [`Dependency`] name or the display name of the
/// platform package manager (e.g. "Homebrew") when the manager itself is
/// absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingDependency {
    /// Name to display.
    pub name: String,
    /// Why it is missing.
    pub status: DependencyStatus,
}

impl MissingDependency {
    pub(crate) fn not_installed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: DependencyStatus::NotInstalled,
        }
    }
}
