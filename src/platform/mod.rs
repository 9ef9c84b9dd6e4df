//! Platform installers.
//!
//! One [`PlatformInstaller`] implementation per supported operating system,
//! selected once at startup by [`installer`]. Every implementation drives
//! the host exclusively through the [`HostContext`] it was built with.
//!
//! # Example
//!
//! ```rust,no_run
//! use hubble_install::{boards, platform, progress, HostContext, InstallOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hubble_install::ProvisionError> {
//!     let ctx = HostContext::system(InstallOptions::default(), progress::silent())?;
//!     let installer = platform::installer(ctx)?;
//!     let board = boards::find("nrf52840dk").unwrap();
//!
//!     let missing = installer.check_prerequisites(&board.dependencies()).await?;
//!     for dep in &missing {
//!         println!("{}: {}", dep.name, dep.status);
//!     }
//!     Ok(())
//! }
//! ```

mod linux;
mod macos;
mod windows;

pub use linux::LinuxInstaller;
pub use macos::MacOsInstaller;
pub use windows::WindowsInstaller;

use crate::dependency::MissingDependency;
use crate::flash::{self, FlashRequest, FlashResult, ShellFlavor};
use crate::locate::ExecutableLocator;
use crate::{Dependency, HostContext, ProcessEnv, ProvisionError};
use async_trait::async_trait;

/// A supported host operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum Platform {
    /// macOS, provisioned through Homebrew.
    #[strum(serialize = "macOS")]
    MacOs,
    /// Linux distributions using apt, dnf or yum.
    #[strum(serialize = "Linux")]
    Linux,
    /// Windows, provisioned through Chocolatey.
    #[strum(serialize = "Windows")]
    Windows,
}

impl Platform {
    /// Map an OS identifier as reported by `std::env::consts::OS`.
    ///
    /// ```rust
    /// use hubble_install::platform::Platform;
    ///
    /// assert_eq!(Platform::from_os("macos").unwrap(), Platform::MacOs);
    /// assert!(Platform::from_os("freebsd").is_err());
    /// ```
    pub fn from_os(os: &str) -> Result<Self, ProvisionError> {
        match os {
            "macos" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            "windows" => Ok(Self::Windows),
            other => Err(ProvisionError::UnsupportedPlatform {
                os: other.to_string(),
                fix: "This installer supports macOS, Linux and Windows".to_string(),
            }),
        }
    }

    /// The platform this process is running on.
    pub fn current() -> Result<Self, ProvisionError> {
        Self::from_os(std::env::consts::OS)
    }

    /// Shell syntax used in user-facing hints.
    pub fn shell(&self) -> ShellFlavor {
        match self {
            Self::Windows => ShellFlavor::PowerShell,
            Self::MacOs | Self::Linux => ShellFlavor::Posix,
        }
    }
}

/// The native package manager of a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum PackageManagerKind {
    /// Homebrew (macOS).
    #[strum(serialize = "Homebrew")]
    Homebrew,
    /// apt (Debian, Ubuntu and derivatives).
    #[strum(serialize = "apt")]
    Apt,
    /// dnf (Fedora, RHEL 8+).
    #[strum(serialize = "dnf")]
    Dnf,
    /// yum (older RHEL and CentOS).
    #[strum(serialize = "yum")]
    Yum,
    /// Chocolatey (Windows).
    #[strum(serialize = "Chocolatey")]
    Chocolatey,
    /// A Linux host with none of the supported managers.
    #[strum(serialize = "unknown")]
    Unknown,
}

impl PackageManagerKind {
    /// Names of the Linux package managers this installer supports.
    pub fn supported_linux_names() -> [&'static str; 3] {
        ["apt", "dnf", "yum"]
    }

    /// Detect the Linux package manager from the search path.
    ///
    /// Checked in order: `apt-get`, `dnf`, `yum`.
    pub fn detect_linux(env: &ProcessEnv) -> Self {
        [("apt-get", Self::Apt), ("dnf", Self::Dnf), ("yum", Self::Yum)]
            .into_iter()
            .find(|(program, _)| env.lookup(program).is_some())
            .map_or(Self::Unknown, |(_, kind)| kind)
    }
}

/// Provisions one kind of host.
///
/// Call order: [`check_prerequisites`](Self::check_prerequisites), then
/// [`install_package_manager`](Self::install_package_manager) when the
/// manager is reported missing, then
/// [`install_dependencies`](Self::install_dependencies), then one of the
/// flashing operations.
#[async_trait]
pub trait PlatformInstaller: Send + Sync {
    /// Display name of the platform.
    fn name(&self) -> &'static str;

    /// The platform this installer targets.
    fn platform(&self) -> Platform;

    /// Report which of `deps`, plus the package manager, are absent.
    ///
    /// Performs no installs. The result is the same for any ordering of
    /// `deps`.
    async fn check_prerequisites(
        &self,
        deps: &[Dependency],
    ) -> Result<Vec<MissingDependency>, ProvisionError>;

    /// Install the native package manager if it is absent or broken.
    ///
    /// Idempotent: when the manager is present and functional this has no
    /// side effects beyond presence and version queries.
    async fn install_package_manager(&self) -> Result<(), ProvisionError>;

    /// Install every dependency in `deps` that is not already present.
    async fn install_dependencies(&self, deps: &[Dependency]) -> Result<(), ProvisionError>;

    /// Flash a connected board directly.
    async fn flash_board(&self, request: &FlashRequest) -> Result<FlashResult, ProvisionError>;

    /// Generate a hex file in the current directory for a separate
    /// programming tool.
    async fn generate_hex_file(
        &self,
        request: &FlashRequest,
    ) -> Result<FlashResult, ProvisionError>;
}

/// Build the installer for `platform`.
pub fn installer_for(platform: Platform, ctx: HostContext) -> Box<dyn PlatformInstaller> {
    match platform {
        Platform::MacOs => Box::new(MacOsInstaller::new(ctx)),
        Platform::Linux => Box::new(LinuxInstaller::new(ctx)),
        Platform::Windows => Box::new(WindowsInstaller::new(ctx)),
    }
}

/// Build the installer for the running host.
pub fn installer(ctx: HostContext) -> Result<Box<dyn PlatformInstaller>, ProvisionError> {
    Ok(installer_for(Platform::current()?, ctx))
}

/// Locate uv and run the flashing tool, writing a hex file when `hex` is set.
pub(crate) async fn flash_with(
    ctx: &HostContext,
    uv: &ExecutableLocator,
    request: &FlashRequest,
    hex: bool,
    shell: ShellFlavor,
) -> Result<FlashResult, ProvisionError> {
    let located = uv.locate(ctx.exec.as_ref(), &ctx.env).await?;
    let output = if hex {
        let dir = std::env::current_dir()
            .map_err(|e| ProvisionError::io("failed to get current directory", e))?;
        Some(request.hex_path(&dir))
    } else {
        None
    };
    flash::run(ctx, &located.path, request, output.as_deref(), shell).await
}
