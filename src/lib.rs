//! # hubble-install
//!
//! Provisions a developer machine so it can program a Hubble-enabled
//! embedded board.
//!
//! The crate detects the host operating system, checks for and installs
//! the board's toolchain (a native package manager, `uv`, and vendor tools
//! such as `nrfutil` and SEGGER J-Link), then runs the external flashing
//! tool with the user's credentials.
//!
//! ## Features
//!
//! - [`platform::PlatformInstaller`]: one implementation per supported OS,
//!   selected once by [`platform::installer`]
//! - [`ExecutableLocator`]: executable lookup with a ranked fallback chain
//!   for tools installed moments ago
//! - [`install::install_all`]: sequential or concurrent dependency installs
//! - [`flash`]: invocation of the flashing tool with network failure
//!   classification
//! - [`ProvisionError`]: every failure carries an actionable fix suggestion
//!
//! All process spawning and downloads go through the [`ProcessExecutor`]
//! and [`install::fetch::Fetcher`] traits held by a [`HostContext`], and
//! the executable search path is an explicit [`ProcessEnv`], so every
//! platform variant can be exercised with fakes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hubble_install::flash::FlashRequest;
//! use hubble_install::{boards, platform, progress, HostContext, InstallOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hubble_install::ProvisionError> {
//!     let ctx = HostContext::system(InstallOptions::default(), progress::silent())?;
//!     let installer = platform::installer(ctx)?;
//!     let board = boards::find("nrf52840dk").unwrap();
//!     let deps = board.dependencies();
//!
//!     if !installer.check_prerequisites(&deps).await?.is_empty() {
//!         installer.install_package_manager().await?;
//!         installer.install_dependencies(&deps).await?;
//!     }
//!
//!     let request = FlashRequest::new(
//!         "0f61efd0-24a7-4a2e-ae0f-8549d14ed901",
//!         "eb31d24113fadb77c6d89d65a8007c0eed3595e2255aaf1d",
//!         board.id,
//!         Some("kitchen-sensor".to_string()),
//!     );
//!     let result = installer.flash_board(&request).await?;
//!     println!("{result:?}");
//!     Ok(())
//! }
//! ```

pub mod boards;
pub mod bootstrap;
pub mod config;
mod context;
mod dependency;
mod env;
mod error;
mod exec;
pub mod flash;
pub mod install;
mod locate;
mod options;
pub mod platform;
pub mod progress;
mod version;

pub use context::HostContext;
pub use dependency::{Dependency, DependencyStatus, MissingDependency};
pub use env::ProcessEnv;
pub use error::ProvisionError;
pub use exec::{
    CommandSpec, ExecOutput, ProcessExecutor, StdioMode, SystemExecutor,
    REBOOT_REQUIRED_EXIT_CODE,
};
pub use locate::{ExecutableLocator, LocateStrategy, Located};
pub use options::InstallOptions;
pub use platform::PackageManagerKind;
pub use progress::ProvisionEvent;
