//! Installation options.

use std::time::Duration;

/// Timeouts and polling parameters used while provisioning.
///
/// # Example
///
/// ```rust
/// use hubble_install::InstallOptions;
/// use std::time::Duration;
///
/// // Poll faster for a vendor installer on a quick machine
/// let opts = InstallOptions {
///     poll_interval: Duration::from_millis(500),
///     ..Default::default()
/// };
/// assert_eq!(opts.poll_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Maximum time for a `--version` functional check.
    ///
    /// Default: 5 seconds
    pub version_timeout: Duration,

    /// Interval between checks for a vendor installer's files.
    ///
    /// Default: 2 seconds
    pub poll_interval: Duration,

    /// How long to wait for a vendor installer's files to appear.
    ///
    /// Default: 60 seconds
    pub poll_timeout: Duration,

    /// Maximum time for a single HTTPS download.
    ///
    /// Default: 10 minutes
    pub download_timeout: Duration,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            version_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(60),
            download_timeout: Duration::from_secs(600),
        }
    }
}
