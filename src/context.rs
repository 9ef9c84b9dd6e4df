//! The capabilities an installer is allowed to use.

use crate::install::fetch::{Fetcher, HttpFetcher};
use crate::progress::{ProgressFn, ProvisionEvent};
use crate::{InstallOptions, ProcessEnv, ProcessExecutor, ProvisionError, SystemExecutor};
use std::sync::Arc;

/// Process spawning, downloads, the search path and a progress sink.
///
/// Cloning is cheap; install tasks each hold their own clone.
#[derive(Clone)]
pub struct HostContext {
    /// Runs external programs.
    pub exec: Arc<dyn ProcessExecutor>,
    /// Downloads vendor binaries.
    pub fetcher: Arc<dyn Fetcher>,
    /// Search path and environment snapshot.
    pub env: Arc<ProcessEnv>,
    /// Timeouts and polling.
    pub options: InstallOptions,
    progress: ProgressFn,
}

impl HostContext {
    /// Assemble a context from its parts.
    pub fn new(
        exec: Arc<dyn ProcessExecutor>,
        fetcher: Arc<dyn Fetcher>,
        env: Arc<ProcessEnv>,
        options: InstallOptions,
        progress: ProgressFn,
    ) -> Self {
        Self {
            exec,
            fetcher,
            env,
            options,
            progress,
        }
    }

    /// A context backed by the real host.
    pub fn system(options: InstallOptions, progress: ProgressFn) -> Result<Self, ProvisionError> {
        let env = Arc::new(ProcessEnv::from_process());
        let exec = Arc::new(SystemExecutor::new(Arc::clone(&env)));
        let fetcher = Arc::new(HttpFetcher::new(options.download_timeout)?);
        Ok(Self::new(exec, fetcher, env, options, progress))
    }

    /// Report a progress event.
    pub fn report(&self, event: ProvisionEvent) {
        (self.progress)(event);
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("env", &self.env)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
