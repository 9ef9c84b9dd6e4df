//! Process-local executable search path and environment snapshot.
//!
//! The search path is modelled as an explicit resource rather than the
//! ambient `PATH` variable. Installers prepend directories here and the
//! [`SystemExecutor`](crate::SystemExecutor) hands the resulting value to
//! every child it spawns, so a freshly installed tool becomes visible to
//! later steps of the same run without touching the real process
//! environment.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Search path and environment variables seen by the installers.
#[derive(Debug, Default)]
pub struct ProcessEnv {
    search_path: RwLock<Vec<PathBuf>>,
    vars: HashMap<String, String>,
}

impl ProcessEnv {
    /// Snapshot the current process's `PATH` and environment variables.
    pub fn from_process() -> Self {
        let search_path = std::env::var_os("PATH")
            .map(|raw| std::env::split_paths(&raw).collect())
            .unwrap_or_default();
        Self {
            search_path: RwLock::new(search_path),
            vars: std::env::vars().collect(),
        }
    }

    /// An environment that only knows the given directories and no variables.
    ///
    /// ```rust
    /// use hubble_install::ProcessEnv;
    ///
    /// let env = ProcessEnv::isolated(["/opt/tools/bin"]).with_var("HOME", "/home/dev");
    /// assert_eq!(env.search_path().len(), 1);
    /// assert_eq!(env.var("HOME"), Some("/home/dev"));
    /// ```
    pub fn isolated<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_path: RwLock::new(dirs.into_iter().map(Into::into).collect()),
            vars: HashMap::new(),
        }
    }

    /// Set a variable in the snapshot.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Look up a variable, treating empty values as unset.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// The invoking user's home directory (`HOME`, else `USERPROFILE`).
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.var("HOME")
            .or_else(|| self.var("USERPROFILE"))
            .map(PathBuf::from)
    }

    /// Current search path entries, highest priority first.
    pub fn search_path(&self) -> Vec<PathBuf> {
        self.search_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The search path joined with the platform separator, for child processes.
    pub fn joined_search_path(&self) -> Option<OsString> {
        std::env::join_paths(self.search_path()).ok()
    }

    /// Put `dir` at the front of the search path unless it is already present.
    ///
    /// Returns `true` if the path changed. Safe to call from concurrent
    /// install tasks: the check and the insert happen under one lock.
    pub fn prepend_if_absent(&self, dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        let mut entries = self
            .search_path
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|entry| same_dir(entry, dir)) {
            return false;
        }
        debug!(dir = %dir.display(), "Prepending to search path");
        entries.insert(0, dir.to_path_buf());
        true
    }

    /// Resolve `name` against the search path.
    pub fn lookup(&self, name: &str) -> Option<PathBuf> {
        let paths = self.joined_search_path()?;
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(name, Some(paths), cwd).ok()
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    if cfg!(windows) {
        a.to_string_lossy()
            .eq_ignore_ascii_case(&b.to_string_lossy())
    } else {
        a == b
    }
}
