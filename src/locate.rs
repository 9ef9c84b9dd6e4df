//! Executable lookup with a ranked fallback chain.
//!
//! A tool installed a moment ago by a package manager is often invisible to
//! the running process: its shim directory was added to the persistent
//! `PATH`, not to ours. The locator works through progressively more
//! expensive strategies and stops at the first hit.

use crate::{CommandSpec, ProcessEnv, ProcessExecutor, ProvisionError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// One way of finding an executable.
#[derive(Debug, Clone)]
pub enum LocateStrategy {
    /// Standard lookup against the [`ProcessEnv`] search path.
    SearchPath,
    /// A directory known to hold the executable, such as a package manager's shim dir.
    Directory(PathBuf),
    /// A command whose first line of output is the executable's path.
    ManagerQuery(CommandSpec),
    /// Full paths of common per-user install locations, checked in order.
    Candidates(Vec<PathBuf>),
}

/// Where an executable was found and which strategy found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// Path to the executable.
    pub path: PathBuf,
    /// Index of the strategy that matched.
    pub strategy: usize,
}

/// Finds an executable by trying [`LocateStrategy`]s in order.
///
/// # Example
///
/// ```rust
/// use hubble_install::{ExecutableLocator, LocateStrategy};
///
/// let locator = ExecutableLocator::new("uv")
///     .then(LocateStrategy::Directory("/opt/homebrew/bin".into()))
///     .then(LocateStrategy::Candidates(vec!["/home/dev/.local/bin/uv".into()]));
/// assert_eq!(locator.strategies().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    name: String,
    file_name: String,
    strategies: Vec<LocateStrategy>,
}

impl ExecutableLocator {
    /// A locator for `name` that starts with a search-path lookup.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            file_name: name.clone(),
            name,
            strategies: vec![LocateStrategy::SearchPath],
        }
    }

    /// Override the file name checked by directory strategies (e.g. `uv.exe`).
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Append a fallback strategy.
    pub fn then(mut self, strategy: LocateStrategy) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// The executable name being searched for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The strategies, in the order they are tried.
    pub fn strategies(&self) -> &[LocateStrategy] {
        &self.strategies
    }

    /// Find the executable, or `None` once every strategy is exhausted.
    pub async fn find(&self, exec: &dyn ProcessExecutor, env: &ProcessEnv) -> Option<Located> {
        for (index, strategy) in self.strategies.iter().enumerate() {
            if let Some(path) = self.try_strategy(strategy, exec, env).await {
                debug!(name = %self.name, strategy = index, path = %path.display(), "Located executable");
                return Some(Located {
                    path,
                    strategy: index,
                });
            }
        }
        debug!(name = %self.name, "Executable not found by any strategy");
        None
    }

    /// Like [`find`](Self::find) but fails with `ExecutableNotFound`.
    pub async fn locate(
        &self,
        exec: &dyn ProcessExecutor,
        env: &ProcessEnv,
    ) -> Result<Located, ProvisionError> {
        self.find(exec, env)
            .await
            .ok_or_else(|| ProvisionError::executable_not_found(&self.name))
    }

    async fn try_strategy(
        &self,
        strategy: &LocateStrategy,
        exec: &dyn ProcessExecutor,
        env: &ProcessEnv,
    ) -> Option<PathBuf> {
        match strategy {
            LocateStrategy::SearchPath => env.lookup(&self.name),
            LocateStrategy::Directory(dir) => existing_file(&dir.join(&self.file_name)),
            LocateStrategy::ManagerQuery(cmd) => {
                let output = exec.run(cmd).await.ok()?;
                if !output.success() {
                    return None;
                }
                let line = output.stdout.lines().map(str::trim).find(|l| !l.is_empty())?;
                existing_file(Path::new(line))
            }
            LocateStrategy::Candidates(paths) => paths.iter().find_map(|p| existing_file(p)),
        }
    }
}

fn existing_file(path: &Path) -> Option<PathBuf> {
    path.is_file().then(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecOutput;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct QueryExecutor {
        answer: String,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ProcessExecutor for QueryExecutor {
        async fn run(&self, cmd: &CommandSpec) -> std::io::Result<ExecOutput> {
            self.calls.lock().unwrap().push(cmd.to_string());
            Ok(ExecOutput::ok(self.answer.clone()))
        }
    }

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "").unwrap();
        path
    }

    #[tokio::test]
    async fn test_third_strategy_wins_without_consulting_fourth() {
        let scratch = tempfile::tempdir().unwrap();
        let versioned = touch(scratch.path(), "uv-from-lib");
        let common = touch(scratch.path(), "uv-common");
        let exec = QueryExecutor {
            answer: format!("{}\n", versioned.display()),
            calls: Mutex::new(Vec::new()),
        };
        let env = ProcessEnv::isolated(Vec::<PathBuf>::new());

        let locator = ExecutableLocator::new("uv")
            .then(LocateStrategy::Directory(scratch.path().join("shims")))
            .then(LocateStrategy::ManagerQuery(CommandSpec::new("powershell")))
            .then(LocateStrategy::ManagerQuery(CommandSpec::new("never-run")))
            .then(LocateStrategy::Candidates(vec![common]));

        let located = locator.locate(&exec, &env).await.unwrap();
        assert_eq!(located.path, versioned);
        assert_eq!(located.strategy, 2);
        assert_eq!(*exec.calls.lock().unwrap(), vec!["powershell".to_string()]);
    }

    #[tokio::test]
    async fn test_directory_strategy_uses_file_name() {
        let scratch = tempfile::tempdir().unwrap();
        let shim = touch(scratch.path(), "uv.exe");
        let exec = QueryExecutor {
            answer: String::new(),
            calls: Mutex::new(Vec::new()),
        };
        let env = ProcessEnv::isolated(Vec::<PathBuf>::new());

        let located = ExecutableLocator::new("uv")
            .with_file_name("uv.exe")
            .then(LocateStrategy::Directory(scratch.path().to_path_buf()))
            .locate(&exec, &env)
            .await
            .unwrap();
        assert_eq!(located.path, shim);
        assert_eq!(located.strategy, 1);
    }

    #[tokio::test]
    async fn test_query_pointing_at_missing_file_falls_through() {
        let scratch = tempfile::tempdir().unwrap();
        let common = touch(scratch.path(), "uv");
        let exec = QueryExecutor {
            answer: "/nonexistent/uv".to_string(),
            calls: Mutex::new(Vec::new()),
        };
        let env = ProcessEnv::isolated(Vec::<PathBuf>::new());

        let located = ExecutableLocator::new("uv")
            .then(LocateStrategy::ManagerQuery(CommandSpec::new("query")))
            .then(LocateStrategy::Candidates(vec![common.clone()]))
            .locate(&exec, &env)
            .await
            .unwrap();
        assert_eq!(located.path, common);
        assert_eq!(located.strategy, 2);
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_executable_not_found() {
        let exec = QueryExecutor {
            answer: String::new(),
            calls: Mutex::new(Vec::new()),
        };
        let env = ProcessEnv::isolated(Vec::<PathBuf>::new());

        let err = ExecutableLocator::new("definitely_not_a_real_executable_12345")
            .then(LocateStrategy::Candidates(vec![PathBuf::from("/nonexistent/tool")]))
            .locate(&exec, &env)
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::ExecutableNotFound { .. }));
        assert!(err.fix_suggestion().contains("new one"));
    }
}
