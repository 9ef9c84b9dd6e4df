//! Fakes shared by the integration tests.
//!
//! Nothing here spawns a real process or touches the network: commands are
//! matched against scripted rules and downloads write a fixture file.

#![allow(dead_code)]

use async_trait::async_trait;
use hubble_install::install::fetch::Fetcher;
use hubble_install::{
    CommandSpec, ExecOutput, HostContext, InstallOptions, ProcessEnv, ProcessExecutor,
    ProvisionError, ProvisionEvent,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Effect = Box<dyn Fn() + Send + Sync>;

struct Rule {
    needle: String,
    output: ExecOutput,
    effect: Option<Effect>,
}

/// Answers commands from a script and records every command it is given.
///
/// A command matches the first rule whose needle occurs in its displayed
/// form. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Vec<Rule>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands containing `needle` with `output`.
    pub fn on(mut self, needle: &str, output: ExecOutput) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            output,
            effect: None,
        });
        self
    }

    /// Like [`on`](Self::on), running `effect` before answering.
    pub fn on_with<F>(mut self, needle: &str, output: ExecOutput, effect: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            needle: needle.to_string(),
            output,
            effect: Some(Box::new(effect)),
        });
        self
    }

    /// Every command run so far, as displayed.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether any command containing `needle` was run.
    pub fn ran(&self, needle: &str) -> bool {
        self.calls().iter().any(|call| call.contains(needle))
    }
}

#[async_trait]
impl ProcessExecutor for ScriptedExecutor {
    async fn run(&self, cmd: &CommandSpec) -> std::io::Result<ExecOutput> {
        let shown = cmd.to_string();
        self.calls.lock().unwrap().push(shown.clone());
        // Let sibling install tasks interleave.
        tokio::task::yield_now().await;
        match self.rules.iter().find(|rule| shown.contains(&rule.needle)) {
            Some(rule) => {
                if let Some(effect) = &rule.effect {
                    effect();
                }
                Ok(rule.output.clone())
            }
            None => Ok(ExecOutput::ok("")),
        }
    }
}

/// Writes a placeholder file for every download and records the URLs and
/// destinations.
#[derive(Default)]
pub struct FakeFetcher {
    urls: Mutex<Vec<String>>,
    dests: Mutex<Vec<PathBuf>>,
}

impl FakeFetcher {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Every path a download was written to.
    pub fn dests(&self) -> Vec<PathBuf> {
        self.dests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), ProvisionError> {
        self.urls.lock().unwrap().push(url.to_string());
        self.dests.lock().unwrap().push(dest.to_path_buf());
        std::fs::write(dest, b"fixture").map_err(|e| ProvisionError::Io {
            message: e.to_string(),
            fix: String::new(),
        })
    }
}

/// A context wired to fakes, plus handles for inspecting what happened.
pub struct Harness {
    pub ctx: HostContext,
    pub exec: Arc<ScriptedExecutor>,
    pub fetcher: Arc<FakeFetcher>,
    pub events: Arc<Mutex<Vec<ProvisionEvent>>>,
}

impl Harness {
    pub fn new(exec: ScriptedExecutor, env: ProcessEnv) -> Self {
        let exec = Arc::new(exec);
        let fetcher = Arc::new(FakeFetcher::default());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let options = InstallOptions {
            poll_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_millis(100),
            ..InstallOptions::default()
        };
        let ctx = HostContext::new(
            Arc::clone(&exec) as Arc<dyn ProcessExecutor>,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            Arc::new(env),
            options,
            Arc::new(move |event: ProvisionEvent| sink.lock().unwrap().push(event)),
        );
        Self {
            ctx,
            exec,
            fetcher,
            events,
        }
    }

    pub fn events(&self) -> Vec<ProvisionEvent> {
        self.events.lock().unwrap().clone()
    }
}

/// An environment with an empty search path and `HOME` set to `home`.
pub fn home_env(home: &Path) -> ProcessEnv {
    ProcessEnv::isolated(Vec::<PathBuf>::new()).with_var("HOME", home.to_string_lossy())
}

/// A Windows-shaped environment rooted in `root`: Chocolatey, profile and
/// local app data all live underneath it.
pub fn windows_env(root: &Path) -> ProcessEnv {
    ProcessEnv::isolated(Vec::<PathBuf>::new())
        .with_var("ChocolateyInstall", root.join("choco").to_string_lossy())
        .with_var("USERPROFILE", root.join("profile").to_string_lossy())
        .with_var("LOCALAPPDATA", root.join("appdata").to_string_lossy())
}

/// Create an executable placeholder at `path`, with parent directories.
pub fn touch_executable(path: &Path) {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).unwrap();
    }
    std::fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
