//! Process execution.
//!
//! Every external program the installers touch goes through the
//! [`ProcessExecutor`] trait, so each platform variant can be exercised with
//! a scripted executor in tests.

use crate::ProcessEnv;
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

/// Exit code a Windows installer uses for "succeeded, reboot required".
pub const REBOOT_REQUIRED_EXIT_CODE: i32 = 3010;

/// How a child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioMode {
    /// Pipe stdout and stderr and return them in [`ExecOutput`].
    #[default]
    Capture,
    /// Hand the terminal to the child (stdin included). Nothing is captured.
    Inherit,
    /// Stream stdout and stderr to the terminal while also capturing them.
    Tee,
    /// Discard all output.
    Silent,
}

/// A command ready for execution.
///
/// # Example
///
/// ```rust
/// use hubble_install::{CommandSpec, StdioMode};
///
/// let cmd = CommandSpec::new("brew")
///     .args(["install", "uv"])
///     .stdio(StdioMode::Inherit);
/// assert_eq!(cmd.to_string(), "brew install uv");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to execute, either a bare name or a path.
    pub program: PathBuf,
    /// Arguments to pass to the program.
    pub args: Vec<String>,
    /// Environment variables set on top of the inherited environment.
    pub env_vars: Vec<(String, String)>,
    /// Stream wiring.
    pub stdio: StdioMode,
    secret_args: Vec<usize>,
}

impl CommandSpec {
    /// Start building a command for `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_vars: Vec::new(),
            stdio: StdioMode::default(),
            secret_args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append an argument that must never appear in logs.
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        self.secret_args.push(self.args.len());
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Choose how stdio is wired.
    pub fn stdio(mut self, stdio: StdioMode) -> Self {
        self.stdio = stdio;
        self
    }

    /// The program's file name, without directories.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for (index, arg) in self.args.iter().enumerate() {
            if self.secret_args.contains(&index) {
                f.write_str(" ***")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code, `None` if the child was killed by a signal.
    pub code: Option<i32>,
    /// Captured stdout (empty unless captured).
    pub stdout: String,
    /// Captured stderr (empty unless captured).
    pub stderr: String,
}

impl ExecOutput {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the child exited with status 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Whether the child reported "succeeded, reboot required".
    pub fn requires_reboot(&self) -> bool {
        self.code == Some(REBOOT_REQUIRED_EXIT_CODE)
    }

    /// Stdout if non-empty, else stderr (some tools print versions to stderr).
    pub fn text(&self) -> &str {
        if self.stdout.trim().is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Runs external programs.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run `cmd` to completion.
    ///
    /// Returns `Err` only if the process could not be started; a non-zero
    /// exit is reported through [`ExecOutput::code`].
    async fn run(&self, cmd: &CommandSpec) -> std::io::Result<ExecOutput>;
}

/// Executes commands on the host, resolving programs against a [`ProcessEnv`].
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    env: Arc<ProcessEnv>,
}

impl SystemExecutor {
    /// Create an executor bound to the given search path.
    pub fn new(env: Arc<ProcessEnv>) -> Self {
        Self { env }
    }

    fn resolve(&self, program: &Path) -> PathBuf {
        if program.components().count() > 1 {
            return program.to_path_buf();
        }
        program
            .to_str()
            .and_then(|name| self.env.lookup(name))
            .unwrap_or_else(|| program.to_path_buf())
    }
}

#[async_trait]
impl ProcessExecutor for SystemExecutor {
    async fn run(&self, cmd: &CommandSpec) -> std::io::Result<ExecOutput> {
        let program = self.resolve(&cmd.program);
        debug!(command = %cmd, resolved = %program.display(), "Running command");

        let mut command = Command::new(&program);
        command
            .args(&cmd.args)
            .envs(cmd.env_vars.iter().cloned())
            .kill_on_drop(true);
        if let Some(path) = self.env.joined_search_path() {
            command.env("PATH", path);
        }

        match cmd.stdio {
            StdioMode::Capture => {
                let output = command
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()
                    .await?;
                Ok(ExecOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            StdioMode::Inherit => {
                let status = command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await?;
                Ok(ExecOutput {
                    code: status.code(),
                    ..ExecOutput::default()
                })
            }
            StdioMode::Silent => {
                let status = command
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await?;
                Ok(ExecOutput {
                    code: status.code(),
                    ..ExecOutput::default()
                })
            }
            StdioMode::Tee => {
                let mut child = command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()?;
                let stdout = child.stdout.take();
                let stderr = child.stderr.take();
                let (stdout, stderr, status) = tokio::join!(
                    tee(stdout, tokio::io::stdout()),
                    tee(stderr, tokio::io::stderr()),
                    child.wait()
                );
                Ok(ExecOutput {
                    code: status?.code(),
                    stdout: stdout?,
                    stderr: stderr?,
                })
            }
        }
    }
}

/// Copy `reader` to `sink` chunk by chunk, keeping a copy of everything seen.
async fn tee<R, W>(reader: Option<R>, mut sink: W) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(String::new());
    };
    let mut captured = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        sink.write_all(&buf[..read]).await?;
        sink.flush().await?;
        captured.extend_from_slice(&buf[..read]);
    }
    Ok(String::from_utf8_lossy(&captured).into_owned())
}
