//! Strict-mode shell script execution.
//!
//! Every external command the tool runs goes through [`Shell`]: the script
//! body is written to a temporary file behind a `set -eux -o pipefail`
//! preamble and handed to `/bin/bash` in the requested working directory.
//! A wall-clock timeout (default 120 s) bounds each invocation.

use std::fmt;
use std::io;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub enum ShellError {
    /// The interpreter could not be started (or the script file written)
    Spawn(io::Error),
    /// The script exceeded its wall-clock timeout and was killed
    TimedOut { secs: u64 },
    /// The script exited non-zero under `check`
    Failed { code: i32, stderr: String },
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellError::Spawn(e) => write!(f, "failed to run shell: {e}"),
            ShellError::TimedOut { secs } => {
                write!(f, "script timed out after {secs}s")
            }
            ShellError::Failed { code, stderr } => {
                write!(f, "script exited with status {code}: {}", stderr.trim())
            }
        }
    }
}

impl std::error::Error for ShellError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShellError::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct ShellOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Builder for one script invocation.
#[derive(Debug, Clone)]
pub struct Shell {
    cwd: PathBuf,
    timeout: Duration,
    interpreter: PathBuf,
    preamble: String,
    check: bool,
    capture: bool,
}

impl Shell {
    /// A shell with the default contract: bash strict mode, 120 s timeout,
    /// captured output, non-zero exit treated as an error.
    pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
        Shell {
            cwd: cwd.into(),
            timeout: DEFAULT_TIMEOUT,
            interpreter: PathBuf::from("/bin/bash"),
            preamble: "set -eux -o pipefail".to_string(),
            check: true,
            capture: true,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// With `check` disabled a non-zero exit is reported in
    /// [`ShellOutput::code`] instead of failing the call.
    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    /// Execute `script` under the preamble. The temporary script file
    /// lives only for the duration of this call.
    pub fn run(&self, script: &str) -> Result<ShellOutput, ShellError> {
        let mut file = tempfile::NamedTempFile::new().map_err(ShellError::Spawn)?;
        write!(file, "{}\n{}\n", self.preamble, script).map_err(ShellError::Spawn)?;
        file.flush().map_err(ShellError::Spawn)?;

        log::debug!("$ {}", summary(script));
        let started = Instant::now();

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(file.path());
        cmd.current_dir(&self.cwd);
        cmd.stdin(Stdio::null());
        if self.capture {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(ShellError::Spawn)?;

        // Drain pipes on helper threads so a chatty child cannot deadlock
        // against a full pipe buffer while we wait on it.
        let stdout_thread = child.stdout.take().map(drain);
        let stderr_thread = child.stderr.take().map(drain);

        let status = match child.wait_timeout(self.timeout).map_err(ShellError::Spawn)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ShellError::TimedOut {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = stdout_thread.map(join_drain).unwrap_or_default();
        let stderr = stderr_thread.map(join_drain).unwrap_or_default();
        let code = status.code().unwrap_or(-1);

        crate::profile::observe("shell.run", started.elapsed());
        log::debug!("  -> exit {code} in {:.1}ms", started.elapsed().as_secs_f64() * 1000.0);

        if self.check && !status.success() {
            return Err(ShellError::Failed { code, stderr });
        }

        Ok(ShellOutput {
            code,
            stdout,
            stderr,
        })
    }
}

fn drain(mut stream: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = String::new();
        let _ = stream.read_to_string(&mut buf);
        buf
    })
}

fn join_drain(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// First non-empty line of a script, for log lines.
fn summary(script: &str) -> &str {
    script
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("<empty script>")
}
