//! The external player process.
//!
//! A [`PlayerProcess`] owns one child spawned through `/bin/sh -c` in its own
//! process group. It is only ever released after the child has been reaped:
//! either it exited on its own ([`PlayerProcess::run_until`]) or it was
//! signalled and waited on ([`PlayerProcess::terminate`]).

use std::{
    future::Future,
    path::Path,
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex},
    time::Duration,
};

use error_stack::Report;
use nix::{
    errno::Errno,
    sys::signal::{killpg, Signal},
    unistd::Pid,
};
use serde::Serialize;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::error::{Result, RiseberryError};

/// Placeholder replaced by the quoted sound file path.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// Captured output beyond this many bytes is dropped.
const MAX_OUTPUT: usize = 64 * 1024;

/// How long to wait for the output pipes to drain once the child has exited.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How a playback ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackOutcome {
    /// The player exited with status 0.
    Completed,
    /// The player was terminated by a stop or by a newer playback.
    Interrupted,
}

/// A shell command template containing an optional `{file}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    template: String,
}

impl PlayerCommand {
    pub fn parse(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if template.trim().is_empty() {
            Err(RiseberryError::InvalidCommand(
                "player command is empty".to_string(),
            ))?
        }
        Ok(Self { template })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitutes the shell-quoted `file` for every `{file}` placeholder.
    pub fn render(&self, file: &Path) -> Result<String> {
        let file = file.to_str().ok_or_else(|| {
            Report::new(RiseberryError::InvalidCommand(format!(
                "sound path {} is not valid UTF-8",
                file.display()
            )))
        })?;
        let quoted = shlex::try_quote(file)
            .map_err(|e| RiseberryError::InvalidCommand(format!("{file:?}: {e}")))?;
        Ok(self.template.replace(FILE_PLACEHOLDER, &quoted))
    }
}

pub struct PlayerProcess {
    child: Child,
    pid: u32,
    grace: Duration,
    output: Arc<Mutex<Vec<u8>>>,
    readers: Vec<JoinHandle<()>>,
}

impl PlayerProcess {
    /// Starts `command` for `file`. `grace` is how long [`terminate`] waits
    /// after SIGTERM before escalating to SIGKILL.
    ///
    /// [`terminate`]: PlayerProcess::terminate
    pub fn spawn(command: &PlayerCommand, file: &Path, grace: Duration) -> Result<Self> {
        let script = command.render(file)?;
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(RiseberryError::Spawn)?;

        let Some(pid) = child.id() else {
            return Err(Report::new(RiseberryError::Spawn(std::io::Error::other(
                "player exited before its pid was read",
            ))));
        };

        let output = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(capture(stdout, output.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(capture(stderr, output.clone()));
        }

        info!(pid, command = %script, "Player started");
        Ok(PlayerProcess {
            child,
            pid,
            grace,
            output,
            readers,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Waits for the player to exit, or terminates it as soon as `cancel`
    /// resolves. The process is reaped on every path.
    pub async fn run_until<F>(mut self, cancel: F) -> Result<PlaybackOutcome>
    where
        F: Future<Output = ()>,
    {
        let status = tokio::select! {
            status = self.child.wait() => status.map_err(RiseberryError::Wait)?,
            _ = cancel => {
                self.terminate().await?;
                return Ok(PlaybackOutcome::Interrupted);
            }
        };

        let output = self.collect_output().await;
        if status.success() {
            info!(pid = self.pid, "Player finished");
            Ok(PlaybackOutcome::Completed)
        } else {
            warn!(pid = self.pid, %status, "Player failed");
            Err(Report::new(RiseberryError::PlaybackFailed {
                status: status.to_string(),
                output,
            }))
        }
    }

    /// SIGTERM to the whole process group, SIGKILL after the grace period,
    /// then wait for the child.
    pub async fn terminate(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.child.try_wait().map_err(RiseberryError::Wait)? {
            self.abort_readers();
            return Ok(status);
        }

        info!(pid = self.pid, "Terminating player");
        self.signal_group(Signal::SIGTERM)?;
        let status = match timeout(self.grace, self.child.wait()).await {
            Ok(status) => status.map_err(RiseberryError::Wait)?,
            Err(_) => {
                warn!(
                    pid = self.pid,
                    grace_ms = self.grace.as_millis() as u64,
                    "Player ignored SIGTERM, sending SIGKILL"
                );
                self.signal_group(Signal::SIGKILL)?;
                self.child.wait().await.map_err(RiseberryError::Wait)?
            }
        };
        self.abort_readers();
        debug!(pid = self.pid, %status, "Player reaped");
        Ok(status)
    }

    fn signal_group(&self, signal: Signal) -> Result<()> {
        // With process_group(0) the group id equals the child's pid.
        match killpg(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(Report::new(RiseberryError::Signal(e))),
        }
    }

    async fn collect_output(&mut self) -> String {
        for reader in self.readers.iter_mut() {
            if timeout(OUTPUT_DRAIN_TIMEOUT, reader).await.is_err() {
                debug!(pid = self.pid, "Player output still open after exit");
            }
        }
        self.abort_readers();
        match self.output.lock() {
            Ok(output) => String::from_utf8_lossy(&output).trim_end().to_string(),
            Err(_) => String::new(),
        }
    }

    fn abort_readers(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }
}

impl Drop for PlayerProcess {
    fn drop(&mut self) {
        self.abort_readers();
        // Only reached with a live child if the owner was dropped mid-play;
        // kill_on_drop covers the leader, this covers the rest of the group.
        if self.child.id().is_some() {
            let _ = self.signal_group(Signal::SIGKILL);
        }
    }
}

fn capture<R>(mut reader: R, output: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut output) = output.lock() {
                        let room = MAX_OUTPUT.saturating_sub(output.len());
                        output.extend_from_slice(&buf[..n.min(room)]);
                    }
                }
            }
        }
    })
}
