//! Child-process line source.
//!
//! The process runs with stdout and stderr piped; both pipes are forwarded
//! line by line into a single channel so diagnostics travel through the same
//! decode path as data.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::traits::{LineSource, SourceError};

/// Lines buffered between the pipe readers and the consumer.
const LINE_BUFFER: usize = 256;

/// A spawned stream process exposing its merged output as lines.
pub struct ProcessSource {
    child: Child,
    pid: Option<u32>,
    lines: mpsc::Receiver<String>,
    forwarders: Vec<JoinHandle<()>>,
    terminate_requested: bool,
}

impl ProcessSource {
    /// Spawns `command` (program followed by its arguments).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::EmptyCommand`] for an empty argument vector and
    /// [`SourceError::Spawn`] if the program cannot be started.
    pub fn spawn(command: &[String]) -> Result<Self, SourceError> {
        let (program, args) = command.split_first().ok_or(SourceError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SourceError::Spawn {
                program: program.clone(),
                source,
            })?;

        let pid = child.id();
        let (tx, lines) = mpsc::channel(LINE_BUFFER);
        let mut forwarders = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(forward(stdout, tx.clone(), "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward(stderr, tx, "stderr"));
        }

        info!(program = %program, pid = ?pid, "Spawned stream process");

        Ok(Self {
            child,
            pid,
            lines,
            forwarders,
            terminate_requested: false,
        })
    }

    /// OS process ID, if the process was still running when spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }
}

#[async_trait]
impl LineSource for ProcessSource {
    async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    fn terminate(&mut self) {
        if self.terminate_requested {
            return;
        }
        self.terminate_requested = true;

        // Already reaped: nothing to signal, and the PID may have been reused.
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return;
        }
        if let Err(e) = request_stop(&mut self.child) {
            debug!(pid = ?self.pid, error = %e, "Termination request failed");
        }
    }

    async fn wait(&mut self, grace: Duration) -> Result<(), SourceError> {
        let status = match timeout(grace, self.child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    pid = ?self.pid,
                    grace_ms = grace.as_millis() as u64,
                    "Process ignored termination request, killing"
                );
                self.child.kill().await?;
                self.child.wait().await?
            }
        };
        debug!(pid = ?self.pid, %status, "Stream process exited");

        // A grandchild may still hold a pipe open; the readers are of no use
        // once the process is gone.
        self.lines.close();
        for handle in self.forwarders.drain(..) {
            handle.abort();
            let _ = handle.await;
        }
        Ok(())
    }
}

/// Copies `reader` into `tx` one line at a time until EOF or until the
/// receiving side goes away. Invalid UTF-8 is replaced rather than fatal.
fn forward<R>(reader: R, tx: mpsc::Sender<String>, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(stream, error = %e, "Stopped reading process output");
                    break;
                }
            }
        }
    })
}

#[cfg(unix)]
fn request_stop(child: &mut Child) -> std::io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(pid)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(errno.into()),
    }
}

#[cfg(not(unix))]
fn request_stop(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}
