//! Shell session manager.
//!
//! Starts external processes behind pipes and keeps the ones that outlive
//! their start timeout as addressable sessions. Output is captured
//! continuously by reader tasks and drained on every read. Entries are
//! only removed by [`ShellManager::clear`].

use std::collections::HashMap;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, ToolError};

/// How long a synchronous start waits for the pipes to drain after exit
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(250);

const READ_CHUNK: usize = 4096;

/// Whether a session's start call blocked until exit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sync,
    Async,
}

/// How a process ended
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExitInfo {
    pub exit_code: Option<i32>,
    pub signal: Option<String>,
}

impl ExitInfo {
    fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status
                .signal()
                .map(|raw| Signal::try_from(raw).map_or_else(|_| raw.to_string(), |s| s.as_str().to_string()))
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            exit_code: status.code(),
            signal,
        }
    }
}

/// Output of a process that finished within its start timeout
#[derive(Clone, Debug, Serialize)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    #[serde(flatten)]
    pub exit: ExitInfo,
}

/// Result of starting a session
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ShellStart {
    /// Exited within the timeout; full output returned directly
    Sync(ShellOutput),
    /// Still running; interact through the returned id
    Async { id: String },
}

impl ShellStart {
    pub const fn mode(&self) -> ExecutionMode {
        match self {
            Self::Sync(_) => ExecutionMode::Sync,
            Self::Async { .. } => ExecutionMode::Async,
        }
    }
}

/// State of a session at one read
#[derive(Clone, Debug, Serialize)]
pub struct ShellSnapshot {
    pub id: String,
    /// Output since the previous read
    pub stdout: String,
    pub stderr: String,
    pub completed: bool,
    pub signaled: bool,
    #[serde(flatten)]
    pub exit: ExitInfo,
}

/// Listing entry
#[derive(Clone, Debug, Serialize)]
pub struct ShellListing {
    pub id: String,
    pub command: String,
    pub mode: ExecutionMode,
    pub completed: bool,
    pub signaled: bool,
}

#[derive(Default)]
struct OutputBuffers {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl OutputBuffers {
    fn drain(&mut self) -> (String, String) {
        let stdout = String::from_utf8_lossy(&std::mem::take(&mut self.stdout)).into_owned();
        let stderr = String::from_utf8_lossy(&std::mem::take(&mut self.stderr)).into_owned();
        (stdout, stderr)
    }
}

#[derive(Clone, Copy)]
enum Pipe {
    Stdout,
    Stderr,
}

/// One registered process
pub struct ShellInstance {
    pub id: String,
    pub command: String,
    pub mode: ExecutionMode,
    pid: Option<u32>,
    // Drained by the writer task, so writes never block a caller
    input: mpsc::UnboundedSender<Vec<u8>>,
    output: Arc<Mutex<OutputBuffers>>,
    exit: watch::Receiver<Option<ExitInfo>>,
    signaled: AtomicBool,
}

impl ShellInstance {
    pub fn is_completed(&self) -> bool {
        self.exit.borrow().is_some()
    }

    pub fn was_signaled(&self) -> bool {
        self.signaled.load(Ordering::SeqCst)
    }

    /// Drain buffered output and report status
    pub fn snapshot(&self) -> ShellSnapshot {
        let (stdout, stderr) = self.output.lock().drain();
        let exit = self.exit.borrow().clone();
        ShellSnapshot {
            id: self.id.clone(),
            stdout,
            stderr,
            completed: exit.is_some(),
            signaled: self.was_signaled(),
            exit: exit.unwrap_or_default(),
        }
    }

    /// Queue input for the process. Returns once queued, not once written.
    fn write_input(&self, text: &str) -> Result<()> {
        if self.is_completed() {
            return Err(ToolError::InputClosed(self.id.clone()));
        }
        self.input
            .send(text.as_bytes().to_vec())
            .map_err(|_| ToolError::InputClosed(self.id.clone()))
    }

    fn deliver_signal(&self, signal: Signal) -> Result<()> {
        let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) else {
            return Err(ToolError::Signal {
                id: self.id.clone(),
                signal: signal.as_str().into(),
                reason: "process id unavailable".into(),
            });
        };

        match kill(Pid::from_raw(pid), signal) {
            // Exited between the completion check and delivery
            Ok(()) | Err(nix::errno::Errno::ESRCH) => {
                self.signaled.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(errno) => Err(ToolError::Signal {
                id: self.id.clone(),
                signal: signal.as_str().into(),
                reason: errno.desc().into(),
            }),
        }
    }

    fn listing(&self) -> ShellListing {
        ShellListing {
            id: self.id.clone(),
            command: self.command.clone(),
            mode: self.mode,
            completed: self.is_completed(),
            signaled: self.was_signaled(),
        }
    }
}

/// Parse `TERM`, `SIGTERM` or `sigterm` into a signal
pub fn parse_signal(name: &str) -> Result<Signal> {
    let upper = name.trim().to_ascii_uppercase();
    let full = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&full).map_err(|_| ToolError::InvalidSignal(name.to_string()))
}

/// Registry of shell sessions
pub struct ShellManager {
    shell: String,
    instances: RwLock<HashMap<String, Arc<ShellInstance>>>,
}

impl Default for ShellManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellManager {
    pub fn new() -> Self {
        Self::with_shell("sh")
    }

    /// Use a different shell program to run command lines
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Start a command line.
    ///
    /// If it exits within `timeout` the full output is returned directly;
    /// otherwise it is registered and its id returned. A zero timeout always
    /// registers.
    pub async fn start(&self, command: &str, timeout: Duration) -> Result<ShellStart> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let pid = child.id();
        let output = Arc::new(Mutex::new(OutputBuffers::default()));
        let readers = [
            spawn_reader(child.stdout.take(), Arc::clone(&output), Pipe::Stdout),
            spawn_reader(child.stderr.take(), Arc::clone(&output), Pipe::Stderr),
        ];
        let (input, input_rx) = mpsc::unbounded_channel();
        spawn_writer(child.stdin.take(), input_rx);

        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(async move {
            let info = match child.wait().await {
                Ok(status) => ExitInfo::from_status(status),
                Err(e) => {
                    warn!(error = %e, "waiting on shell process failed");
                    ExitInfo::default()
                }
            };
            exit_tx.send_replace(Some(info));
        });

        debug!(command, ?pid, ?timeout, "shell process spawned");

        if !timeout.is_zero() {
            let mut rx = exit_rx.clone();
            let waited = tokio::time::timeout(timeout, async move {
                rx.wait_for(Option::is_some).await.map(|info| info.clone())
            })
            .await;

            if let Ok(Ok(Some(exit))) = waited {
                let _ = tokio::time::timeout(OUTPUT_DRAIN_GRACE, async {
                    for reader in readers {
                        let _ = reader.await;
                    }
                })
                .await;
                let (stdout, stderr) = output.lock().drain();
                debug!(command, exit_code = ?exit.exit_code, "shell process finished synchronously");
                return Ok(ShellStart::Sync(ShellOutput {
                    stdout,
                    stderr,
                    exit,
                }));
            }
        }

        let id = Uuid::new_v4().to_string();
        let instance = Arc::new(ShellInstance {
            id: id.clone(),
            command: command.to_string(),
            mode: ExecutionMode::Async,
            pid,
            input,
            output,
            exit: exit_rx,
            signaled: AtomicBool::new(false),
        });
        self.instances.write().insert(id.clone(), instance);
        info!(shell = %id, command, "shell session detached");

        Ok(ShellStart::Async { id })
    }

    /// Optionally write input and/or deliver a signal, then read.
    ///
    /// Signalling a completed process is reported as `signaled` without
    /// touching the OS.
    pub async fn interact(
        &self,
        id: &str,
        input: Option<&str>,
        signal: Option<&str>,
    ) -> Result<ShellSnapshot> {
        let instance = self.get(id)?;

        if let Some(text) = input {
            instance.write_input(text)?;
            debug!(shell = %id, bytes = text.len(), "input written");
        }

        if let Some(name) = signal {
            if instance.is_completed() {
                let mut snapshot = instance.snapshot();
                snapshot.signaled = true;
                return Ok(snapshot);
            }
            let signal = parse_signal(name)?;
            instance.deliver_signal(signal)?;
            info!(shell = %id, signal = signal.as_str(), "signal delivered");
        }

        Ok(instance.snapshot())
    }

    /// Look up a registered session
    pub fn get(&self, id: &str) -> Result<Arc<ShellInstance>> {
        self.instances
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ToolError::InstanceNotFound(id.to_string()))
    }

    pub fn list(&self) -> Vec<ShellListing> {
        let mut all: Vec<_> = self.instances.read().values().map(|i| i.listing()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }

    /// Remove every session, killing those still running.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let drained: Vec<_> = self.instances.write().drain().map(|(_, i)| i).collect();
        for instance in &drained {
            if !instance.is_completed() {
                if let Err(e) = instance.deliver_signal(Signal::SIGKILL) {
                    warn!(shell = %instance.id, error = %e, "failed to kill shell on clear");
                }
            }
        }
        drained.len()
    }
}

fn spawn_writer(stdin: Option<ChildStdin>, mut queue: mpsc::UnboundedReceiver<Vec<u8>>) {
    tokio::spawn(async move {
        let Some(mut stdin) = stdin else { return };
        while let Some(bytes) = queue.recv().await {
            let written = match stdin.write_all(&bytes).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                // Broken pipe once the process has exited
                debug!(error = %e, "shell stdin write failed");
                break;
            }
        }
    });
}

fn spawn_reader<R>(pipe: Option<R>, output: Arc<Mutex<OutputBuffers>>, which: Pipe) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else { return };
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    let mut buffers = output.lock();
                    match which {
                        Pipe::Stdout => buffers.stdout.extend_from_slice(&chunk[..n]),
                        Pipe::Stderr => buffers.stderr.extend_from_slice(&chunk[..n]),
                    }
                }
                Err(e) => {
                    debug!(error = %e, "shell pipe read failed");
                    break;
                }
            }
        }
    })
}
