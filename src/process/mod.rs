//! A child process bound to a pseudo-terminal

mod reader;

use crate::buffer::{Decoder, Encoding};
use crate::result::ExpectError;
use bytes::BytesMut;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, ExitStatus, MasterPty, PtySize};
pub(crate) use reader::ReadEvent;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
#[cfg(test)]
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::sync::Mutex;

/// Polls of `try_wait` after killing the child
const REAP_ATTEMPTS: u32 = 10;

/// Delay between reap polls
const REAP_INTERVAL: Duration = Duration::from_millis(20);

/// Result of a bounded, non-blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Newly decoded text, in stream order.
    Data(String),
    /// Nothing arrived within the poll window.
    Nothing,
    /// The child closed its side of the terminal. Repeats on later reads.
    Eof,
}

/// One spawned child attached to a PTY.
///
/// The process and the PTY descriptors are owned exclusively by this value.
/// Dropping it terminates a still-running child.
pub struct PtyProcess {
    master: Box<dyn MasterPty + Send>,
    child: Option<Box<dyn Child + Send + Sync>>,
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    events: UnboundedReceiver<ReadEvent>,
    pending: BytesMut,
    decoder: Decoder,
    eof: bool,
    terminated: bool,
    command: String,
}

impl PtyProcess {
    /// Start `command` (split on whitespace) in a fresh 24x80 PTY.
    ///
    /// Use [`SessionBuilder`](crate::SessionBuilder) for quoting-free
    /// argument lists, environment variables and PTY size.
    ///
    /// # Errors
    ///
    /// [`ExpectError::Spawn`] if the command is empty, the program cannot be
    /// found or `working_dir` is not a directory; [`ExpectError::Pty`] if the
    /// terminal cannot be allocated.
    pub fn start(
        command: &str,
        working_dir: Option<&Path>,
        encoding: Encoding,
    ) -> Result<Self, ExpectError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ExpectError::Spawn("Empty command".to_string()))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(parts);
        set_working_dir(&mut cmd, working_dir)?;

        Self::spawn_command(command.trim().to_string(), cmd, PtySize::default(), encoding)
    }

    pub(crate) fn spawn_command(
        command: String,
        cmd: CommandBuilder,
        size: PtySize,
        encoding: Encoding,
    ) -> Result<Self, ExpectError> {
        let pair = native_pty_system()
            .openpty(size)
            .map_err(|e| ExpectError::Pty(e.to_string()))?;

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ExpectError::Spawn(format!("{command}: {e}")))?;

        // Only the child may hold the slave, otherwise the master never sees a hangup
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ExpectError::Pty(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| ExpectError::Pty(e.to_string()))?;
        let events = reader::spawn_reader(reader)?;

        tracing::debug!(command = %command, pid = ?child.process_id(), "spawned child in pty");

        Ok(Self {
            master: pair.master,
            child: Some(child),
            writer: Arc::new(Mutex::new(writer)),
            events,
            pending: BytesMut::new(),
            decoder: Decoder::new(encoding),
            eof: false,
            terminated: false,
            command,
        })
    }

    /// The command line this process was started with
    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS process id, if known
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.process_id())
    }

    /// Encoding used to decode output
    pub fn encoding(&self) -> Encoding {
        self.decoder.encoding()
    }

    /// Whether end-of-stream has been observed
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Write raw bytes to the child's terminal input.
    ///
    /// No newline is appended.
    ///
    /// # Errors
    ///
    /// [`ExpectError::ClosedSession`] if the child has exited or was
    /// terminated; [`ExpectError::Process`] for other write failures.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        if !self.is_alive()? {
            return Err(ExpectError::ClosedSession);
        }

        let writer = self.writer.clone();
        let data = data.to_vec();
        let written = tokio::task::spawn_blocking(move || {
            let mut writer = writer.blocking_lock();
            writer.write_all(&data)?;
            writer.flush()
        })
        .await
        .map_err(|e| ExpectError::Process(e.to_string()))?;

        if let Err(e) = written {
            if !self.is_alive()? {
                return Err(ExpectError::ClosedSession);
            }
            return Err(ExpectError::Process(e.to_string()));
        }
        Ok(())
    }

    /// Read whatever output is available, waiting at most `poll`.
    ///
    /// At most `max_bytes` raw bytes are decoded per call; the rest is kept
    /// for the next call. A zero `poll` only checks what has already arrived.
    ///
    /// # Errors
    ///
    /// [`ExpectError::Process`] if the PTY read failed for a reason other
    /// than the child hanging up.
    pub async fn read_nonblocking(
        &mut self,
        max_bytes: usize,
        poll: Duration,
    ) -> Result<ReadOutcome, ExpectError> {
        if self.pending.is_empty() && !self.eof {
            let event = if poll.is_zero() {
                match self.events.try_recv() {
                    Ok(event) => Some(event),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => Some(ReadEvent::Eof),
                }
            } else {
                match tokio::time::timeout(poll, self.events.recv()).await {
                    Ok(Some(event)) => Some(event),
                    Ok(None) => Some(ReadEvent::Eof),
                    Err(_) => None,
                }
            };

            match event {
                None => return Ok(ReadOutcome::Nothing),
                Some(ReadEvent::Data(bytes)) => self.pending.extend_from_slice(&bytes),
                Some(ReadEvent::Eof) => {
                    tracing::debug!(command = %self.command, "end of stream");
                    self.eof = true;
                }
                Some(ReadEvent::Failed(e)) => {
                    tracing::warn!(command = %self.command, error = %e, "pty read failed");
                    return Err(ExpectError::Process(e.to_string()));
                }
            }
        }

        while !self.pending.is_empty() {
            let take = self.pending.len().min(max_bytes.max(1));
            let chunk = self.pending.split_to(take);
            let text = self.decoder.decode(&chunk);
            if !text.is_empty() {
                return Ok(ReadOutcome::Data(text));
            }
        }

        if self.eof {
            let rest = self.decoder.finish();
            if !rest.is_empty() {
                return Ok(ReadOutcome::Data(rest));
            }
            return Ok(ReadOutcome::Eof);
        }

        Ok(ReadOutcome::Nothing)
    }

    /// Check whether the child is still running.
    pub fn is_alive(&mut self) -> Result<bool, ExpectError> {
        if self.terminated {
            return Ok(false);
        }
        match self.child.as_mut() {
            Some(child) => Ok(child.try_wait()?.is_none()),
            None => Ok(false),
        }
    }

    /// Terminate the child. Calling this again, or after the child exited, is a no-op.
    ///
    /// After the kill signal the child is reaped by polling on the runtime's
    /// timer, so other tasks keep running while it goes away.
    pub async fn terminate(&mut self) -> Result<(), ExpectError> {
        if !self.kill()? {
            return Ok(());
        }

        // Reap it so no zombie outlives the session
        for _ in 0..REAP_ATTEMPTS {
            tokio::time::sleep(REAP_INTERVAL).await;
            if self.try_reap()? {
                return Ok(());
            }
        }
        tracing::warn!(command = %self.command, "child did not exit after kill");
        Ok(())
    }

    /// Send the kill signal once. Returns whether the child still has to be reaped.
    fn kill(&mut self) -> Result<bool, ExpectError> {
        if self.terminated {
            return Ok(false);
        }
        self.terminated = true;

        let Some(child) = self.child.as_mut() else {
            return Ok(false);
        };
        if child.try_wait()?.is_some() {
            return Ok(false);
        }

        tracing::debug!(command = %self.command, pid = ?child.process_id(), "terminating child");
        if let Err(e) = child.kill() {
            // The child may have exited between the check and the signal
            if child.try_wait()?.is_none() {
                return Err(ExpectError::Process(e.to_string()));
            }
            return Ok(false);
        }
        Ok(true)
    }

    fn try_reap(&mut self) -> Result<bool, ExpectError> {
        match self.child.as_mut() {
            Some(child) => Ok(child.try_wait()?.is_some()),
            None => Ok(true),
        }
    }

    /// Wait for the child to exit and return its status.
    pub async fn wait(&mut self) -> Result<ExitStatus, ExpectError> {
        let mut child = self.child.take().ok_or(ExpectError::ClosedSession)?;

        let (child, status) = tokio::task::spawn_blocking(move || {
            let status = child.wait();
            (child, status)
        })
        .await
        .map_err(|e| ExpectError::Process(e.to_string()))?;

        self.child = Some(child);
        let status = status?;
        tracing::debug!(command = %self.command, code = status.exit_code(), "child exited");
        Ok(status)
    }

    /// Detach the reader thread and feed events from the returned sender instead
    #[cfg(test)]
    pub(crate) fn replace_events(&mut self) -> UnboundedSender<ReadEvent> {
        let (tx, rx) = unbounded_channel();
        self.events = rx;
        tx
    }

    /// Change the terminal size seen by the child
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), ExpectError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| ExpectError::Pty(e.to_string()))
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        match self.kill() {
            Ok(false) => {}
            Ok(true) => {
                // Drop cannot await, so a blocking wait reaps the child off the runtime
                if let (Some(mut child), Ok(runtime)) =
                    (self.child.take(), tokio::runtime::Handle::try_current())
                {
                    runtime.spawn_blocking(move || child.wait());
                }
            }
            Err(e) => {
                tracing::warn!(command = %self.command, error = %e, "failed to terminate child on drop");
            }
        }
    }
}

pub(crate) fn set_working_dir(
    cmd: &mut CommandBuilder,
    dir: Option<&Path>,
) -> Result<(), ExpectError> {
    match dir {
        Some(dir) if !dir.is_dir() => Err(ExpectError::Spawn(format!(
            "working directory {} does not exist",
            dir.display()
        ))),
        Some(dir) => {
            cmd.cwd(dir);
            Ok(())
        }
        // Without an explicit cwd the child would start in $HOME
        None => {
            if let Ok(cwd) = std::env::current_dir() {
                cmd.cwd(cwd);
            }
            Ok(())
        }
    }
}
