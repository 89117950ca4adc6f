//! Side channels that copy the child's output somewhere a human can see it
//!
//! A mirror observes every chunk the session reads, in order, and never
//! influences matching. The session calls [`Mirror::on_data`] synchronously
//! from its read loop, so implementations must return promptly.

use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Receives a verbatim copy of the child's output.
pub trait Mirror: Send {
    /// Called once per chunk read, in stream order.
    fn on_data(&mut self, text: &str);
}

impl<F> Mirror for F
where
    F: FnMut(&str) + Send,
{
    fn on_data(&mut self, text: &str) {
        self(text)
    }
}

/// Chunks a [`BackgroundMirror`] queues before it starts dropping output
pub const DEFAULT_MIRROR_QUEUE: usize = 1024;

/// Forwards output to a writer on a background thread.
///
/// `on_data` only enqueues, so a slow sink (a paused terminal, a full pipe)
/// delays the transcript but never the session. The queue is bounded; once it
/// is full, further chunks are dropped and counted in [`dropped`](Self::dropped).
/// Queued output is written out when the mirror is dropped.
pub struct BackgroundMirror {
    tx: Option<SyncSender<String>>,
    handle: Option<JoinHandle<()>>,
    dropped: Arc<AtomicU64>,
}

impl BackgroundMirror {
    /// Mirror into an arbitrary writer
    pub fn new<W: Write + Send + 'static>(sink: W) -> io::Result<Self> {
        Self::with_capacity(sink, DEFAULT_MIRROR_QUEUE)
    }

    /// Mirror into `sink`, queueing at most `capacity` chunks
    pub fn with_capacity<W: Write + Send + 'static>(
        mut sink: W,
        capacity: usize,
    ) -> io::Result<Self> {
        let (tx, rx) = sync_channel::<String>(capacity.max(1));

        let handle = thread::Builder::new()
            .name("ptyexpect-mirror".into())
            .spawn(move || {
                for chunk in rx {
                    let written = sink
                        .write_all(chunk.as_bytes())
                        .and_then(|()| sink.flush());
                    if let Err(e) = written {
                        tracing::warn!(error = %e, "mirror sink failed, dropping transcript");
                        break;
                    }
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            dropped: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Chunks discarded because the sink fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Mirror to this process's standard output (the usual "logfile = stdout")
    pub fn stdout() -> io::Result<Self> {
        Self::new(io::stdout())
    }

    /// Mirror to this process's standard error
    pub fn stderr() -> io::Result<Self> {
        Self::new(io::stderr())
    }
}

impl Mirror for BackgroundMirror {
    fn on_data(&mut self, text: &str) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(text.to_owned()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                    tracing::warn!("mirror sink is falling behind, dropping output");
                }
            }
            // The writer thread only goes away after a sink failure
            Err(TrySendError::Disconnected(_)) => self.tx = None,
        }
    }
}

impl Drop for BackgroundMirror {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Collects output into a shared in-memory transcript.
#[derive(Debug, Clone, Default)]
pub struct TranscriptMirror {
    transcript: Arc<Mutex<String>>,
}

impl TranscriptMirror {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything mirrored so far
    pub fn contents(&self) -> String {
        match self.transcript.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Mirror for TranscriptMirror {
    fn on_data(&mut self, text: &str) {
        match self.transcript.lock() {
            Ok(mut guard) => guard.push_str(text),
            Err(poisoned) => poisoned.into_inner().push_str(text),
        }
    }
}

/// Writes output synchronously to a writer.
///
/// Only suitable for sinks that never block for long (files, in-memory
/// buffers); use [`BackgroundMirror`] for terminals and pipes.
pub struct WriterMirror<W> {
    sink: Option<W>,
}

impl<W: Write + Send> WriterMirror<W> {
    /// Wrap a writer
    pub fn new(sink: W) -> Self {
        Self { sink: Some(sink) }
    }

    /// Recover the writer, unless it was dropped after failing
    pub fn into_inner(self) -> Option<W> {
        self.sink
    }
}

impl<W: Write + Send> Mirror for WriterMirror<W> {
    fn on_data(&mut self, text: &str) {
        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.write_all(text.as_bytes()) {
                tracing::warn!(error = %e, "mirror sink failed, dropping transcript");
                self.sink = None;
            }
        }
    }
}
