//! Background thread that drains the PTY master

use bytes::Bytes;
use std::io::{self, Read};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

/// Size of a single read from the PTY master
const READ_CHUNK: usize = 4096;

/// Backoff when a non-blocking descriptor reports `WouldBlock`
const WOULD_BLOCK_BACKOFF: Duration = Duration::from_millis(10);

/// What the reader thread observed on the PTY master
#[derive(Debug)]
pub(crate) enum ReadEvent {
    Data(Bytes),
    Eof,
    Failed(io::Error),
}

/// Spawn the reader thread, returning the receiving end of its channel.
///
/// Chunks arrive in the order the PTY produced them. The thread exits after
/// sending `Eof` or `Failed`, or once the receiver is dropped.
pub(crate) fn spawn_reader<R: Read + Send + 'static>(
    mut reader: R,
) -> io::Result<UnboundedReceiver<ReadEvent>> {
    let (tx, rx) = unbounded_channel();

    thread::Builder::new()
        .name("ptyexpect-reader".into())
        .spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                let event = match reader.read(&mut buf) {
                    Ok(0) => ReadEvent::Eof,
                    Ok(n) => ReadEvent::Data(Bytes::copy_from_slice(&buf[..n])),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        thread::sleep(WOULD_BLOCK_BACKOFF);
                        continue;
                    }
                    Err(e) if is_hangup(&e) => ReadEvent::Eof,
                    Err(e) => ReadEvent::Failed(e),
                };

                let last = !matches!(event, ReadEvent::Data(_));
                if tx.send(event).is_err() || last {
                    break;
                }
            }
            tracing::trace!("pty reader thread exiting");
        })?;

    Ok(rx)
}

/// Linux reports EIO on the master once every slave descriptor is closed.
#[cfg(unix)]
fn is_hangup(e: &io::Error) -> bool {
    const EIO: i32 = 5;
    e.raw_os_error() == Some(EIO)
}

#[cfg(not(unix))]
fn is_hangup(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::BrokenPipe
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_chunks_then_eof() {
        let mut rx = spawn_reader(Cursor::new(b"ready> ".to_vec())).unwrap();

        match rx.recv().await {
            Some(ReadEvent::Data(bytes)) => assert_eq!(&bytes[..], b"ready> "),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(rx.recv().await, Some(ReadEvent::Eof)));
        assert!(rx.recv().await.is_none());
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[tokio::test]
    async fn test_hard_failure_is_reported() {
        let mut rx = spawn_reader(FailingReader).unwrap();
        match rx.recv().await {
            Some(ReadEvent::Failed(e)) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[cfg(unix)]
    struct HangupReader;

    #[cfg(unix)]
    impl Read for HangupReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from_raw_os_error(5))
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_eio_is_end_of_stream() {
        let mut rx = spawn_reader(HangupReader).unwrap();
        assert!(matches!(rx.recv().await, Some(ReadEvent::Eof)));
    }
}
