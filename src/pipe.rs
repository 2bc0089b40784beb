//! Channel Pipe
//!
//! A single-direction, closable byte stream backed by a bounded
//! `tokio::sync::mpsc` channel. Writers enqueue whole chunks and block only
//! while every slot is taken; readers block until a chunk arrives or the pipe
//! is closed. Bytes are observed in write order.
//!
//! ```text
//!   PipeWriter ──write──▶ [ chunk | chunk | … ] ──read──▶ PipeReader
//!                         (bounded slot count)
//! ```
//!
//! The blocking channel API is used, so a pipe must be driven from plain
//! threads (or `spawn_blocking`), never from inside an async task.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc;

/// Default number of chunks a pipe buffers before writers block.
pub const DEFAULT_SLOTS: usize = 8;

/// Errors reported by [`ChanPipe`] operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipeError {
    #[error("write on closed pipe")]
    ClosedPipe,
    #[error("pipe closed before {0:?} was read")]
    UnmatchedClose(String),
}

impl From<PipeError> for io::Error {
    fn from(err: PipeError) -> Self {
        let kind = match err {
            PipeError::ClosedPipe => io::ErrorKind::BrokenPipe,
            PipeError::UnmatchedClose(_) => io::ErrorKind::UnexpectedEof,
        };
        io::Error::new(kind, err)
    }
}

struct RecvHalf {
    rx: mpsc::Receiver<Vec<u8>>,
    /// Bytes received but not yet handed to a reader
    pending: Vec<u8>,
}

/// Bounded, closable byte pipe.
pub struct ChanPipe {
    tx: Mutex<Option<mpsc::Sender<Vec<u8>>>>,
    rx: Mutex<RecvHalf>,
}

impl Default for ChanPipe {
    fn default() -> Self {
        Self::new(DEFAULT_SLOTS)
    }
}

impl std::fmt::Debug for ChanPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChanPipe")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ChanPipe {
    /// Create a pipe buffering at most `slots` chunks.
    pub fn new(slots: usize) -> Self {
        let (tx, rx) = mpsc::channel(slots.max(1));
        Self {
            tx: Mutex::new(Some(tx)),
            rx: Mutex::new(RecvHalf {
                rx,
                pending: Vec::new(),
            }),
        }
    }

    /// Create a shared pipe, ready to be split into reader and writer handles.
    pub fn shared(slots: usize) -> Arc<Self> {
        Arc::new(Self::new(slots))
    }

    pub fn reader(self: &Arc<Self>) -> PipeReader {
        PipeReader(Arc::clone(self))
    }

    pub fn writer(self: &Arc<Self>) -> PipeWriter {
        PipeWriter(Arc::clone(self))
    }

    /// Enqueue `data` as one chunk. Blocks while the pipe is full.
    pub fn write(&self, data: &[u8]) -> Result<usize, PipeError> {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(PipeError::ClosedPipe)?;
        if data.is_empty() {
            return Ok(0);
        }
        tx.blocking_send(data.to_vec())
            .map_err(|_| PipeError::ClosedPipe)?;
        Ok(data.len())
    }

    pub fn write_str(&self, s: &str) -> Result<usize, PipeError> {
        self.write(s.as_bytes())
    }

    /// Read up to `buf.len()` bytes, blocking until some are available.
    /// Returns `Ok(0)` once the pipe is closed and fully drained.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, PipeError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut half = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        if half.pending.is_empty() {
            match half.rx.blocking_recv() {
                Some(chunk) => half.pending = chunk,
                None => return Ok(0),
            }
        }
        let n = buf.len().min(half.pending.len());
        buf[..n].copy_from_slice(&half.pending[..n]);
        half.pending.drain(..n);
        Ok(n)
    }

    /// Accumulate bytes until `target` has been seen and return everything up
    /// to and including it. Bytes after the match stay buffered for the next
    /// read.
    pub fn read_until(&self, target: &[u8]) -> Result<Vec<u8>, PipeError> {
        let mut half = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        let mut acc = std::mem::take(&mut half.pending);

        loop {
            if let Some(end) = find(&acc, target) {
                half.pending = acc.split_off(end);
                return Ok(acc);
            }
            match half.rx.blocking_recv() {
                Some(chunk) => acc.extend_from_slice(&chunk),
                None => {
                    return Err(PipeError::UnmatchedClose(
                        String::from_utf8_lossy(target).into_owned(),
                    ))
                }
            }
        }
    }

    pub fn read_string(&self, target: &str) -> Result<String, PipeError> {
        let bytes = self.read_until(target.as_bytes())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Close the pipe. Idempotent. Buffered chunks remain readable; blocked
    /// and future writers fail with [`PipeError::ClosedPipe`].
    pub fn close(&self) {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let was_open = sender.is_some();
        // The sender must be gone before taking the receiver lock: a reader
        // parked in recv holds that lock until the last sender drops.
        drop(sender);

        // Closing the receiving side wakes writers stuck on a full channel.
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .rx
            .close();
        if was_open {
            tracing::trace!("pipe closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// End offset of the first occurrence of `target` in `haystack`.
fn find(haystack: &[u8], target: &[u8]) -> Option<usize> {
    if target.is_empty() {
        return Some(0);
    }
    haystack
        .windows(target.len())
        .position(|w| w == target)
        .map(|start| start + target.len())
}

/// `io::Read` handle onto a shared [`ChanPipe`].
#[derive(Clone, Debug)]
pub struct PipeReader(pub Arc<ChanPipe>);

impl io::Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.0.read(buf)?)
    }
}

/// `io::Write` handle onto a shared [`ChanPipe`].
#[derive(Clone, Debug)]
pub struct PipeWriter(pub Arc<ChanPipe>);

impl io::Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.0.write(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_write_then_read_in_order() {
        let pipe = ChanPipe::new(4);
        pipe.write_str("foo").unwrap();
        pipe.write_str("bar").unwrap();
        pipe.close();

        let mut out = String::new();
        PipeReader(Arc::new(pipe)).read_to_string(&mut out).unwrap();
        assert_eq!(out, "foobar");
    }

    #[test]
    fn test_write_after_close_fails() {
        let pipe = ChanPipe::default();
        pipe.close();
        assert_eq!(pipe.write_str("x"), Err(PipeError::ClosedPipe));

        let err = PipeWriter(Arc::new(pipe)).write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_close_is_idempotent_and_keeps_data() {
        let pipe = ChanPipe::default();
        pipe.write_str("left").unwrap();
        pipe.close();
        pipe.close();
        assert!(pipe.is_closed());

        let mut buf = [0u8; 16];
        assert_eq!(pipe.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"left");
        assert_eq!(pipe.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_short_reads_keep_remainder() {
        let pipe = ChanPipe::default();
        pipe.write_str("abcdef").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(pipe.read(&mut buf).unwrap(), 4);
        assert_eq!(pipe.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
    }

    #[test]
    fn test_read_until_across_chunks() {
        let pipe = ChanPipe::default();
        pipe.write_str("fo").unwrap();
        pipe.write_str("o\n$ ").unwrap();
        assert_eq!(pipe.read_string("foo\n").unwrap(), "foo\n");
        // the prompt stays buffered
        assert_eq!(pipe.read_string("$ ").unwrap(), "$ ");
    }

    #[test]
    fn test_read_until_unmatched_close() {
        let pipe = ChanPipe::default();
        pipe.write_str("partial").unwrap();
        pipe.close();
        assert_eq!(
            pipe.read_string("never"),
            Err(PipeError::UnmatchedClose("never".to_string()))
        );
    }

    #[test]
    fn test_close_unblocks_reader() {
        let pipe = ChanPipe::shared(2);
        let reader = {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || pipe.read_string("x"))
        };
        thread::sleep(Duration::from_millis(20));
        pipe.close();
        assert!(matches!(reader.join().unwrap(), Err(PipeError::UnmatchedClose(_))));
    }

    /// Run `f` on a thread and wait at most `secs` for it to finish.
    fn finishes_within<F>(secs: u64, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            f();
            let _ = done_tx.send(());
        });
        done_rx.recv_timeout(Duration::from_secs(secs)).is_ok()
    }

    #[test]
    fn test_close_from_another_thread_while_reader_parked() {
        let pipe = ChanPipe::shared(2);
        let (parked_tx, parked_rx) = std::sync::mpsc::channel();
        let reader = {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || {
                let _ = parked_tx.send(());
                let mut buf = [0u8; 8];
                pipe.read(&mut buf)
            })
        };
        parked_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));

        let closer = Arc::clone(&pipe);
        assert!(finishes_within(5, move || closer.close()), "close blocked");
        assert_eq!(reader.join().unwrap(), Ok(0));
        assert!(pipe.is_closed());
    }

    #[test]
    fn test_close_unblocks_full_writer() {
        let pipe = ChanPipe::shared(1);
        pipe.write_str("a").unwrap();
        let writer = {
            let pipe = Arc::clone(&pipe);
            thread::spawn(move || pipe.write_str("b"))
        };
        thread::sleep(Duration::from_millis(20));
        pipe.close();
        assert_eq!(writer.join().unwrap(), Err(PipeError::ClosedPipe));
    }

    #[test]
    fn test_backpressure_drains_without_deadlock() {
        let pipe = ChanPipe::shared(2);
        let producer = {
            let mut w = pipe.writer();
            thread::spawn(move || {
                for i in 0..100 {
                    writeln!(w, "line {}", i).unwrap();
                }
                w.0.close();
            })
        };

        let mut out = String::new();
        thread::sleep(Duration::from_millis(20));
        pipe.reader().read_to_string(&mut out).unwrap();
        producer.join().unwrap();
        assert_eq!(out.lines().count(), 100);
        assert_eq!(out.lines().last(), Some("line 99"));
    }
}
