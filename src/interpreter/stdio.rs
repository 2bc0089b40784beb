//! Standard Streams
//!
//! Shared, cloneable handles for a runner's stdin/stdout/stderr. Several
//! execution units (pipeline stages, background jobs, copier threads of an
//! external command) may hold the same stream at once; each write is applied
//! under the stream's lock so chunks never interleave mid-write.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Cloneable output stream.
#[derive(Clone)]
pub struct OutStream(SharedWriter);

impl OutStream {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self(Arc::new(Mutex::new(Box::new(writer))))
    }

    /// Stream that discards everything.
    pub fn sink() -> Self {
        Self::new(io::sink())
    }

    pub fn write_str(&self, s: &str) -> io::Result<()> {
        let mut w = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        w.write_all(s.as_bytes())?;
        w.flush()
    }
}

impl Write for OutStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).flush()
    }
}

impl std::fmt::Debug for OutStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OutStream")
    }
}

struct InInner {
    /// Bytes handed back with [`InStream::unread`], served first
    pending: Vec<u8>,
    reader: Box<dyn Read + Send>,
}

/// Cloneable input stream.
#[derive(Clone)]
pub struct InStream(Arc<Mutex<InInner>>);

impl InStream {
    pub fn new<R: Read + Send + 'static>(reader: R) -> Self {
        Self(Arc::new(Mutex::new(InInner {
            pending: Vec::new(),
            reader: Box::new(reader),
        })))
    }

    /// Put `bytes` back in front of the stream for the next reader.
    pub fn unread(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut inner = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        inner.pending.splice(0..0, bytes.iter().copied());
    }
}

impl Read for InStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.pending.is_empty() {
            return inner.reader.read(buf);
        }
        let n = buf.len().min(inner.pending.len());
        buf[..n].copy_from_slice(&inner.pending[..n]);
        inner.pending.drain(..n);
        Ok(n)
    }
}

impl std::fmt::Debug for InStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InStream")
    }
}

/// In-memory sink used to capture output (command substitution, `Shell::exec`).
#[derive(Clone, Default, Debug)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The three standard streams of a runner.
///
/// `stdin` is `None` unless a pipeline or `<` redirection provides one, so
/// commands never consume input meant for the interactive session itself.
#[derive(Clone, Debug)]
pub struct Stdio {
    pub stdin: Option<InStream>,
    pub stdout: OutStream,
    pub stderr: OutStream,
}

impl Default for Stdio {
    fn default() -> Self {
        Self {
            stdin: None,
            stdout: OutStream::new(io::stdout()),
            stderr: OutStream::new(io::stderr()),
        }
    }
}

impl Stdio {
    pub fn new(stdin: Option<InStream>, stdout: OutStream, stderr: OutStream) -> Self {
        Self { stdin, stdout, stderr }
    }

    /// Streams that read nothing and discard all output.
    pub fn null() -> Self {
        Self::new(None, OutStream::sink(), OutStream::sink())
    }
}
