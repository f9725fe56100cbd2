use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared handle to an output target. Check bodies only ever hold one of
/// these, never the buffer that backs it.
pub type OutputSink = Arc<Mutex<dyn Write + Send>>;

/// Append-only in-memory byte sink.
///
/// One instance backs the run-wide transcript; a fresh instance is scoped
/// to each check, so a worker abandoned by a timeout can keep writing
/// without touching anything a later check will read.
#[derive(Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated text, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Appends raw text without a trailing newline.
    pub fn append(&self, text: &str) {
        self.lock().extend_from_slice(text.as_bytes());
    }

    /// Appends one line of text.
    pub fn append_line(&self, line: &str) {
        let mut bytes = self.lock();
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
    }

    /// A `Write` handle into this buffer, suitable as an [`OutputSink`].
    pub fn sink(&self) -> OutputSink {
        Arc::new(Mutex::new(CaptureSink {
            bytes: Arc::clone(&self.bytes),
        }))
    }

    // A check body panicking mid-write poisons the lock; the bytes behind
    // it are still intact.
    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct CaptureSink {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Write for CaptureSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The swappable output target of one check context.
///
/// `redirect` swaps the target and hands back a token recording the prior
/// one; `restore` puts the prior target back unconditionally, even if the
/// check body has swapped targets itself in the meantime.
pub struct OutputSlot {
    current: Mutex<OutputSink>,
}

/// Records the output target that was active before a `redirect`.
pub struct RedirectToken {
    prior: OutputSink,
}

impl OutputSlot {
    pub fn new(initial: OutputSink) -> Self {
        Self {
            current: Mutex::new(initial),
        }
    }

    /// Swaps the current target for `sink` and returns a token holding the
    /// one it replaced.
    pub fn redirect(&self, sink: OutputSink) -> RedirectToken {
        let mut current = self.lock();
        let prior = std::mem::replace(&mut *current, sink);
        RedirectToken { prior }
    }

    /// Replaces the current target without recording the prior one. This is
    /// what a check body uses to inspect its own printed output.
    pub fn set(&self, sink: OutputSink) {
        *self.lock() = sink;
    }

    /// Restores the target recorded in `token`, regardless of what the
    /// current target is.
    pub fn restore(&self, token: RedirectToken) {
        *self.lock() = token.prior;
    }

    /// The currently active target.
    pub fn target(&self) -> OutputSink {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, OutputSink> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The process's real standard output, as an [`OutputSink`].
pub fn console_sink() -> OutputSink {
    Arc::new(Mutex::new(io::stdout()))
}
