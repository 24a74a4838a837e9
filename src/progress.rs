//! Progress bar drawing that shares stderr with the log output.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;

/// Bar advanced once per finished task; its length is set once enumeration is done
pub fn task_bar() -> ProgressBar {
    let progress = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} files ({eta})",
    ) {
        progress.set_style(style);
    }
    progress
}

/// [`MakeWriter`] that clears the bars of a [`MultiProgress`] while a log line
/// is written and redraws them afterwards
#[derive(Clone)]
pub struct ProgressWriter<M> {
    progress: MultiProgress,
    inner: M,
}

impl<M> ProgressWriter<M> {
    pub fn new(progress: MultiProgress, inner: M) -> Self {
        Self { progress, inner }
    }
}

impl<'a, M> MakeWriter<'a> for ProgressWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SuspendedWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendedWriter {
            progress: self.progress.clone(),
            inner: self.inner.make_writer(),
            buffer: Vec::new(),
        }
    }
}

/// Collects one log event and writes it in a single piece when dropped
pub struct SuspendedWriter<W: Write> {
    progress: MultiProgress,
    inner: W,
    buffer: Vec<u8>,
}

impl<W: Write> Write for SuspendedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<W: Write> Drop for SuspendedWriter<W> {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let Self {
            progress,
            inner,
            buffer,
        } = self;
        progress.suspend(|| {
            // Nowhere left to report a failed log write
            let _ = inner.write_all(buffer.as_slice());
            let _ = inner.flush();
        });
    }
}
