//! Progress bars and log routing.
//!
//! Log lines are routed through the shared [`MultiProgress`] so tracing
//! output prints above any pinned bars instead of tearing them.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static MULTI: OnceLock<MultiProgress> = OnceLock::new();

fn multi() -> &'static MultiProgress {
    MULTI.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Create a pinned counting bar with the standard archivist style.
/// Returns `None` for a zero-length total so callers can skip no-op passes.
pub fn counting_bar(len: u64, message: &str) -> Option<ProgressBar> {
    if len == 0 {
        return None;
    }
    let pb = multi().add(ProgressBar::new(len));
    pb.set_style(
        ProgressStyle::with_template("{msg} [{bar:30.cyan/blue}] {pos}/{len} ({percent}%)")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

pub fn tick(pb: &Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.inc(1);
    }
}

pub fn finish(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.finish_with_message(message.to_string());
    }
}

/// `MakeWriter` factory handing tracing a writer that prints above the bars
#[derive(Default, Clone)]
pub struct BarSafeWriterFactory;

pub struct BarSafeWriter {
    pending: Vec<u8>,
}

impl BarSafeWriter {
    fn emit_line(&self, line: &str) {
        let line = line.trim_end_matches('\r');
        let _ = multi().println(line.to_string());
    }
}

impl Write for BarSafeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        while let Some(idx) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=idx).collect();
            self.emit_line(&String::from_utf8_lossy(&line[..line.len() - 1]));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.emit_line(&String::from_utf8_lossy(&rest));
        }
        Ok(())
    }
}

impl Drop for BarSafeWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for BarSafeWriterFactory {
    type Writer = BarSafeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        BarSafeWriter { pending: Vec::new() }
    }
}
