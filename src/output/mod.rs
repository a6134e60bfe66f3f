//! Rendering of results and progress.

mod json;
mod text;

pub use self::json::JsonSink;
pub use self::text::TextSink;
use crate::error::Result;
use std::io::Write;
use tokio::sync::mpsc::Receiver;
use woof_uploader::{OutputFormat, ProgressInfo, UploadResult};

/// Destination for everything a run reports.
pub trait Sink: Send {
    fn handle_result(&mut self, result: &UploadResult) -> Result<()>;
    fn handle_progress(&mut self, progress: &ProgressInfo) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

pub fn sink<W: Write + Send + 'static>(format: OutputFormat, writer: W) -> Box<dyn Sink> {
    match format {
        OutputFormat::Text => Box::new(TextSink::new(writer)),
        OutputFormat::Json => Box::new(JsonSink::new(writer)),
    }
}

/// Tally of the results seen by [`drain`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// Feed both channels into `sink` until the result channel closes.
///
/// Progress is only forwarded when `show_progress` is set; otherwise it is
/// left in the channel for the engine to drop.
pub async fn drain(
    mut results: Receiver<UploadResult>,
    mut progress: Receiver<ProgressInfo>,
    sink: &mut dyn Sink,
    show_progress: bool,
) -> Result<Summary> {
    let mut summary = Summary::default();
    loop {
        tokio::select! {
            result = results.recv() => match result {
                Some(result) => {
                    if result.is_success() {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                    }
                    sink.handle_result(&result)?;
                },
                None => break,
            },
            Some(snapshot) = progress.recv(), if show_progress => sink.handle_progress(&snapshot)?,
        }
    }
    sink.close()?;
    Ok(summary)
}

/// `1023 B`, `1.5 KiB`, `2.0 GiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut divisor = UNIT;
    let mut exponent = 0;
    while bytes / divisor >= UNIT && exponent < 5 {
        divisor *= UNIT;
        exponent += 1;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exponent];
    format!("{:.1} {prefix}iB", bytes as f64 / divisor as f64)
}
