use super::{Sink, format_bytes};
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use woof_uploader::{ProgressInfo, UploadResult};

const BAR_TEMPLATE: &str = "[{bar:40.cyan/blue}] {msg} {percent}% ({bytes}/{total_bytes}, {bytes_per_sec})";

/// One line per result on the writer, plus a progress bar per file in flight
/// drawn on stderr.
pub struct TextSink<W> {
    writer: W,
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self::with_progress(writer, MultiProgress::new())
    }

    pub fn with_progress(writer: W, multi: MultiProgress) -> Self {
        Self { writer, multi, bars: HashMap::new() }
    }

    fn bar(&mut self, file_name: &str, total: u64) -> &ProgressBar {
        self.bars.entry(file_name.to_string()).or_insert_with(|| {
            let bar = self.multi.add(ProgressBar::new(total));
            bar.set_style(style());
            bar.set_message(file_name.to_string());
            bar
        })
    }

    fn end_bar(&mut self, file_name: &str) {
        if let Some(bar) = self.bars.remove(file_name) {
            bar.finish_and_clear();
        }
    }

    fn write_progress(&mut self, progress: &ProgressInfo) {
        let bar = self.bar(&progress.file_name, progress.total_bytes);
        bar.set_length(progress.total_bytes);
        bar.set_position(progress.bytes_uploaded.min(progress.total_bytes));
        if progress.bytes_uploaded >= progress.total_bytes {
            self.end_bar(&progress.file_name);
        }
    }
}

fn style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn write_result(writer: &mut impl Write, result: &UploadResult) -> std::io::Result<()> {
    match &result.error {
        Some(error) if result.file_name.is_empty() => writeln!(writer, "ERROR {}", &**error)?,
        Some(error) => writeln!(writer, "ERROR {}: {}", result.file_name, &**error)?,
        None => writeln!(
            writer,
            "SUCCESS {} ({}) -> {} [{:?} via {}]",
            result.file_name,
            format_bytes(result.size),
            result.url,
            round_to_millis(result.duration),
            result.provider,
        )?,
    }
    writer.flush()
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

impl<W: Write + Send> Sink for TextSink<W> {
    fn handle_result(&mut self, result: &UploadResult) -> Result<()> {
        self.end_bar(&result.file_name);
        let writer = &mut self.writer;
        self.multi.suspend(|| write_result(writer, result)).or_raise(|| ErrorKind::Output)
    }

    fn handle_progress(&mut self, progress: &ProgressInfo) -> Result<()> {
        self.write_progress(progress);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        self.multi.clear().or_raise(|| ErrorKind::Output)?;
        self.writer.flush().or_raise(|| ErrorKind::Output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::tests::{Shared, result};
    use indicatif::ProgressDrawTarget;
    use rstest::rstest;

    fn sink(out: &Shared) -> TextSink<Shared> {
        TextSink::with_progress(out.clone(), MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    #[test]
    fn test_success_line() {
        let out = Shared::default();
        sink(&out).handle_result(&result("a.txt", None)).unwrap();
        assert_eq!(out.contents(), "SUCCESS a.txt (1.5 KiB) -> https://host.example/a.txt [1.234s via GoFile]\n");
    }

    #[test]
    fn test_error_line() {
        let out = Shared::default();
        sink(&out).handle_result(&result("a.txt", Some("boom"))).unwrap();
        assert_eq!(out.contents(), "ERROR a.txt: upload task failed: boom\n");
    }

    #[test]
    fn test_error_without_file_name() {
        let out = Shared::default();
        sink(&out).handle_result(&result("", Some("boom"))).unwrap();
        assert_eq!(out.contents(), "ERROR upload task failed: boom\n");
    }

    #[rstest]
    #[case(0, 100, true)]
    #[case(50, 100, true)]
    #[case(100, 100, false)]
    #[case(0, 0, false)]
    fn test_bar_per_file(#[case] bytes: u64, #[case] total: u64, #[case] in_flight: bool) {
        let out = Shared::default();
        let mut sink = sink(&out);
        sink.handle_progress(&ProgressInfo::new("a.txt", bytes, total, Duration::from_secs(1))).unwrap();
        assert_eq!(sink.bars.contains_key("a.txt"), in_flight);
        if let Some(bar) = sink.bars.get("a.txt") {
            assert_eq!(bar.position(), bytes);
            assert_eq!(bar.length(), Some(total));
        }
        // Bars never touch the result stream.
        assert_eq!(out.contents(), "");
    }

    #[test]
    fn test_concurrent_files_get_their_own_bars() {
        let out = Shared::default();
        let mut sink = sink(&out);
        sink.handle_progress(&ProgressInfo::new("a.txt", 10, 100, Duration::from_secs(1))).unwrap();
        sink.handle_progress(&ProgressInfo::new("b.txt", 30, 300, Duration::from_secs(1))).unwrap();
        sink.handle_progress(&ProgressInfo::new("a.txt", 20, 100, Duration::from_secs(1))).unwrap();
        assert_eq!(sink.bars.len(), 2);
        assert_eq!(sink.bars["a.txt"].position(), 20);
        assert_eq!(sink.bars["b.txt"].position(), 30);
    }

    #[test]
    fn test_overshoot_is_clamped() {
        let out = Shared::default();
        let mut sink = sink(&out);
        let mut progress = ProgressInfo::new("a.txt", 10, 100, Duration::ZERO);
        progress.bytes_uploaded = 50;
        progress.total_bytes = 200;
        sink.handle_progress(&progress).unwrap();
        progress.bytes_uploaded = 150;
        progress.total_bytes = 100;
        sink.handle_progress(&progress).unwrap();
        assert!(sink.bars.is_empty());
    }

    #[test]
    fn test_result_ends_open_bar() {
        let out = Shared::default();
        let mut sink = sink(&out);
        sink.handle_progress(&ProgressInfo::new("b.txt", 10, 100, Duration::from_secs(1))).unwrap();
        sink.handle_progress(&ProgressInfo::new("c.txt", 10, 100, Duration::from_secs(1))).unwrap();
        sink.handle_result(&result("b.txt", None)).unwrap();
        assert!(!sink.bars.contains_key("b.txt"));
        assert!(sink.bars.contains_key("c.txt"));
        sink.close().unwrap();
        assert!(sink.bars.is_empty());
        assert!(out.contents().starts_with("SUCCESS b.txt"));
    }
}
