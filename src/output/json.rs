use super::Sink;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use woof_uploader::{ProgressInfo, UploadResult};

/// Newline-delimited JSON: one object per result or progress snapshot,
/// distinguished by `type`.
pub struct JsonSink<W> {
    writer: W,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Result(ResultRecord<'a>),
    Progress(&'a ProgressInfo),
}

#[derive(Serialize)]
struct ResultRecord<'a> {
    file_name: &'a str,
    file_path: &'a Path,
    size: u64,
    success: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    url: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    provider: &'a str,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    completed_at: Option<String>,
}

impl<'a> From<&'a UploadResult> for ResultRecord<'a> {
    fn from(result: &'a UploadResult) -> Self {
        Self {
            file_name: &result.file_name,
            file_path: &result.file_path,
            size: result.size,
            success: result.is_success(),
            url: &result.url,
            provider: &result.provider,
            duration_ms: u64::try_from(result.duration.as_millis()).unwrap_or(u64::MAX),
            error: result.error.as_ref().map(|error| (**error).to_string()),
            completed_at: result.completed_at.format(&Rfc3339).ok(),
        }
    }
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    fn write(&mut self, record: &Record<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record).or_raise(|| ErrorKind::Output)?;
        writeln!(self.writer).or_raise(|| ErrorKind::Output)?;
        self.writer.flush().or_raise(|| ErrorKind::Output)
    }
}

impl<W: Write + Send> Sink for JsonSink<W> {
    fn handle_result(&mut self, result: &UploadResult) -> Result<()> {
        self.write(&Record::Result(result.into()))
    }

    fn handle_progress(&mut self, progress: &ProgressInfo) -> Result<()> {
        self.write(&Record::Progress(progress))
    }

    fn close(&mut self) -> Result<()> {
        self.writer.flush().or_raise(|| ErrorKind::Output)
    }
}
