use crate::models::ProgressInfo;
use pin_project_lite::pin_project;
use std::io::{Result, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};
use tokio::time::Instant;

pin_project! {
    /// Reader adapter reporting cumulative progress after every read.
    ///
    /// Seeking moves the counter with the cursor, and a rewind to the start
    /// also restarts the clock used for the speed estimate, so a reader
    /// replayed for a retry reports the new attempt rather than the sum.
    pub struct ProgressReader<R, F> {
        #[pin]
        inner: R,
        file_name: String,
        position: u64,
        total: u64,
        started: Instant,
        report: F,
    }
}

impl<R, F> ProgressReader<R, F>
where
    F: FnMut(ProgressInfo),
{
    pub fn new(inner: R, file_name: impl Into<String>, total: u64, report: F) -> Self {
        Self {
            inner,
            file_name: file_name.into(),
            position: 0,
            total,
            started: Instant::now(),
            report,
        }
    }

    /// Bytes read so far in the current attempt.
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<R, F> AsyncRead for ProgressReader<R, F>
where
    R: AsyncRead,
    F: FnMut(ProgressInfo),
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        ready!(this.inner.poll_read(cx, buf))?;
        *this.position += (buf.filled().len() - before) as u64;
        (this.report)(ProgressInfo::new(this.file_name.as_str(), *this.position, *this.total, this.started.elapsed()));
        Poll::Ready(Ok(()))
    }
}

impl<R, F> AsyncSeek for ProgressReader<R, F>
where
    R: AsyncSeek,
    F: FnMut(ProgressInfo),
{
    fn start_seek(self: Pin<&mut Self>, position: SeekFrom) -> Result<()> {
        self.project().inner.start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<u64>> {
        let this = self.project();
        let position = ready!(this.inner.poll_complete(cx))?;
        if position == 0 {
            *this.started = Instant::now();
        }
        *this.position = position;
        Poll::Ready(Ok(position))
    }
}
