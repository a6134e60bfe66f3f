//! Bounded-concurrency upload scheduling with per-file provider fallback.

use crate::error::{Error, ErrorKind, Result};
use crate::models::{FileDescriptor, ProgressInfo, UploadConfig, UploadResult};
use crate::observer::{ObserverHandle, TracingObserver, UploadEvent};
use crate::progress::ProgressReader;
use crate::scan::scan;
use futures::StreamExt;
use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncSeekExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use woof_provider::ProviderHandle;

/// Result slots per unit of concurrency.
const RESULT_BUFFER_FACTOR: usize = 2;
/// Progress snapshots buffered before new ones are dropped.
const PROGRESS_BUFFER: usize = 100;

/// Receiving ends of a run: one result per file, plus lossy progress.
pub type Channels = (mpsc::Receiver<UploadResult>, mpsc::Receiver<ProgressInfo>);

/// The upload engine.
///
/// Every call to [`upload`](Self::upload) starts an independent run; the
/// engine itself holds nothing but its observer.
#[derive(Clone)]
pub struct Uploader {
    observer: ObserverHandle,
}

impl Default for Uploader {
    fn default() -> Self {
        Self::new()
    }
}

impl Uploader {
    pub fn new() -> Self {
        Self { observer: Arc::new(TracingObserver) }
    }

    /// Replace the default [`TracingObserver`].
    pub fn with_observer(mut self, observer: ObserverHandle) -> Self {
        self.observer = observer;
        self
    }

    /// Scan `paths` and upload every file found, at most
    /// `config.concurrency` at a time.
    ///
    /// Providers are tried in `config.providers` order for each file until
    /// one succeeds. Exactly one [`UploadResult`] is sent per file (scan
    /// errors get a result of their own, without a file name); progress is
    /// best effort. Both channels close once the scan is exhausted and every
    /// upload has finished, or soon after `cancel` fires. Cancelled uploads
    /// produce no result.
    ///
    /// The only immediate error is an empty provider list.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn upload(&self, cancel: &CancellationToken, paths: Vec<PathBuf>, config: &UploadConfig) -> Result<Channels> {
        if config.providers.is_empty() {
            exn::bail!(ErrorKind::NoProviders);
        }
        let concurrency = config.concurrency.clamp(1, Semaphore::MAX_PERMITS);
        if concurrency != config.concurrency {
            self.observer.observe(&UploadEvent::ConcurrencyClamped { requested: config.concurrency, effective: concurrency });
        }
        self.observer.observe(&UploadEvent::RunStarted {
            inputs: paths.len(),
            providers: config.providers.len(),
            concurrency,
        });

        let result_buffer = concurrency.saturating_mul(RESULT_BUFFER_FACTOR).min(Semaphore::MAX_PERMITS);
        let (results, result_rx) = mpsc::channel(result_buffer);
        let (progress, progress_rx) = mpsc::channel(PROGRESS_BUFFER);
        let run = Arc::new(Run {
            providers: config.providers.clone(),
            observer: self.observer.clone(),
            cancel: cancel.child_token(),
            results,
            progress,
        });
        tokio::spawn(run.dispatch(paths, concurrency));
        Ok((result_rx, progress_rx))
    }
}

/// State shared by the dispatcher and every upload task of one run. The
/// channels close when the last reference is dropped.
struct Run {
    providers: Vec<ProviderHandle>,
    observer: ObserverHandle,
    /// Child of the caller's token; also cancelled when a task crashes.
    cancel: CancellationToken,
    results: mpsc::Sender<UploadResult>,
    progress: mpsc::Sender<ProgressInfo>,
}

impl Run {
    async fn dispatch(self: Arc<Self>, paths: Vec<PathBuf>, concurrency: usize) {
        let gate = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        let mut crashed = None;
        let mut scheduled = 0usize;
        let mut files = std::pin::pin!(scan(paths, self.cancel.clone()));

        loop {
            let item = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(joined) = tasks.join_next() => {
                    self.reap(joined, &mut crashed);
                    continue;
                },
                item = files.next() => item,
            };
            let Some(item) = item else { break };
            let file = match item {
                Ok(file) => file,
                Err(error) => {
                    let message = error.to_string();
                    let error = error.raise(ErrorKind::Scan(message));
                    self.observer.observe(&UploadEvent::ScanFailed { error: &error });
                    self.deliver(UploadResult::orphan(error)).await;
                    continue;
                },
            };
            if file.is_dir {
                continue;
            }
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = gate.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            scheduled += 1;
            self.observer.observe(&UploadEvent::FileScheduled { path: &file.path, size: file.size });
            tasks.spawn(self.clone().upload_file(file, permit));
        }

        while let Some(joined) = tasks.join_next().await {
            self.reap(joined, &mut crashed);
        }
        if let Some(error) = crashed {
            self.observer.observe(&UploadEvent::TaskCrashed { error: &error });
            // The group is already cancelled, so this one bypasses `deliver`.
            let _ = self.results.send(UploadResult::orphan(error)).await;
        }
        self.observer.observe(&UploadEvent::RunFinished { scheduled, cancelled: self.cancel.is_cancelled() });
    }

    /// A crashed task takes the whole run down; only the first crash is kept.
    fn reap(&self, joined: std::result::Result<(), JoinError>, crashed: &mut Option<Error>) {
        let Err(error) = joined else { return };
        if error.is_cancelled() || crashed.is_some() {
            return;
        }
        self.cancel.cancel();
        *crashed = Some(Error::from(ErrorKind::TaskFailed(error.to_string())));
    }

    async fn upload_file(self: Arc<Self>, file: FileDescriptor, _permit: OwnedSemaphorePermit) {
        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            outcome = self.try_providers(&file) => outcome,
        };
        let result = match outcome {
            Some(Ok((provider, url))) => {
                self.observer.observe(&UploadEvent::FileUploaded { path: &file.path, provider: &provider, url: &url });
                UploadResult::success(&file, &provider, url, started.elapsed())
            },
            Some(Err(error)) => {
                self.observer.observe(&UploadEvent::FileFailed { path: &file.path, error: &error });
                UploadResult::failure(&file, error, started.elapsed())
            },
            None => return,
        };
        self.deliver(result).await;
    }

    /// Each provider in turn, against the same rewound file. Returns the
    /// winning provider's name and URL, or `None` once cancelled.
    async fn try_providers(&self, file: &FileDescriptor) -> Option<Result<(String, String)>> {
        let mut source = match File::open(&file.path).await {
            Ok(source) => source,
            Err(e) => return Some(Err(Error::from(ErrorKind::from_io(e, &file.path)))),
        };
        let mut last = None;
        for provider in &self.providers {
            if self.cancel.is_cancelled() {
                return None;
            }
            if let Err(e) = source.seek(SeekFrom::Start(0)).await {
                return Some(Err(Error::from(ErrorKind::from_io(e, &file.path))));
            }
            let progress = self.progress.clone();
            let mut body = ProgressReader::new(&mut source, file.name.as_str(), file.size, move |info| {
                // Never wait on a slow consumer.
                let _ = progress.try_send(info);
            });
            match provider.upload(&self.cancel, &file.path, &mut body, file.size).await {
                Ok(response) => return Some(Ok((provider.name().to_string(), response.url))),
                Err(error) => {
                    self.observer.observe(&UploadEvent::ProviderFailed {
                        path: &file.path,
                        provider: provider.name(),
                        error: &error,
                    });
                    last = Some(error);
                },
            }
        }
        let error = last?;
        let summary = ErrorKind::AllProvidersFailed { count: self.providers.len(), last: error.to_string() };
        Some(Err(error.raise(summary)))
    }

    async fn deliver(&self, result: UploadResult) {
        tokio::select! {
            _ = self.cancel.cancelled() => {},
            _ = self.results.send(result) => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use woof_provider::error::ProviderError;
    use woof_provider::provider::{MockBehaviour, MockProvider};
    use woof_provider::{ConsistencyWrapper, Provider, ProviderResponse, UploadBody, WrapperConfig};

    fn uploader() -> Uploader {
        Uploader::new().with_observer(Arc::new(NoopObserver))
    }

    fn config(concurrency: usize, providers: Vec<ProviderHandle>) -> UploadConfig {
        UploadConfig { concurrency, providers, ..UploadConfig::default() }
    }

    fn wrapped(mock: &Arc<MockProvider>, max_retries: u32) -> ProviderHandle {
        let config = WrapperConfig { max_retries, retry_delay: Duration::from_millis(1), ..WrapperConfig::default() };
        Arc::new(ConsistencyWrapper::new(mock.clone(), config).with_observer(Arc::new(woof_provider::observer::NoopObserver)))
    }

    fn write_files(dir: &Path, names: &[&str], size: usize) {
        for name in names {
            let path = dir.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, vec![b'x'; size]).unwrap();
        }
    }

    async fn drain(channels: Channels) -> (Vec<UploadResult>, Vec<ProgressInfo>) {
        let (mut results, mut progress) = channels;
        let mut collected = Vec::new();
        while let Some(result) = results.recv().await {
            collected.push(result);
        }
        let mut snapshots = Vec::new();
        while let Some(info) = progress.recv().await {
            snapshots.push(info);
        }
        (collected, snapshots)
    }

    #[tokio::test]
    async fn test_single_file_single_provider() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["report.pdf"], 10 * 1024 * 1024);
        let mock = Arc::new(MockProvider::succeeding("host", "https://host/abc"));

        let channels = uploader()
            .upload(&CancellationToken::new(), vec![dir.path().join("report.pdf")], &config(5, vec![wrapped(&mock, 3)]))
            .unwrap();
        let (results, progress) = drain(channels).await;

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.is_success());
        assert_eq!(result.url, "https://host/abc");
        assert_eq!(result.provider, "host");
        assert_eq!(result.file_name, "report.pdf");
        assert_eq!(result.size, 10_485_760);
        assert!(!progress.is_empty());
        assert_eq!(mock.bodies()[0].len(), 10_485_760);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_provider() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["a.txt"], 64);
        let first = Arc::new(MockProvider::failing("first", ProviderError::api("quota-exceeded-code", "over quota")));
        let second = Arc::new(MockProvider::succeeding("second", "https://second/a"));

        let providers = vec![wrapped(&first, 3), wrapped(&second, 3)];
        let channels = uploader().upload(&CancellationToken::new(), vec![dir.path().to_path_buf()], &config(2, providers));
        let (results, _) = drain(channels.unwrap()).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].provider, "second");
        assert_eq!(results[0].url, "https://second/a");
        assert_eq!(first.calls(), 1);
        // The second provider got the whole file, not what the first left behind.
        assert_eq!(second.bodies(), [vec![b'x'; 64]]);
    }

    #[tokio::test]
    async fn test_all_providers_failed() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["a.txt"], 8);
        let mock = Arc::new(MockProvider::failing("host", ProviderError::network("connection refused")));

        let channels = uploader().upload(&CancellationToken::new(), vec![dir.path().join("a.txt")], &config(1, vec![wrapped(&mock, 2)]));
        let (results, _) = drain(channels.unwrap()).await;

        assert_eq!(mock.calls(), 3);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(!result.is_success());
        assert!(result.url.is_empty() && result.provider.is_empty());
        let error = result.error.as_ref().unwrap();
        assert!(matches!(&**error, ErrorKind::AllProvidersFailed { count: 1, .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_mid_run() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..100).map(|i| format!("file-{i:03}.txt")).collect();
        write_files(dir.path(), &names.iter().map(String::as_str).collect::<Vec<_>>(), 16);
        let mock = Arc::new(MockProvider::succeeding("host", "https://host/x").with_delay(Duration::from_millis(20)));
        let providers: Vec<ProviderHandle> = vec![mock.clone()];

        let cancel = CancellationToken::new();
        let (mut results, progress) =
            uploader().upload(&cancel, vec![dir.path().to_path_buf()], &config(5, providers)).unwrap();
        let first = results.recv().await;
        assert!(first.is_some());
        cancel.cancel();

        let (rest, _) = tokio::time::timeout(Duration::from_secs(10), drain((results, progress))).await.unwrap();
        assert!(rest.len() + 1 <= 100);
        assert!(mock.calls() < 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_gate_bounds_concurrency() {
        for (concurrency, files) in [(1, 3), (3, 9)] {
            let dir = tempfile::tempdir().unwrap();
            let names: Vec<String> = (0..files).map(|i| format!("{i}.bin")).collect();
            write_files(dir.path(), &names.iter().map(String::as_str).collect::<Vec<_>>(), 4);
            let mock = Arc::new(MockProvider::succeeding("host", "https://host/x").with_delay(Duration::from_millis(15)));
            let providers: Vec<ProviderHandle> = vec![mock.clone()];

            let channels = uploader().upload(&CancellationToken::new(), vec![dir.path().to_path_buf()], &config(concurrency, providers));
            let (results, _) = drain(channels.unwrap()).await;

            assert_eq!(results.len(), files);
            assert!(results.iter().all(UploadResult::is_success));
            assert!(mock.peak_concurrency() <= concurrency);
            assert!(mock.peak_concurrency() >= 1);
        }
    }

    #[tokio::test]
    async fn test_directories_never_scheduled() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["a/one.txt", "a/b/two.txt", "three.txt"], 3);
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        let mock = Arc::new(MockProvider::succeeding("host", "https://host/x"));
        let providers: Vec<ProviderHandle> = vec![mock.clone()];

        let channels = uploader().upload(&CancellationToken::new(), vec![dir.path().to_path_buf()], &config(4, providers));
        let (results, _) = drain(channels.unwrap()).await;

        let mut names: Vec<&str> = results.iter().map(|r| r.file_name.as_str()).collect();
        names.sort();
        assert_eq!(names, ["one.txt", "three.txt", "two.txt"]);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_scan_errors_become_results() {
        let dir: TempDir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["real.txt"], 3);
        let mock = Arc::new(MockProvider::succeeding("host", "https://host/x"));
        let providers: Vec<ProviderHandle> = vec![mock.clone()];
        let paths = vec![dir.path().join("missing.txt"), dir.path().join("real.txt")];

        let (results, _) = drain(uploader().upload(&CancellationToken::new(), paths, &config(1, providers)).unwrap()).await;

        assert_eq!(results.len(), 2);
        let orphan = results.iter().find(|r| r.file_name.is_empty()).unwrap();
        assert!(matches!(&**orphan.error.as_ref().unwrap(), ErrorKind::Scan(_)));
        assert!(results.iter().any(|r| r.file_name == "real.txt" && r.is_success()));
    }

    #[tokio::test]
    async fn test_zero_size_file_reports_complete() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["empty.txt"], 0);
        let mock = Arc::new(MockProvider::succeeding("host", "https://host/e"));
        let providers: Vec<ProviderHandle> = vec![mock.clone()];

        let channels = uploader().upload(&CancellationToken::new(), vec![dir.path().join("empty.txt")], &config(1, providers));
        let (results, progress) = drain(channels.unwrap()).await;

        assert!(results[0].is_success());
        assert_eq!(results[0].size, 0);
        assert!(!progress.is_empty());
        assert!(progress.iter().all(|info| info.percentage == 100.0));
    }

    #[test]
    fn test_no_providers_is_an_error() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let _guard = runtime.enter();
        let err = uploader().upload(&CancellationToken::new(), vec![], &config(1, vec![])).unwrap_err();
        assert!(matches!(*err, ErrorKind::NoProviders));
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["a.txt", "b.txt"], 1);
        let mock = Arc::new(MockProvider::succeeding("host", "https://host/x"));
        let providers: Vec<ProviderHandle> = vec![mock.clone()];

        let channels = uploader().upload(&CancellationToken::new(), vec![dir.path().to_path_buf()], &config(0, providers));
        let (results, _) = drain(channels.unwrap()).await;
        assert_eq!(results.len(), 2);
        assert_eq!(mock.peak_concurrency(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["a.txt"], 1);
        let mock = Arc::new(MockProvider::succeeding("host", "https://host/x"));
        let providers: Vec<ProviderHandle> = vec![mock.clone()];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let (results, _) = drain(uploader().upload(&cancel, vec![dir.path().to_path_buf()], &config(1, providers)).unwrap()).await;
        assert!(results.is_empty());
        assert_eq!(mock.calls(), 0);
    }

    struct Explosive;

    #[async_trait::async_trait]
    impl Provider for Explosive {
        fn name(&self) -> &str {
            "explosive"
        }

        async fn upload(
            &self,
            _cancel: &CancellationToken,
            _path: &Path,
            _body: &mut dyn UploadBody,
            _size: u64,
        ) -> woof_provider::error::Result<ProviderResponse> {
            panic!("provider blew up");
        }
    }

    #[tokio::test]
    async fn test_crashed_task_yields_one_result() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["a.txt"], 1);
        let providers: Vec<ProviderHandle> = vec![Arc::new(Explosive)];

        let channels = uploader().upload(&CancellationToken::new(), vec![dir.path().join("a.txt")], &config(1, providers));
        let (results, _) = drain(channels.unwrap()).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(&**results[0].error.as_ref().unwrap(), ErrorKind::TaskFailed(_)));
    }

    #[tokio::test]
    async fn test_behaviours_scripted_per_call() {
        let dir = tempfile::tempdir().unwrap();
        write_files(dir.path(), &["a.txt"], 2);
        let mock = Arc::new(
            MockProvider::succeeding("host", "https://host/late")
                .with_script([MockBehaviour::Fail(ProviderError::temporary("busy"))]),
        );
        let channels = uploader().upload(&CancellationToken::new(), vec![dir.path().join("a.txt")], &config(1, vec![wrapped(&mock, 1)]));
        let (results, _) = drain(channels.unwrap()).await;
        assert_eq!(results[0].url, "https://host/late");
        assert_eq!(mock.calls(), 2);
    }
}
