//! The `upload` command.

use crate::cli::UploadArgs;
use crate::config::Config;
use crate::error::{ErrorKind, Result};
use crate::output::{self, Summary};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use woof_hosts::Factory;
use woof_provider::ProviderHandle;
use woof_uploader::{UploadConfig, Uploader};

/// Expand glob patterns among the `--file` arguments. Plain paths pass through
/// untouched so that a missing file is reported as such.
pub fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::with_capacity(patterns.len());
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            files.push(PathBuf::from(pattern));
            continue;
        }
        let before = files.len();
        for entry in glob::glob(pattern).or_raise(|| ErrorKind::InvalidPattern(pattern.clone()))? {
            match entry {
                Ok(path) => files.push(path),
                Err(error) => tracing::warn!(path = %error.path().display(), %error, "Unreadable glob match"),
            }
        }
        if files.len() == before {
            tracing::warn!(pattern, "Glob pattern matched nothing");
        }
    }
    Ok(files)
}

/// `--file` paths must be files and `--folder` paths directories.
pub fn validate_paths(files: &[PathBuf], folders: &[PathBuf]) -> Result<()> {
    for file in files {
        let metadata = std::fs::metadata(file).or_raise(|| missing_or(file, ErrorKind::FileNotFound))?;
        if metadata.is_dir() {
            exn::bail!(ErrorKind::NotAFile(file.clone()));
        }
        tracing::debug!(path = %file.display(), "File validated");
    }
    for folder in folders {
        let metadata = std::fs::metadata(folder).or_raise(|| missing_or(folder, ErrorKind::DirectoryNotFound))?;
        if !metadata.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(folder.clone()));
        }
        tracing::debug!(path = %folder.display(), "Folder validated");
    }
    Ok(())
}

fn missing_or(path: &Path, missing: fn(PathBuf) -> ErrorKind) -> ErrorKind {
    if path.exists() { ErrorKind::PathCheck(path.to_path_buf()) } else { missing(path.to_path_buf()) }
}

/// Which providers a run uses: `--all`, then `--providers`, then whatever the
/// configuration enables.
pub fn select_providers(args: &UploadArgs, config: &Config, factory: &Factory) -> Result<Vec<ProviderHandle>> {
    let configs = config.provider_configs();
    let (mode, providers) = if args.all {
        ("all", factory.create_all())
    } else if !args.providers.is_empty() {
        ("named", factory.create_named(args.providers.as_slice(), &configs))
    } else {
        ("enabled", factory.create_enabled(&configs))
    };
    let providers = providers.or_raise(|| ErrorKind::Providers)?;
    let names: Vec<&str> = providers.iter().map(|provider| provider.name()).collect();
    tracing::debug!(mode, ?names, "Providers selected");
    if providers.is_empty() {
        exn::bail!(ErrorKind::NoProviders(no_providers_help()));
    }
    Ok(providers)
}

fn no_providers_help() -> String {
    [
        "no providers available. Options:",
        "  1. Use --all to try all available providers",
        "  2. Specify providers with --providers/-p",
        "  3. Enable providers in a config file passed with --config",
        "",
        "Example:",
        "  woof upload --all -f file.txt",
        "  woof upload --providers buzzheavier -d ./folder",
    ]
    .join("\n")
}

pub async fn run(args: UploadArgs, config: Config, cancel: &CancellationToken) -> Result<Summary> {
    if args.files.is_empty() && args.folders.is_empty() {
        exn::bail!(ErrorKind::NoInput);
    }
    tracing::debug!(files = args.files.len(), folders = args.folders.len(), "Processing flags");
    let files = expand_patterns(&args.files)?;
    validate_paths(&files, &args.folders)?;

    let mut upload_config = UploadConfig {
        concurrency: usize::try_from(config.concurrency).unwrap_or(0),
        output: config.output,
        verbose: config.verbose,
        retry_attempts: config.upload.retry_attempts,
        retry_delay: config.upload.retry_delay,
        ..UploadConfig::default()
    };
    let mut factory = Factory::new(upload_config.wrapper_config());
    let mut uploader = Uploader::new();
    if !config.verbose {
        factory = factory.with_observer(Arc::new(woof_provider::observer::NoopObserver));
        uploader = uploader.with_observer(Arc::new(woof_uploader::observer::NoopObserver));
    }
    upload_config.providers = select_providers(&args, &config, &factory)?;

    let paths: Vec<PathBuf> = files.into_iter().chain(args.folders).collect();
    let (results, progress) = uploader.upload(cancel, paths, &upload_config).or_raise(|| ErrorKind::Upload)?;
    let mut sink = output::sink(config.output, std::io::stdout());
    let summary = output::drain(results, progress, sink.as_mut(), !args.no_progress).await?;
    tracing::info!(total = summary.total(), succeeded = summary.succeeded, failed = summary.failed, "Upload finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> UploadArgs {
        let cli = Cli::try_parse_from(["woof", "upload"].into_iter().chain(extra.iter().copied())).unwrap();
        match cli.command {
            Command::Upload(args) => args,
            Command::Version => unreachable!(),
        }
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.log"), "a").unwrap();
        fs::write(dir.path().join("b.log"), "b").unwrap();
        fs::write(dir.path().join("c.txt"), "c").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        dir
    }

    #[test]
    fn test_expand_patterns() {
        let dir = fixture();
        let pattern = format!("{}/*.log", dir.path().display());
        let plain = dir.path().join("c.txt").display().to_string();
        let missing = format!("{}/*.nothing", dir.path().display());
        let mut files = expand_patterns(&[pattern, plain.clone(), missing]).unwrap();
        files.sort();
        assert_eq!(files, [dir.path().join("a.log"), dir.path().join("b.log"), PathBuf::from(plain)]);
    }

    #[test]
    fn test_expand_keeps_missing_plain_path() {
        let files = expand_patterns(&["does/not/exist.txt".to_string()]).unwrap();
        assert_eq!(files, [PathBuf::from("does/not/exist.txt")]);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = expand_patterns(&["[".to_string()]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPattern(pattern) if pattern == "["));
    }

    #[test]
    fn test_validate_paths() {
        let dir = fixture();
        let file = dir.path().join("a.log");
        let folder = dir.path().join("sub");
        validate_paths(&[file.clone()], &[folder.clone()]).unwrap();

        let err = validate_paths(&[folder.clone()], &[]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAFile(_)));
        let err = validate_paths(&[], &[file]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotADirectory(_)));
        let err = validate_paths(&[dir.path().join("nope")], &[]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::FileNotFound(_)));
        let err = validate_paths(&[], &[dir.path().join("nope")]).unwrap_err();
        assert!(matches!(&*err, ErrorKind::DirectoryNotFound(_)));
    }

    #[test]
    fn test_select_providers() {
        let factory = Factory::new(Default::default());
        let config = Config::default();

        let names = |providers: Vec<ProviderHandle>| -> Vec<String> {
            providers.iter().map(|provider| provider.name().to_string()).collect()
        };
        let all = select_providers(&args(&["--all"]), &config, &factory).unwrap();
        assert_eq!(names(all), ["BuzzHeavier", "GoFile"]);
        let named = select_providers(&args(&["-p", "gofile"]), &config, &factory).unwrap();
        assert_eq!(names(named), ["GoFile"]);

        let Err(err) = select_providers(&args(&["-p", "dropbox"]), &config, &factory) else {
            panic!("unknown provider accepted");
        };
        assert!(matches!(&*err, ErrorKind::Providers));

        // Nothing is enabled by default.
        let Err(err) = select_providers(&args(&[]), &config, &factory) else {
            panic!("providers selected with nothing enabled");
        };
        match &*err {
            ErrorKind::NoProviders(help) => assert!(help.contains("--all")),
            other => panic!("unexpected error: {other}"),
        }

        let mut enabled = Config::default();
        enabled.providers[1].enabled = true;
        let providers = select_providers(&args(&[]), &enabled, &factory).unwrap();
        assert_eq!(names(providers), ["GoFile"]);
    }

    #[tokio::test]
    async fn test_run_requires_input() {
        let err = run(args(&["--all"]), Config::default(), &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NoInput));
    }
}
