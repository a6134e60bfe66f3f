//! Filesystem discovery.

use crate::error::{ErrorKind, Result};
use crate::models::{FileDescriptor, file_name};
use async_stream::stream;
use futures::Stream;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// Lazily walks `paths`, yielding every file and directory beneath them.
///
/// Each input path is walked depth-first, directories before their contents,
/// siblings in file-name order; input paths are walked in the order given.
/// Problems are yielded as `Err` items and never end the walk: a failing
/// entry only loses its own subtree. Symbolic links are followed to describe
/// their target but only descended into when they are input paths themselves.
///
/// The walk checks `cancel` before every entry and ends quietly once it fires.
pub fn scan(paths: Vec<PathBuf>, cancel: CancellationToken) -> impl Stream<Item = Result<FileDescriptor>> + Send {
    let mut stack: Vec<(PathBuf, bool)> = paths.into_iter().rev().map(|path| (path, true)).collect();
    stream! {
        while let Some((path, root)) = stack.pop() {
            if cancel.is_cancelled() {
                tracing::debug!(path = %path.display(), "Scan cancelled");
                break;
            }
            let (file, descend) = match describe(&path, root).await {
                Ok(entry) => entry,
                Err(e) => { yield Err(e); continue; },
            };
            yield Ok(file);
            if descend {
                match children(&path).await {
                    // Reverse so the smallest name is popped first.
                    Ok(children) => stack.extend(children.into_iter().rev().map(|child| (child, false))),
                    Err(e) => yield Err(e),
                }
            }
        }
    }
}

/// Describe one entry, and whether its contents should be walked. Links met
/// inside the walk are never followed into; an input path is walked whatever
/// it points at.
async fn describe(path: &Path, root: bool) -> Result<(FileDescriptor, bool)> {
    let link = fs::symlink_metadata(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
    let real_dir = link.is_dir();
    let metadata = match link.file_type().is_symlink() {
        true => fs::metadata(path).await.map_err(|e| ErrorKind::from_io(e, path))?,
        false => link,
    };
    let descend = real_dir || (root && metadata.is_dir());
    Ok((descriptor(path, &metadata), descend))
}

fn descriptor(path: &Path, metadata: &Metadata) -> FileDescriptor {
    FileDescriptor {
        path: path.to_path_buf(),
        name: file_name(path),
        size: if metadata.is_dir() { 0 } else { metadata.len() },
        modified: metadata.modified().map(OffsetDateTime::from).unwrap_or(OffsetDateTime::UNIX_EPOCH),
        is_dir: metadata.is_dir(),
    }
}

async fn children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| ErrorKind::from_io(e, dir))?;
    let mut children = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| ErrorKind::from_io(e, dir))? {
        children.push(entry.path());
    }
    children.sort();
    Ok(children)
}
