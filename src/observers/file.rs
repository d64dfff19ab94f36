//! # Polling file-tree observer.
//!
//! [`FileObserver`] watches a file or a directory tree by rescanning it every
//! [`PollConfig::interval`] and diffing against the previous scan.
//!
//! A file counts as changed when its size, modification time, or content checksum
//! differs. The checksum is a blake3 hash of the first 8 KiB, which is enough to
//! catch most edits without reading large files in full.
//!
//! ## Events
//! - `Added(FileChange)` new file
//! - `Modified(FileChange)` size / mtime / checksum differs
//! - `Deleted(FileChange)` file vanished (payload = last known state)
//! - `Error` a rescan failed; the previous state is kept and polling continues

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::poll::{PollConfig, send_all};
use crate::error::ObserverError;
use crate::events::Event;
use crate::observers::Observer;

const CHECKSUM_PREFIX: u64 = 8 * 1024;

/// State of one file as seen by a scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChange {
    /// Path of the file (under the watched root).
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, if the platform reports one.
    pub modified: Option<SystemTime>,
    /// Hex blake3 hash of the first 8 KiB.
    pub checksum: String,
}

impl FileChange {
    fn differs_from(&self, other: &FileChange) -> bool {
        self.size != other.size
            || self.modified != other.modified
            || self.checksum != other.checksum
    }
}

type Scan = BTreeMap<PathBuf, FileChange>;

/// Observes a file or a directory tree by polling.
#[derive(Clone, Debug)]
pub struct FileObserver {
    root: PathBuf,
    poll: PollConfig,
}

impl FileObserver {
    pub fn new(root: impl Into<PathBuf>, poll: PollConfig) -> Self {
        Self {
            root: root.into(),
            poll,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn scan(&self) -> Result<Scan, ObserverError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan_path(&root))
            .await
            .map_err(|e| ObserverError::io(&self.root, std::io::Error::other(e)))?
    }
}

#[async_trait]
impl Observer for FileObserver {
    type Item = FileChange;

    fn name(&self) -> &str {
        "file"
    }

    async fn watch(
        &self,
        ctx: CancellationToken,
    ) -> Result<mpsc::Receiver<Event<FileChange>>, ObserverError> {
        let mut last = self.poll.setup(self.name(), &ctx, || self.scan()).await?;
        debug!(root = %self.root.display(), files = last.len(), "initial scan done");

        let (tx, rx) = self.poll.channel();
        let me = self.clone();
        tokio::spawn(async move {
            while me.poll.tick(&ctx).await {
                let events = match me.scan().await {
                    Ok(current) => {
                        let events = diff(&last, &current);
                        last = current;
                        events
                    }
                    Err(e) => {
                        warn!(root = %me.root.display(), error = %e, "rescan failed");
                        vec![Event::error(format!(
                            "failed to scan {}: {e}",
                            me.root.display()
                        ))]
                    }
                };
                if !send_all(&tx, &ctx, events).await {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn list(&self) -> Result<Vec<FileChange>, ObserverError> {
        let scan = self.scan().await.map_err(|e| ObserverError::List {
            observer: self.name().to_string(),
            error: e.to_string(),
        })?;
        Ok(scan.into_values().collect())
    }
}

/// Scans `root` (a file or a directory tree) into path-ordered state.
fn scan_path(root: &Path) -> Result<Scan, ObserverError> {
    let mut out = Scan::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            ObserverError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let meta = entry
            .metadata()
            .map_err(|e| ObserverError::io(path, e.into()))?;
        out.insert(
            path.to_path_buf(),
            FileChange {
                path: path.to_path_buf(),
                size: meta.len(),
                modified: meta.modified().ok(),
                checksum: checksum(path)?,
            },
        );
    }
    Ok(out)
}

fn checksum(path: &Path) -> Result<String, ObserverError> {
    let file = File::open(path).map_err(|e| ObserverError::io(path, e))?;
    let mut buf = Vec::with_capacity(CHECKSUM_PREFIX as usize);
    file.take(CHECKSUM_PREFIX)
        .read_to_end(&mut buf)
        .map_err(|e| ObserverError::io(path, e))?;
    Ok(blake3::hash(&buf).to_hex().to_string())
}

/// Events turning `prev` into `cur`: adds and modifications in path order, then deletions.
fn diff(prev: &Scan, cur: &Scan) -> Vec<Event<FileChange>> {
    let mut events = Vec::new();
    for (path, state) in cur {
        match prev.get(path) {
            None => events.push(Event::added(state.clone())),
            Some(old) if state.differs_from(old) => events.push(Event::modified(state.clone())),
            Some(_) => {}
        }
    }
    for (path, old) in prev {
        if !cur.contains_key(path) {
            events.push(Event::deleted(old.clone()));
        }
    }
    events
}
