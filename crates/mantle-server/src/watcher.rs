//! File watching for rebuilds.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A `widget.toml` changed
    ManifestChanged(PathBuf),

    /// Any other file under a widget directory changed
    SourceChanged(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::ManifestChanged(path) | WatchEvent::SourceChanged(path) => path,
        }
    }
}

/// File watcher for the widgets directory.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `path` recursively.
    ///
    /// Returns the watcher and a channel to receive events. Bursts of events
    /// within 100ms are collapsed into the first.
    pub fn new(path: &Path) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), std::io::Error> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(std::io::Error::other)?;

        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(std::io::Error::other)?;

        std::thread::spawn(move || {
            let debounce = Duration::from_millis(100);
            let mut last_event: Option<Instant> = None;

            while let Ok(event) = sync_rx.recv() {
                let now = Instant::now();
                if last_event.is_some_and(|last| now.duration_since(last) < debounce) {
                    continue;
                }

                let classified: Vec<WatchEvent> = event
                    .paths
                    .iter()
                    .filter_map(|path| classify_event(path, &event.kind))
                    .collect();
                if classified.is_empty() {
                    continue;
                }
                last_event = Some(now);

                for e in classified {
                    if async_tx.blocking_send(e).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Classify a notify event into a WatchEvent.
fn classify_event(path: &Path, kind: &notify::EventKind) -> Option<WatchEvent> {
    use notify::EventKind;

    if !matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return None;
    }

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name == mantle_codegen::MANIFEST_FILE {
        Some(WatchEvent::ManifestChanged(path.to_path_buf()))
    } else {
        Some(WatchEvent::SourceChanged(path.to_path_buf()))
    }
}
