// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem event stream using file notifications

use std::path::PathBuf;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

use crate::SensorError;

/// Kind of filesystem change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
    Created,
    Modified,
    Moved,
    Deleted,
}

/// One filesystem change under the watch set
#[derive(Debug, Clone)]
pub struct FsEvent {
    pub kind: FsEventKind,
    pub path: PathBuf,
    pub dest_path: Option<PathBuf>,
}

/// Keeps the underlying watcher alive; dropping it stops the stream.
pub struct FsWatch {
    _watcher: RecommendedWatcher,
}

/// Watch `paths` recursively and stream mapped events into a channel.
///
/// Nonexistent paths are skipped with a warning so one bad config entry
/// doesn't take the whole watcher down.
pub fn watch(paths: &[PathBuf], buffer: usize) -> Result<(FsWatch, mpsc::Receiver<FsEvent>), SensorError> {
    let (tx, rx) = mpsc::channel(buffer);

    let mut watcher =
        notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
            let Ok(event) = result else {
                return;
            };
            for mapped in map_event(event) {
                // Receiver dropped means the subsystem is shutting down
                let _ = tx.blocking_send(mapped);
            }
        })?;

    let mut watched = 0usize;
    for path in paths {
        if !path.exists() {
            warn!(path = %path.display(), "watch path does not exist, skipping");
            continue;
        }
        match watcher.watch(path, RecursiveMode::Recursive) {
            Ok(()) => watched += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "could not watch path"),
        }
    }
    tracing::info!(watched, configured = paths.len(), "filesystem watch started");

    Ok((FsWatch { _watcher: watcher }, rx))
}

fn map_event(event: notify::Event) -> Vec<FsEvent> {
    match event.kind {
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .map(|path| FsEvent {
                kind: FsEventKind::Created,
                path,
                dest_path: None,
            })
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .into_iter()
            .map(|path| FsEvent {
                kind: FsEventKind::Deleted,
                path,
                dest_path: None,
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.into_iter();
            match (paths.next(), paths.next()) {
                (Some(src), dest) => vec![FsEvent {
                    kind: FsEventKind::Moved,
                    path: src,
                    dest_path: dest,
                }],
                _ => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .into_iter()
            .map(|path| FsEvent {
                kind: FsEventKind::Moved,
                path,
                dest_path: None,
            })
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .map(|path| FsEvent {
                kind: FsEventKind::Modified,
                path,
                dest_path: None,
            })
            .collect(),
        // Access and other event classes carry no detection signal
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "fs_events_tests.rs"]
mod tests;
