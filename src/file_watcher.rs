// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Hot-folder watcher for incoming photos.
//!
//! Uses the `notify` crate (OS-native events: FSEvents on macOS, inotify on
//! Linux) to watch the camera's drop directory. A camera or tether tool
//! writes a file in several chunks, so events are batched until the folder
//! has been quiet for the settle window before any path is delivered.

use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Quiet period before a batch of new files is delivered
pub const SETTLE: Duration = Duration::from_millis(750);

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch hot folder {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Whether `path` looks like a photo the booth can load.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

/// Watch `dir` and send each new image file to `out` once, after it has
/// settled. Returns when `out` is closed or the watcher stops.
pub async fn watch_hot_folder(
    dir: PathBuf,
    out: mpsc::Sender<PathBuf>,
    settle: Duration,
) -> Result<(), WatchError> {
    let (tx, mut rx) = mpsc::channel::<Event>(64);

    // The watcher lives on this stack frame, so it stays alive as long as
    // the task runs.
    let mut watcher = notify::recommended_watcher(move |result: Result<Event, notify::Error>| {
        match result {
            Ok(event) if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) => {
                let _ = tx.blocking_send(event);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Hot folder watcher error: {}", e),
        }
    })
    .map_err(|source| WatchError::Watch {
        path: dir.clone(),
        source,
    })?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|source| WatchError::Watch {
            path: dir.clone(),
            source,
        })?;
    tracing::info!("Watching hot folder {}", dir.display());

    let mut delivered: HashSet<PathBuf> = HashSet::new();
    loop {
        let first = tokio::select! {
            event = rx.recv() => event,
            _ = out.closed() => None,
        };
        let Some(first) = first else {
            break;
        };
        let mut batch = BTreeSet::new();
        batch.extend(first.paths);

        // Debounce: wait until the folder is quiet
        loop {
            match tokio::time::timeout(settle, rx.recv()).await {
                Ok(Some(event)) => batch.extend(event.paths),
                Ok(None) => return Ok(()),
                Err(_) => break,
            }
        }

        for path in batch {
            if !is_image_path(&path) || !path.is_file() || delivered.contains(&path) {
                continue;
            }
            tracing::info!("New photo in hot folder: {}", path.display());
            if out.send(path.clone()).await.is_err() {
                return Ok(());
            }
            delivered.insert(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_image_extensions() {
        assert!(is_image_path(Path::new("/tmp/IMG_0001.JPG")));
        assert!(is_image_path(Path::new("shot.png")));
        assert!(!is_image_path(Path::new("shot.png.part")));
        assert!(!is_image_path(Path::new("notes.txt")));
        assert!(!is_image_path(Path::new("no_extension")));
    }

    #[tokio::test]
    async fn missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::channel(4);
        let result = watch_hot_folder(dir.path().join("gone"), tx, SETTLE).await;
        assert!(matches!(result, Err(WatchError::Watch { .. })));
    }

    #[tokio::test]
    async fn new_photo_is_delivered_once() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(watch_hot_folder(
            dir.path().to_path_buf(),
            tx,
            Duration::from_millis(50),
        ));
        // Let the watcher register before anything lands
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(dir.path().join("notes.txt"), b"not a photo").unwrap();
        std::fs::write(dir.path().join("shot.png"), b"first").unwrap();
        let path = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.file_name(), Some(std::ffi::OsStr::new("shot.png")));

        // Rewriting the same file is not a new photo
        std::fs::write(dir.path().join("shot.png"), b"second").unwrap();
        assert!(
            tokio::time::timeout(Duration::from_millis(500), rx.recv())
                .await
                .is_err()
        );

        // Nobody listening ends the watcher
        drop(rx);
        let result = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
