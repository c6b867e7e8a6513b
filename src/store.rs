// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Where sessions and finished composites go.
//!
//! Sessions are saved as timestamped JSON snapshots; the newest one is what
//! a restarted booth picks up. Composites leave through a [`RasterSink`]
//! (print spooler, email queue, or just a folder of PNGs).

use crate::model::{IdSpaceExhausted, Session};
use chrono::Local;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SESSION_PREFIX: &str = "session-";
const SESSION_SUFFIX: &str = ".json";
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("bad session file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("refusing to write non-PNG data")]
    NotPng,
    #[error("session {path} is unusable: {source}")]
    Ids {
        path: PathBuf,
        #[source]
        source: IdSpaceExhausted,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub trait SessionStore {
    /// Persist a snapshot of `session`.
    fn save(&mut self, session: &Session) -> Result<(), StoreError>;

    /// The most recently saved session, if any.
    fn load_latest(&self) -> Result<Option<Session>, StoreError>;
}

/// Consumer of finished composites.
pub trait RasterSink {
    fn write_png(&mut self, png: &[u8]) -> Result<(), StoreError>;
}

/// Timestamp used in file names; sorts chronologically as text.
fn timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S-%3f").to_string()
}

/// `dir/<prefix><stamp><suffix>`, with a counter appended if a file with
/// that name already exists.
fn unique_path(dir: &Path, prefix: &str, suffix: &str) -> PathBuf {
    let stamp = timestamp();
    let mut path = dir.join(format!("{prefix}{stamp}{suffix}"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{prefix}{stamp}_{n:02}{suffix}"));
        n += 1;
    }
    path
}

/// Session snapshots as JSON files in one directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshots(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.dir)(e)),
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| {
                        name.starts_with(SESSION_PREFIX) && name.ends_with(SESSION_SUFFIX)
                    })
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl SessionStore for JsonFileStore {
    fn save(&mut self, session: &Session) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let path = unique_path(&self.dir, SESSION_PREFIX, SESSION_SUFFIX);
        let json = serde_json::to_string_pretty(session).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(io_error(&path))?;
        tracing::info!("Saved session to {}", path.display());
        Ok(())
    }

    fn load_latest(&self) -> Result<Option<Session>, StoreError> {
        let Some(path) = self.snapshots()?.pop() else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(&path).map_err(io_error(&path))?;
        let session: Session = serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        session.reserve_ids().map_err(|source| StoreError::Ids {
            path: path.clone(),
            source,
        })?;
        tracing::info!("Loaded session from {}", path.display());
        Ok(Some(session))
    }
}

/// Writes each composite as a timestamped PNG file.
#[derive(Debug, Clone)]
pub struct PngFileSink {
    dir: PathBuf,
    prefix: String,
    last_written: Option<PathBuf>,
}

impl PngFileSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            last_written: None,
        }
    }

    pub fn last_written(&self) -> Option<&Path> {
        self.last_written.as_deref()
    }
}

impl RasterSink for PngFileSink {
    fn write_png(&mut self, png: &[u8]) -> Result<(), StoreError> {
        if !png.starts_with(PNG_SIGNATURE) {
            return Err(StoreError::NotPng);
        }
        std::fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))?;
        let path = unique_path(&self.dir, &format!("{}-", self.prefix), ".png");
        std::fs::write(&path, png).map_err(io_error(&path))?;
        tracing::info!("Wrote composite to {}", path.display());
        self.last_written = Some(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StickerLayer;
    use kurbo::Point;

    #[test]
    fn empty_store_has_no_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("sessions"));
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn latest_save_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path());

        let mut session = Session::new();
        store.save(&session).unwrap();
        session
            .stickers
            .push(StickerLayer::new("star.png", Point::new(0.3, 0.3), 0.1, 0.1));
        session.filter = "sepia(1)".to_string();
        store.save(&session).unwrap();

        assert_eq!(store.snapshots().unwrap().len(), 2);
        assert_eq!(store.load_latest().unwrap(), Some(session));
    }

    #[test]
    fn unrelated_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.json"), "{}").unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load_latest().unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("session-20250101-000000-000.json"), "{oops").unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(matches!(store.load_latest(), Err(StoreError::Json { .. })));
    }

    #[test]
    fn png_sink_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = PngFileSink::new(dir.path(), "print");
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(b"rest");

        sink.write_png(&png).unwrap();
        sink.write_png(&png).unwrap();
        let written = sink.last_written().unwrap();
        assert_eq!(std::fs::read(written).unwrap(), png);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);

        assert!(matches!(sink.write_png(b"GIF89a"), Err(StoreError::NotPng)));
    }
}
