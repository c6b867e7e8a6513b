// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The running booth.
//!
//! A [`Booth`] drives one operator canvas and its guest hub on a fixed
//! frame tick. Photos dropped in the hot folder are imported as they
//! settle, accepted print requests leave as PNGs, and each composite that
//! follows an edit is matched by a session snapshot on disk so a restarted
//! booth resumes where it stopped.

use crate::canvas::EditorCanvas;
use crate::file_watcher::{self, watch_hot_folder};
use crate::model::IdSpaceExhausted;
use crate::settings::Config;
use crate::store::{JsonFileStore, PngFileSink, SessionStore, StoreError};
use crate::sync::{GuestAction, OperatorHub, SyncBus, SyncError};
use crate::theme::Theme;
use kurbo::Size;
use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Spacing of booth frames
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Settled hot-folder photos waiting to be imported
const PHOTO_QUEUE: usize = 16;

/// File name prefix of printed composites
const PRINT_PREFIX: &str = "print";

#[derive(Debug, Error)]
pub enum BoothError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ids(#[from] IdSpaceExhausted),
}

/// What one [`Booth::step`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub applied: Vec<GuestAction>,
    pub printed: bool,
    pub saved: bool,
}

#[derive(Debug)]
pub struct Booth {
    canvas: EditorCanvas,
    hub: OperatorHub,
    sessions: Option<JsonFileStore>,
    prints: Option<PngFileSink>,
    container: Size,
    /// Composite the last snapshot decision was made for
    last_composite: Option<u64>,
}

impl Booth {
    /// A booth with a background compositor, attached to `bus` as its
    /// operator.
    pub fn from_config(config: Config, theme: Theme, bus: &SyncBus) -> Result<Self, BoothError> {
        Self::new(EditorCanvas::new(config, theme), bus)
    }

    pub fn new(canvas: EditorCanvas, bus: &SyncBus) -> Result<Self, BoothError> {
        let config = canvas.config().clone();
        let width = f64::from(crate::DEFAULT_RENDER_WIDTH);
        let container = Size::new(width, width / config.aspect.ratio());
        let sessions = config.snapshot_dir.as_deref().map(JsonFileStore::new);
        let prints = config
            .snapshot_dir
            .as_deref()
            .map(|dir| PngFileSink::new(dir, PRINT_PREFIX));
        Ok(Self {
            hub: OperatorHub::new(bus, config)?,
            canvas,
            sessions,
            prints,
            container,
            last_composite: None,
        })
    }

    pub fn canvas(&self) -> &EditorCanvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut EditorCanvas {
        &mut self.canvas
    }

    pub fn hub(&self) -> &OperatorHub {
        &self.hub
    }

    /// Pick up the newest saved session. Returns false when there is none.
    pub fn resume(&mut self, now: Instant) -> Result<bool, BoothError> {
        let Some(store) = &self.sessions else {
            return Ok(false);
        };
        let Some(session) = store.load_latest()? else {
            return Ok(false);
        };
        self.canvas.load_session(session, now)?;
        // Already on disk
        self.canvas.take_unsaved();
        Ok(true)
    }

    /// Add a photo from disk. Failures are logged and skipped.
    pub fn import(&mut self, path: &Path, now: Instant) -> bool {
        match self.canvas.import_photo(path, now) {
            Ok(_) => {
                tracing::info!("Imported {}", path.display());
                true
            }
            Err(e) => {
                tracing::warn!("Cannot import photo: {}", e);
                false
            }
        }
    }

    /// One booth frame: guest sync, prints, preview and composite, then a
    /// snapshot if a composite of new edits just landed.
    pub fn step(&mut self, now: Instant) -> StepReport {
        let applied = self.canvas.sync_with(&mut self.hub, now);
        let mut printed = false;
        for action in &applied {
            if let GuestAction::RequestPrint { copies } = action {
                printed |= self.print(*copies);
            }
        }

        self.canvas.paint(self.container, 1.0, now);

        let landed = self.canvas.latest_composite().map(|response| response.seq);
        let mut saved = false;
        if landed != self.last_composite {
            self.last_composite = landed;
            if self.canvas.take_unsaved() {
                saved = self.save();
            }
        }
        StepReport {
            applied,
            printed,
            saved,
        }
    }

    /// Run until `shutdown` resolves, importing from the hot folder if one
    /// is configured. Unsaved edits are written before returning.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        let (photo_tx, mut photos) = mpsc::channel(PHOTO_QUEUE);
        let watcher = self.canvas.config().hot_folder.clone().map(|dir| {
            tokio::spawn(async move {
                if let Err(e) = watch_hot_folder(dir, photo_tx, file_watcher::SETTLE).await {
                    tracing::error!("{}", e);
                }
            })
        });

        let mut ticker = tokio::time::interval(FRAME_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);
        tracing::info!("Booth running");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(path) = photos.recv() => {
                    self.import(&path, Instant::now());
                }
                _ = ticker.tick() => {
                    self.step(Instant::now());
                }
            }
        }

        if let Some(watcher) = watcher {
            watcher.abort();
        }
        if self.canvas.take_unsaved() {
            self.save();
        }
        tracing::info!("Booth stopped");
    }

    fn print(&mut self, copies: u32) -> bool {
        let Some(sink) = &mut self.prints else {
            tracing::warn!("Print requested but no snapshot_dir is configured");
            return false;
        };
        let width = self.canvas.frame().pixel_width().max(1);
        let height = self.canvas.frame().pixel_height().max(1);
        match self.canvas.export(width, height, sink) {
            Ok(()) => {
                tracing::info!("Sent print ({} copies)", copies);
                true
            }
            Err(e) => {
                tracing::error!("Print failed: {}", e);
                false
            }
        }
    }

    fn save(&mut self) -> bool {
        let Some(store) = &mut self.sessions else {
            return false;
        };
        match store.save(self.canvas.session()) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Cannot save session: {}", e);
                false
            }
        }
    }
}
