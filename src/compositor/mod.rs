// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The high-fidelity compositor.
//!
//! [`Compositor`] ties the debounce/single-flight [`CompositeScheduler`] to
//! a background [`CompositeWorker`]. If the worker cannot be started, or
//! dies, the compositor switches permanently to rendering inline on the
//! calling thread. That is slower, not an error.

pub mod protocol;
pub mod scheduler;
pub mod worker;

pub use protocol::{CompositeRequest, CompositeResponse, WorkerMessage};
pub use scheduler::CompositeScheduler;
pub use worker::{CompositeWorker, WorkerResources, render_composite};

use crate::render::images::ImageStore;
use crate::render::text::FontBook;
use crate::theme::Theme;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("failed to encode composite: {0}")]
    Encode(#[from] image::ImageError),
    #[error("failed to serialize compositor message: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("compositor thread unavailable: {0}")]
    WorkerUnavailable(String),
    #[error("unexpected {0} message from compositor thread")]
    UnexpectedMessage(&'static str),
    #[error("canvas has no area")]
    EmptyCanvas,
    #[error("canvas {width}x{height} exceeds the {max}px limit")]
    TooLarge { width: u32, height: u32, max: u32 },
}

enum Backend {
    Worker(CompositeWorker),
    Inline {
        images: ImageStore,
        fonts: FontBook,
        theme: Theme,
    },
}

impl Backend {
    fn inline(resources: &WorkerResources) -> Self {
        Backend::Inline {
            images: resources.image_store(),
            fonts: resources.font_book(),
            theme: resources.theme,
        }
    }
}

pub struct Compositor {
    scheduler: CompositeScheduler,
    backend: Backend,
    resources: WorkerResources,
    latest: Option<CompositeResponse>,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("scheduler", &self.scheduler)
            .field("fallback", &self.is_fallback())
            .field("latest_seq", &self.latest.as_ref().map(|r| r.seq))
            .finish()
    }
}

impl Compositor {
    /// Start a compositor with a background thread, falling back to inline
    /// rendering if the thread cannot be spawned.
    pub fn new(resources: WorkerResources, debounce: Duration) -> Self {
        let backend = match CompositeWorker::spawn(resources.clone()) {
            Ok(worker) => Backend::Worker(worker),
            Err(e) => {
                tracing::warn!("{}; compositing on the calling thread", e);
                Backend::inline(&resources)
            }
        };
        Self {
            scheduler: CompositeScheduler::new(debounce),
            backend,
            resources,
            latest: None,
        }
    }

    /// A compositor that always renders on the calling thread.
    pub fn inline(resources: WorkerResources, debounce: Duration) -> Self {
        Self {
            scheduler: CompositeScheduler::new(debounce),
            backend: Backend::inline(&resources),
            resources,
            latest: None,
        }
    }

    /// Whether composites run on the calling thread.
    pub fn is_fallback(&self) -> bool {
        matches!(self.backend, Backend::Inline { .. })
    }

    /// Note a layer edit; restarts the debounce window.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.scheduler.mark_dirty(now);
    }

    pub fn is_busy(&self) -> bool {
        self.scheduler.is_in_flight() || self.scheduler.is_pending()
    }

    /// The newest applied result.
    pub fn latest(&self) -> Option<&CompositeResponse> {
        self.latest.as_ref()
    }

    pub fn scheduler(&self) -> &CompositeScheduler {
        &self.scheduler
    }

    /// Drive the pipeline: collect finished results, then issue a request
    /// if the debounce window has elapsed. `snapshot` builds the request
    /// for a given sequence number and is only called when one is issued.
    ///
    /// Returns true when a new result was applied.
    pub fn tick<F>(&mut self, now: Instant, snapshot: F) -> bool
    where
        F: FnOnce(u64) -> CompositeRequest,
    {
        let mut applied = self.collect(now);
        if let Some(seq) = self.scheduler.poll(now) {
            let request = snapshot(seq);
            applied |= self.dispatch(request, now);
        }
        applied
    }

    /// Block up to `timeout` for the in-flight result. Returns true when a
    /// new result was applied.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let Backend::Worker(worker) = &self.backend else {
            return false;
        };
        match worker.recv_timeout(timeout) {
            Ok(Some(response)) => self.accept(response, Instant::now()),
            Ok(None) => false,
            Err(e) => {
                self.use_inline(e);
                self.scheduler.abandon(Instant::now());
                false
            }
        }
    }

    fn collect(&mut self, now: Instant) -> bool {
        let mut applied = false;
        loop {
            let Backend::Worker(worker) = &self.backend else {
                return applied;
            };
            match worker.try_recv() {
                Ok(Some(response)) => applied |= self.accept(response, now),
                Ok(None) => return applied,
                Err(e) => {
                    self.use_inline(e);
                    self.scheduler.abandon(now);
                    return applied;
                }
            }
        }
    }

    fn dispatch(&mut self, request: CompositeRequest, now: Instant) -> bool {
        if let Backend::Worker(worker) = &self.backend {
            match worker.post(&request) {
                Ok(()) => return false,
                // Rendered inline below, still under the same seq
                Err(e) => self.use_inline(e),
            }
        }
        let Backend::Inline { images, fonts, theme } = &mut self.backend else {
            return false;
        };
        let response = render_composite(&request, images, fonts, theme).unwrap_or_else(|e| {
            tracing::error!("Composite #{} failed: {}", request.seq, e);
            CompositeResponse::failed(request.seq, e.to_string())
        });
        self.accept(response, now)
    }

    fn accept(&mut self, response: CompositeResponse, now: Instant) -> bool {
        if !self.scheduler.complete(response.seq, now) {
            return false;
        }
        if let Some(error) = &response.error {
            tracing::warn!("Composite #{} failed: {}", response.seq, error);
            return false;
        }
        tracing::debug!(
            "Applied composite #{} ({:.1}ms)",
            response.seq,
            response.render_duration_ms
        );
        self.latest = Some(response);
        true
    }

    fn use_inline(&mut self, error: CompositeError) {
        tracing::warn!("{}; switching to inline compositing", error);
        self.backend = Backend::inline(&self.resources);
    }
}
