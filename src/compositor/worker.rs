// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The background compositor thread.
//!
//! ```text
//! Editor thread                 Compositor thread
//! ┌──────────────┐  COMPOSITE  ┌────────────────┐
//! │ Compositor   │────────────►│ worker loop    │
//! │  - post()    │   (JSON)    │  - decode imgs │
//! │  - try_recv()│◄────────────│  - draw_scene  │
//! └──────────────┘   RESULT    │  - encode PNG  │
//!                              └────────────────┘
//! ```
//!
//! The thread owns its own image cache and font book. It runs every request
//! to completion; there is no cancellation. Dropping the handle closes the
//! request channel, which ends the loop, and joins the thread.

use super::CompositeError;
use super::protocol::{CompositeRequest, CompositeResponse, WorkerMessage};
use crate::render::images::{ImageStore, encode_data_url};
use crate::render::raster::{MAX_DIMENSION, RasterSurface};
use crate::render::scene::draw_scene;
use crate::render::text::FontBook;
use crate::theme::Theme;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use image::ImageFormat;
use std::io::Cursor;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

/// What the worker needs to build its own caches.
#[derive(Debug, Clone, Default)]
pub struct WorkerResources {
    /// Base for relative image paths
    pub image_dir: Option<PathBuf>,
    pub fonts_dir: Option<PathBuf>,
    pub theme: Theme,
}

impl WorkerResources {
    pub fn image_store(&self) -> ImageStore {
        match &self.image_dir {
            Some(dir) => ImageStore::with_base_dir(dir),
            None => ImageStore::new(),
        }
    }

    pub fn font_book(&self) -> FontBook {
        match &self.fonts_dir {
            Some(dir) => FontBook::load_dir(dir),
            None => FontBook::new(),
        }
    }
}

/// Handle to a running compositor thread.
#[derive(Debug)]
pub struct CompositeWorker {
    request_tx: Option<Sender<String>>,
    result_rx: Receiver<String>,
    thread: Option<thread::JoinHandle<()>>,
}

impl CompositeWorker {
    pub fn spawn(resources: WorkerResources) -> Result<Self, CompositeError> {
        // Requests are unbounded (single-flight keeps it at one); results
        // likewise never exceed one outstanding message.
        let (request_tx, request_rx) = channel::unbounded::<String>();
        let (result_tx, result_rx) = channel::unbounded::<String>();

        let thread = thread::Builder::new()
            .name("compositor".to_string())
            .spawn(move || worker_main(resources, request_rx, result_tx))
            .map_err(|e| CompositeError::WorkerUnavailable(e.to_string()))?;

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            thread: Some(thread),
        })
    }

    /// Send a request. Fails if the thread is gone.
    pub fn post(&self, request: &CompositeRequest) -> Result<(), CompositeError> {
        let text = WorkerMessage::Composite(request.clone()).to_json()?;
        let tx = self
            .request_tx
            .as_ref()
            .ok_or_else(|| CompositeError::WorkerUnavailable("worker shut down".to_string()))?;
        tx.send(text)
            .map_err(|_| CompositeError::WorkerUnavailable("request channel closed".to_string()))
    }

    /// Take a finished response without blocking.
    pub fn try_recv(&self) -> Result<Option<CompositeResponse>, CompositeError> {
        match self.result_rx.try_recv() {
            Ok(text) => parse_result(&text).map(Some),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(CompositeError::WorkerUnavailable(
                "result channel closed".to_string(),
            )),
        }
    }

    /// Wait up to `timeout` for a response.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<CompositeResponse>, CompositeError> {
        match self.result_rx.recv_timeout(timeout) {
            Ok(text) => parse_result(&text).map(Some),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(CompositeError::WorkerUnavailable(
                "result channel closed".to_string(),
            )),
        }
    }
}

#[cfg(test)]
impl CompositeWorker {
    /// A handle on caller-owned channels, with no thread behind it.
    pub(crate) fn detached(request_tx: Sender<String>, result_rx: Receiver<String>) -> Self {
        Self {
            request_tx: Some(request_tx),
            result_rx,
            thread: None,
        }
    }
}

impl Drop for CompositeWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.request_tx.take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("Compositor thread panicked");
        }
    }
}

fn parse_result(text: &str) -> Result<CompositeResponse, CompositeError> {
    match WorkerMessage::from_json(text)? {
        WorkerMessage::Result(response) => Ok(response),
        WorkerMessage::Composite(_) => Err(CompositeError::UnexpectedMessage("COMPOSITE")),
    }
}

fn worker_main(resources: WorkerResources, request_rx: Receiver<String>, result_tx: Sender<String>) {
    tracing::info!("Compositor thread started");
    let mut images = resources.image_store();
    let fonts = resources.font_book();

    for text in request_rx.iter() {
        let request = match WorkerMessage::from_json(&text) {
            Ok(WorkerMessage::Composite(request)) => request,
            Ok(WorkerMessage::Result(_)) => {
                tracing::warn!("Compositor thread: ignoring RESULT sent as a request");
                continue;
            }
            Err(e) => {
                tracing::warn!("Compositor thread: malformed request: {}", e);
                continue;
            }
        };

        let response = render_composite(&request, &mut images, &fonts, &resources.theme)
            .unwrap_or_else(|e| {
                tracing::error!("Composite #{} failed: {}", request.seq, e);
                CompositeResponse::failed(request.seq, e.to_string())
            });

        let sent = WorkerMessage::Result(response)
            .to_json()
            .map_err(|e| tracing::error!("Compositor thread: cannot encode result: {}", e))
            .ok()
            .is_some_and(|json| result_tx.send(json).is_ok());
        if !sent {
            tracing::info!("Compositor thread: result channel closed, exiting");
            return;
        }
    }
    tracing::info!("Compositor thread: request channel closed, exiting");
}

/// Render a request to a PNG data URL. Used by the worker thread and by
/// the synchronous fallback alike.
pub fn render_composite(
    request: &CompositeRequest,
    images: &mut ImageStore,
    fonts: &FontBook,
    theme: &Theme,
) -> Result<CompositeResponse, CompositeError> {
    if request.width == 0 || request.height == 0 {
        return Err(CompositeError::EmptyCanvas);
    }
    if request.width > MAX_DIMENSION || request.height > MAX_DIMENSION {
        return Err(CompositeError::TooLarge {
            width: request.width,
            height: request.height,
            max: MAX_DIMENSION,
        });
    }
    let started = Instant::now();
    let mut surface = RasterSurface::new(request.width, request.height);
    let report = draw_scene(&mut surface, &request.scene(), images, fonts, theme);

    let mut png = Cursor::new(Vec::new());
    surface.to_image().write_to(&mut png, ImageFormat::Png)?;
    let render_duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    tracing::debug!(
        "Composite #{} rendered {}x{} in {:.1}ms ({} skipped)",
        request.seq,
        request.width,
        request.height,
        render_duration_ms,
        report.skipped
    );

    Ok(CompositeResponse {
        seq: request.seq,
        image_data: encode_data_url("image/png", png.get_ref()),
        render_duration_ms,
        width: request.width,
        height: request.height,
        skipped_layers: report.skipped,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Session;

    fn request(seq: u64, width: u32, height: u32) -> CompositeRequest {
        CompositeRequest::snapshot(seq, &Session::new(), width, height, None, 1.0, 1.0)
    }

    #[test]
    fn render_composite_produces_png() {
        let response = render_composite(
            &request(1, 8, 12),
            &mut ImageStore::new(),
            &FontBook::new(),
            &Theme::default(),
        )
        .unwrap();
        assert!(response.is_ok());
        assert!(response.image_data.starts_with("data:image/png;base64,"));
        let decoded = image::load_from_memory(&response.png_bytes().unwrap()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 12));
    }

    #[test]
    fn empty_canvas_is_an_error() {
        let result = render_composite(
            &request(1, 0, 10),
            &mut ImageStore::new(),
            &FontBook::new(),
            &Theme::default(),
        );
        assert!(matches!(result, Err(CompositeError::EmptyCanvas)));
    }

    #[test]
    fn oversized_canvas_is_an_error() {
        let result = render_composite(
            &request(1, MAX_DIMENSION + 1, 10),
            &mut ImageStore::new(),
            &FontBook::new(),
            &Theme::default(),
        );
        assert!(matches!(result, Err(CompositeError::TooLarge { .. })));
    }

    #[test]
    fn worker_round_trip() {
        let worker = CompositeWorker::spawn(WorkerResources::default()).unwrap();
        worker.post(&request(42, 4, 4)).unwrap();
        let response = worker
            .recv_timeout(Duration::from_secs(10))
            .unwrap()
            .expect("worker should answer");
        assert_eq!(response.seq, 42);
        assert!(response.is_ok());
    }

    #[test]
    fn worker_reports_render_failures() {
        let worker = CompositeWorker::spawn(WorkerResources::default()).unwrap();
        worker.post(&request(3, 0, 0)).unwrap();
        let response = worker.recv_timeout(Duration::from_secs(10)).unwrap().unwrap();
        assert_eq!(response.seq, 3);
        assert!(response.error.is_some());
    }
}
