// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-frame work for EditorCanvas

use super::EditorCanvas;
use crate::compositor::{CompositeError, CompositeRequest, CompositeResponse, render_composite};
use crate::render::{DrawReport, PreviewInput};
use crate::store::{RasterSink, StoreError};
use kurbo::Size;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error("composite has no PNG payload: {0}")]
    Payload(#[from] crate::render::ImageLoadError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EditorCanvas {
    // ============================================================================
    // PAINT
    // ============================================================================

    /// Run one display frame: refit the canvas, draw the preview, and drive
    /// the compositor. Returns `None` while the container has no area.
    pub fn paint(&mut self, container: Size, device_pixel_ratio: f64, now: Instant) -> Option<DrawReport> {
        if self
            .frame
            .resize(container, device_pixel_ratio, self.config.aspect)
        {
            // A new size needs a new composite
            self.compositor.mark_dirty(now);
        }
        if self.frame.is_empty() {
            return None;
        }

        let input = PreviewInput {
            session: &self.session,
            selection: self.selection,
            gesture: &self.gesture,
            frame: &self.frame,
            frame_src: self.frame_src.as_deref(),
            frame_opacity: self.config.frame_opacity,
            global_photo_scale: self.config.global_photo_scale,
        };
        let report = self
            .preview
            .render(&input, &mut self.images, &self.fonts, &self.theme, now);

        let (width, height) = (self.frame.pixel_width(), self.frame.pixel_height());
        let session = &self.session;
        let frame_src = self.frame_src.as_deref();
        let (opacity, scale) = (self.config.frame_opacity, self.config.global_photo_scale);
        if self.compositor.tick(now, |seq| {
            CompositeRequest::snapshot(seq, session, width, height, frame_src, opacity, scale)
        }) {
            tracing::debug!("[EditorCanvas::paint] new composite applied");
        }
        Some(report)
    }

    /// Newest composite from the background pipeline.
    pub fn latest_composite(&self) -> Option<&CompositeResponse> {
        self.compositor.latest()
    }

    /// Render the session now, at an explicit size, on the calling thread.
    pub fn render_now(&mut self, width: u32, height: u32) -> Result<CompositeResponse, CompositeError> {
        let request = CompositeRequest::snapshot(
            0,
            &self.session,
            width,
            height,
            self.frame_src.as_deref(),
            self.config.frame_opacity,
            self.config.global_photo_scale,
        );
        render_composite(&request, &mut self.images, &self.fonts, &self.theme)
    }

    /// Render at `width` x `height` and hand the PNG to `sink`.
    pub fn export(&mut self, width: u32, height: u32, sink: &mut dyn RasterSink) -> Result<(), ExportError> {
        let response = self.render_now(width, height)?;
        sink.write_png(&response.png_bytes()?)?;
        Ok(())
    }
}
