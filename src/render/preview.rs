// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-frame preview rendering for the operator canvas.
//!
//! Each frame redraws the scene from scratch, then the selection
//! affordances on top. While a freehand stroke is in progress the
//! affordances are suppressed and the live stroke goes to a separate
//! overlay surface, so committing the stroke only has to clear the overlay.

use super::frame::CanvasFrame;
use super::images::ImageStore;
use super::raster::RasterSurface;
use super::scene::{DrawReport, Scene, draw_scene};
use super::surface::Surface;
use super::text::FontBook;
use crate::editing::hit_test::{
    HitContext, has_rotate_handle, has_scale_handle, layer_rect, rotate_handle_center,
    scale_handle_center,
};
use crate::editing::{Gesture, InteractionMode, Selection};
use crate::model::Session;
use crate::theme::Theme;
use image::RgbaImage;
use kurbo::{Point, Vec2};
use peniko::Color;
use std::time::{Duration, Instant};

/// Weight of the newest sample in the smoothed frame rate
const FPS_SMOOTHING: f64 = 0.1;

/// Frame timing, exposed for diagnostics only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    last_frame: Option<Instant>,
    fps: f64,
    frame_duration: Duration,
    frames: u64,
}

impl FrameStats {
    /// Record a frame that started at `start` and took `duration`.
    pub fn record(&mut self, start: Instant, duration: Duration) {
        if let Some(last) = self.last_frame {
            let interval = start.saturating_duration_since(last).as_secs_f64();
            if interval > 0.0 {
                let sample = 1.0 / interval;
                self.fps = if self.fps == 0.0 {
                    sample
                } else {
                    self.fps + (sample - self.fps) * FPS_SMOOTHING
                };
            }
        }
        self.last_frame = Some(start);
        self.frame_duration = duration;
        self.frames += 1;
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Everything one preview frame reads.
pub struct PreviewInput<'a> {
    pub session: &'a Session,
    pub selection: Option<Selection>,
    pub gesture: &'a Gesture,
    pub frame: &'a CanvasFrame,
    pub frame_src: Option<&'a str>,
    pub frame_opacity: f64,
    pub global_photo_scale: f64,
}

#[derive(Debug)]
pub struct PreviewRenderer {
    surface: RasterSurface,
    overlay: RasterSurface,
    overlay_dirty: bool,
    stats: FrameStats,
}

impl Default for PreviewRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewRenderer {
    pub fn new() -> Self {
        Self {
            surface: RasterSurface::new(0, 0),
            overlay: RasterSurface::new(0, 0),
            overlay_dirty: false,
            stats: FrameStats::default(),
        }
    }

    /// Draw one frame.
    pub fn render(
        &mut self,
        input: &PreviewInput<'_>,
        images: &mut ImageStore,
        fonts: &FontBook,
        theme: &Theme,
        now: Instant,
    ) -> DrawReport {
        let started = Instant::now();
        let (width, height) = (input.frame.pixel_width(), input.frame.pixel_height());
        if self.surface.resize(width, height) | self.overlay.resize(width, height) {
            tracing::debug!("[PreviewRenderer::render] surfaces now {}x{}", width, height);
        }

        let scene = Scene::from_session(
            input.session,
            input.frame_src,
            input.frame_opacity,
            input.global_photo_scale,
        );
        let report = draw_scene(&mut self.surface, &scene, images, fonts, theme);

        if input.gesture.mode() != InteractionMode::Drawing
            && let Some(selection) = input.selection
        {
            let ctx = HitContext {
                frame: input.frame.size(),
                device_pixel_ratio: input.frame.device_pixel_ratio(),
                text: fonts,
            };
            draw_affordances(&mut self.surface, input.session, selection, &ctx, theme);
        }

        self.update_overlay(input.gesture, input.frame, theme);
        self.stats.record(now, started.elapsed());
        report
    }

    /// Redraw the live stroke overlay. Cheap to call on every pointer move.
    pub fn update_overlay(&mut self, gesture: &Gesture, frame: &CanvasFrame, theme: &Theme) {
        match gesture.live_stroke() {
            Some((points, brush)) => {
                self.overlay.clear(Color::TRANSPARENT);
                let canvas: Vec<Point> = points.iter().map(|p| p.to_canvas(frame.size())).collect();
                self.overlay.stroke_polyline(
                    &canvas,
                    brush.width * frame.size().height,
                    theme.ink(&brush.color),
                );
                self.overlay_dirty = true;
            }
            None => self.clear_overlay(),
        }
    }

    pub fn clear_overlay(&mut self) {
        if self.overlay_dirty {
            self.overlay.clear(Color::TRANSPARENT);
            self.overlay_dirty = false;
        }
    }

    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    /// For callers that decorate the frame after [`render`](Self::render).
    pub fn surface_mut(&mut self) -> &mut RasterSurface {
        &mut self.surface
    }

    pub fn overlay(&self) -> &RasterSurface {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut RasterSurface {
        &mut self.overlay
    }

    pub fn has_live_stroke(&self) -> bool {
        self.overlay_dirty
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// The frame as displayed: scene with the overlay on top.
    pub fn snapshot(&mut self) -> RgbaImage {
        let size = self.surface.size();
        let mut composed = RasterSurface::new(size.width as u32, size.height as u32);
        composed.clear(Color::TRANSPARENT);
        composed.composite_over(&mut self.surface);
        if self.overlay_dirty {
            composed.composite_over(&mut self.overlay);
        }
        composed.to_image()
    }
}

/// Bounding box, rotation handle, and scale handle of the selected layer.
pub fn draw_affordances(
    surface: &mut dyn Surface,
    session: &Session,
    selection: Selection,
    ctx: &HitContext<'_>,
    theme: &Theme,
) {
    let Some(rect) = layer_rect(session, selection, ctx) else {
        return;
    };
    let dpr = ctx.device_pixel_ratio;
    surface.stroke_rotated_rect(&rect, theme.selection_stroke_width * dpr, theme.selection_stroke);

    if has_rotate_handle(selection.kind) {
        let top = rect.local_to_canvas(Vec2::new(0.0, -rect.half_height));
        let handle = rotate_handle_center(&rect, ctx);
        surface.stroke_polyline(&[top, handle], theme.selection_stroke_width * dpr, theme.handle_line);
        draw_handle(surface, handle, dpr, theme);
    }
    if has_scale_handle(selection.kind) {
        draw_handle(surface, scale_handle_center(&rect), dpr, theme);
    }
}

fn draw_handle(surface: &mut dyn Surface, center: Point, dpr: f64, theme: &Theme) {
    let radius = theme.handle_radius * dpr;
    surface.fill_circle(center, radius + theme.handle_outline_width * dpr, theme.handle_outline);
    surface.fill_circle(center, radius, theme.handle_fill);
}
