// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Pointer event handlers for EditorCanvas

use super::EditorCanvas;
use crate::editing::{Gesture, HitContext, InteractionMode};
use kurbo::Point;
use std::time::Instant;

impl EditorCanvas {
    // ============================================================================
    // POINTER EVENT HANDLERS
    // ============================================================================

    /// Pointer pressed at `position`, relative to the canvas container in
    /// CSS pixels.
    pub fn pointer_down(&mut self, position: Point) {
        if !self.gesture.is_idle() {
            tracing::debug!("[EditorCanvas::pointer_down] ignored, gesture in progress");
            return;
        }
        let point = self.frame.to_canvas(position);
        let ctx = HitContext {
            frame: self.frame.size(),
            device_pixel_ratio: self.frame.device_pixel_ratio(),
            text: &self.fonts,
        };
        self.gesture = Gesture::begin(
            &self.session,
            &mut self.selection,
            self.tool,
            &self.brush,
            point,
            &ctx,
        );
        self.gesture_changed = false;
        tracing::debug!(
            "[EditorCanvas::pointer_down] at {:?}, mode {:?}, selection {:?}",
            point,
            self.gesture.mode(),
            self.selection
        );
        if self.gesture.mode() == InteractionMode::Drawing {
            self.preview
                .update_overlay(&self.gesture, &self.frame, &self.theme);
        }
    }

    /// Pointer moved. Returns true when the preview needs repainting.
    pub fn pointer_move(&mut self, position: Point, now: Instant) -> bool {
        if self.gesture.is_idle() {
            return false;
        }
        let point = self.frame.to_canvas(position);
        let changed = self.gesture.update(
            &mut self.session,
            point,
            self.frame.size(),
            self.config.global_photo_scale,
        );
        if !changed {
            return false;
        }
        if self.gesture.mode() == InteractionMode::Drawing {
            // Only the overlay changes until the stroke is committed
            self.preview
                .update_overlay(&self.gesture, &self.frame, &self.theme);
        } else {
            self.gesture_changed = true;
            self.touch(now);
        }
        true
    }

    /// Pointer released. Commits a stroke and records one history entry
    /// for the whole gesture.
    pub fn pointer_up(&mut self, now: Instant) {
        let gesture = std::mem::take(&mut self.gesture);
        let mode = gesture.mode();
        if let Some(drawing) = gesture.finish() {
            self.session.drawings.push(drawing);
            self.gesture_changed = true;
        }
        self.preview.clear_overlay();
        if std::mem::take(&mut self.gesture_changed) {
            tracing::debug!("[EditorCanvas::pointer_up] committing {:?}", mode);
            self.commit(now);
        }
    }

    /// Pointer left the canvas; ends the gesture as if released.
    pub fn pointer_leave(&mut self, now: Instant) {
        if !self.gesture.is_idle() {
            self.pointer_up(now);
        }
    }
}
