// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The guest side of the sync bus.
//!
//! A [`GuestMirror`] holds a read-only copy of the operator's display state
//! and its own selection. It never edits the mirrored session; strokes and
//! choices go back to the operator as guest actions.

use super::channel::{SyncBus, SyncEndpoint, SyncError};
use super::message::{DisplayState, GuestAction, GuestStroke, InterWindowMessage, KioskMode};
use crate::editing::hit_test::{self, HitContext};
use crate::editing::interaction::Brush;
use crate::editing::selection::{self, Selection};
use crate::editing::Gesture;
use crate::model::layer::NormalizedPoint;
use crate::render::frame::CanvasFrame;
use crate::render::images::ImageStore;
use crate::render::preview::{PreviewInput, PreviewRenderer};
use crate::render::scene::DrawReport;
use crate::render::surface::Surface;
use crate::render::text::{FontBook, TextMeasure};
use crate::theme::Theme;
use kurbo::Point;
use std::time::Instant;

#[derive(Debug)]
pub struct GuestMirror {
    endpoint: SyncEndpoint,
    state: Option<DisplayState>,
    selection: Option<Selection>,
    stroke: Gesture,
    brush: Brush,
}

impl GuestMirror {
    /// Join `bus` as a guest.
    pub fn new(bus: &SyncBus) -> Self {
        Self {
            endpoint: bus.guest(),
            state: None,
            selection: None,
            stroke: Gesture::Idle,
            brush: Brush::default(),
        }
    }

    /// Ask the operator for the current state.
    pub fn request_state(&self) -> Result<(), SyncError> {
        self.endpoint.post(&InterWindowMessage::GetState)
    }

    pub fn send_action(&self, action: GuestAction) -> Result<(), SyncError> {
        tracing::debug!("[GuestMirror] sending {}", action.name());
        self.endpoint.post(&InterWindowMessage::GuestAction(action))
    }

    pub fn state(&self) -> Option<&DisplayState> {
        self.state.as_ref()
    }

    pub fn mode(&self) -> KioskMode {
        self.state.as_ref().map(|s| s.mode).unwrap_or_default()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn set_brush(&mut self, brush: Brush) {
        self.brush = brush;
    }

    /// Apply every queued state. Returns true if the mirror changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Some(message) = self.endpoint.try_recv() {
            changed |= self.receive(message);
        }
        changed
    }

    /// Wait until a newer state arrives. Returns false once the bus is gone.
    pub async fn next_state(&mut self) -> bool {
        while let Some(message) = self.endpoint.recv().await {
            if self.receive(message) {
                return true;
            }
        }
        false
    }

    fn receive(&mut self, message: InterWindowMessage) -> bool {
        let InterWindowMessage::SetState(state) = message else {
            // GET_STATE and GUEST_ACTION are for the operator
            return false;
        };
        if let Some(current) = &self.state {
            if state.epoch != current.epoch {
                tracing::info!(
                    "[GuestMirror] operator restarted (epoch {} -> {})",
                    current.epoch,
                    state.epoch
                );
            } else if state.revision <= current.revision {
                tracing::debug!(
                    "[GuestMirror] ignoring stale revision {} (have {})",
                    state.revision,
                    current.revision
                );
                return false;
            }
        }
        self.selection = selection::reconcile(self.selection, &state.session);
        self.state = Some(*state);
        true
    }

    /// Select the layer under `point` (canvas pixels) for local affordances.
    pub fn select_at(&mut self, point: Point, frame: &CanvasFrame, text: &dyn TextMeasure) -> Option<Selection> {
        let state = self.state.as_ref()?;
        let ctx = HitContext {
            frame: frame.size(),
            device_pixel_ratio: frame.device_pixel_ratio(),
            text,
        };
        self.selection =
            hit_test::hit_test(&state.session, self.selection, point, &ctx).map(|hit| hit.selection());
        self.selection
    }

    /// Start a local stroke at `point` (canvas pixels).
    pub fn begin_stroke(&mut self, point: Point, frame: &CanvasFrame) {
        self.stroke = Gesture::Drawing {
            points: vec![NormalizedPoint::from_canvas(point, frame.size())],
            brush: self.brush.clone(),
        };
    }

    pub fn extend_stroke(&mut self, point: Point, frame: &CanvasFrame) -> bool {
        match &mut self.stroke {
            Gesture::Drawing { points, .. } => {
                points.push(NormalizedPoint::from_canvas(point, frame.size()));
                true
            }
            _ => false,
        }
    }

    /// Finish the local stroke and hand it to the operator. The stroke
    /// shows up in the mirror once the operator rebroadcasts.
    pub fn end_stroke(&mut self) -> Result<bool, SyncError> {
        let Some(drawing) = std::mem::take(&mut self.stroke).finish() else {
            return Ok(false);
        };
        self.send_action(GuestAction::AddDrawing {
            stroke: GuestStroke {
                points: drawing.points,
                color: drawing.color,
                stroke_width: drawing.stroke_width,
            },
        })?;
        Ok(true)
    }

    /// Draw the mirrored state, with empty layout slots outlined. `None`
    /// until the first state arrives.
    pub fn render(
        &self,
        renderer: &mut PreviewRenderer,
        frame: &CanvasFrame,
        images: &mut ImageStore,
        fonts: &FontBook,
        theme: &Theme,
        now: Instant,
    ) -> Option<DrawReport> {
        let state = self.state.as_ref()?;
        let input = PreviewInput {
            session: &state.session,
            selection: self.selection,
            gesture: &self.stroke,
            frame,
            frame_src: state.frame_src.as_deref(),
            frame_opacity: state.frame_opacity,
            global_photo_scale: state.global_photo_scale,
        };
        let report = renderer.render(&input, images, fonts, theme, now);

        let surface = renderer.surface_mut();
        let width = theme.selection_stroke_width * frame.device_pixel_ratio();
        for slot in &state.placeholders {
            surface.stroke_rotated_rect(&slot.rotated_rect(frame.size()), width, theme.handle_line);
        }
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Session, StickerLayer};
    use crate::settings::{AspectRatio, Config};
    use crate::sync::channel::SyncBus;
    use crate::sync::operator::OperatorHub;
    use crate::render::text::ApproxTextMeasure;
    use kurbo::Size;

    fn square_frame() -> CanvasFrame {
        CanvasFrame::fit(
            Size::new(100.0, 100.0),
            1.0,
            AspectRatio {
                width: 1.0,
                height: 1.0,
            },
        )
    }

    fn state(revision: u64, stickers: usize) -> DisplayState {
        let mut session = Session::new();
        for _ in 0..stickers {
            session
                .stickers
                .push(StickerLayer::new("s.png", Point::new(0.5, 0.5), 0.4, 0.4));
        }
        DisplayState {
            revision,
            session,
            ..DisplayState::default()
        }
    }

    #[test]
    fn older_revisions_are_ignored() {
        let bus = SyncBus::new("booth", 8);
        let operator = bus.operator().unwrap();
        let mut guest = GuestMirror::new(&bus);

        operator
            .post(&InterWindowMessage::SetState(Box::new(state(5, 1))))
            .unwrap();
        operator
            .post(&InterWindowMessage::SetState(Box::new(state(3, 2))))
            .unwrap();
        assert!(guest.poll());
        assert_eq!(guest.state().unwrap().revision, 5);
        assert_eq!(guest.state().unwrap().session.stickers.len(), 1);
    }

    #[test]
    fn selection_is_reconciled_against_new_state() {
        let bus = SyncBus::new("booth", 8);
        let operator = bus.operator().unwrap();
        let mut guest = GuestMirror::new(&bus);
        let frame = square_frame();

        operator
            .post(&InterWindowMessage::SetState(Box::new(state(1, 1))))
            .unwrap();
        guest.poll();
        assert!(guest
            .select_at(Point::new(50.0, 50.0), &frame, &ApproxTextMeasure)
            .is_some());

        operator
            .post(&InterWindowMessage::SetState(Box::new(state(2, 0))))
            .unwrap();
        guest.poll();
        assert_eq!(guest.selection(), None);
    }

    #[test]
    fn guest_stroke_round_trips_through_operator() {
        let bus = SyncBus::new("booth", 16);
        let mut hub = OperatorHub::new(&bus, Config::default()).unwrap();
        let mut guest = GuestMirror::new(&bus);
        let mut session = Session::new();
        let frame = square_frame();

        guest.request_state().unwrap();
        hub.poll(&mut session, Instant::now());
        assert!(guest.poll());

        guest.begin_stroke(Point::new(10.0, 10.0), &frame);
        guest.extend_stroke(Point::new(60.0, 40.0), &frame);
        assert!(guest.end_stroke().unwrap());
        // Not drawn locally until the operator applies it
        assert!(guest.state().unwrap().session.drawings.is_empty());

        hub.poll(&mut session, Instant::now());
        assert_eq!(session.drawings.len(), 1);
        assert!(guest.poll());
        assert_eq!(guest.state().unwrap().session.drawings.len(), 1);
    }

    #[test]
    fn single_point_stroke_is_not_sent() {
        let bus = SyncBus::new("booth", 8);
        let mut operator = bus.operator().unwrap();
        let mut guest = GuestMirror::new(&bus);
        guest.begin_stroke(Point::new(10.0, 10.0), &square_frame());
        assert!(!guest.end_stroke().unwrap());
        assert!(operator.try_recv().is_none());
    }

    #[test]
    fn render_waits_for_first_state() {
        let bus = SyncBus::new("booth", 8);
        let operator = bus.operator().unwrap();
        let mut guest = GuestMirror::new(&bus);
        let mut renderer = PreviewRenderer::new();
        let frame = square_frame();
        let mut images = ImageStore::new();
        let fonts = FontBook::new();
        let theme = Theme::default();

        assert!(guest
            .render(&mut renderer, &frame, &mut images, &fonts, &theme, Instant::now())
            .is_none());
        operator
            .post(&InterWindowMessage::SetState(Box::new(state(1, 0))))
            .unwrap();
        guest.poll();
        assert!(guest
            .render(&mut renderer, &frame, &mut images, &fonts, &theme, Instant::now())
            .is_some());
        assert_eq!(renderer.snapshot().dimensions(), (100, 100));
    }

    #[test]
    fn restarted_operator_takes_over() {
        let bus = SyncBus::new("booth", 16);
        let mut guest = GuestMirror::new(&bus);
        let mut session = Session::new();

        let mut first = OperatorHub::new(&bus, Config::default()).unwrap();
        for _ in 0..5 {
            first.broadcast(&session).unwrap();
        }
        assert!(guest.poll());
        assert_eq!(guest.state().unwrap().revision, 5);
        drop(first);

        // A new operator run starts counting from scratch
        let mut second = OperatorHub::new(&bus, Config::default()).unwrap();
        session.filter = "sepia(1)".to_string();
        second.broadcast(&session).unwrap();
        assert!(guest.poll());
        let state = guest.state().unwrap();
        assert_eq!(state.revision, 1);
        assert_eq!(state.epoch, second.epoch());
        assert_eq!(state.session.filter, "sepia(1)");

        // Within the new run, order still holds
        let mut stale = state.clone();
        stale.revision = 0;
        stale.session.filter = "none".to_string();
        assert!(!guest.receive(InterWindowMessage::SetState(Box::new(stale))));
        assert_eq!(guest.state().unwrap().session.filter, "sepia(1)");
    }

    #[test]
    fn guest_intents_reach_an_operator_that_joins_later() {
        let bus = SyncBus::new("booth", 2);
        let guest = GuestMirror::new(&bus);
        guest.request_state().unwrap();
        for _ in 0..10 {
            guest
                .send_action(GuestAction::SetFilter {
                    filter: "sepia(1)".to_string(),
                })
                .unwrap();
        }
        let mut hub = OperatorHub::new(&bus, Config::default()).unwrap();
        let mut session = Session::new();
        assert_eq!(hub.poll(&mut session, Instant::now()).len(), 10);
        assert_eq!(session.filter, "sepia(1)");
    }

    #[tokio::test]
    async fn next_state_waits_for_operator() {
        let bus = SyncBus::new("booth", 8);
        let operator = bus.operator().unwrap();
        let mut guest = GuestMirror::new(&bus);
        let waiter = tokio::spawn(async move {
            let changed = guest.next_state().await;
            (changed, guest.mode())
        });
        let mut s = state(1, 0);
        s.mode = KioskMode::Layout;
        operator.post(&InterWindowMessage::SetState(Box::new(s))).unwrap();
        assert_eq!(waiter.await.unwrap(), (true, KioskMode::Layout));
    }
}
