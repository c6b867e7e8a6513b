// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The operator's editor canvas.
//!
//! [`EditorCanvas`] owns the canonical session and everything that acts
//! on it: the selection, the active gesture, undo history, the preview
//! renderer and the compositor. Pointer handling lives in `pointer.rs` and
//! per-frame work in `paint.rs`.

mod paint;
mod pointer;

use crate::compositor::{Compositor, WorkerResources};
use crate::editing::interaction::Brush;
use crate::editing::selection;
use crate::editing::{Gesture, History, InteractionMode, Selection, ToolId};
use crate::model::{IdSpaceExhausted, LayerKind, PhotoLayer, Session, StickerLayer, TextLayer};
use crate::render::{CanvasFrame, FontBook, ImageLoadError, ImageStore, PreviewRenderer};
use crate::settings::Config;
use crate::sync::{GuestAction, OperatorHub};
use crate::theme::Theme;
use kurbo::Point;
use std::path::Path;
use std::time::Instant;

/// Width of a freshly added sticker, as a fraction of the canvas width
const NEW_STICKER_WIDTH: f64 = 0.25;

/// Size of freshly added text, as a fraction of the canvas height
const NEW_TEXT_SIZE: f64 = 0.06;

#[derive(Debug)]
pub struct EditorCanvas {
    pub(super) session: Session,
    pub(super) selection: Option<Selection>,
    pub(super) gesture: Gesture,
    /// Whether the current gesture has changed the session
    pub(super) gesture_changed: bool,
    pub(super) tool: ToolId,
    pub(super) brush: Brush,
    pub(super) history: History,
    pub(super) preview: PreviewRenderer,
    pub(super) compositor: Compositor,
    pub(super) config: Config,
    pub(super) images: ImageStore,
    pub(super) fonts: FontBook,
    pub(super) theme: Theme,
    pub(super) frame: CanvasFrame,
    pub(super) frame_src: Option<String>,
    pub(super) layout: Option<String>,
    /// Session changed since the last [`take_edited`](Self::take_edited)
    pub(super) edited: bool,
    /// Session changed since the last [`take_unsaved`](Self::take_unsaved)
    pub(super) unsaved: bool,
    /// Layout or frame changed here and the hub has not been told
    pub(super) kiosk_dirty: bool,
}

impl EditorCanvas {
    /// A canvas with a background compositor thread.
    pub fn new(config: Config, theme: Theme) -> Self {
        let compositor = Compositor::new(Self::worker_resources(&config, theme), config.composite_debounce());
        Self::with_compositor(config, theme, compositor)
    }

    /// A canvas using the given compositor.
    pub fn with_compositor(config: Config, theme: Theme, compositor: Compositor) -> Self {
        let fonts = match &config.fonts_dir {
            Some(dir) => FontBook::load_dir(dir),
            None => FontBook::new(),
        };
        Self {
            session: Session::new(),
            selection: None,
            gesture: Gesture::Idle,
            gesture_changed: false,
            tool: ToolId::default(),
            brush: Brush::default(),
            history: History::new(Session::new(), config.history_depth),
            preview: PreviewRenderer::new(),
            compositor,
            images: ImageStore::new(),
            fonts,
            theme,
            frame: CanvasFrame::default(),
            frame_src: config.frame_src.clone(),
            layout: None,
            edited: false,
            unsaved: false,
            kiosk_dirty: false,
            config,
        }
    }

    /// What a compositor for this config needs.
    pub fn worker_resources(config: &Config, theme: Theme) -> WorkerResources {
        WorkerResources {
            image_dir: None,
            fonts_dir: config.fonts_dir.clone(),
            theme,
        }
    }

    /// Start over from `session`, clearing history. A session whose ids
    /// cannot be reserved is refused and the current one kept.
    pub fn load_session(&mut self, session: Session, now: Instant) -> Result<(), IdSpaceExhausted> {
        session.reserve_ids()?;
        self.gesture = Gesture::Idle;
        self.selection = None;
        self.history = History::new(session.clone(), self.config.history_depth);
        self.session = session;
        self.touch(now);
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn select(&mut self, selection: Option<Selection>) {
        self.selection = selection.and_then(|sel| sel.resolve(&self.session));
    }

    pub fn mode(&self) -> InteractionMode {
        self.gesture.mode()
    }

    pub fn tool(&self) -> ToolId {
        self.tool
    }

    /// Switch tools. Ignored mid-gesture.
    pub fn set_tool(&mut self, tool: ToolId) {
        if self.gesture.is_idle() {
            self.tool = tool;
        }
    }

    pub fn brush(&self) -> &Brush {
        &self.brush
    }

    pub fn set_brush(&mut self, brush: Brush) {
        self.brush = brush;
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn preview(&self) -> &PreviewRenderer {
        &self.preview
    }

    pub fn frame(&self) -> &CanvasFrame {
        &self.frame
    }

    pub fn frame_src(&self) -> Option<&str> {
        self.frame_src.as_deref()
    }

    pub fn layout(&self) -> Option<&str> {
        self.layout.as_deref()
    }

    pub fn set_frame_src(&mut self, frame_src: Option<String>, now: Instant) {
        if self.frame_src != frame_src {
            self.frame_src = frame_src;
            self.kiosk_dirty = true;
            self.touch(now);
        }
    }

    pub fn images_mut(&mut self) -> &mut ImageStore {
        &mut self.images
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether the session changed since the last call.
    pub fn take_edited(&mut self) -> bool {
        std::mem::take(&mut self.edited)
    }

    /// Whether the session changed since it was last saved.
    pub fn take_unsaved(&mut self) -> bool {
        std::mem::take(&mut self.unsaved)
    }

    // ============================================================================
    // LAYER COMMANDS
    // ============================================================================

    /// Add a photo, placed in the active layout's next free slot.
    pub fn add_photo(&mut self, src: &str, width: u32, height: u32, now: Instant) -> Selection {
        let mut photo = PhotoLayer::new(src, width, height);
        if let Some(slot) = self
            .layout
            .as_deref()
            .and_then(|id| self.config.layout(id))
            .and_then(|layout| layout.slots.get(self.session.photos.len()))
        {
            photo = photo.with_transform(*slot);
        }
        self.session.photos.push(photo);
        self.finish_add(LayerKind::Photo, now)
    }

    /// Add a photo file, sized from the decoded image.
    pub fn import_photo(&mut self, path: &Path, now: Instant) -> Result<Selection, ImageLoadError> {
        let src = path.to_string_lossy().into_owned();
        let image = self.images.load(&src)?;
        Ok(self.add_photo(&src, image.width(), image.height(), now))
    }

    /// Add a sticker at the canvas center, keeping the image's aspect ratio
    /// when the image can be loaded.
    pub fn add_sticker(&mut self, src: &str, now: Instant) -> Selection {
        let width = NEW_STICKER_WIDTH;
        let height = match self.images.get(src) {
            Some(image) if image.width() > 0 => {
                width * self.config.aspect.ratio() * image.height() as f64 / image.width() as f64
            }
            _ => width * self.config.aspect.ratio(),
        };
        self.session
            .stickers
            .push(StickerLayer::new(src, Point::new(0.5, 0.5), width, height));
        self.finish_add(LayerKind::Sticker, now)
    }

    pub fn add_text(&mut self, text: &str, now: Instant) -> Selection {
        self.session
            .text_layers
            .push(TextLayer::new(text, Point::new(0.5, 0.5), NEW_TEXT_SIZE));
        self.finish_add(LayerKind::Text, now)
    }

    fn finish_add(&mut self, kind: LayerKind, now: Instant) -> Selection {
        let selection = Selection::new(kind, self.session.len(kind) - 1);
        self.selection = Some(selection);
        self.commit(now);
        selection
    }

    pub fn delete_selected(&mut self, now: Instant) -> bool {
        let Some(sel) = self.selection else {
            return false;
        };
        if !self.session.remove(sel.kind, sel.index) {
            self.selection = None;
            return false;
        }
        self.selection = sel.after_removal(sel.kind, sel.index);
        self.commit(now);
        true
    }

    pub fn bring_selected_to_front(&mut self, now: Instant) -> bool {
        let Some(sel) = self.selection else {
            return false;
        };
        let Some(index) = self.session.bring_to_front(sel.kind, sel.index) else {
            return false;
        };
        self.selection = Some(Selection::new(sel.kind, index));
        self.commit(now);
        true
    }

    /// Change the selected text layer's content and/or color.
    pub fn update_selected_text(&mut self, text: Option<&str>, color: Option<&str>, now: Instant) -> bool {
        let Some(layer) = self
            .selection
            .filter(|sel| sel.kind == LayerKind::Text)
            .and_then(|sel| self.session.text_layers.get_mut(sel.index))
        else {
            return false;
        };
        if let Some(text) = text {
            layer.text = text.to_string();
        }
        if let Some(color) = color {
            layer.color = color.to_string();
        }
        self.commit(now);
        true
    }

    /// Multiply the selected photo's crop zoom, floored at neutral.
    pub fn zoom_selected_photo(&mut self, factor: f64, now: Instant) -> bool {
        if !(factor.is_finite() && factor > 0.0) {
            return false;
        }
        let Some(photo) = self
            .selection
            .filter(|sel| sel.kind == LayerKind::Photo)
            .and_then(|sel| self.session.photos.get_mut(sel.index))
        else {
            return false;
        };
        photo.crop.scale = (photo.crop.effective_scale() * factor).max(crate::model::Crop::MIN_SCALE);
        self.commit(now);
        true
    }

    pub fn set_filter(&mut self, filter: &str, now: Instant) {
        if self.session.filter != filter {
            self.session.filter = filter.to_string();
            self.commit(now);
        }
    }

    /// Re-slot photos into a named layout. Unknown ids are ignored.
    pub fn apply_layout(&mut self, id: &str, now: Instant) -> bool {
        let Some(layout) = self.config.layout(id) else {
            tracing::warn!("Unknown layout {:?}", id);
            return false;
        };
        self.session.apply_layout(&layout.slots);
        self.layout = Some(id.to_string());
        self.kiosk_dirty = true;
        self.commit(now);
        true
    }

    pub fn undo(&mut self, now: Instant) -> bool {
        if !self.gesture.is_idle() {
            return false;
        }
        match self.history.undo() {
            Some(snapshot) => {
                self.restore(&snapshot, now);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self, now: Instant) -> bool {
        if !self.gesture.is_idle() {
            return false;
        }
        match self.history.redo() {
            Some(snapshot) => {
                self.restore(&snapshot, now);
                true
            }
            None => false,
        }
    }

    fn restore(&mut self, snapshot: &Session, now: Instant) {
        self.session = snapshot.clone();
        self.selection = selection::reconcile(self.selection, &self.session);
        self.touch(now);
    }

    // ============================================================================
    // GUEST SYNC
    // ============================================================================

    /// Apply queued guest actions and keep the guest display current.
    /// Returns the actions applied.
    ///
    /// The hub holds the kiosk state. Layout and frame choices made here
    /// are handed to it before guest actions are applied, and only an
    /// applied guest action brings its values back.
    pub fn sync_with(&mut self, hub: &mut OperatorHub, now: Instant) -> Vec<GuestAction> {
        if std::mem::take(&mut self.kiosk_dirty) {
            let layout = self.layout.clone();
            let frame_src = self.frame_src.clone();
            match hub.update_kiosk(&self.session, |kiosk| {
                kiosk.layout = layout;
                kiosk.frame_src = frame_src;
            }) {
                // That broadcast carried the session too
                Ok(true) => self.edited = false,
                Ok(false) => {}
                Err(e) => tracing::error!("Cannot send operator kiosk change: {}", e),
            }
        }

        let applied = hub.poll(&mut self.session, now);
        if !applied.is_empty() {
            self.layout = hub.kiosk().layout.clone();
            if self.frame_src != hub.kiosk().frame_src {
                self.frame_src = hub.kiosk().frame_src.clone();
                self.touch(now);
            }
            if applied.iter().any(|action| action.touches_session()) {
                self.selection = selection::reconcile(self.selection, &self.session);
                self.commit(now);
            }
            // The hub already broadcast this state
            self.edited = false;
        }
        if self.take_edited()
            && let Err(e) = hub.session_edited(&self.session, now)
        {
            tracing::error!("Cannot rebroadcast session: {}", e);
        }
        applied
    }

    /// Record a finished change: one history entry, a new composite, and a
    /// guest rebroadcast.
    pub(super) fn commit(&mut self, now: Instant) {
        self.history.push(&self.session);
        self.touch(now);
    }

    /// The session changed in a way the outputs must reflect.
    pub(super) fn touch(&mut self, now: Instant) {
        self.compositor.mark_dirty(now);
        self.edited = true;
        self.unsaved = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{GuestAction, InterWindowMessage, SyncBus};
    use std::time::Duration;

    pub(super) fn canvas() -> EditorCanvas {
        let config = Config::default();
        let theme = Theme::default();
        let compositor = Compositor::inline(
            EditorCanvas::worker_resources(&config, theme),
            config.composite_debounce(),
        );
        EditorCanvas::with_compositor(config, theme, compositor)
    }

    #[test]
    fn add_and_delete_reconcile_selection() {
        let now = Instant::now();
        let mut canvas = canvas();
        canvas.add_sticker("a.png", now);
        canvas.add_sticker("b.png", now);
        assert_eq!(canvas.selection(), Some(Selection::new(LayerKind::Sticker, 1)));

        assert!(canvas.delete_selected(now));
        assert_eq!(canvas.selection(), None);
        assert_eq!(canvas.session().stickers.len(), 1);
        assert!(!canvas.delete_selected(now));
    }

    #[test]
    fn bring_to_front_follows_the_layer() {
        let now = Instant::now();
        let mut canvas = canvas();
        canvas.add_sticker("a.png", now);
        canvas.add_sticker("b.png", now);
        canvas.select(Some(Selection::new(LayerKind::Sticker, 0)));
        assert!(canvas.bring_selected_to_front(now));
        assert_eq!(canvas.selection(), Some(Selection::new(LayerKind::Sticker, 1)));
        assert_eq!(canvas.session().stickers[1].src, "a.png");
    }

    #[test]
    fn photos_fill_layout_slots() {
        let now = Instant::now();
        let mut canvas = canvas();
        assert!(canvas.apply_layout("strip", now));
        canvas.add_photo("one.jpg", 400, 300, now);
        canvas.add_photo("two.jpg", 400, 300, now);
        let slots = &canvas.config().layout("strip").unwrap().slots;
        assert_eq!(canvas.session().photos[1].transform, slots[1]);
        assert!(!canvas.apply_layout("nope", now));
    }

    #[test]
    fn text_edits_only_touch_text() {
        let now = Instant::now();
        let mut canvas = canvas();
        canvas.add_sticker("a.png", now);
        assert!(!canvas.update_selected_text(Some("hi"), None, now));
        canvas.add_text("Hello", now);
        assert!(canvas.update_selected_text(Some("Hi!"), Some("#000"), now));
        let text = &canvas.session().text_layers[0];
        assert_eq!((text.text.as_str(), text.color.as_str()), ("Hi!", "#000"));
    }

    #[test]
    fn undo_redo_walk_history() {
        let now = Instant::now();
        let mut canvas = canvas();
        canvas.add_text("one", now);
        canvas.set_filter("sepia(1)", now);
        assert!(canvas.undo(now));
        assert_eq!(canvas.session().filter, "");
        assert_eq!(canvas.session().text_layers.len(), 1);
        assert!(canvas.undo(now));
        assert!(canvas.session().is_empty());
        assert_eq!(canvas.selection(), None);
        assert!(!canvas.undo(now));
        assert!(canvas.redo(now));
        assert_eq!(canvas.session().text_layers.len(), 1);
    }

    #[test]
    fn photo_zoom_is_floored() {
        let now = Instant::now();
        let mut canvas = canvas();
        canvas.add_photo("p.jpg", 100, 100, now);
        assert!(canvas.zoom_selected_photo(2.0, now));
        assert_eq!(canvas.session().photos[0].crop.scale, 2.0);
        assert!(canvas.zoom_selected_photo(0.1, now));
        assert_eq!(canvas.session().photos[0].crop.scale, 1.0);
    }

    #[test]
    fn guest_actions_flow_into_the_session() {
        let now = Instant::now();
        let bus = SyncBus::new("booth", 16);
        let mut hub = OperatorHub::new(&bus, Config::default()).unwrap();
        let mut guest = bus.guest();
        let mut canvas = canvas();
        canvas.add_photo("p.jpg", 100, 100, now);

        for action in [
            GuestAction::Start,
            GuestAction::SelectLayout {
                layout: "grid".to_string(),
            },
            GuestAction::SetFilter {
                filter: "grayscale(1)".to_string(),
            },
        ] {
            guest.post(&InterWindowMessage::GuestAction(action)).unwrap();
        }
        assert_eq!(canvas.sync_with(&mut hub, now).len(), 3);
        assert_eq!(canvas.session().filter, "grayscale(1)");
        let grid = canvas.config().layout("grid").unwrap().slots[0];
        assert_eq!(canvas.session().photos[0].transform, grid);

        // New photos now land in the guest's chosen layout
        canvas.add_photo("q.jpg", 100, 100, now);
        assert_eq!(
            canvas.session().photos[1].transform,
            canvas.config().layout("grid").unwrap().slots[1]
        );

        // That edit is rebroadcast on the next sync
        while guest.try_recv().is_some() {}
        canvas.sync_with(&mut hub, now + Duration::from_secs(1));
        assert!(matches!(guest.try_recv(), Some(InterWindowMessage::SetState(_))));
    }

    #[test]
    fn operator_choices_survive_a_sync() {
        let now = Instant::now();
        let bus = SyncBus::new("booth", 16);
        let mut hub = OperatorHub::new(&bus, Config::default()).unwrap();
        let mut guest = bus.guest();
        let mut canvas = canvas();

        canvas.set_frame_src(Some("gold.png".to_string()), now);
        assert!(canvas.sync_with(&mut hub, now).is_empty());
        assert_eq!(canvas.frame_src(), Some("gold.png"));
        assert_eq!(hub.kiosk().frame_src.as_deref(), Some("gold.png"));

        // The guest picks a layout, then the operator picks another
        let action = GuestAction::SelectLayout {
            layout: "grid".to_string(),
        };
        guest.post(&InterWindowMessage::GuestAction(action)).unwrap();
        canvas.sync_with(&mut hub, now);
        assert_eq!(canvas.layout(), Some("grid"));

        assert!(canvas.apply_layout("strip", now));
        canvas.sync_with(&mut hub, now);
        assert_eq!(canvas.layout(), Some("strip"));
        assert_eq!(hub.kiosk().layout.as_deref(), Some("strip"));
        assert_eq!(canvas.frame_src(), Some("gold.png"));

        canvas.add_photo("p.jpg", 100, 100, now);
        let strip = &canvas.config().layout("strip").unwrap().slots;
        assert_eq!(canvas.session().photos[0].transform, strip[0]);

        let mut last = None;
        while let Some(message) = guest.try_recv() {
            if let InterWindowMessage::SetState(state) = message {
                last = Some(*state);
            }
        }
        let state = last.unwrap();
        assert_eq!(state.layout.as_deref(), Some("strip"));
        assert_eq!(state.frame_src.as_deref(), Some("gold.png"));
    }

    #[test]
    fn import_photo_reads_its_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        image::RgbaImage::new(40, 30).save(&path).unwrap();

        let now = Instant::now();
        let mut canvas = canvas();
        assert!(!canvas.take_unsaved());
        canvas.import_photo(&path, now).unwrap();
        let photo = &canvas.session().photos[0];
        assert_eq!((photo.original_width, photo.original_height), (40, 30));
        assert!(canvas.take_unsaved());
        assert!(!canvas.take_unsaved());
        assert!(canvas.import_photo(&dir.path().join("missing.png"), now).is_err());
        assert_eq!(canvas.session().photos.len(), 1);
    }
}
