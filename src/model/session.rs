// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The session: every layer of one composition plus global state.
//!
//! Array order is z-order within a kind (later entries draw on top). The
//! kinds themselves always draw photos, drawings, stickers, then text.

use super::layer::{DrawingLayer, LayerKind, PhotoLayer, StickerLayer, TextLayer, Transform};
use super::layer_id::{IdSpaceExhausted, LayerId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Session {
    pub photos: Vec<PhotoLayer>,
    pub stickers: Vec<StickerLayer>,
    pub text_layers: Vec<TextLayer>,
    pub drawings: Vec<DrawingLayer>,
    /// CSS-style filter applied to photos
    pub filter: String,
    pub is_paid: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of layers of one kind.
    pub fn len(&self, kind: LayerKind) -> usize {
        match kind {
            LayerKind::Photo => self.photos.len(),
            LayerKind::Sticker => self.stickers.len(),
            LayerKind::Text => self.text_layers.len(),
            LayerKind::Drawing => self.drawings.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
            && self.stickers.is_empty()
            && self.text_layers.is_empty()
            && self.drawings.is_empty()
    }

    /// Remove a layer. Returns false when the index is out of range.
    ///
    /// Callers holding a selection must reconcile it afterwards
    /// (see `Selection::after_removal`).
    pub fn remove(&mut self, kind: LayerKind, index: usize) -> bool {
        if index >= self.len(kind) {
            return false;
        }
        match kind {
            LayerKind::Photo => {
                self.photos.remove(index);
            }
            LayerKind::Sticker => {
                self.stickers.remove(index);
            }
            LayerKind::Text => {
                self.text_layers.remove(index);
            }
            LayerKind::Drawing => {
                self.drawings.remove(index);
            }
        }
        true
    }

    /// Move a layer to the top of its kind's stack, returning its new index.
    pub fn bring_to_front(&mut self, kind: LayerKind, index: usize) -> Option<usize> {
        fn rotate<T>(items: &mut [T], index: usize) -> Option<usize> {
            if index >= items.len() {
                return None;
            }
            items[index..].rotate_left(1);
            Some(items.len() - 1)
        }
        match kind {
            LayerKind::Photo => rotate(&mut self.photos, index),
            LayerKind::Sticker => rotate(&mut self.stickers, index),
            LayerKind::Text => rotate(&mut self.text_layers, index),
            LayerKind::Drawing => rotate(&mut self.drawings, index),
        }
    }

    /// Re-slot photos into a layout's transforms, in order.
    ///
    /// Photos beyond the slot count keep their placement. Crops reset since
    /// the box shape changes.
    pub fn apply_layout(&mut self, slots: &[Transform]) {
        for (photo, slot) in self.photos.iter_mut().zip(slots) {
            photo.transform = *slot;
            photo.crop = Default::default();
        }
    }

    /// Advance the id counter past every id in this session. Call after
    /// deserializing a session from outside this process.
    pub fn reserve_ids(&self) -> Result<(), IdSpaceExhausted> {
        let ids = self
            .stickers
            .iter()
            .map(|s| s.id)
            .chain(self.text_layers.iter().map(|t| t.id))
            .chain(self.drawings.iter().map(|d| d.id));
        match ids.max() {
            Some(max) => LayerId::reserve_through(max),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    fn sticker(src: &str) -> StickerLayer {
        StickerLayer::new(src, Point::new(0.5, 0.5), 0.2, 0.2)
    }

    #[test]
    fn session_with_largest_id_is_rejected() {
        let mut session = Session::new();
        session.stickers.push(sticker("a"));
        let mut json = serde_json::to_value(&session).unwrap();
        json["stickers"][0]["id"] = serde_json::json!(u64::MAX);
        let foreign: Session = serde_json::from_value(json).unwrap();
        assert!(foreign.reserve_ids().is_err());
        assert!(Session::new().reserve_ids().is_ok());
    }

    #[test]
    fn remove_out_of_range_is_noop() {
        let mut session = Session::new();
        session.stickers.push(sticker("a"));
        assert!(!session.remove(LayerKind::Sticker, 3));
        assert_eq!(session.stickers.len(), 1);
        assert!(session.remove(LayerKind::Sticker, 0));
        assert!(session.is_empty());
    }

    #[test]
    fn bring_to_front_keeps_relative_order() {
        let mut session = Session::new();
        for src in ["a", "b", "c"] {
            session.stickers.push(sticker(src));
        }
        assert_eq!(session.bring_to_front(LayerKind::Sticker, 0), Some(2));
        let order: Vec<&str> = session.stickers.iter().map(|s| s.src.as_str()).collect();
        assert_eq!(order, ["b", "c", "a"]);
        assert_eq!(session.bring_to_front(LayerKind::Sticker, 9), None);
    }

    #[test]
    fn apply_layout_reslots_photos() {
        let mut session = Session::new();
        session.photos.push(PhotoLayer::new("a", 10, 10));
        session.photos.push(PhotoLayer::new("b", 10, 10));
        session.photos[0].crop.x = 40.0;
        let slot = Transform {
            x: 0.2,
            y: 0.3,
            width: 0.4,
            height: 0.5,
            rotation: 0.0,
        };
        session.apply_layout(&[slot]);
        assert_eq!(session.photos[0].transform, slot);
        assert_eq!(session.photos[0].crop.x, 0.0);
        assert_eq!(session.photos[1].transform, Transform::default());
    }

    #[test]
    fn session_json_shape() {
        let mut session = Session::new();
        session.is_paid = true;
        let json = serde_json::to_value(&session).unwrap();
        assert!(json["textLayers"].is_array());
        assert_eq!(json["isPaid"], true);
        let back: Session = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
