// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Pointer-driven gesture state machine.
//!
//! A gesture starts on pointer-down from `Idle`, is updated on every
//! pointer-move, and ends on pointer-up or pointer-leave. Each non-idle
//! state carries what it needs from gesture start (anchor pointer and a
//! snapshot of the layer), so every update is computed against a stable
//! origin instead of accumulating per-frame deltas. There is no way to
//! reach a non-idle state without that snapshot.

use super::hit_test::{self, HitContext, HitTarget};
use super::selection::Selection;
use crate::model::geometry::{self, rotate_vector};
use crate::model::layer::NormalizedPoint;
use crate::model::{Crop, DrawingLayer, LayerKind, Session, StickerLayer, TextLayer};
use crate::settings;
use kurbo::{Point, Size};

/// Active editing tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ToolId {
    /// Select, move, rotate, scale, and crop layers
    #[default]
    Select,
    /// Freehand drawing
    Draw,
}

/// Coarse state of the machine, for rendering and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionMode {
    Idle,
    Moving,
    Rotating,
    Scaling,
    CropPanning,
    Drawing,
}

/// Stroke settings for the draw tool.
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    pub color: String,
    /// Fraction of the canvas height
    pub width: f64,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            color: "#ff3366".to_string(),
            width: 0.008,
        }
    }
}

/// Size of the layer being scaled, captured at gesture start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleOrigin {
    Sticker { width: f64, height: f64 },
    Text { font_size: f64 },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    Moving {
        target: Selection,
        anchor: Point,
        /// Normalized layer center at gesture start
        origin: Point,
    },
    Rotating {
        target: Selection,
        center: Point,
        /// `angle(anchor) - start_rotation`, in degrees
        angle_offset: f64,
    },
    Scaling {
        target: Selection,
        center: Point,
        start_distance: f64,
        origin: ScaleOrigin,
    },
    CropPanning {
        target: Selection,
        anchor: Point,
        start_crop: Crop,
        rotation: f64,
    },
    Drawing {
        points: Vec<NormalizedPoint>,
        brush: Brush,
    },
}

impl Gesture {
    pub fn mode(&self) -> InteractionMode {
        match self {
            Gesture::Idle => InteractionMode::Idle,
            Gesture::Moving { .. } => InteractionMode::Moving,
            Gesture::Rotating { .. } => InteractionMode::Rotating,
            Gesture::Scaling { .. } => InteractionMode::Scaling,
            Gesture::CropPanning { .. } => InteractionMode::CropPanning,
            Gesture::Drawing { .. } => InteractionMode::Drawing,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Gesture::Idle)
    }

    /// Points of the in-progress stroke, if drawing.
    pub fn live_stroke(&self) -> Option<(&[NormalizedPoint], &Brush)> {
        match self {
            Gesture::Drawing { points, brush } => Some((points, brush)),
            _ => None,
        }
    }

    /// Pointer-down. Only valid from `Idle`; updates `selection` to the hit
    /// layer, or clears it when nothing is hit.
    pub fn begin(
        session: &Session,
        selection: &mut Option<Selection>,
        tool: ToolId,
        brush: &Brush,
        point: Point,
        ctx: &HitContext<'_>,
    ) -> Gesture {
        if tool == ToolId::Draw {
            return Gesture::Drawing {
                points: vec![NormalizedPoint::from_canvas(point, ctx.frame)],
                brush: brush.clone(),
            };
        }

        let current = super::selection::reconcile(*selection, session);
        let Some(hit) = hit_test::hit_test(session, current, point, ctx) else {
            *selection = None;
            return Gesture::Idle;
        };

        let target = hit.selection();
        *selection = Some(target);
        let gesture = match hit {
            HitTarget::RotateHandle(_) => Self::begin_rotate(session, target, point, ctx),
            HitTarget::ScaleHandle(_) => Self::begin_scale(session, target, point, ctx),
            HitTarget::Body(_) => Self::begin_body(session, target, point),
        }
        .unwrap_or_default();
        tracing::debug!("[Gesture::begin] {:?} on {:?}", gesture.mode(), target);
        gesture
    }

    fn begin_rotate(
        session: &Session,
        target: Selection,
        point: Point,
        ctx: &HitContext<'_>,
    ) -> Option<Gesture> {
        let rect = hit_test::layer_rect(session, target, ctx)?;
        let start_rotation = rotation_of(session, target)?;
        Some(Gesture::Rotating {
            target,
            center: rect.center,
            angle_offset: geometry::angle_around(rect.center, point) - start_rotation,
        })
    }

    fn begin_scale(
        session: &Session,
        target: Selection,
        point: Point,
        ctx: &HitContext<'_>,
    ) -> Option<Gesture> {
        let rect = hit_test::layer_rect(session, target, ctx)?;
        let origin = match target.kind {
            LayerKind::Sticker => {
                let sticker = session.stickers.get(target.index)?;
                ScaleOrigin::Sticker {
                    width: sticker.width,
                    height: sticker.height,
                }
            }
            LayerKind::Text => ScaleOrigin::Text {
                font_size: session.text_layers.get(target.index)?.font_size,
            },
            LayerKind::Photo | LayerKind::Drawing => return None,
        };
        Some(Gesture::Scaling {
            target,
            center: rect.center,
            start_distance: geometry::distance(point, rect.center),
            origin,
        })
    }

    fn begin_body(session: &Session, target: Selection, point: Point) -> Option<Gesture> {
        match target.kind {
            LayerKind::Photo => {
                let photo = session.photos.get(target.index)?;
                Some(Gesture::CropPanning {
                    target,
                    anchor: point,
                    start_crop: photo.crop,
                    rotation: photo.transform.rotation,
                })
            }
            LayerKind::Sticker => {
                let sticker = session.stickers.get(target.index)?;
                Some(Gesture::Moving {
                    target,
                    anchor: point,
                    origin: Point::new(sticker.x, sticker.y),
                })
            }
            LayerKind::Text => {
                let text = session.text_layers.get(target.index)?;
                Some(Gesture::Moving {
                    target,
                    anchor: point,
                    origin: Point::new(text.x, text.y),
                })
            }
            LayerKind::Drawing => None,
        }
    }

    /// Pointer-move. Mutates the targeted layer in place and returns
    /// whether anything changed.
    pub fn update(
        &mut self,
        session: &mut Session,
        point: Point,
        frame: Size,
        global_photo_scale: f64,
    ) -> bool {
        match self {
            Gesture::Idle => false,
            Gesture::Moving {
                target,
                anchor,
                origin,
            } => {
                if frame.width <= 0.0 || frame.height <= 0.0 {
                    return false;
                }
                let delta = point - *anchor;
                let x = origin.x + delta.x / frame.width;
                let y = origin.y + delta.y / frame.height;
                match target.kind {
                    LayerKind::Sticker => with_sticker(session, *target, |s| {
                        s.x = x;
                        s.y = y;
                    }),
                    LayerKind::Text => with_text(session, *target, |t| {
                        t.x = x;
                        t.y = y;
                    }),
                    LayerKind::Photo | LayerKind::Drawing => false,
                }
            }
            Gesture::Rotating {
                target,
                center,
                angle_offset,
            } => {
                let rotation = geometry::angle_around(*center, point) - *angle_offset;
                set_rotation(session, *target, rotation)
            }
            Gesture::Scaling {
                target,
                center,
                start_distance,
                origin,
            } => {
                if *start_distance <= f64::EPSILON {
                    return false;
                }
                let factor = geometry::distance(point, *center) / *start_distance;
                let floor = settings::interaction::MIN_LAYER_SIZE;
                match *origin {
                    ScaleOrigin::Sticker { width, height } => {
                        let smallest = width.min(height);
                        let factor = if smallest > 0.0 {
                            factor.max(floor / smallest)
                        } else {
                            factor
                        };
                        with_sticker(session, *target, |s| {
                            s.width = (width * factor).max(floor);
                            s.height = (height * factor).max(floor);
                        })
                    }
                    ScaleOrigin::Text { font_size } => with_text(session, *target, |t| {
                        t.font_size = (font_size * factor).max(floor);
                    }),
                }
            }
            Gesture::CropPanning {
                target,
                anchor,
                start_crop,
                rotation,
            } => {
                let local = rotate_vector(point - *anchor, -*rotation);
                let divisor = global_photo_scale.max(f64::EPSILON) * start_crop.effective_scale();
                let Some(photo) = session.photos.get_mut(target.index) else {
                    return false;
                };
                photo.crop.x = start_crop.x - local.x / divisor;
                photo.crop.y = start_crop.y - local.y / divisor;
                true
            }
            Gesture::Drawing { points, .. } => {
                points.push(NormalizedPoint::from_canvas(point, frame));
                true
            }
        }
    }

    /// Pointer-up or pointer-leave. Move/rotate/scale/crop were applied
    /// incrementally, so only a stroke needs committing.
    pub fn finish(self) -> Option<DrawingLayer> {
        match self {
            Gesture::Drawing { points, brush } if points.len() > 1 => {
                Some(DrawingLayer::new(points, brush.color, brush.width))
            }
            _ => None,
        }
    }
}

fn with_sticker(session: &mut Session, target: Selection, f: impl FnOnce(&mut StickerLayer)) -> bool {
    match session.stickers.get_mut(target.index) {
        Some(sticker) => {
            f(sticker);
            true
        }
        None => false,
    }
}

fn with_text(session: &mut Session, target: Selection, f: impl FnOnce(&mut TextLayer)) -> bool {
    match session.text_layers.get_mut(target.index) {
        Some(text) => {
            f(text);
            true
        }
        None => false,
    }
}

fn rotation_of(session: &Session, target: Selection) -> Option<f64> {
    match target.kind {
        LayerKind::Photo => session.photos.get(target.index).map(|p| p.transform.rotation),
        LayerKind::Sticker => session.stickers.get(target.index).map(|s| s.rotation),
        LayerKind::Text => session.text_layers.get(target.index).map(|t| t.rotation),
        LayerKind::Drawing => None,
    }
}

fn set_rotation(session: &mut Session, target: Selection, rotation: f64) -> bool {
    match target.kind {
        LayerKind::Photo => match session.photos.get_mut(target.index) {
            Some(photo) => {
                photo.transform.rotation = rotation;
                true
            }
            None => false,
        },
        LayerKind::Sticker => with_sticker(session, target, |s| s.rotation = rotation),
        LayerKind::Text => with_text(session, target, |t| t.rotation = rotation),
        LayerKind::Drawing => false,
    }
}
