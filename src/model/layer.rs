// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The four layer variants that make up a composed image.
//!
//! All spatial fields are normalized to the canvas frame: `x`/`y` are the
//! layer center, sizes are fractions of the canvas width (horizontal) and
//! height (vertical). Text size and stroke widths are fractions of the
//! canvas height. Rotations are degrees and are never wrapped on storage.

use super::geometry::{self, RotatedRect};
use super::layer_id::LayerId;
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Which array of the session a layer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Photo,
    Sticker,
    Text,
    Drawing,
}

/// Placement of a photo box on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees
    #[serde(default)]
    pub rotation: f64,
}

impl Transform {
    pub fn rotated_rect(&self, frame: Size) -> RotatedRect {
        let abs = geometry::to_absolute(self.x, self.y, self.width, self.height, frame);
        RotatedRect::new(abs.center(), abs.size(), self.rotation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.5,
            y: 0.5,
            width: 1.0,
            height: 1.0,
            rotation: 0.0,
        }
    }
}

/// Pan and zoom inside a photo box.
///
/// `x`/`y` are pan offsets in box pixels at unit zoom; the image is drawn
/// shifted by `-offset * zoom`, so a negative `x` moves the picture right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub x: f64,
    pub y: f64,
    pub scale: f64,
}

impl Crop {
    pub const MIN_SCALE: f64 = 1.0;

    /// Zoom factor with the lower bound applied.
    pub fn effective_scale(&self) -> f64 {
        self.scale.max(Self::MIN_SCALE)
    }
}

impl Default for Crop {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

/// How a photo fills its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fit {
    /// Scale up to cover the whole box, cropping overflow
    #[default]
    Cover,
    /// Scale down to fit inside the box, leaving empty bands
    Contain,
}

impl Fit {
    /// Base scale mapping an image of `image` size into a box of `bounds` size.
    pub fn base_scale(self, image: Size, bounds: Size) -> f64 {
        if image.width <= 0.0 || image.height <= 0.0 {
            return 1.0;
        }
        let sx = bounds.width / image.width;
        let sy = bounds.height / image.height;
        match self {
            Fit::Cover => sx.max(sy),
            Fit::Contain => sx.min(sy),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoLayer {
    pub src: String,
    pub transform: Transform,
    #[serde(default)]
    pub crop: Crop,
    pub original_width: u32,
    pub original_height: u32,
    #[serde(default)]
    pub fit: Fit,
}

impl PhotoLayer {
    pub fn new(src: impl Into<String>, original_width: u32, original_height: u32) -> Self {
        Self {
            src: src.into(),
            transform: Transform::default(),
            crop: Crop::default(),
            original_width,
            original_height,
            fit: Fit::Cover,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn original_size(&self) -> Size {
        Size::new(self.original_width as f64, self.original_height as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerLayer {
    #[serde(default)]
    pub id: LayerId,
    pub src: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: f64,
}

impl StickerLayer {
    pub fn new(src: impl Into<String>, center: Point, width: f64, height: f64) -> Self {
        Self {
            id: LayerId::next(),
            src: src.into(),
            x: center.x,
            y: center.y,
            width,
            height,
            rotation: 0.0,
        }
    }

    pub fn rotated_rect(&self, frame: Size) -> RotatedRect {
        let abs = geometry::to_absolute(self.x, self.y, self.width, self.height, frame);
        RotatedRect::new(abs.center(), abs.size(), self.rotation)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    #[serde(default)]
    pub id: LayerId,
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// Fraction of the canvas height
    pub font_size: f64,
    pub font_family: String,
    pub color: String,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_font_weight")]
    pub font_weight: String,
}

fn default_font_weight() -> String {
    "normal".to_string()
}

impl TextLayer {
    pub fn new(text: impl Into<String>, center: Point, font_size: f64) -> Self {
        Self {
            id: LayerId::next(),
            text: text.into(),
            x: center.x,
            y: center.y,
            font_size,
            font_family: "sans-serif".to_string(),
            color: "#ffffff".to_string(),
            rotation: 0.0,
            font_weight: default_font_weight(),
        }
    }

    /// Whether the weight asks for a bold face (`bold`, `bolder`, or >= 600).
    pub fn is_bold(&self) -> bool {
        match self.font_weight.trim() {
            "bold" | "bolder" => true,
            other => other.parse::<u32>().is_ok_and(|w| w >= 600),
        }
    }

    /// Font size in canvas pixels.
    pub fn pixel_size(&self, frame: Size) -> f64 {
        self.font_size * frame.height
    }

    pub fn center(&self, frame: Size) -> Point {
        Point::new(self.x * frame.width, self.y * frame.height)
    }
}

/// A committed freehand stroke. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingLayer {
    #[serde(default)]
    pub id: LayerId,
    pub points: Vec<NormalizedPoint>,
    pub color: String,
    /// Fraction of the canvas height
    pub stroke_width: f64,
}

impl DrawingLayer {
    pub fn new(points: Vec<NormalizedPoint>, color: impl Into<String>, stroke_width: f64) -> Self {
        Self {
            id: LayerId::next(),
            points,
            color: color.into(),
            stroke_width,
        }
    }

    pub fn canvas_points(&self, frame: Size) -> Vec<Point> {
        self.points.iter().map(|p| p.to_canvas(frame)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub fn from_canvas(point: Point, frame: Size) -> Self {
        Self {
            x: if frame.width > 0.0 { point.x / frame.width } else { 0.0 },
            y: if frame.height > 0.0 { point.y / frame.height } else { 0.0 },
        }
    }

    pub fn to_canvas(self, frame: Size) -> Point {
        Point::new(self.x * frame.width, self.y * frame.height)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_fills_and_contain_fits() {
        let image = Size::new(400.0, 200.0);
        let bounds = Size::new(100.0, 100.0);
        assert_eq!(Fit::Cover.base_scale(image, bounds), 0.5);
        assert_eq!(Fit::Contain.base_scale(image, bounds), 0.25);
    }

    #[test]
    fn crop_scale_has_floor() {
        let crop = Crop {
            x: 0.0,
            y: 0.0,
            scale: 0.3,
        };
        assert_eq!(crop.effective_scale(), 1.0);
    }

    #[test]
    fn text_weight_detection() {
        let mut text = TextLayer::new("hi", Point::new(0.5, 0.5), 0.05);
        assert!(!text.is_bold());
        text.font_weight = "700".to_string();
        assert!(text.is_bold());
        text.font_weight = "bold".to_string();
        assert!(text.is_bold());
        text.font_weight = "400".to_string();
        assert!(!text.is_bold());
    }

    #[test]
    fn photo_json_uses_camel_case() {
        let photo = PhotoLayer::new("a.jpg", 640, 480);
        let json = serde_json::to_value(&photo).unwrap();
        assert_eq!(json["originalWidth"], 640);
        assert_eq!(json["fit"], "cover");
        assert_eq!(json["crop"]["scale"], 1.0);
    }

    #[test]
    fn sticker_missing_id_gets_fresh_one() {
        let json = r#"{"src":"s.png","x":0.1,"y":0.2,"width":0.1,"height":0.1}"#;
        let a: StickerLayer = serde_json::from_str(json).unwrap();
        let b: StickerLayer = serde_json::from_str(json).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.rotation, 0.0);
    }

    #[test]
    fn normalized_point_round_trips_through_canvas() {
        let frame = Size::new(200.0, 400.0);
        let p = NormalizedPoint::from_canvas(Point::new(50.0, 100.0), frame);
        assert_eq!(p, NormalizedPoint { x: 0.25, y: 0.25 });
        assert_eq!(p.to_canvas(frame), Point::new(50.0, 100.0));
    }
}
