// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The drawing interface both render pipelines target.

use super::filter::FilterChain;
use super::text::TextBlock;
use crate::model::geometry::RotatedRect;
use image::RgbaImage;
use kurbo::{Affine, Point, Size};
use peniko::Color;

/// An image blit: `transform` maps image pixel space onto the surface.
#[derive(Debug, Clone, Copy)]
pub struct ImageDraw<'a> {
    pub image: &'a RgbaImage,
    pub transform: Affine,
    /// Only pixels inside this rect are touched
    pub clip: Option<RotatedRect>,
    pub opacity: f64,
    pub filter: &'a FilterChain,
}

pub trait Surface {
    /// Size in device pixels.
    fn size(&self) -> Size;

    /// Replace every pixel with `color`.
    fn clear(&mut self, color: Color);

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color);

    /// Stroke connected segments with round joins and caps. A single point
    /// draws a dot.
    fn stroke_polyline(&mut self, points: &[Point], width: f64, color: Color);

    fn draw_image(&mut self, draw: ImageDraw<'_>);

    /// Fill a laid-out text block; `transform` maps block space onto the
    /// surface.
    fn draw_text(&mut self, block: &TextBlock, transform: Affine, color: Color);

    /// Outline of a rotated rectangle.
    fn stroke_rotated_rect(&mut self, rect: &RotatedRect, width: f64, color: Color) {
        let [a, b, c, d] = rect.corners();
        self.stroke_polyline(&[a, b, c, d, a], width, color);
    }
}
