// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! CPU implementation of [`Surface`] on `vello_cpu`.
//!
//! Draw calls are recorded into a [`vello_cpu::RenderContext`] and
//! rasterized into a premultiplied pixmap on [`RasterSurface::render`].
//! [`RasterSurface::to_image`] hands the result out as straight RGBA so it
//! can go to the `image` encoders as-is.

use super::filter::FilterChain;
use super::surface::{ImageDraw, Surface};
use super::text::TextBlock;
use crate::model::geometry::RotatedRect;
use crate::theme::to_rgba;
use image::{Rgba, RgbaImage};
use kurbo::{Affine, BezPath, Circle, Point, Shape, Size};
use peniko::Color;
use std::sync::Arc;
use vello_cpu::peniko::color::PremulRgba8;
use vello_cpu::{Pixmap, RenderContext};

/// Flattening tolerance for circles and clip outlines
const TOLERANCE: f64 = 0.1;

/// Largest edge a surface can have; pixmaps are addressed with `u16`.
pub const MAX_DIMENSION: u32 = u16::MAX as u32;

pub struct RasterSurface {
    width: u16,
    height: u16,
    /// `None` while the surface has no area
    ctx: Option<RenderContext>,
    pixmap: Pixmap,
    /// Draw calls recorded since the last render
    pending: bool,
}

impl std::fmt::Debug for RasterSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterSurface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pending", &self.pending)
            .finish()
    }
}

impl RasterSurface {
    /// Edges beyond [`MAX_DIMENSION`] are clamped.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.min(MAX_DIMENSION) as u16;
        let height = height.min(MAX_DIMENSION) as u16;
        Self {
            width,
            height,
            ctx: (width > 0 && height > 0).then(|| RenderContext::new(width, height)),
            pixmap: Pixmap::new(width, height),
            pending: false,
        }
    }

    /// Reallocate for a new size. Returns false, keeping the current
    /// contents, when the size is unchanged.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if (u32::from(self.width), u32::from(self.height))
            == (width.min(MAX_DIMENSION), height.min(MAX_DIMENSION))
        {
            return false;
        }
        *self = Self::new(width, height);
        true
    }

    /// Rasterize everything drawn since the last call.
    pub fn render(&mut self) {
        if !std::mem::take(&mut self.pending) {
            return;
        }
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.flush();
            ctx.render_to_pixmap(&mut self.pixmap);
        }
    }

    /// Current contents as straight-alpha RGBA.
    pub fn to_image(&mut self) -> RgbaImage {
        self.render();
        let mut image = RgbaImage::new(u32::from(self.width), u32::from(self.height));
        for (pixel, premul) in image
            .pixels_mut()
            .zip(self.pixmap.data_as_u8_slice().chunks_exact(4))
        {
            *pixel = unpremultiply(premul);
        }
        image
    }

    /// The rendered pixmap as an image paint covering `0..width, 0..height`.
    fn as_paint(&mut self) -> vello_cpu::Image {
        self.render();
        vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(self.pixmap.clone())),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        }
    }

    /// Draw `layer` on top of this surface, pixel for pixel.
    pub fn composite_over(&mut self, layer: &mut RasterSurface) {
        let paint = layer.as_paint();
        let bounds = vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(layer.width), f64::from(layer.height));
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(paint);
            ctx.fill_rect(&bounds);
            self.pending = true;
        }
    }

    fn fill_path(&mut self, path: &BezPath, color: Color) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(cpu_color(color));
        ctx.fill_path(&cpu_path(path));
        self.pending = true;
    }
}

impl Surface for RasterSurface {
    fn size(&self) -> Size {
        Size::new(f64::from(self.width), f64::from(self.height))
    }

    fn clear(&mut self, color: Color) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        ctx.reset();
        if to_rgba(color)[3] > 0 {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(cpu_color(color));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(self.width),
                f64::from(self.height),
            ));
        }
        self.pending = true;
    }

    fn fill_circle(&mut self, center: Point, radius: f64, color: Color) {
        if radius <= 0.0 {
            return;
        }
        self.fill_path(&Circle::new(center, radius).to_path(TOLERANCE), color);
    }

    fn stroke_polyline(&mut self, points: &[Point], width: f64, color: Color) {
        let Some((&first, rest)) = points.split_first() else {
            return;
        };
        if width <= 0.0 {
            return;
        }
        if rest.is_empty() {
            self.fill_circle(first, width / 2.0, color);
            return;
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let mut path = vello_cpu::kurbo::BezPath::new();
        path.move_to(cpu_point(first));
        for &point in rest {
            path.line_to(cpu_point(point));
        }
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_stroke(
            vello_cpu::kurbo::Stroke::new(width)
                .with_caps(vello_cpu::kurbo::Cap::Round)
                .with_join(vello_cpu::kurbo::Join::Round),
        );
        ctx.set_paint(cpu_color(color));
        ctx.stroke_path(&path);
        self.pending = true;
    }

    fn draw_image(&mut self, draw: ImageDraw<'_>) {
        let (iw, ih) = draw.image.dimensions();
        if iw == 0 || ih == 0 || draw.opacity <= 0.0 || draw.transform.determinant().abs() < 1e-12 {
            return;
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let Some(paint) = image_paint(draw.image, draw.filter) else {
            tracing::debug!("[RasterSurface::draw_image] {}x{} image too large", iw, ih);
            return;
        };

        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        if let Some(clip) = &draw.clip {
            ctx.push_clip_layer(&cpu_path(&rotated_rect_path(clip)));
        }
        let opacity = draw.opacity.min(1.0) as f32;
        if opacity < 1.0 {
            ctx.push_opacity_layer(opacity);
        }
        ctx.set_transform(cpu_affine(draw.transform));
        ctx.set_paint(paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(iw), f64::from(ih)));
        if opacity < 1.0 {
            ctx.pop_layer();
        }
        if draw.clip.is_some() {
            ctx.pop_layer();
        }
        self.pending = true;
    }

    fn draw_text(&mut self, block: &TextBlock, transform: Affine, color: Color) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        ctx.set_transform(cpu_affine(transform));
        ctx.set_paint(cpu_color(color));
        let glyphs = block.glyphs.iter().map(|glyph| vello_cpu::Glyph {
            id: glyph.id,
            x: glyph.x,
            y: glyph.y,
        });
        ctx.glyph_run(&block.font)
            .font_size(block.font_size)
            .fill_glyphs(glyphs);
        self.pending = true;
    }
}

fn rotated_rect_path(rect: &RotatedRect) -> BezPath {
    let [a, b, c, d] = rect.corners();
    let mut path = BezPath::new();
    path.move_to(a);
    path.line_to(b);
    path.line_to(c);
    path.line_to(d);
    path.close_path();
    path
}

/// Premultiplied image paint with `filter` baked into the pixels. `None`
/// when the image does not fit a pixmap.
fn image_paint(image: &RgbaImage, filter: &FilterChain) -> Option<vello_cpu::Image> {
    let width = u16::try_from(image.width()).ok()?;
    let height = u16::try_from(image.height()).ok()?;
    let mut opaque = true;
    let pixels: Vec<PremulRgba8> = image
        .pixels()
        .map(|pixel| {
            let rgba = if filter.is_identity() {
                pixel.0
            } else {
                let unit = filter.apply(pixel.0.map(|c| f32::from(c) / 255.0));
                unit.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
            };
            opaque &= rgba[3] == 255;
            PremulRgba8::from_u8_array(premultiply(rgba))
        })
        .collect();
    let pixmap = Pixmap::from_parts_with_opacity(pixels, width, height, !opaque);
    Some(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

fn premultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let a16 = u16::from(a);
    let premul = |c: u8| (((u16::from(c) * a16) + 127) / 255) as u8;
    [premul(r), premul(g), premul(b), a]
}

fn unpremultiply(premul: &[u8]) -> Rgba<u8> {
    let a = premul[3];
    if a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let a16 = u16::from(a);
    let straight = |c: u8| ((u16::from(c) * 255 + a16 / 2) / a16).min(255) as u8;
    Rgba([straight(premul[0]), straight(premul[1]), straight(premul[2]), a])
}

fn cpu_color(color: Color) -> vello_cpu::peniko::Color {
    let [r, g, b, a] = to_rgba(color);
    vello_cpu::peniko::Color::from_rgba8(r, g, b, a)
}

fn cpu_point(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn cpu_affine(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn cpu_path(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(cpu_point(p)),
            PathEl::LineTo(p) => out.line_to(cpu_point(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(cpu_point(p1), cpu_point(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(cpu_point(p1), cpu_point(p2), cpu_point(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}
