// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The layer draw routine shared by the preview and the compositor.
//!
//! Draw order is fixed: background, photos (clipped to their boxes and
//! filtered), frame overlay without filter, drawings, stickers, then text.
//! A layer whose image or font is unavailable is skipped; everything else
//! still renders.

use super::filter::FilterChain;
use super::images::ImageStore;
use super::surface::{ImageDraw, Surface};
use super::text::FontBook;
use crate::model::{DrawingLayer, PhotoLayer, Session, StickerLayer, TextLayer};
use crate::theme::Theme;
use kurbo::{Affine, Size, Vec2};

/// Borrowed view of everything a composite depends on.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub photos: &'a [PhotoLayer],
    pub stickers: &'a [StickerLayer],
    pub text_layers: &'a [TextLayer],
    pub drawings: &'a [DrawingLayer],
    pub filter: &'a str,
    pub frame_src: Option<&'a str>,
    pub frame_opacity: f64,
    pub global_photo_scale: f64,
}

impl<'a> Scene<'a> {
    pub fn from_session(
        session: &'a Session,
        frame_src: Option<&'a str>,
        frame_opacity: f64,
        global_photo_scale: f64,
    ) -> Self {
        Self {
            photos: &session.photos,
            stickers: &session.stickers,
            text_layers: &session.text_layers,
            drawings: &session.drawings,
            filter: &session.filter,
            frame_src,
            frame_opacity,
            global_photo_scale,
        }
    }
}

/// How many layers made it onto the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawReport {
    pub drawn: usize,
    pub skipped: usize,
}

impl DrawReport {
    fn tally(&mut self, drawn: bool) {
        if drawn {
            self.drawn += 1;
        } else {
            self.skipped += 1;
        }
    }
}

/// Image-to-canvas transform for a photo whose decoded size is `image`.
///
/// The image is centered in its box, fit-scaled, zoomed by global photo
/// scale and crop zoom, shifted by the crop pan (in the box's local frame),
/// and finally rotated with the box.
pub fn photo_transform(
    photo: &PhotoLayer,
    frame: Size,
    image: Size,
    global_photo_scale: f64,
) -> Affine {
    let rect = photo.transform.rotated_rect(frame);
    let bounds = Size::new(rect.half_width * 2.0, rect.half_height * 2.0);
    let zoom = global_photo_scale * photo.crop.effective_scale();
    let scale = photo.fit.base_scale(image, bounds) * zoom;
    let pan = Vec2::new(-photo.crop.x * zoom, -photo.crop.y * zoom);
    Affine::translate(rect.center.to_vec2())
        * Affine::rotate(rect.angle.to_radians())
        * Affine::translate(pan)
        * Affine::scale(scale)
        * Affine::translate(Vec2::new(-image.width / 2.0, -image.height / 2.0))
}

/// Draw the whole scene, replacing the surface contents.
pub fn draw_scene(
    surface: &mut dyn Surface,
    scene: &Scene<'_>,
    images: &mut ImageStore,
    fonts: &FontBook,
    theme: &Theme,
) -> DrawReport {
    let frame = surface.size();
    let mut report = DrawReport::default();

    surface.clear(theme.background);

    let filter = FilterChain::parse(scene.filter);
    for photo in scene.photos {
        report.tally(draw_photo(surface, photo, frame, scene.global_photo_scale, &filter, images));
    }

    // Frame overlay is never filtered
    if let Some(src) = scene.frame_src
        && !src.is_empty()
    {
        report.tally(draw_frame_overlay(surface, src, scene.frame_opacity, frame, images));
    }

    for drawing in scene.drawings {
        report.tally(draw_drawing(surface, drawing, frame, theme));
    }

    let identity = FilterChain::identity();
    for sticker in scene.stickers {
        report.tally(draw_sticker(surface, sticker, frame, &identity, images));
    }

    for text in scene.text_layers {
        report.tally(draw_text(surface, text, frame, fonts, theme));
    }

    tracing::trace!("[draw_scene] {:?}", report);
    report
}

fn draw_photo(
    surface: &mut dyn Surface,
    photo: &PhotoLayer,
    frame: Size,
    global_photo_scale: f64,
    filter: &FilterChain,
    images: &mut ImageStore,
) -> bool {
    let Some(image) = images.get(&photo.src) else {
        return false;
    };
    let image_size = Size::new(image.width() as f64, image.height() as f64);
    surface.draw_image(ImageDraw {
        image: &image,
        transform: photo_transform(photo, frame, image_size, global_photo_scale),
        clip: Some(photo.transform.rotated_rect(frame)),
        opacity: 1.0,
        filter,
    });
    true
}

fn draw_frame_overlay(
    surface: &mut dyn Surface,
    src: &str,
    opacity: f64,
    frame: Size,
    images: &mut ImageStore,
) -> bool {
    let Some(image) = images.get(src) else {
        return false;
    };
    if image.width() == 0 || image.height() == 0 {
        return false;
    }
    let identity = FilterChain::identity();
    surface.draw_image(ImageDraw {
        image: &image,
        transform: Affine::scale_non_uniform(
            frame.width / image.width() as f64,
            frame.height / image.height() as f64,
        ),
        clip: None,
        opacity: opacity.clamp(0.0, 1.0),
        filter: &identity,
    });
    true
}

fn draw_drawing(
    surface: &mut dyn Surface,
    drawing: &DrawingLayer,
    frame: Size,
    theme: &Theme,
) -> bool {
    if drawing.points.is_empty() || !drawing.points.iter().all(|p| p.is_finite()) {
        tracing::debug!("Skipping drawing {} with unusable points", drawing.id);
        return false;
    }
    surface.stroke_polyline(
        &drawing.canvas_points(frame),
        drawing.stroke_width * frame.height,
        theme.ink(&drawing.color),
    );
    true
}

fn draw_sticker(
    surface: &mut dyn Surface,
    sticker: &StickerLayer,
    frame: Size,
    filter: &FilterChain,
    images: &mut ImageStore,
) -> bool {
    let Some(image) = images.get(&sticker.src) else {
        return false;
    };
    if image.width() == 0 || image.height() == 0 {
        return false;
    }
    let rect = sticker.rotated_rect(frame);
    let transform = Affine::translate(rect.center.to_vec2())
        * Affine::rotate(rect.angle.to_radians())
        * Affine::scale_non_uniform(
            rect.half_width * 2.0 / image.width() as f64,
            rect.half_height * 2.0 / image.height() as f64,
        )
        * Affine::translate(Vec2::new(
            -(image.width() as f64) / 2.0,
            -(image.height() as f64) / 2.0,
        ));
    surface.draw_image(ImageDraw {
        image: &image,
        transform,
        clip: None,
        opacity: 1.0,
        filter,
    });
    true
}

fn draw_text(
    surface: &mut dyn Surface,
    text: &TextLayer,
    frame: Size,
    fonts: &FontBook,
    theme: &Theme,
) -> bool {
    let Some(block) = fonts.layout(text, frame) else {
        tracing::debug!("Skipping text {}: no font for {:?}", text.id, text.font_family);
        return false;
    };
    // Center-anchored on both axes, rotated about the anchor
    let transform = Affine::translate(text.center(frame).to_vec2())
        * Affine::rotate(text.rotation.to_radians())
        * Affine::translate(Vec2::new(-block.size.width / 2.0, -block.size.height / 2.0));
    surface.draw_text(&block, transform, theme.ink(&text.color));
    true
}
