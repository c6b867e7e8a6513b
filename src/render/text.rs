// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Font loading, text measurement, and text layout.
//!
//! `fontdue` supplies the metrics; the glyph outlines are filled by the
//! raster surface from the same font data.
//!
//! Fonts come from a directory of `.ttf`/`.otf` files; the family name of a
//! face is its lowercased file stem. A bold request first tries
//! `<family>-bold`, `<family>bold`, and `<family> bold`.

use crate::model::TextLayer;
use fontdue::{Font, FontSettings};
use kurbo::Size;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use vello_cpu::peniko::{Blob, FontData};

/// Average advance of a glyph relative to the font size, used when no
/// face is available to measure with.
const APPROX_ADVANCE: f64 = 0.6;

/// Line height relative to the font size
const LINE_HEIGHT: f64 = 1.2;

#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse font {family}: {reason}")]
    Parse { family: String, reason: String },
}

/// Text block size in canvas pixels, used for hit testing and handles.
pub trait TextMeasure {
    fn measure(&self, layer: &TextLayer, frame: Size) -> Size;
}

/// Font-free estimate from character counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproxTextMeasure;

impl TextMeasure for ApproxTextMeasure {
    fn measure(&self, layer: &TextLayer, frame: Size) -> Size {
        approx_size(layer, frame)
    }
}

fn approx_size(layer: &TextLayer, frame: Size) -> Size {
    let px = layer.pixel_size(frame);
    let lines: Vec<&str> = layer.text.split('\n').collect();
    let widest = lines
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    Size::new(
        widest as f64 * px * APPROX_ADVANCE,
        lines.len() as f64 * px * LINE_HEIGHT,
    )
}

/// A glyph placed in a [`TextBlock`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionedGlyph {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

/// A laid-out, unrotated text layer.
#[derive(Clone)]
pub struct TextBlock {
    pub font: FontData,
    pub font_size: f32,
    pub glyphs: Vec<PositionedGlyph>,
    pub size: Size,
}

struct Face {
    metrics: Font,
    data: FontData,
}

/// Loaded font faces keyed by family.
#[derive(Default)]
pub struct FontBook {
    faces: BTreeMap<String, Face>,
    default_family: Option<String>,
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBook")
            .field("families", &self.faces.keys().collect::<Vec<_>>())
            .field("default_family", &self.default_family)
            .finish()
    }
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every font file in `dir`. Unreadable files are logged and skipped.
    pub fn load_dir(dir: &Path) -> Self {
        let mut book = Self::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot read fonts dir {}: {}", dir.display(), e);
                return book;
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "ttf" | "otf"))
            })
            .collect();
        paths.sort();

        for path in paths {
            if let Err(e) = book.load_file(&path) {
                tracing::warn!("{}", e);
            }
        }
        tracing::info!("Loaded {} font faces from {}", book.faces.len(), dir.display());
        book
    }

    fn load_file(&mut self, path: &Path) -> Result<(), FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let family = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string();
        self.add_font(&family, &bytes)
    }

    /// Register a face under `family`. The first face added becomes the
    /// fallback for unknown families.
    pub fn add_font(&mut self, family: &str, bytes: &[u8]) -> Result<(), FontError> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|reason| {
            FontError::Parse {
                family: family.to_string(),
                reason: reason.to_string(),
            }
        })?;
        let key = family.trim().to_lowercase();
        if self.default_family.is_none() {
            self.default_family = Some(key.clone());
        }
        let data = FontData::new(Blob::from(bytes.to_vec()), 0);
        self.faces.insert(key, Face { metrics: font, data });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Resolve a CSS-ish family list (`"Brand", Arial, sans-serif`) to a face.
    pub fn face(&self, families: &str, bold: bool) -> Option<&Font> {
        self.resolve(families, bold).map(|face| &face.metrics)
    }

    fn resolve(&self, families: &str, bold: bool) -> Option<&Face> {
        for family in families.split(',') {
            let family = family.trim().trim_matches(|c| c == '"' || c == '\'').to_lowercase();
            if family.is_empty() {
                continue;
            }
            if bold {
                for candidate in [
                    format!("{family}-bold"),
                    format!("{family}bold"),
                    format!("{family} bold"),
                ] {
                    if let Some(font) = self.faces.get(&candidate) {
                        return Some(font);
                    }
                }
            }
            if let Some(font) = self.faces.get(&family) {
                return Some(font);
            }
        }
        self.default_family
            .as_ref()
            .and_then(|family| self.faces.get(family))
    }

    /// Lay out a text layer with each line centered. Glyph positions are
    /// in block space: origin at the top-left, `y` on the baseline. Returns
    /// `None` when no face resolves or the text is empty.
    pub fn layout(&self, layer: &TextLayer, frame: Size) -> Option<TextBlock> {
        let face = self.resolve(&layer.font_family, layer.is_bold())?;
        let font = &face.metrics;
        let px = layer.pixel_size(frame) as f32;
        if px <= 0.0 || layer.text.trim().is_empty() {
            return None;
        }

        let (ascent, line_height) = line_metrics(font, px);
        let lines: Vec<&str> = layer.text.split('\n').collect();
        let widths: Vec<f32> = lines.iter().map(|line| line_advance(font, line, px)).collect();
        let block_width = widths.iter().cloned().fold(0.0_f32, f32::max);
        let block_height = line_height * lines.len() as f32;
        if block_width <= 0.0 || block_height <= 0.0 {
            return None;
        }

        let mut glyphs = Vec::with_capacity(layer.text.len());
        for (row, (line, width)) in lines.iter().zip(&widths).enumerate() {
            let baseline = ascent + row as f32 * line_height;
            let mut pen_x = (block_width - width) / 2.0;
            let mut previous: Option<char> = None;
            for ch in line.chars() {
                if let Some(prev) = previous {
                    pen_x += font.horizontal_kern(prev, ch, px).unwrap_or(0.0);
                }
                glyphs.push(PositionedGlyph {
                    id: u32::from(font.lookup_glyph_index(ch)),
                    x: pen_x,
                    y: baseline,
                });
                pen_x += font.metrics(ch, px).advance_width;
                previous = Some(ch);
            }
        }
        Some(TextBlock {
            font: face.data.clone(),
            font_size: px,
            glyphs,
            size: Size::new(f64::from(block_width), f64::from(block_height)),
        })
    }
}

impl TextMeasure for FontBook {
    fn measure(&self, layer: &TextLayer, frame: Size) -> Size {
        let Some(font) = self.face(&layer.font_family, layer.is_bold()) else {
            return approx_size(layer, frame);
        };
        let px = layer.pixel_size(frame) as f32;
        let (_, line_height) = line_metrics(font, px);
        let lines: Vec<&str> = layer.text.split('\n').collect();
        let width = lines
            .iter()
            .map(|line| line_advance(font, line, px))
            .fold(0.0_f32, f32::max);
        Size::new(width as f64, (line_height * lines.len() as f32) as f64)
    }
}

fn line_metrics(font: &Font, px: f32) -> (f32, f32) {
    match font.horizontal_line_metrics(px) {
        Some(metrics) => (metrics.ascent, metrics.new_line_size),
        None => (px, px * LINE_HEIGHT as f32),
    }
}

fn line_advance(font: &Font, line: &str, px: f32) -> f32 {
    let mut width = 0.0;
    let mut previous: Option<char> = None;
    for ch in line.chars() {
        if let Some(prev) = previous {
            width += font.horizontal_kern(prev, ch, px).unwrap_or(0.0);
        }
        width += font.metrics(ch, px).advance_width;
        previous = Some(ch);
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn approx_measure_scales_with_canvas_height() {
        let layer = TextLayer::new("abcd", Point::new(0.5, 0.5), 0.1);
        let size = ApproxTextMeasure.measure(&layer, Size::new(500.0, 1000.0));
        assert!((size.width - 4.0 * 100.0 * APPROX_ADVANCE).abs() < 1e-9);
        assert!((size.height - 100.0 * LINE_HEIGHT).abs() < 1e-9);
    }

    #[test]
    fn approx_measure_uses_widest_line() {
        let layer = TextLayer::new("ab\nabcdef", Point::new(0.5, 0.5), 0.1);
        let size = ApproxTextMeasure.measure(&layer, Size::new(1000.0, 1000.0));
        assert!((size.width - 6.0 * 100.0 * APPROX_ADVANCE).abs() < 1e-9);
        assert!((size.height - 2.0 * 100.0 * LINE_HEIGHT).abs() < 1e-9);
    }

    #[test]
    fn empty_book_falls_back_to_estimate() {
        let book = FontBook::new();
        let layer = TextLayer::new("hey", Point::new(0.5, 0.5), 0.05);
        let frame = Size::new(800.0, 800.0);
        assert_eq!(book.measure(&layer, frame), ApproxTextMeasure.measure(&layer, frame));
        assert!(book.layout(&layer, frame).is_none());
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        let mut book = FontBook::new();
        assert!(book.add_font("broken", b"not a font").is_err());
        assert!(book.is_empty());
    }

    #[test]
    fn missing_dir_gives_empty_book() {
        let dir = tempfile::tempdir().unwrap();
        let book = FontBook::load_dir(&dir.path().join("absent"));
        assert!(book.is_empty());
    }
}
