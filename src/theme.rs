// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Theme colors and constants
//!
//! All colors use hexadecimal format: Color::from_rgb8(0xRR, 0xGG, 0xBB)
//!
//! Renderers never reach for these constants directly; they take a [`Theme`]
//! value, which defaults to the constants below.

use peniko::Color;
use peniko::color::{Srgb, parse_color};

// ============================================================================
// BASE COLORS -- a dark to light gradient
// ============================================================================
const BASE_A: Color = Color::from_rgb8(0x10, 0x10, 0x10);
const BASE_B: Color = Color::from_rgb8(0x20, 0x20, 0x20);
const BASE_O: Color = Color::from_rgb8(0xf0, 0xf0, 0xf0);

// ============================================================================
// CANVAS
// ============================================================================
const CANVAS_BACKGROUND: Color = Color::from_rgb8(0xff, 0xff, 0xff);
const LETTERBOX_BACKGROUND: Color = BASE_B;

// ============================================================================
// SELECTION AFFORDANCES
// ============================================================================
const SELECTION_STROKE: Color = Color::from_rgb8(0x57, 0x9a, 0xff);
const HANDLE_FILL: Color = BASE_O;
const HANDLE_OUTLINE: Color = Color::from_rgb8(0x44, 0x28, 0xec);
const HANDLE_LINE: Color = Color::from_rgb8(0x57, 0x9a, 0xff);

// Sizes in CSS pixels, scaled by device pixel ratio at paint time
const SELECTION_STROKE_WIDTH: f64 = 2.0;
const HANDLE_RADIUS: f64 = 8.0;
const HANDLE_OUTLINE_WIDTH: f64 = 2.0;

// ============================================================================
// FALLBACKS
// ============================================================================
/// Used when a layer color string does not parse
const FALLBACK_INK: Color = BASE_A;

// ============================================================================
// PUBLIC API - Don't edit below this line unless you know what you're doing
// ============================================================================

/// Colors for the composition canvas
pub mod canvas {
    use super::Color;
    pub const BACKGROUND: Color = super::CANVAS_BACKGROUND;
    pub const LETTERBOX: Color = super::LETTERBOX_BACKGROUND;
}

/// Selection box and handles
pub mod selection {
    use super::Color;
    pub const STROKE: Color = super::SELECTION_STROKE;
    pub const HANDLE_FILL: Color = super::HANDLE_FILL;
    pub const HANDLE_OUTLINE: Color = super::HANDLE_OUTLINE;
    pub const HANDLE_LINE: Color = super::HANDLE_LINE;

    pub mod size {
        pub const STROKE_WIDTH: f64 = super::super::SELECTION_STROKE_WIDTH;
        pub const HANDLE_RADIUS: f64 = super::super::HANDLE_RADIUS;
        pub const HANDLE_OUTLINE_WIDTH: f64 = super::super::HANDLE_OUTLINE_WIDTH;
    }
}

/// Styling handed to the renderers each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theme {
    pub background: Color,
    pub letterbox: Color,
    pub selection_stroke: Color,
    pub handle_fill: Color,
    pub handle_outline: Color,
    pub handle_line: Color,
    pub selection_stroke_width: f64,
    pub handle_radius: f64,
    pub handle_outline_width: f64,
    pub fallback_ink: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: canvas::BACKGROUND,
            letterbox: canvas::LETTERBOX,
            selection_stroke: selection::STROKE,
            handle_fill: selection::HANDLE_FILL,
            handle_outline: selection::HANDLE_OUTLINE,
            handle_line: selection::HANDLE_LINE,
            selection_stroke_width: selection::size::STROKE_WIDTH,
            handle_radius: selection::size::HANDLE_RADIUS,
            handle_outline_width: selection::size::HANDLE_OUTLINE_WIDTH,
            fallback_ink: FALLBACK_INK,
        }
    }
}

impl Theme {
    /// Resolve a CSS color string from layer data, falling back to the
    /// theme ink for anything unparseable.
    pub fn ink(&self, css: &str) -> Color {
        parse_css_color(css).unwrap_or_else(|| {
            tracing::debug!("Unparseable color {:?}, using fallback", css);
            self.fallback_ink
        })
    }
}

/// Parse any CSS color syntax (`#rgb`, `#rrggbb`, `rgb(...)`, named colors).
pub fn parse_css_color(css: &str) -> Option<Color> {
    parse_color(css.trim())
        .ok()
        .map(|color| color.to_alpha_color::<Srgb>())
}

/// Straight-alpha RGBA bytes for pixel work.
pub fn to_rgba(color: Color) -> [u8; 4] {
    let rgba = color.to_rgba8();
    [rgba.r, rgba.g, rgba.b, rgba.a]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_and_named_colors_parse() {
        assert_eq!(to_rgba(parse_css_color("#ff3366").unwrap()), [0xff, 0x33, 0x66, 0xff]);
        assert_eq!(to_rgba(parse_css_color(" white ").unwrap()), [255, 255, 255, 255]);
    }

    #[test]
    fn garbage_color_uses_fallback_ink() {
        let theme = Theme::default();
        assert_eq!(theme.ink("not-a-color"), FALLBACK_INK);
    }
}
