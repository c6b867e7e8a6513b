// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Canvas frame sizing.
//!
//! The frame is derived, never stored in the session: every paint
//! recomputes it from the container size (CSS pixels), the device pixel
//! ratio, and the target aspect ratio, letterboxing inside the container.

use crate::settings::AspectRatio;
use kurbo::{Point, Size, Vec2};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasFrame {
    /// Backing size in device pixels, whole numbers
    size: Size,
    device_pixel_ratio: f64,
    /// Letterbox offset inside the container, CSS pixels
    offset: Vec2,
}

impl Default for CanvasFrame {
    fn default() -> Self {
        Self {
            size: Size::ZERO,
            device_pixel_ratio: 1.0,
            offset: Vec2::ZERO,
        }
    }
}

impl CanvasFrame {
    /// Compute a frame for a container.
    pub fn fit(container: Size, device_pixel_ratio: f64, aspect: AspectRatio) -> Self {
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        let ratio = aspect.ratio();
        let (mut width, mut height) = (container.width.max(0.0), container.height.max(0.0));
        if width / ratio > height {
            width = height * ratio;
        } else {
            height = width / ratio;
        }
        let size = Size::new((width * dpr).round(), (height * dpr).round());
        let offset = Vec2::new(
            (container.width - width).max(0.0) / 2.0,
            (container.height - height).max(0.0) / 2.0,
        );
        Self {
            size,
            device_pixel_ratio: dpr,
            offset,
        }
    }

    /// Refit to a container. Returns false, leaving the frame untouched,
    /// when the result is the same as the current frame.
    pub fn resize(&mut self, container: Size, device_pixel_ratio: f64, aspect: AspectRatio) -> bool {
        let next = Self::fit(container, device_pixel_ratio, aspect);
        if next == *self {
            return false;
        }
        tracing::debug!(
            "[CanvasFrame::resize] {}x{} -> {}x{}",
            self.size.width,
            self.size.height,
            next.size.width,
            next.size.height
        );
        *self = next;
        true
    }

    /// A frame of a fixed device-pixel size, as used by the compositor.
    pub fn fixed(width: u32, height: u32) -> Self {
        Self {
            size: Size::new(width as f64, height as f64),
            ..Self::default()
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixel_width(&self) -> u32 {
        self.size.width as u32
    }

    pub fn pixel_height(&self) -> u32 {
        self.size.height as u32
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    pub fn is_empty(&self) -> bool {
        self.size.width < 1.0 || self.size.height < 1.0
    }

    /// Map a container-relative pointer position (CSS pixels) to canvas
    /// device pixels.
    pub fn to_canvas(&self, container_point: Point) -> Point {
        ((container_point - self.offset).to_vec2() * self.device_pixel_ratio).to_point()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORTRAIT: AspectRatio = AspectRatio {
        width: 2.0,
        height: 3.0,
    };

    #[test]
    fn letterboxes_wide_container() {
        let frame = CanvasFrame::fit(Size::new(1000.0, 600.0), 2.0, PORTRAIT);
        assert_eq!(frame.size(), Size::new(800.0, 1200.0));
        // Centered horizontally: 400 CSS px wide in a 1000 px container
        assert_eq!(frame.to_canvas(Point::new(300.0, 0.0)), Point::new(0.0, 0.0));
        assert_eq!(frame.to_canvas(Point::new(500.0, 300.0)), Point::new(400.0, 600.0));
    }

    #[test]
    fn letterboxes_tall_container() {
        let frame = CanvasFrame::fit(Size::new(200.0, 900.0), 1.0, PORTRAIT);
        assert_eq!(frame.size(), Size::new(200.0, 300.0));
        assert_eq!(frame.to_canvas(Point::new(0.0, 300.0)), Point::new(0.0, 0.0));
    }

    #[test]
    fn resize_is_noop_when_unchanged() {
        let mut frame = CanvasFrame::default();
        assert!(frame.resize(Size::new(400.0, 600.0), 1.0, PORTRAIT));
        assert!(!frame.resize(Size::new(400.0, 600.0), 1.0, PORTRAIT));
        assert!(frame.resize(Size::new(400.0, 600.0), 2.0, PORTRAIT));
    }

    #[test]
    fn zero_container_is_empty() {
        assert!(CanvasFrame::fit(Size::ZERO, 1.0, PORTRAIT).is_empty());
    }
}
