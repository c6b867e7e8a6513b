// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Normalized transform math shared by every layer kind.
//!
//! Layers store their placement in units relative to the canvas frame
//! (`0.0..=1.0` on each axis) with rotation in degrees. Everything in here
//! converts between that space and canvas pixels, and provides the single
//! rotated-rectangle containment test used for all hit testing.

use kurbo::{Point, Rect, Size, Vec2};

/// Axis-aligned placement in canvas pixels, before rotation is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbsoluteBox {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl AbsoluteBox {
    pub fn center(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }

    /// Unrotated bounds centered on the box center.
    pub fn rect(&self) -> Rect {
        Rect::from_center_size(self.center(), self.size())
    }
}

/// A rectangle rotated about its center, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    pub half_width: f64,
    pub half_height: f64,
    /// Rotation in degrees, clockwise on a y-down canvas
    pub angle: f64,
}

impl RotatedRect {
    pub fn new(center: Point, size: Size, angle: f64) -> Self {
        Self {
            center,
            half_width: size.width / 2.0,
            half_height: size.height / 2.0,
            angle,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_rotated_rect(
            point,
            self.center,
            self.half_width,
            self.half_height,
            self.angle,
        )
    }

    /// Map a point from the rect's local (unrotated, center-origin) frame
    /// onto the canvas.
    pub fn local_to_canvas(&self, local: Vec2) -> Point {
        self.center + rotate_vector(local, self.angle)
    }

    /// Corners in drawing order: top-left, top-right, bottom-right, bottom-left.
    pub fn corners(&self) -> [Point; 4] {
        let (hw, hh) = (self.half_width, self.half_height);
        [
            self.local_to_canvas(Vec2::new(-hw, -hh)),
            self.local_to_canvas(Vec2::new(hw, -hh)),
            self.local_to_canvas(Vec2::new(hw, hh)),
            self.local_to_canvas(Vec2::new(-hw, hh)),
        ]
    }

    /// Axis-aligned bounds of the rotated shape.
    pub fn bounding_box(&self) -> Rect {
        let corners = self.corners();
        let mut rect = Rect::from_points(corners[0], corners[1]);
        for corner in &corners[2..] {
            rect = rect.union_pt(*corner);
        }
        rect
    }
}

/// Scale normalized center/size fields by the frame size.
pub fn to_absolute(x: f64, y: f64, width: f64, height: f64, frame: Size) -> AbsoluteBox {
    AbsoluteBox {
        x: x * frame.width,
        y: y * frame.height,
        w: width * frame.width,
        h: height * frame.height,
    }
}

/// Rotate a delta by `angle` degrees.
///
/// Pass the negated layer rotation to bring a pointer delta into the
/// layer's local frame.
pub fn rotate_vector(delta: Vec2, angle: f64) -> Vec2 {
    let (sin, cos) = angle.to_radians().sin_cos();
    Vec2::new(delta.x * cos - delta.y * sin, delta.x * sin + delta.y * cos)
}

/// Containment test against a rectangle rotated about `center`.
///
/// The point is inverse-rotated into the rectangle's frame and then tested
/// axis-aligned. Edges count as inside.
pub fn point_in_rotated_rect(
    point: Point,
    center: Point,
    half_width: f64,
    half_height: f64,
    angle: f64,
) -> bool {
    let local = rotate_vector(point - center, -angle);
    local.x.abs() <= half_width && local.y.abs() <= half_height
}

pub fn distance(a: Point, b: Point) -> f64 {
    a.distance(b)
}

/// Angle of `point` around `center`, in degrees.
pub fn angle_around(center: Point, point: Point) -> f64 {
    (point - center).atan2().to_degrees()
}

/// Wrap an angle into `[0, 360)`.
pub fn normalize_degrees(angle: f64) -> f64 {
    angle.rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn to_absolute_scales_each_axis() {
        let abs = to_absolute(0.5, 0.25, 0.4, 0.2, Size::new(1000.0, 2000.0));
        assert_eq!(abs.center(), Point::new(500.0, 500.0));
        assert_eq!(abs.size(), Size::new(400.0, 400.0));
    }

    #[test]
    fn rotate_quarter_turn() {
        let v = rotate_vector(Vec2::new(10.0, 0.0), 90.0);
        assert!((v.x - 0.0).abs() < EPS);
        assert!((v.y - 10.0).abs() < EPS);
    }

    #[test]
    fn rotate_full_turn_is_identity() {
        let v = Vec2::new(3.0, -7.0);
        let r = rotate_vector(v, 360.0);
        assert!((r - v).hypot() < EPS);
    }

    #[test]
    fn unrotated_containment() {
        let c = Point::new(100.0, 100.0);
        assert!(point_in_rotated_rect(Point::new(140.0, 120.0), c, 50.0, 25.0, 0.0));
        assert!(!point_in_rotated_rect(Point::new(140.0, 130.0), c, 50.0, 25.0, 0.0));
        // Edge is inside
        assert!(point_in_rotated_rect(Point::new(150.0, 125.0), c, 50.0, 25.0, 0.0));
    }

    #[test]
    fn rotated_containment_swaps_axes() {
        let c = Point::new(0.0, 0.0);
        // Wide, short rect turned upright
        assert!(point_in_rotated_rect(Point::new(0.0, 45.0), c, 50.0, 10.0, 90.0));
        assert!(!point_in_rotated_rect(Point::new(45.0, 0.0), c, 50.0, 10.0, 90.0));
    }

    #[test]
    fn rotated_rect_corners_and_bounds() {
        let rect = RotatedRect::new(Point::new(0.0, 0.0), Size::new(20.0, 10.0), 90.0);
        let bounds = rect.bounding_box();
        assert!((bounds.width() - 10.0).abs() < EPS);
        assert!((bounds.height() - 20.0).abs() < EPS);
    }

    #[test]
    fn angle_around_center() {
        let c = Point::new(10.0, 10.0);
        assert!((angle_around(c, Point::new(20.0, 10.0)) - 0.0).abs() < EPS);
        assert!((angle_around(c, Point::new(10.0, 20.0)) - 90.0).abs() < EPS);
    }

    #[test]
    fn normalize_wraps_negative() {
        assert!((normalize_degrees(-90.0) - 270.0).abs() < EPS);
        assert!((normalize_degrees(725.0) - 5.0).abs() < EPS);
    }
}
