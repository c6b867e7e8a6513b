// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! CSS-style filter chains applied to photo pixels.
//!
//! A session carries a filter string such as
//! `"sepia(0.4) contrast(120%) hue-rotate(30deg)"`. It is parsed once per
//! draw into a [`FilterChain`] and then applied per sampled pixel. Functions
//! run left to right with channels clamped to `0..=1` after each step.

/// One filter function with its amount resolved to a plain number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterOp {
    Brightness(f32),
    Contrast(f32),
    Grayscale(f32),
    Sepia(f32),
    Saturate(f32),
    Invert(f32),
    /// Degrees
    HueRotate(f32),
    Opacity(f32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterChain {
    ops: Vec<FilterOp>,
}

impl FilterChain {
    /// The neutral chain. Drawing with it leaves pixels untouched.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Parse a filter string. `none` and the empty string give the identity
    /// chain; unknown or malformed functions are skipped.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("none") {
            return Self::identity();
        }

        let mut ops = Vec::new();
        let mut rest = input;
        while let Some(open) = rest.find('(') {
            let Some(close) = rest[open..].find(')').map(|i| open + i) else {
                tracing::debug!("Unterminated filter function in {:?}", input);
                break;
            };
            let name = rest[..open].trim().to_ascii_lowercase();
            let arg = rest[open + 1..close].trim();
            match parse_op(&name, arg) {
                Some(op) => ops.push(op),
                None => tracing::debug!("Ignoring filter {}({})", name, arg),
            }
            rest = &rest[close + 1..];
        }
        Self { ops }
    }

    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Filter one straight-alpha pixel with channels in `0..=1`.
    pub fn apply(&self, mut rgba: [f32; 4]) -> [f32; 4] {
        for op in &self.ops {
            let [r, g, b, a] = rgba;
            rgba = match *op {
                FilterOp::Brightness(k) => [r * k, g * k, b * k, a],
                FilterOp::Contrast(k) => [
                    (r - 0.5) * k + 0.5,
                    (g - 0.5) * k + 0.5,
                    (b - 0.5) * k + 0.5,
                    a,
                ],
                FilterOp::Invert(k) => [
                    r + (1.0 - 2.0 * r) * k,
                    g + (1.0 - 2.0 * g) * k,
                    b + (1.0 - 2.0 * b) * k,
                    a,
                ],
                FilterOp::Opacity(k) => [r, g, b, a * k],
                FilterOp::Grayscale(k) => matrix(grayscale_matrix(k), rgba),
                FilterOp::Sepia(k) => matrix(sepia_matrix(k), rgba),
                FilterOp::Saturate(k) => matrix(saturate_matrix(k), rgba),
                FilterOp::HueRotate(deg) => matrix(hue_rotate_matrix(deg), rgba),
            };
            for channel in &mut rgba {
                *channel = channel.clamp(0.0, 1.0);
            }
        }
        rgba
    }
}

fn parse_op(name: &str, arg: &str) -> Option<FilterOp> {
    let op = match name {
        "hue-rotate" => FilterOp::HueRotate(parse_angle(arg)?),
        "brightness" => FilterOp::Brightness(parse_amount(arg)?),
        "contrast" => FilterOp::Contrast(parse_amount(arg)?),
        "saturate" => FilterOp::Saturate(parse_amount(arg)?),
        // These four saturate at 100%
        "grayscale" => FilterOp::Grayscale(parse_amount(arg)?.min(1.0)),
        "sepia" => FilterOp::Sepia(parse_amount(arg)?.min(1.0)),
        "invert" => FilterOp::Invert(parse_amount(arg)?.min(1.0)),
        "opacity" => FilterOp::Opacity(parse_amount(arg)?.min(1.0)),
        _ => return None,
    };
    Some(op)
}

/// `0.5`, `50%`, or empty (which means 1).
fn parse_amount(arg: &str) -> Option<f32> {
    if arg.is_empty() {
        return Some(1.0);
    }
    let value = match arg.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f32>().ok()? / 100.0,
        None => arg.parse::<f32>().ok()?,
    };
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// `30deg`, `0.5turn`, `1rad`, `100grad`, bare `0`, or empty.
fn parse_angle(arg: &str) -> Option<f32> {
    if arg.is_empty() {
        return Some(0.0);
    }
    let (number, per_degree) = if let Some(n) = arg.strip_suffix("deg") {
        (n, 1.0)
    } else if let Some(n) = arg.strip_suffix("grad") {
        (n, 0.9)
    } else if let Some(n) = arg.strip_suffix("rad") {
        (n, 180.0 / std::f32::consts::PI)
    } else if let Some(n) = arg.strip_suffix("turn") {
        (n, 360.0)
    } else {
        (arg, 1.0)
    };
    let value = number.trim().parse::<f32>().ok()? * per_degree;
    value.is_finite().then_some(value)
}

type Matrix = [[f32; 3]; 3];

fn matrix(m: Matrix, [r, g, b, a]: [f32; 4]) -> [f32; 4] {
    [
        m[0][0] * r + m[0][1] * g + m[0][2] * b,
        m[1][0] * r + m[1][1] * g + m[1][2] * b,
        m[2][0] * r + m[2][1] * g + m[2][2] * b,
        a,
    ]
}

fn grayscale_matrix(k: f32) -> Matrix {
    let s = 1.0 - k;
    [
        [0.2126 + 0.7874 * s, 0.7152 - 0.7152 * s, 0.0722 - 0.0722 * s],
        [0.2126 - 0.2126 * s, 0.7152 + 0.2848 * s, 0.0722 - 0.0722 * s],
        [0.2126 - 0.2126 * s, 0.7152 - 0.7152 * s, 0.0722 + 0.9278 * s],
    ]
}

fn sepia_matrix(k: f32) -> Matrix {
    let s = 1.0 - k;
    [
        [0.393 + 0.607 * s, 0.769 - 0.769 * s, 0.189 - 0.189 * s],
        [0.349 - 0.349 * s, 0.686 + 0.314 * s, 0.168 - 0.168 * s],
        [0.272 - 0.272 * s, 0.534 - 0.534 * s, 0.131 + 0.869 * s],
    ]
}

fn saturate_matrix(s: f32) -> Matrix {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn hue_rotate_matrix(deg: f32) -> Matrix {
    let (sin, cos) = deg.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-3;

    fn close(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(&b).all(|(x, y)| (x - y).abs() < EPS)
    }

    #[test]
    fn none_and_empty_are_identity() {
        assert!(FilterChain::parse("").is_identity());
        assert!(FilterChain::parse("  none ").is_identity());
        let px = [0.2, 0.4, 0.6, 1.0];
        assert_eq!(FilterChain::identity().apply(px), px);
    }

    #[test]
    fn parses_numbers_percentages_and_angles() {
        let chain = FilterChain::parse("brightness(120%) sepia(0.5) hue-rotate(0.25turn)");
        assert_eq!(
            chain.ops(),
            &[
                FilterOp::Brightness(1.2),
                FilterOp::Sepia(0.5),
                FilterOp::HueRotate(90.0),
            ]
        );
    }

    #[test]
    fn unknown_functions_are_skipped() {
        let chain = FilterChain::parse("blur(4px) grayscale(1) drop-shadow(1px 1px red)");
        assert_eq!(chain.ops(), &[FilterOp::Grayscale(1.0)]);
    }

    #[test]
    fn grayscale_equalizes_channels() {
        let out = FilterChain::parse("grayscale(100%)").apply([1.0, 0.0, 0.0, 1.0]);
        assert!((out[0] - out[1]).abs() < EPS && (out[1] - out[2]).abs() < EPS);
        assert!((out[0] - 0.2126).abs() < EPS);
    }

    #[test]
    fn invert_and_opacity() {
        let out = FilterChain::parse("invert(1) opacity(50%)").apply([0.25, 0.5, 1.0, 1.0]);
        assert!(close(out, [0.75, 0.5, 0.0, 0.5]));
    }

    #[test]
    fn full_hue_turn_is_neutral() {
        let px = [0.3, 0.6, 0.9, 1.0];
        assert!(close(FilterChain::parse("hue-rotate(360deg)").apply(px), px));
    }

    #[test]
    fn channels_clamp_after_each_step() {
        let out = FilterChain::parse("brightness(3) brightness(0.5)").apply([0.5, 0.5, 0.5, 1.0]);
        assert!(close(out, [0.5, 0.5, 0.5, 1.0]));
    }
}
