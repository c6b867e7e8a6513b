// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Rendering: the raster surface, the shared scene routine, and the
//! per-frame preview

pub mod filter;
pub mod frame;
pub mod images;
pub mod preview;
pub mod raster;
pub mod scene;
pub mod surface;
pub mod text;

pub use filter::FilterChain;
pub use frame::CanvasFrame;
pub use images::{ImageLoadError, ImageStore};
pub use preview::{FrameStats, PreviewInput, PreviewRenderer};
pub use raster::RasterSurface;
pub use scene::{DrawReport, Scene, draw_scene};
pub use surface::{ImageDraw, Surface};
pub use text::{ApproxTextMeasure, FontBook, TextMeasure};
