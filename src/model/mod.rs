// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Layer data model and normalized geometry

pub mod geometry;
pub mod layer;
pub mod layer_id;
pub mod session;

pub use layer::{
    Crop, DrawingLayer, Fit, LayerKind, PhotoLayer, StickerLayer, TextLayer, Transform,
};
pub use layer_id::{IdSpaceExhausted, LayerId};
pub use session::Session;
