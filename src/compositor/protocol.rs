// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Messages crossing the compositor thread boundary.
//!
//! Requests and responses travel as JSON text, so the worker never shares
//! memory with the editor: a request is a full owned snapshot of the scene.

use crate::model::{DrawingLayer, PhotoLayer, Session, StickerLayer, TextLayer};
use crate::render::images::{ImageLoadError, decode_data_url};
use crate::render::scene::Scene;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    #[serde(rename = "COMPOSITE")]
    Composite(CompositeRequest),
    #[serde(rename = "RESULT")]
    Result(CompositeResponse),
}

impl WorkerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeRequest {
    /// Monotonic per compositor; responses echo it back
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub photos: Vec<PhotoLayer>,
    pub stickers: Vec<StickerLayer>,
    pub text_layers: Vec<TextLayer>,
    pub drawings: Vec<DrawingLayer>,
    pub frame_src: Option<String>,
    pub frame_opacity: f64,
    pub filter: String,
    pub global_photo_scale: f64,
}

impl CompositeRequest {
    /// Snapshot a session for rendering at `width` x `height`.
    pub fn snapshot(
        seq: u64,
        session: &Session,
        width: u32,
        height: u32,
        frame_src: Option<&str>,
        frame_opacity: f64,
        global_photo_scale: f64,
    ) -> Self {
        Self {
            seq,
            width,
            height,
            photos: session.photos.clone(),
            stickers: session.stickers.clone(),
            text_layers: session.text_layers.clone(),
            drawings: session.drawings.clone(),
            frame_src: frame_src.map(str::to_string),
            frame_opacity,
            filter: session.filter.clone(),
            global_photo_scale,
        }
    }

    pub fn scene(&self) -> Scene<'_> {
        Scene {
            photos: &self.photos,
            stickers: &self.stickers,
            text_layers: &self.text_layers,
            drawings: &self.drawings,
            filter: &self.filter,
            frame_src: self.frame_src.as_deref(),
            frame_opacity: self.frame_opacity,
            global_photo_scale: self.global_photo_scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeResponse {
    pub seq: u64,
    /// PNG as a `data:image/png;base64,` URL; empty when `error` is set
    pub image_data: String,
    pub render_duration_ms: f64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub skipped_layers: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompositeResponse {
    pub fn failed(seq: u64, error: impl Into<String>) -> Self {
        Self {
            seq,
            image_data: String::new(),
            render_duration_ms: 0.0,
            width: 0,
            height: 0,
            skipped_layers: 0,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && !self.image_data.is_empty()
    }

    /// The encoded PNG bytes.
    pub fn png_bytes(&self) -> Result<Vec<u8>, ImageLoadError> {
        decode_data_url(&self.image_data)
    }
}
