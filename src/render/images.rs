// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Decoded image cache keyed by source string.
//!
//! A source is either a `data:<mime>;base64,<payload>` URL or a filesystem
//! path (relative paths resolve against an optional base directory).
//! Successful decodes live for the lifetime of the store. A source that
//! failed once is remembered so the per-frame preview does not retry and
//! re-log it every frame.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {src}: {source}")]
    Decode {
        src: String,
        #[source]
        source: image::ImageError,
    },
    #[error("malformed data URL: {0}")]
    DataUrl(String),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Debug, Default)]
pub struct ImageStore {
    base_dir: Option<PathBuf>,
    cache: HashMap<String, Arc<RgbaImage>>,
    failed: HashSet<String>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            ..Self::default()
        }
    }

    /// Decode `src`, or return the cached decode.
    pub fn load(&mut self, src: &str) -> Result<Arc<RgbaImage>, ImageLoadError> {
        if let Some(image) = self.cache.get(src) {
            return Ok(Arc::clone(image));
        }
        match self.decode(src) {
            Ok(image) => {
                let image = Arc::new(image);
                self.failed.remove(src);
                self.cache.insert(src.to_string(), Arc::clone(&image));
                tracing::debug!(
                    "Decoded {} ({}x{})",
                    short_src(src),
                    image.width(),
                    image.height()
                );
                Ok(image)
            }
            Err(e) => {
                self.failed.insert(src.to_string());
                Err(e)
            }
        }
    }

    /// Like [`load`](Self::load), but logs failures once and returns `None`.
    pub fn get(&mut self, src: &str) -> Option<Arc<RgbaImage>> {
        if self.failed.contains(src) {
            return None;
        }
        match self.load(src) {
            Ok(image) => Some(image),
            Err(e) => {
                tracing::warn!("Skipping layer image: {}", e);
                None
            }
        }
    }

    /// Put an already-decoded image under `src`.
    pub fn insert(&mut self, src: impl Into<String>, image: RgbaImage) {
        let src = src.into();
        self.failed.remove(&src);
        self.cache.insert(src, Arc::new(image));
    }

    /// Forget a source so the next lookup decodes it again.
    pub fn invalidate(&mut self, src: &str) {
        self.cache.remove(src);
        self.failed.remove(src);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn decode(&self, src: &str) -> Result<RgbaImage, ImageLoadError> {
        let bytes = if src.starts_with("data:") {
            decode_data_url(src)?
        } else {
            let path = self.resolve(src);
            std::fs::read(&path).map_err(|source| ImageLoadError::Read { path, source })?
        };
        let image = image::load_from_memory(&bytes).map_err(|source| ImageLoadError::Decode {
            src: short_src(src).to_string(),
            source,
        })?;
        Ok(image.to_rgba8())
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let path = Path::new(src);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Payload bytes of a base64 `data:` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, ImageLoadError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| ImageLoadError::DataUrl("missing data: prefix".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageLoadError::DataUrl("missing comma".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(ImageLoadError::DataUrl(format!(
            "unsupported encoding in {header:?}"
        )));
    }
    Ok(BASE64_STANDARD.decode(payload.trim())?)
}

/// Wrap encoded bytes in a base64 `data:` URL.
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64_STANDARD.encode(bytes))
}

/// Data URLs are huge; keep log lines readable.
fn short_src(src: &str) -> &str {
    if src.starts_with("data:") {
        src.split(',').next().unwrap_or("data:")
    } else {
        src
    }
}
