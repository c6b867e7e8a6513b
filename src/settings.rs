// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Application settings and configuration constants.
//!
//! The constants at the top are compile-time defaults. A [`Config`] loaded
//! from TOML can override the ones an operator is expected to tune.
//! Visual styling (colors, handle sizes) belongs in `theme.rs`.

use crate::model::layer::Transform;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// INTERACTION SETTINGS
// ============================================================================
/// Smallest normalized sticker side or text size reachable by scaling
const MIN_LAYER_SIZE: f64 = 0.02;

/// Distance of the rotation handle above a layer's top edge (CSS pixels)
const ROTATE_HANDLE_OFFSET: f64 = 30.0;

/// Hit radius of the rotation and scale handles (CSS pixels)
const HANDLE_HIT_RADIUS: f64 = 14.0;

// ============================================================================
// COMPOSITOR SETTINGS
// ============================================================================
/// Quiet window before a composite is requested
const COMPOSITE_DEBOUNCE_MS: u64 = 150;

// ============================================================================
// SYNC SETTINGS
// ============================================================================
/// Minimum spacing between layout rebroadcasts while dragging
const GUEST_REBROADCAST_THROTTLE_MS: u64 = 300;

/// Capacity of the in-process sync bus before slow readers lag
const SYNC_BUS_CAPACITY: usize = 64;

/// Upper bound on copies a single guest print request may ask for
const MAX_PRINT_COPIES: u32 = 10;

// ============================================================================
// HISTORY SETTINGS
// ============================================================================
/// Number of session snapshots retained for undo
const HISTORY_DEPTH: usize = 50;

// ============================================================================
// CANVAS DEFAULTS
// ============================================================================
const ASPECT_WIDTH: f64 = 2.0;
const ASPECT_HEIGHT: f64 = 3.0;
const FRAME_OPACITY: f64 = 1.0;
const GLOBAL_PHOTO_SCALE: f64 = 1.0;

// ============================================================================
// PUBLIC API - Don't edit below this line unless you know what you're doing
// ============================================================================

/// Pointer interaction settings
pub mod interaction {
    /// Minimum normalized size for stickers (each side) and text
    pub const MIN_LAYER_SIZE: f64 = super::MIN_LAYER_SIZE;

    /// Rotation handle offset above the top edge, before DPR scaling
    pub const ROTATE_HANDLE_OFFSET: f64 = super::ROTATE_HANDLE_OFFSET;

    /// Handle hit radius, before DPR scaling
    pub const HANDLE_HIT_RADIUS: f64 = super::HANDLE_HIT_RADIUS;
}

/// Background compositor settings
pub mod compositor {
    use std::time::Duration;

    /// Debounce window for composite requests
    pub const DEBOUNCE: Duration = Duration::from_millis(super::COMPOSITE_DEBOUNCE_MS);
}

/// Operator/guest synchronization settings
pub mod sync {
    use std::time::Duration;

    /// Throttle for rebroadcasting live layout edits to the guest
    pub const REBROADCAST_THROTTLE: Duration =
        Duration::from_millis(super::GUEST_REBROADCAST_THROTTLE_MS);

    /// Broadcast bus capacity
    pub const BUS_CAPACITY: usize = super::SYNC_BUS_CAPACITY;

    /// Maximum copies per print request
    pub const MAX_PRINT_COPIES: u32 = super::MAX_PRINT_COPIES;
}

/// Undo history settings
pub mod history {
    /// Default snapshot depth
    pub const DEPTH: usize = super::HISTORY_DEPTH;
}

// ============================================================================
// RUNTIME CONFIG
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Target aspect ratio of the canvas as a `width:height` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub width: f64,
    pub height: f64,
}

impl AspectRatio {
    pub fn ratio(self) -> f64 {
        if self.height <= 0.0 {
            1.0
        } else {
            self.width / self.height
        }
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self {
            width: ASPECT_WIDTH,
            height: ASPECT_HEIGHT,
        }
    }
}

/// A named arrangement of photo slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub id: String,
    pub slots: Vec<Transform>,
}

/// Operator-tunable configuration, usually read from `snapbooth.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub aspect: AspectRatio,
    pub frame_src: Option<String>,
    pub frame_opacity: f64,
    pub global_photo_scale: f64,
    pub fonts_dir: Option<PathBuf>,
    pub hot_folder: Option<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
    pub history_depth: usize,
    pub composite_debounce_ms: u64,
    pub rebroadcast_throttle_ms: u64,
    /// States a slow guest may fall behind before it skips ahead
    pub sync_bus_capacity: usize,
    pub layouts: Vec<Layout>,
    /// Filters offered to the guest
    pub filter_presets: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aspect: AspectRatio::default(),
            frame_src: None,
            frame_opacity: FRAME_OPACITY,
            global_photo_scale: GLOBAL_PHOTO_SCALE,
            fonts_dir: None,
            hot_folder: None,
            snapshot_dir: None,
            history_depth: HISTORY_DEPTH,
            composite_debounce_ms: COMPOSITE_DEBOUNCE_MS,
            rebroadcast_throttle_ms: GUEST_REBROADCAST_THROTTLE_MS,
            sync_bus_capacity: sync::BUS_CAPACITY,
            layouts: default_layouts(),
            filter_presets: default_filter_presets(),
        }
    }
}

impl Config {
    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(
            "Loaded config from {} ({} layouts)",
            path.display(),
            config.layouts.len()
        );
        Ok(config)
    }

    pub fn composite_debounce(&self) -> Duration {
        Duration::from_millis(self.composite_debounce_ms)
    }

    pub fn rebroadcast_throttle(&self) -> Duration {
        Duration::from_millis(self.rebroadcast_throttle_ms)
    }

    pub fn layout(&self, id: &str) -> Option<&Layout> {
        self.layouts.iter().find(|layout| layout.id == id)
    }
}

fn default_filter_presets() -> Vec<String> {
    [
        "none",
        "grayscale(1)",
        "sepia(0.8)",
        "contrast(1.2) saturate(1.3)",
        "brightness(1.1) hue-rotate(-10deg)",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_layouts() -> Vec<Layout> {
    let slot = |x, y, width, height| Transform {
        x,
        y,
        width,
        height,
        rotation: 0.0,
    };
    vec![
        Layout {
            id: "single".to_string(),
            slots: vec![slot(0.5, 0.45, 0.8, 0.7)],
        },
        Layout {
            id: "strip".to_string(),
            slots: vec![
                slot(0.5, 0.18, 0.8, 0.27),
                slot(0.5, 0.47, 0.8, 0.27),
                slot(0.5, 0.76, 0.8, 0.27),
            ],
        },
        Layout {
            id: "grid".to_string(),
            slots: vec![
                slot(0.28, 0.3, 0.4, 0.35),
                slot(0.72, 0.3, 0.4, 0.35),
                slot(0.28, 0.7, 0.4, 0.35),
                slot(0.72, 0.7, 0.4, 0.35),
            ],
        },
    ]
}
