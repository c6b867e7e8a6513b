// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Unique identifiers for stickers, text layers, and drawings.
//!
//! Each `LayerId` is a monotonically increasing `u64` drawn from a global
//! atomic counter. Sessions loaded from disk or received from another
//! context carry their own ids, so loaders call [`LayerId::reserve_through`]
//! to keep freshly minted ids from colliding with them.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// A unique identifier for a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(u64);

/// A foreign id so large that no id can be minted after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} leaves no room for new layer ids")]
pub struct IdSpaceExhausted(pub LayerId);

static LAYER_COUNTER: AtomicU64 = AtomicU64::new(1);

impl LayerId {
    /// Create a new unique layer ID
    pub fn next() -> Self {
        Self(LAYER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Make sure ids handed out later are greater than `id`.
    pub fn reserve_through(id: LayerId) -> Result<(), IdSpaceExhausted> {
        let floor = id.0.checked_add(1).ok_or(IdSpaceExhausted(id))?;
        LAYER_COUNTER.fetch_max(floor, Ordering::Relaxed);
        Ok(())
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::next()
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}
