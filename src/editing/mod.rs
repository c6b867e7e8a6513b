// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Selection, hit testing, and the pointer interaction state machine

pub mod history;
pub mod interaction;
pub mod selection;

pub use history::History;
pub use hit_test::{HitContext, HitTarget};
pub use interaction::{Gesture, InteractionMode, ToolId};
pub use selection::Selection;
