// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! The single active layer selection.
//!
//! "Nothing selected" is `Option::<Selection>::None`. A selection only
//! names a kind and an index, so any mutation that shrinks or reorders a
//! layer array has to reconcile it; an index that no longer resolves is
//! treated as no selection rather than an error.

use crate::model::{LayerKind, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub kind: LayerKind,
    pub index: usize,
}

impl Selection {
    pub fn new(kind: LayerKind, index: usize) -> Self {
        Self { kind, index }
    }

    /// Whether the selection still points at a layer of `session`.
    pub fn is_valid(&self, session: &Session) -> bool {
        self.index < session.len(self.kind)
    }

    /// `Some(self)` if still valid, `None` otherwise.
    pub fn resolve(self, session: &Session) -> Option<Self> {
        self.is_valid(session).then_some(self)
    }

    /// Reconcile after `removed_index` of `kind` was deleted.
    ///
    /// Removing the selected layer clears the selection; removing a layer
    /// below it shifts the index down.
    pub fn after_removal(self, kind: LayerKind, removed_index: usize) -> Option<Self> {
        if self.kind != kind {
            return Some(self);
        }
        match self.index.cmp(&removed_index) {
            std::cmp::Ordering::Less => Some(self),
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Greater => Some(Self::new(kind, self.index - 1)),
        }
    }
}

/// Drop a selection that no longer resolves against `session`.
pub fn reconcile(selection: Option<Selection>, session: &Session) -> Option<Selection> {
    selection.and_then(|sel| sel.resolve(session))
}
