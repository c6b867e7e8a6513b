// Copyright 2025 the Snapbooth Authors
// SPDX-License-Identifier: Apache-2.0

//! Snapshot-based undo/redo.
//!
//! History is a bounded list of immutable session snapshots plus a cursor
//! pointing at the snapshot matching the live session. Pushing drops every
//! snapshot after the cursor (the redo future) before appending, and the
//! oldest snapshot falls off once the bound is reached.

use crate::model::Session;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<Arc<Session>>,
    cursor: usize,
    max_entries: usize,
}

impl History {
    /// Start a history whose first snapshot is `initial`.
    pub fn new(initial: Session, max_entries: usize) -> Self {
        Self {
            snapshots: vec![Arc::new(initial)],
            cursor: 0,
            max_entries: max_entries.max(1),
        }
    }

    /// Snapshot under the cursor.
    pub fn current(&self) -> &Arc<Session> {
        &self.snapshots[self.cursor]
    }

    /// Record `session` as the newest state. Identical consecutive states
    /// are not recorded. Returns whether an entry was added.
    pub fn push(&mut self, session: &Session) -> bool {
        if **self.current() == *session {
            return false;
        }
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(Arc::new(session.clone()));
        if self.snapshots.len() > self.max_entries {
            let overflow = self.snapshots.len() - self.max_entries;
            self.snapshots.drain(..overflow);
        }
        self.cursor = self.snapshots.len() - 1;
        tracing::debug!(
            "History push: {} entries, cursor {}",
            self.snapshots.len(),
            self.cursor
        );
        true
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Step back. Returns the snapshot to restore.
    pub fn undo(&mut self) -> Option<Arc<Session>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(Arc::clone(&self.snapshots[self.cursor]))
    }

    /// Step forward. Returns the snapshot to restore.
    pub fn redo(&mut self) -> Option<Arc<Session>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(Arc::clone(&self.snapshots[self.cursor]))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_filter(filter: &str) -> Session {
        Session {
            filter: filter.to_string(),
            ..Session::default()
        }
    }

    #[test]
    fn undo_redo_walks_the_cursor() {
        let mut history = History::new(with_filter("a"), 10);
        history.push(&with_filter("b"));
        history.push(&with_filter("c"));

        assert_eq!(history.undo().unwrap().filter, "b");
        assert_eq!(history.undo().unwrap().filter, "a");
        assert!(history.undo().is_none());
        assert_eq!(history.redo().unwrap().filter, "b");
    }

    #[test]
    fn push_truncates_future() {
        let mut history = History::new(with_filter("a"), 10);
        history.push(&with_filter("b"));
        history.push(&with_filter("c"));
        history.undo();
        history.undo();
        history.push(&with_filter("d"));

        assert!(!history.can_redo());
        assert_eq!(history.len(), 2);
        assert_eq!(history.undo().unwrap().filter, "a");
    }

    #[test]
    fn oldest_entries_fall_off() {
        let mut history = History::new(with_filter("0"), 3);
        for i in 1..=5 {
            history.push(&with_filter(&i.to_string()));
        }
        assert_eq!(history.len(), 3);
        assert_eq!(history.current().filter, "5");
        history.undo();
        assert_eq!(history.undo().unwrap().filter, "3");
        assert!(!history.can_undo());
    }

    #[test]
    fn identical_state_is_not_recorded() {
        let mut history = History::new(with_filter("a"), 10);
        assert!(!history.push(&with_filter("a")));
        assert_eq!(history.len(), 1);
    }
}
