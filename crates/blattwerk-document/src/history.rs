// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bounded history log — a linear undo/redo list of serialised document
// states with a cursor. Undo and redo only move the cursor; pushing after an
// undo discards the redo branch.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use blattwerk_core::error::{EditorError, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

/// One fully serialised document state. Cloning shares the bytes.
#[derive(Clone)]
pub struct Snapshot {
    bytes: Arc<[u8]>,
    fingerprint: String,
}

impl Snapshot {
    pub fn new(bytes: Vec<u8>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Self {
            fingerprint: hex::encode(hasher.finalize()),
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex SHA-256 of the bytes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint && self.bytes == other.bytes
    }
}

impl Eq for Snapshot {}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("len", &self.bytes.len())
            .field("fingerprint", &&self.fingerprint[..12.min(self.fingerprint.len())])
            .finish()
    }
}

/// Linear undo/redo history holding at most `capacity` snapshots.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    entries: VecDeque<Snapshot>,
    /// Position of the current state; `None` only while empty.
    index: Option<usize>,
    capacity: usize,
}

impl HistoryLog {
    /// Create an empty log. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            index: None,
            capacity,
        }
    }

    /// Drop everything and start over from `snapshot`.
    pub fn reset(&mut self, snapshot: Snapshot) {
        self.entries.clear();
        debug!(fingerprint = &snapshot.fingerprint()[..12], "history reset");
        self.entries.push_back(snapshot);
        self.index = Some(0);
    }

    /// Record a new state. Returns `false` when `snapshot` equals the current
    /// state and nothing was recorded.
    pub fn push(&mut self, snapshot: Snapshot) -> bool {
        if let Some(index) = self.index {
            if self.entries.get(index) == Some(&snapshot) {
                return false;
            }
            self.entries.truncate(index + 1);
        }

        self.entries.push_back(snapshot);
        let mut index = self.entries.len() - 1;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            index -= 1;
        }
        self.index = Some(index);
        debug!(len = self.entries.len(), index, "history push");
        true
    }

    pub fn can_undo(&self) -> bool {
        self.index.is_some_and(|index| index > 0)
    }

    pub fn can_redo(&self) -> bool {
        self.index.is_some_and(|index| index + 1 < self.entries.len())
    }

    /// Step back and return the state now current.
    pub fn undo(&mut self) -> Result<Snapshot> {
        match self.index {
            Some(index) if index > 0 => {
                self.index = Some(index - 1);
                Ok(self.entries[index - 1].clone())
            }
            _ => Err(EditorError::NoUndoAvailable),
        }
    }

    /// Step forward and return the state now current.
    pub fn redo(&mut self) -> Result<Snapshot> {
        match self.index {
            Some(index) if index + 1 < self.entries.len() => {
                self.index = Some(index + 1);
                Ok(self.entries[index + 1].clone())
            }
            _ => Err(EditorError::NoRedoAvailable),
        }
    }

    pub fn current(&self) -> Result<Snapshot> {
        self.index
            .and_then(|index| self.entries.get(index))
            .cloned()
            .ok_or(EditorError::EmptyHistory)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = None;
    }
}
