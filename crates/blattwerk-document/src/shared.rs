// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thread-shared document — a `Document` behind a read/write lock. A mutation
// holds the write lock for its whole edit, round trip and history push, so
// readers never observe a half-synchronised pair of handles.

use std::sync::{Arc, RwLock};

use blattwerk_core::error::{EditorError, Result};
use tracing::warn;

use crate::editor::Document;

/// Cloneable handle to one document shared between threads.
#[derive(Debug, Clone, Default)]
pub struct SharedDocument {
    inner: Arc<RwLock<Document>>,
}

impl SharedDocument {
    pub fn new(document: Document) -> Self {
        Self {
            inner: Arc::new(RwLock::new(document)),
        }
    }

    /// Run a read-only query. Queries may run concurrently with each other.
    pub fn read<T>(&self, query: impl FnOnce(&Document) -> Result<T>) -> Result<T> {
        let guard = self.inner.read().map_err(|_| {
            warn!("document lock poisoned (read)");
            EditorError::LockPoisoned
        })?;
        query(&guard)
    }

    /// Run an operation with exclusive access.
    pub fn write<T>(&self, operation: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.write().map_err(|_| {
            warn!("document lock poisoned (write)");
            EditorError::LockPoisoned
        })?;
        operation(&mut guard)
    }

    pub fn page_count(&self) -> Result<usize> {
        self.read(|doc| Ok(doc.page_count()))
    }

    pub fn is_dirty(&self) -> Result<bool> {
        self.read(|doc| Ok(doc.is_dirty()))
    }
}
