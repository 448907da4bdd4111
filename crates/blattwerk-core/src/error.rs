// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Blattwerk.

use thiserror::Error;

/// Top-level error type for all Blattwerk operations.
#[derive(Debug, Error)]
pub enum EditorError {
    // -- Document lifecycle --
    #[error("no document is open")]
    NotOpen,

    #[error("document has never been saved; use save-as")]
    NoPath,

    // -- Validation --
    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{order:?} is not a permutation of 0..{page_count}")]
    InvalidPermutation { order: Vec<usize>, page_count: usize },

    // -- Codec errors --
    #[error("PDF codec failed: {0}")]
    Codec(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("image processing failed: {0}")]
    Image(String),

    // -- History --
    #[error("nothing to undo")]
    NoUndoAvailable,

    #[error("nothing to redo")]
    NoRedoAvailable,

    #[error("history is empty")]
    EmptyHistory,

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("document lock poisoned")]
    LockPoisoned,

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EditorError>;
