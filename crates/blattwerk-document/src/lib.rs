// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-document — PDF editing engine for Blattwerk.
//
// Keeps a structural (page tree) and a render (content stream) model of one
// PDF byte-identical across every edit, with a bounded undo/redo history
// over serialised snapshots.

pub mod editor;
pub mod fonts;
pub mod history;
pub mod pdf;
pub mod shared;
pub mod sync;

#[cfg(test)]
mod test_support;

// Re-export the primary types so callers can use `blattwerk_document::Document` etc.
pub use editor::Document;
pub use fonts::{FontDef, FontRegistry};
pub use history::{HistoryLog, Snapshot};
pub use pdf::codec::{Codec, RenderCodec};
pub use pdf::render::RenderHandle;
pub use pdf::structure::StructureHandle;
pub use shared::SharedDocument;
pub use sync::{Commit, SyncEngine};
