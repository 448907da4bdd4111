// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Codec traits — the seam between the synchronisation engine and the two
// document models it keeps in lock-step.

use std::path::Path;

use blattwerk_core::error::Result;

/// A document model that can be opened from a file or a byte buffer and
/// serialised back to bytes.
///
/// `Clone` is required: the engine applies every edit to a scratch copy and
/// only swaps it in once the round trip has succeeded.
pub trait Codec: Clone + Sized {
    /// Short name used in log output.
    const NAME: &'static str;

    /// Open a document from the filesystem.
    fn open(path: &Path) -> Result<Self>;

    /// Parse a document from an in-memory buffer.
    fn from_bytes(data: &[u8]) -> Result<Self>;

    /// Serialise the complete document.
    fn serialize(&self) -> Result<Vec<u8>>;

    /// Number of pages in the document.
    fn page_count(&self) -> usize;
}

/// Extra capability of the render-side codec: external font registration.
///
/// Registered fonts live beside the document, not inside it, so registering
/// never changes the serialised bytes.
pub trait RenderCodec: Codec {
    fn insert_font(&mut self, name: &str, path: &Path) -> Result<()>;
}
