// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synchronisation engine — owns the structural and render handles and keeps
// them byte-identical. Every edit runs on a scratch copy of one handle; the
// result is serialised once and both handles are rebuilt from those bytes
// before anything committed is replaced.

use std::path::Path;
use std::sync::Arc;

use blattwerk_core::error::Result;
use tracing::{debug, instrument, warn};

use crate::fonts::FontRegistry;
use crate::history::Snapshot;
use crate::pdf::codec::{Codec, RenderCodec};
use crate::pdf::render::RenderHandle;
use crate::pdf::structure::StructureHandle;

/// Result of a committed mutation.
#[derive(Debug, Clone)]
pub struct Commit<T> {
    /// Whatever the edit closure produced.
    pub value: T,
    /// The new document state, ready to be pushed onto the history.
    pub snapshot: Snapshot,
}

/// The pair of document handles plus the fonts registered on the render
/// side.
///
/// Handles are only ever reachable through shared references; edits go
/// through [`mutate_structure`](Self::mutate_structure) or
/// [`mutate_render`](Self::mutate_render).
#[derive(Debug)]
pub struct SyncEngine<S: Codec = StructureHandle, R: RenderCodec = RenderHandle> {
    structure: S,
    render: R,
    fonts: Option<Arc<FontRegistry>>,
}

impl<S: Codec, R: RenderCodec> SyncEngine<S, R> {
    /// Open both handles from the same file.
    #[instrument(skip(fonts), fields(path = %path.display()))]
    pub fn open(path: &Path, fonts: Option<Arc<FontRegistry>>) -> Result<Self> {
        let structure = S::open(path)?;
        let mut render = R::open(path)?;
        if let Some(registry) = &fonts {
            registry.register(&mut render);
        }
        debug!(
            structure = S::NAME,
            render = R::NAME,
            pages = structure.page_count(),
            "engine opened"
        );
        Ok(Self {
            structure,
            render,
            fonts,
        })
    }

    /// Build both handles from one buffer.
    pub fn from_bytes(bytes: &[u8], fonts: Option<Arc<FontRegistry>>) -> Result<Self> {
        let (structure, render) = rebuild::<S, R>(bytes, fonts.as_deref())?;
        Ok(Self {
            structure,
            render,
            fonts,
        })
    }

    /// Replace both handles with documents parsed from `bytes`. On failure
    /// the current handles stay in place.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn load(&mut self, bytes: &[u8]) -> Result<()> {
        let (structure, render) = rebuild::<S, R>(bytes, self.fonts.as_deref())?;
        self.structure = structure;
        self.render = render;
        Ok(())
    }

    pub fn structure(&self) -> &S {
        &self.structure
    }

    pub fn render(&self) -> &R {
        &self.render
    }

    pub fn fonts(&self) -> Option<&FontRegistry> {
        self.fonts.as_deref()
    }

    /// Attach a font registry and register its fonts on the current render
    /// handle. Serialised bytes do not change.
    pub fn set_font_registry(&mut self, fonts: Arc<FontRegistry>) -> usize {
        let registered = fonts.register(&mut self.render);
        self.fonts = Some(fonts);
        registered
    }

    pub fn page_count(&self) -> usize {
        self.render.page_count()
    }

    /// Current state as a snapshot.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot::new(self.structure.serialize()?))
    }

    /// True when both handles serialise to the same bytes.
    pub fn is_consistent(&self) -> Result<bool> {
        Ok(self.structure.serialize()? == self.render.serialize()?)
    }

    /// Run a page-tree edit on a copy of the structural handle and commit
    /// it. `edit` returns `Ok(None)` to decline, which leaves everything as
    /// it was.
    pub fn mutate_structure<T>(
        &mut self,
        edit: impl FnOnce(&mut S) -> Result<Option<T>>,
    ) -> Result<Option<Commit<T>>> {
        let mut scratch = self.structure.clone();
        let Some(value) = edit(&mut scratch)? else {
            return Ok(None);
        };
        let bytes = scratch.serialize()?;
        self.commit(bytes, S::NAME).map(|snapshot| Some(Commit { value, snapshot }))
    }

    /// Run a content edit on a copy of the render handle and commit it.
    pub fn mutate_render<T>(
        &mut self,
        edit: impl FnOnce(&mut R) -> Result<Option<T>>,
    ) -> Result<Option<Commit<T>>> {
        let mut scratch = self.render.clone();
        let Some(value) = edit(&mut scratch)? else {
            return Ok(None);
        };
        let bytes = scratch.serialize()?;
        self.commit(bytes, R::NAME).map(|snapshot| Some(Commit { value, snapshot }))
    }

    fn commit(&mut self, bytes: Vec<u8>, owner: &str) -> Result<Snapshot> {
        let (structure, render) = rebuild::<S, R>(&bytes, self.fonts.as_deref()).inspect_err(|err| {
            warn!(owner, %err, "rebuild after edit failed, keeping previous state");
        })?;
        self.structure = structure;
        self.render = render;

        let snapshot = Snapshot::new(bytes);
        debug!(
            owner,
            bytes = snapshot.len(),
            fingerprint = &snapshot.fingerprint()[..12],
            "edit committed"
        );
        Ok(snapshot)
    }
}

/// Parse a fresh pair of handles from one buffer.
fn rebuild<S: Codec, R: RenderCodec>(bytes: &[u8], fonts: Option<&FontRegistry>) -> Result<(S, R)> {
    let structure = S::from_bytes(bytes)?;
    let mut render = R::from_bytes(bytes)?;
    if let Some(registry) = fonts {
        registry.register(&mut render);
    }
    Ok((structure, render))
}
