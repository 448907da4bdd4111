// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document facade — the single entry point front-ends use. Composes the
// synchronisation engine with the history log: every committed edit marks
// the document dirty and pushes a snapshot; undo and redo reload both
// handles from the snapshot bytes.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use blattwerk_core::config::EditorConfig;
use blattwerk_core::error::{EditorError, Result};
use blattwerk_core::types::{
    AnnotationId, AnnotationStyle, AnnotationSummary, AnnotationUpdate, PageSize, Point, Rect, Rgb,
    TextBoxOptions, TextStyle,
};
use image::RgbImage;
use tracing::{debug, info, instrument, warn};

use crate::fonts::FontRegistry;
use crate::history::HistoryLog;
use crate::pdf::codec::Codec;
use crate::pdf::render::RenderHandle;
use crate::pdf::structure::StructureHandle;
use crate::sync::SyncEngine;

const PRODUCER: &str = concat!("Blattwerk ", env!("CARGO_PKG_VERSION"));

/// An editable PDF document with undo/redo.
#[derive(Debug)]
pub struct Document {
    engine: Option<SyncEngine>,
    path: Option<PathBuf>,
    dirty: bool,
    history: HistoryLog,
    fonts: Option<Arc<FontRegistry>>,
    stamp_on_save: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::with_config(&EditorConfig::default())
    }
}

impl Document {
    /// A closed document with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &EditorConfig) -> Self {
        Self {
            engine: None,
            path: None,
            dirty: false,
            history: HistoryLog::new(config.history_capacity),
            fonts: None,
            stamp_on_save: config.stamp_on_save,
        }
    }

    // -- Lifecycle ------------------------------------------------------------

    /// Open `path`, replacing any open document. History restarts from the
    /// opened state.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn open(&mut self, path: &Path) -> Result<()> {
        let engine = SyncEngine::open(path, self.fonts.clone())?;
        let snapshot = engine.snapshot()?;
        info!(pages = engine.page_count(), bytes = snapshot.len(), "document opened");

        self.history.reset(snapshot);
        self.engine = Some(engine);
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    /// Open a document held in memory. It has no path until saved with
    /// [`save_as`](Self::save_as).
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn open_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let engine = SyncEngine::from_bytes(bytes, self.fonts.clone())?;
        self.history.reset(engine.snapshot()?);
        self.engine = Some(engine);
        self.path = None;
        self.dirty = false;
        Ok(())
    }

    /// Write to the path the document was opened from or last saved to.
    pub fn save(&mut self) -> Result<()> {
        self.engine()?;
        let path = self.path.clone().ok_or(EditorError::NoPath)?;
        self.save_as(&path)
    }

    /// Write the document to `path` and remember it. History is untouched.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        let structure = self.engine()?.structure();
        let bytes = if self.stamp_on_save {
            structure.serialize_stamped(PRODUCER, chrono::Utc::now())?
        } else {
            structure.serialize()?
        };
        fs::write(path, &bytes)?;

        info!(bytes = bytes.len(), "document saved");
        self.path = Some(path.to_path_buf());
        self.dirty = false;
        Ok(())
    }

    /// Release the document and forget its path and history.
    pub fn close(&mut self) {
        if self.engine.take().is_some() {
            info!(path = ?self.path, "document closed");
        }
        self.path = None;
        self.dirty = false;
        self.history.clear();
    }

    pub fn is_open(&self) -> bool {
        self.engine.is_some()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Use `registry` for text insertion, now and after every reload.
    /// Returns the number of fonts registered on the open document.
    pub fn set_font_registry(&mut self, registry: FontRegistry) -> usize {
        let registry = Arc::new(registry);
        self.fonts = Some(Arc::clone(&registry));
        match self.engine.as_mut() {
            Some(engine) => engine.set_font_registry(registry),
            None => 0,
        }
    }

    /// True when both document models serialise identically.
    pub fn is_consistent(&self) -> Result<bool> {
        self.engine()?.is_consistent()
    }

    // -- Queries --------------------------------------------------------------

    /// Number of pages; 0 when closed.
    pub fn page_count(&self) -> usize {
        self.engine.as_ref().map_or(0, SyncEngine::page_count)
    }

    /// Displayed page size (width and height swapped for quarter turns).
    pub fn page_size(&self, index: usize) -> Result<PageSize> {
        self.render()?.page_size(index).ok_or_else(|| self.out_of_range(index))
    }

    pub fn page_rotation(&self, index: usize) -> Result<i32> {
        self.render()?
            .page_rotation(index)
            .ok_or_else(|| self.out_of_range(index))
    }

    pub fn page_pixmap(&self, index: usize, zoom: f32) -> Result<RgbImage> {
        self.render()?.rasterize(index, zoom)
    }

    /// Render a page and write it as an image; the format follows the file
    /// extension.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn export_page_image(&self, index: usize, zoom: f32, path: &Path) -> Result<()> {
        let pixmap = self.page_pixmap(index, zoom)?;
        pixmap
            .save(path)
            .map_err(|err| EditorError::Image(format!("cannot write {}: {err}", path.display())))?;
        info!(index, width = pixmap.width(), height = pixmap.height(), "page image exported");
        Ok(())
    }

    pub fn list_text_annotations(&self, index: usize) -> Result<Vec<AnnotationSummary>> {
        self.render()?.list_free_text(index)
    }

    /// Write the pages at `indices` to a new file at `output`. Indices are
    /// sorted, de-duplicated and filtered to existing pages; when none
    /// remain nothing is written. Returns the number of pages written.
    #[instrument(skip(self), fields(output = %output.display()))]
    pub fn extract_pages(&self, indices: &[usize], output: &Path) -> Result<usize> {
        let structure = self.engine()?.structure();
        let mut selected: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&index| index < structure.page_count())
            .collect();
        selected.sort_unstable();
        selected.dedup();
        if selected.is_empty() {
            warn!(?indices, "no valid pages to extract");
            return Ok(0);
        }

        let bytes = structure.export_pages(&selected)?;
        fs::write(output, bytes)?;
        info!(pages = selected.len(), "pages extracted");
        Ok(selected.len())
    }

    // -- Page operations ------------------------------------------------------

    pub fn remove_page(&mut self, index: usize) -> Result<bool> {
        self.structural(|s| s.remove_page(index).map(applied))
            .map(|done| done.is_some())
    }

    /// Append every page of the document at `path`. When nothing is open
    /// the file is simply opened. Returns the number of pages added.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn insert_document(&mut self, path: &Path) -> Result<usize> {
        if !self.is_open() {
            self.open(path)?;
            return Ok(self.page_count());
        }
        let source = StructureHandle::open(path)?;
        let appended = self.structural(|s| {
            let count = s.append_document(&source)?;
            Ok((count > 0).then_some(count))
        })?;
        Ok(appended.unwrap_or(0))
    }

    /// Rearrange pages so that position `i` shows the page previously at
    /// `order[i]`.
    pub fn reorder_pages(&mut self, order: &[usize]) -> Result<()> {
        let page_count = self.engine()?.page_count();
        if !is_permutation(order, page_count) {
            return Err(EditorError::InvalidPermutation {
                order: order.to_vec(),
                page_count,
            });
        }
        self.structural(|s| s.reorder_pages(order).map(Some))?;
        Ok(())
    }

    /// Add `degrees` (a multiple of 90) to the page rotation.
    pub fn rotate_page(&mut self, index: usize, degrees: i32) -> Result<bool> {
        self.structural(|s| s.rotate_page(index, degrees).map(applied))
            .map(|done| done.is_some())
    }

    /// Insert an empty page at `position` (appended when past the end).
    /// Returns the index the page ended up at, or `None` for a non-positive
    /// size.
    pub fn insert_blank_page(&mut self, position: usize, width: f32, height: f32) -> Result<Option<usize>> {
        self.engine()?;
        if !(width > 0.0 && height > 0.0) {
            return Ok(None);
        }
        self.structural(|s| s.insert_blank_page(position, PageSize::new(width, height)).map(Some))
    }

    /// Insert a copy of the page at `index` right after it.
    pub fn duplicate_page(&mut self, index: usize) -> Result<bool> {
        self.structural(|s| s.duplicate_page(index).map(applied))
            .map(|done| done.is_some())
    }

    /// Replace the page at `index` with page `source_index` of the document
    /// at `source`.
    #[instrument(skip(self), fields(source = %source.display()))]
    pub fn replace_page(&mut self, index: usize, source: &Path, source_index: usize) -> Result<bool> {
        if index >= self.engine()?.page_count() {
            return Ok(false);
        }
        let source = StructureHandle::open(source)?;
        self.structural(|s| s.replace_page(index, &source, source_index).map(applied))
            .map(|done| done.is_some())
    }

    // -- Content operations ---------------------------------------------------

    pub fn add_text(&mut self, index: usize, point: Point, text: &str, style: &TextStyle) -> Result<bool> {
        self.content(|r| r.insert_text(index, point, text, style).map(applied))
            .map(|done| done.is_some())
    }

    pub fn add_text_box(
        &mut self,
        index: usize,
        rect: Rect,
        text: &str,
        options: &TextBoxOptions,
    ) -> Result<bool> {
        self.content(|r| r.insert_text_box(index, rect, text, options).map(applied))
            .map(|done| done.is_some())
    }

    pub fn draw_filled_rect(&mut self, index: usize, rect: Rect, fill: Rgb) -> Result<bool> {
        self.content(|r| r.draw_filled_rect(index, rect, fill).map(applied))
            .map(|done| done.is_some())
    }

    /// Remove content under `rect` and paint it over with `fill`.
    pub fn redact_rect(&mut self, index: usize, rect: Rect, fill: Rgb) -> Result<bool> {
        self.content(|r| r.apply_redaction(index, rect, fill).map(applied))
            .map(|done| done.is_some())
    }

    pub fn add_text_annotation(
        &mut self,
        index: usize,
        rect: Rect,
        text: &str,
        style: &AnnotationStyle,
    ) -> Result<Option<AnnotationId>> {
        self.content(|r| r.add_free_text(index, rect, text, style))
    }

    pub fn update_text_annotation(
        &mut self,
        index: usize,
        id: AnnotationId,
        update: &AnnotationUpdate,
    ) -> Result<bool> {
        self.content(|r| r.update_free_text(index, id, update).map(applied))
            .map(|done| done.is_some())
    }

    pub fn delete_annotation(&mut self, index: usize, id: AnnotationId) -> Result<bool> {
        self.content(|r| r.delete_annotation(index, id).map(applied))
            .map(|done| done.is_some())
    }

    pub fn add_highlight_rect(&mut self, index: usize, rect: Rect, color: Rgb, opacity: f32) -> Result<bool> {
        self.content(|r| r.add_highlight(index, rect, color, opacity).map(applied))
            .map(|done| done.is_some())
    }

    pub fn add_image(&mut self, index: usize, rect: Rect, image: &Path) -> Result<bool> {
        self.content(|r| r.insert_image(index, rect, image).map(applied))
            .map(|done| done.is_some())
    }

    // -- History --------------------------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.is_open() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.is_open() && self.history.can_redo()
    }

    /// Return to the previous state.
    #[instrument(skip(self))]
    pub fn undo(&mut self) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(EditorError::NotOpen)?;
        let snapshot = self.history.undo()?;
        if let Err(err) = engine.load(snapshot.bytes()) {
            // Keep the cursor on the state the handles still hold.
            let _ = self.history.redo();
            return Err(err);
        }
        self.dirty = true;
        info!(index = ?self.history.index(), "undo");
        Ok(())
    }

    /// Re-apply the state undone last.
    #[instrument(skip(self))]
    pub fn redo(&mut self) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(EditorError::NotOpen)?;
        let snapshot = self.history.redo()?;
        if let Err(err) = engine.load(snapshot.bytes()) {
            let _ = self.history.undo();
            return Err(err);
        }
        self.dirty = true;
        info!(index = ?self.history.index(), "redo");
        Ok(())
    }

    // -- Internals ------------------------------------------------------------

    fn engine(&self) -> Result<&SyncEngine> {
        self.engine.as_ref().ok_or(EditorError::NotOpen)
    }

    fn render(&self) -> Result<&RenderHandle> {
        self.engine().map(SyncEngine::render)
    }

    fn out_of_range(&self, index: usize) -> EditorError {
        EditorError::IndexOutOfRange {
            index,
            len: self.page_count(),
        }
    }

    fn structural<T>(
        &mut self,
        edit: impl FnOnce(&mut StructureHandle) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        let engine = self.engine.as_mut().ok_or(EditorError::NotOpen)?;
        let commit = engine.mutate_structure(edit)?;
        Ok(commit.map(|commit| {
            self.record(commit.snapshot);
            commit.value
        }))
    }

    fn content<T>(&mut self, edit: impl FnOnce(&mut RenderHandle) -> Result<Option<T>>) -> Result<Option<T>> {
        let engine = self.engine.as_mut().ok_or(EditorError::NotOpen)?;
        let commit = engine.mutate_render(edit)?;
        Ok(commit.map(|commit| {
            self.record(commit.snapshot);
            commit.value
        }))
    }

    fn record(&mut self, snapshot: crate::history::Snapshot) {
        self.dirty = true;
        let pushed = self.history.push(snapshot);
        debug!(pushed, len = self.history.len(), index = ?self.history.index(), "history updated");
    }
}

/// `Some(())` for an applied edit, `None` for a declined one.
fn applied(done: bool) -> Option<()> {
    done.then_some(())
}

/// True when `order` holds each of `0..len` exactly once.
fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    order
        .iter()
        .all(|&index| index < len && !std::mem::replace(&mut seen[index], true))
}
