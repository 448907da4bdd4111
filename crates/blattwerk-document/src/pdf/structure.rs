// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Structural codec — page-tree level operations on the PDF object graph
// using the `lopdf` crate: remove, insert, reorder, rotate, duplicate,
// replace, and export of pages.
//
// Every mutation rewrites the page tree as a single flat `/Kids` array under
// the root `/Pages` node and prunes objects that became unreachable.

use std::path::Path;

use blattwerk_core::error::Result;
use blattwerk_core::types::PageSize;
use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId, dictionary};
use tracing::{debug, info, instrument, warn};

use super::codec::Codec;
use super::objects::{
    INHERITABLE, PageFrame, PageImporter, codec_err, empty_document, inherited_attribute,
    page_rotation, pages_root, real_array, resolve, text_string,
};

/// Object-graph view of a PDF document.
#[derive(Debug, Clone)]
pub struct StructureHandle {
    document: Document,
}

impl Codec for StructureHandle {
    const NAME: &'static str = "structure";

    #[instrument(skip_all, fields(path = %path.display()))]
    fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path)
            .map_err(|err| codec_err(format!("failed to open {}", path.display()), err))?;
        debug!(pages = document.get_pages().len(), "structure handle opened");
        Ok(Self { document })
    }

    #[instrument(skip_all, fields(bytes_len = data.len()))]
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| codec_err("failed to load PDF from memory", err))?;
        Ok(Self { document })
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        // lopdf's writer takes `&mut self` and may touch the trailer, so
        // serialise a copy to keep this handle's state untouched.
        let mut document = self.document.clone();
        let mut output = Vec::new();
        document
            .save_to(&mut output)
            .map_err(|err| codec_err("failed to serialise document", err))?;
        Ok(output)
    }

    fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }
}

impl StructureHandle {
    /// Borrow the underlying lopdf document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Page object ids in display order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.get_pages().into_values().collect()
    }

    /// Effective rotation of the page at `index`.
    pub fn rotation(&self, index: usize) -> Option<i32> {
        let id = *self.page_ids().get(index)?;
        Some(page_rotation(&self.document, id))
    }

    // -- Page list mutation ---------------------------------------------------

    /// Delete the page at `index`. Returns `false` when out of range.
    #[instrument(skip(self))]
    pub fn remove_page(&mut self, index: usize) -> Result<bool> {
        let mut ids = self.page_ids();
        if index >= ids.len() {
            return Ok(false);
        }
        ids.remove(index);
        self.write_page_ids(&ids)?;
        info!(index, remaining = ids.len(), "page removed");
        Ok(true)
    }

    /// Append every page of `source` in order. Returns the number appended.
    #[instrument(skip_all)]
    pub fn append_document(&mut self, source: &StructureHandle) -> Result<usize> {
        let mut ids = self.page_ids();
        let mut importer = PageImporter::new(&source.document);
        let mut appended = 0;
        for page_id in source.page_ids() {
            ids.push(importer.import_page(&mut self.document, page_id)?);
            appended += 1;
        }
        self.write_page_ids(&ids)?;
        info!(appended, total = ids.len(), "document appended");
        Ok(appended)
    }

    /// Rearrange pages so that new position `i` holds old page `order[i]`.
    ///
    /// The caller has already checked that `order` is a permutation.
    #[instrument(skip(self))]
    pub fn reorder_pages(&mut self, order: &[usize]) -> Result<()> {
        let ids = self.page_ids();
        let reordered: Vec<ObjectId> = order.iter().map(|&old| ids[old]).collect();
        self.write_page_ids(&reordered)?;
        debug!(?order, "pages reordered");
        Ok(())
    }

    /// Add `degrees` to the page's rotation, wrapping modulo 360.
    ///
    /// Returns `false` when `index` is out of range or `degrees` is not a
    /// multiple of 90.
    #[instrument(skip(self))]
    pub fn rotate_page(&mut self, index: usize, degrees: i32) -> Result<bool> {
        if degrees % 90 != 0 {
            warn!(degrees, "rotation must be a multiple of 90");
            return Ok(false);
        }
        let Some(&page_id) = self.page_ids().get(index) else {
            return Ok(false);
        };

        let existing = page_rotation(&self.document, page_id);
        let rotation = (existing.rem_euclid(360) + degrees.rem_euclid(360)) % 360;
        self.document
            .get_dictionary_mut(page_id)
            .map_err(|err| codec_err("cannot rotate page", err))?
            .set("Rotate", Object::Integer(rotation as i64));

        info!(index, existing, rotation, "page rotated");
        Ok(true)
    }

    /// Insert an empty page of `size` before `position`; positions past the
    /// end append.
    #[instrument(skip(self))]
    pub fn insert_blank_page(&mut self, position: usize, size: PageSize) -> Result<usize> {
        let mut ids = self.page_ids();
        let position = position.min(ids.len());
        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => real_array(&[0.0, 0.0, size.width, size.height]),
            "Resources" => dictionary! {},
        });
        ids.insert(position, page_id);
        self.write_page_ids(&ids)?;
        info!(position, width = size.width, height = size.height, "blank page inserted");
        Ok(position)
    }

    /// Insert a copy of the page at `index` right after it.
    ///
    /// Content streams and resources are shared with the original (content
    /// edits always append new streams, so sharing is safe); annotations are
    /// copied so each page owns its own.
    #[instrument(skip(self))]
    pub fn duplicate_page(&mut self, index: usize) -> Result<bool> {
        let mut ids = self.page_ids();
        let Some(&page_id) = ids.get(index) else {
            return Ok(false);
        };

        let mut page = self
            .document
            .get_dictionary(page_id)
            .map_err(|err| codec_err("cannot read page to duplicate", err))?
            .clone();
        for key in INHERITABLE {
            if !page.has(key)
                && let Some(value) = inherited_attribute(&self.document, page_id, key)
            {
                page.set(key.to_vec(), value);
            }
        }

        let copy_id = self.document.new_object_id();
        let annotations = page
            .get(b"Annots")
            .ok()
            .and_then(|annots| resolve(&self.document, annots))
            .and_then(|annots| annots.as_array().ok())
            .cloned()
            .unwrap_or_default();
        if !annotations.is_empty() {
            let copies = self.copy_annotations(&annotations, copy_id);
            page.set("Annots", Object::Array(copies));
        }

        self.document
            .objects
            .insert(copy_id, Object::Dictionary(page));
        ids.insert(index + 1, copy_id);
        self.write_page_ids(&ids)?;
        info!(index, "page duplicated");
        Ok(true)
    }

    /// Replace the page at `index` with page `source_index` of `source`.
    #[instrument(skip(self, source))]
    pub fn replace_page(
        &mut self,
        index: usize,
        source: &StructureHandle,
        source_index: usize,
    ) -> Result<bool> {
        let mut ids = self.page_ids();
        let source_ids = source.page_ids();
        let (Some(slot), Some(&source_page)) = (ids.get_mut(index), source_ids.get(source_index))
        else {
            return Ok(false);
        };

        let mut importer = PageImporter::new(&source.document);
        *slot = importer.import_page(&mut self.document, source_page)?;
        self.write_page_ids(&ids)?;
        info!(index, source_index, "page replaced");
        Ok(true)
    }

    // -- Export ---------------------------------------------------------------

    /// Build a standalone document from the pages at `indices` (in the given
    /// order) and serialise it. Nothing in this handle changes.
    #[instrument(skip(self))]
    pub fn export_pages(&self, indices: &[usize]) -> Result<Vec<u8>> {
        let ids = self.page_ids();
        let mut exported = StructureHandle {
            document: empty_document(),
        };
        exported.document.version = self.document.version.clone();

        let mut importer = PageImporter::new(&self.document);
        let mut new_ids = Vec::with_capacity(indices.len());
        for &index in indices {
            let page_id = *ids.get(index).ok_or_else(|| {
                codec_err("page export", format!("page {index} not found"))
            })?;
            new_ids.push(importer.import_page(&mut exported.document, page_id)?);
        }
        exported.write_page_ids(&new_ids)?;

        let output = exported.serialize()?;
        debug!(pages = new_ids.len(), output_bytes = output.len(), "pages exported");
        Ok(output)
    }

    /// Unrotated visible (crop-box) size of the page at `index`.
    pub fn page_size(&self, index: usize) -> Option<PageSize> {
        let id = *self.page_ids().get(index)?;
        Some(PageFrame::of(&self.document, id).size())
    }

    /// Serialise with `/Producer` and `/ModDate` set in the Info dictionary.
    /// The handle itself is not modified.
    pub fn serialize_stamped(&self, producer: &str, modified: DateTime<Utc>) -> Result<Vec<u8>> {
        let mut document = self.document.clone();
        let date = modified.format("D:%Y%m%d%H%M%S+00'00'").to_string();

        let existing = document
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .ok()
            .filter(|id| document.get_dictionary(*id).is_ok());
        let info_id = match existing {
            Some(id) => id,
            None => {
                let id = document.add_object(Dictionary::new());
                document.trailer.set("Info", Object::Reference(id));
                id
            }
        };
        let info = document
            .get_dictionary_mut(info_id)
            .map_err(|err| codec_err("cannot update document info", err))?;
        info.set("Producer", text_string(producer));
        info.set("ModDate", Object::string_literal(date));

        let mut output = Vec::new();
        document
            .save_to(&mut output)
            .map_err(|err| codec_err("failed to serialise document", err))?;
        Ok(output)
    }

    // -- Helpers --------------------------------------------------------------

    /// Copy annotation dictionaries for a duplicated page, pointing their
    /// `/P` entry at the new page. Appearance streams stay shared.
    fn copy_annotations(&mut self, annotations: &[Object], page_id: ObjectId) -> Vec<Object> {
        let mut copies = Vec::with_capacity(annotations.len());
        for annotation in annotations {
            let Some(mut dict) = resolve(&self.document, annotation)
                .and_then(|object| object.as_dict().ok())
                .cloned()
            else {
                warn!(?annotation, "skipping unreadable annotation");
                continue;
            };
            dict.set("P", Object::Reference(page_id));
            dict.remove(b"Popup");
            dict.remove(b"Parent");
            let copy_id = self.document.add_object(Object::Dictionary(dict));
            copies.push(Object::Reference(copy_id));
        }
        copies
    }

    /// Make `ids` the complete, flat page list of the document.
    ///
    /// Inherited attributes are copied onto each page first, because the
    /// intermediate `/Pages` nodes they came from are dropped.
    fn write_page_ids(&mut self, ids: &[ObjectId]) -> Result<()> {
        let root = pages_root(&self.document)?;

        for &id in ids {
            let mut inherited = Vec::new();
            if let Ok(page) = self.document.get_dictionary(id) {
                for key in INHERITABLE {
                    if !page.has(key)
                        && let Some(value) = inherited_attribute(&self.document, id, key)
                    {
                        inherited.push((key, value));
                    }
                }
            }
            let page = self
                .document
                .get_dictionary_mut(id)
                .map_err(|err| codec_err(format!("page {id:?} is not a dictionary"), err))?;
            for (key, value) in inherited {
                page.set(key.to_vec(), value);
            }
            page.set("Parent", Object::Reference(root));
        }

        let pages = self
            .document
            .get_dictionary_mut(root)
            .map_err(|err| codec_err("root /Pages is not a dictionary", err))?;
        pages.set(
            "Kids",
            Object::Array(ids.iter().map(|&id| Object::Reference(id)).collect()),
        );
        pages.set("Count", Object::Integer(ids.len() as i64));

        let pruned = self.document.prune_objects();
        if !pruned.is_empty() {
            debug!(pruned = pruned.len(), "unreachable objects pruned");
        }
        Ok(())
    }
}
