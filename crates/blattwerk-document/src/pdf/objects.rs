// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Object-graph helpers shared by both codecs: attribute inheritance through
// the page tree, page-space geometry, cross-document page import, and PDF
// string/stream encoding.

use std::collections::HashMap;
use std::fmt::Display;
use std::io::Write;

use blattwerk_core::error::{EditorError, Result};
use blattwerk_core::types::{PageSize, Point, Rect};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::warn;

/// Page attributes a page may inherit from its ancestors in the page tree.
pub(crate) const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Media box used when neither the page nor its ancestors declare one.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Deepest page-tree nesting we follow before assuming a reference cycle.
const MAX_TREE_DEPTH: usize = 64;

/// Wrap an underlying codec failure with context.
pub(crate) fn codec_err(context: impl Display, err: impl Display) -> EditorError {
    EditorError::Codec(format!("{context}: {err}"))
}

/// Numeric value of an Integer or Real object.
pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

/// Array of Reals.
pub(crate) fn real_array(values: &[f32]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v)).collect())
}

/// Follow a single level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Resolve `dict[key]`, following one reference.
pub(crate) fn resolved_entry<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|object| resolve(doc, object))
}

/// Four numbers of a rectangle array such as `/MediaBox` or `/Rect`,
/// normalised so the lower-left corner comes first.
pub(crate) fn rect_array(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let array = resolve(doc, object)?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut values = [0.0f32; 4];
    for (slot, item) in values.iter_mut().zip(array) {
        *slot = number(resolve(doc, item)?)?;
    }
    Some([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}

/// Look up an attribute on a page, walking `/Parent` links for inheritable keys.
pub(crate) fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_dictionary(current).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value.clone());
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    warn!(?page_id, "page tree deeper than {MAX_TREE_DEPTH} levels, giving up");
    None
}

/// Effective `/Rotate` of a page, normalised to `0..360`.
pub(crate) fn page_rotation(doc: &Document, page_id: ObjectId) -> i32 {
    inherited_attribute(doc, page_id, b"Rotate")
        .as_ref()
        .and_then(|object| resolve(doc, object).and_then(number))
        .map(|degrees| (degrees as i32).rem_euclid(360))
        .unwrap_or(0)
}

/// Returns true for dictionaries of `/Type /Page` or `/Type /Pages`.
pub(crate) fn is_page_node(object: &Object) -> bool {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|ty| ty.as_name().ok())
        .is_some_and(|name| name == b"Page" || name == b"Pages")
}

/// Geometry of one page: converts between page space (top-left origin,
/// y down) and PDF user space (bottom-left origin, y up).
///
/// The frame is the visible area of the page: the `/CropBox` clipped to the
/// `/MediaBox`, or the media box alone when there is no usable crop box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PageFrame {
    bounds: [f32; 4],
}

impl PageFrame {
    pub(crate) fn of(doc: &Document, page_id: ObjectId) -> Self {
        let media = inherited_attribute(doc, page_id, b"MediaBox")
            .and_then(|object| rect_array(doc, &object))
            .unwrap_or(DEFAULT_MEDIA_BOX);
        let bounds = inherited_attribute(doc, page_id, b"CropBox")
            .and_then(|object| rect_array(doc, &object))
            .and_then(|crop| intersect_boxes(crop, media))
            .unwrap_or(media);
        Self { bounds }
    }

    /// Frame of an arbitrary box, e.g. the bounding box of a form XObject.
    pub(crate) fn from_box(bounds: [f32; 4]) -> Self {
        Self { bounds }
    }

    /// Visible area in user space.
    pub(crate) fn bounds(&self) -> [f32; 4] {
        self.bounds
    }

    /// Unrotated visible size.
    pub(crate) fn size(&self) -> PageSize {
        PageSize::new(self.bounds[2] - self.bounds[0], self.bounds[3] - self.bounds[1])
    }

    pub(crate) fn to_user(&self, point: Point) -> (f32, f32) {
        (self.bounds[0] + point.x, self.bounds[3] - point.y)
    }

    /// `[llx, lly, urx, ury]` in user space.
    pub(crate) fn rect_to_user(&self, rect: Rect) -> [f32; 4] {
        let r = rect.normalized();
        [
            self.bounds[0] + r.x0,
            self.bounds[3] - r.y1,
            self.bounds[0] + r.x1,
            self.bounds[3] - r.y0,
        ]
    }

    pub(crate) fn rect_from_user(&self, rect: [f32; 4]) -> Rect {
        Rect::new(
            rect[0] - self.bounds[0],
            self.bounds[3] - rect[3],
            rect[2] - self.bounds[0],
            self.bounds[3] - rect[1],
        )
        .normalized()
    }
}

/// Overlap of two normalised boxes, `None` when it has no area.
fn intersect_boxes(a: [f32; 4], b: [f32; 4]) -> Option<[f32; 4]> {
    let overlap = [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])];
    (overlap[2] > overlap[0] && overlap[3] > overlap[1]).then_some(overlap)
}

/// A new document with an empty page tree.
pub(crate) fn empty_document() -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => Vec::<Object>::new(),
        "Count" => 0,
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Object id of the root `/Pages` node.
pub(crate) fn pages_root(doc: &Document) -> Result<ObjectId> {
    doc.catalog()
        .map_err(|err| codec_err("document has no catalog", err))?
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|err| codec_err("catalog has no /Pages reference", err))
}

/// Copies pages (and everything they reference) from one document into
/// another.
///
/// References already copied are reused, so shared resources are copied once
/// and cycles such as an annotation's `/P` back-link terminate. Pages that
/// were not explicitly imported are never dragged along through such links;
/// those references become `null`.
pub(crate) struct PageImporter<'a> {
    source: &'a Document,
    mapped: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageImporter<'a> {
    pub(crate) fn new(source: &'a Document) -> Self {
        Self {
            source,
            mapped: HashMap::new(),
        }
    }

    /// Copy one page into `target` and return its new id. The caller links it
    /// into the target's page tree and sets `/Parent`.
    pub(crate) fn import_page(&mut self, target: &mut Document, page_id: ObjectId) -> Result<ObjectId> {
        let source = self.source;
        let mut page = source
            .get_dictionary(page_id)
            .map_err(|err| codec_err(format!("cannot read page object {page_id:?}"), err))?
            .clone();

        // Inherited attributes would be lost once the page leaves its tree.
        for key in INHERITABLE {
            if !page.has(key)
                && let Some(value) = inherited_attribute(source, page_id, key)
            {
                page.set(key.to_vec(), value);
            }
        }
        page.remove(b"Parent");

        let new_id = target.new_object_id();
        self.mapped.insert(page_id, new_id);
        let cloned = self.clone_dictionary(target, &page);
        target.objects.insert(new_id, Object::Dictionary(cloned));
        Ok(new_id)
    }

    fn clone_dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Dictionary {
        let mut cloned = Dictionary::new();
        for (key, value) in dict.iter() {
            cloned.set(key.clone(), self.clone_object(target, value));
        }
        cloned
    }

    fn clone_object(&mut self, target: &mut Document, object: &Object) -> Object {
        match object {
            Object::Dictionary(dict) => Object::Dictionary(self.clone_dictionary(target, dict)),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.clone_object(target, item))
                    .collect(),
            ),
            Object::Stream(stream) => {
                let dict = self.clone_dictionary(target, &stream.dict);
                Object::Stream(Stream::new(dict, stream.content.clone()))
            }
            Object::Reference(id) => match self.clone_reference(target, *id) {
                Some(new_id) => Object::Reference(new_id),
                None => Object::Null,
            },
            other => other.clone(),
        }
    }

    fn clone_reference(&mut self, target: &mut Document, id: ObjectId) -> Option<ObjectId> {
        if let Some(mapped) = self.mapped.get(&id) {
            return Some(*mapped);
        }
        let source = self.source;
        let object = match source.get_object(id) {
            Ok(object) => object,
            Err(err) => {
                warn!(?id, %err, "cannot resolve reference, using null");
                return None;
            }
        };
        if is_page_node(object) {
            return None;
        }

        let new_id = target.new_object_id();
        self.mapped.insert(id, new_id);
        let cloned = self.clone_object(target, object);
        target.objects.insert(new_id, cloned);
        Some(new_id)
    }
}

/// Encode a text string: plain ASCII as a literal, anything else as
/// UTF-16BE with a byte-order mark.
pub(crate) fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a text string written by [`text_string`] or any PDFDocEncoded
/// string (approximated as Latin-1).
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(b"\xFE\xFF") {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// A Flate-compressed stream.
pub(crate) fn flate_stream(mut dict: Dictionary, data: &[u8]) -> Result<Stream> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    let compressed = encoder.finish()?;
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    Ok(Stream::new(dict, compressed))
}

/// Decoded bytes of a stream, falling back to the raw bytes for filters
/// lopdf cannot undo.
pub(crate) fn stream_data(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_converts_between_page_and_user_space() {
        let frame = PageFrame::from_box([0.0, 0.0, 600.0, 800.0]);
        assert_eq!(frame.to_user(Point::new(10.0, 20.0)), (10.0, 780.0));

        let rect = Rect::new(10.0, 20.0, 110.0, 70.0);
        let user = frame.rect_to_user(rect);
        assert_eq!(user, [10.0, 730.0, 110.0, 780.0]);
        assert_eq!(frame.rect_from_user(user), rect);
    }

    #[test]
    fn frame_respects_offset_media_box() {
        let frame = PageFrame::from_box([50.0, 100.0, 650.0, 900.0]);
        assert_eq!(frame.size(), PageSize::new(600.0, 800.0));
        assert_eq!(frame.to_user(Point::new(0.0, 0.0)), (50.0, 900.0));
    }

    #[test]
    fn frame_uses_crop_box_clipped_to_media_box() {
        let mut doc = Document::with_version("1.5");
        let cropped = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => real_array(&[0.0, 0.0, 200.0, 200.0]),
            "CropBox" => real_array(&[50.0, 100.0, 150.0, 150.0]),
        });
        let overhanging = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => real_array(&[0.0, 0.0, 200.0, 200.0]),
            "CropBox" => real_array(&[100.0, -50.0, 400.0, 100.0]),
        });
        let disjoint = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => real_array(&[0.0, 0.0, 200.0, 200.0]),
            "CropBox" => real_array(&[300.0, 300.0, 400.0, 400.0]),
        });

        let frame = PageFrame::of(&doc, cropped);
        assert_eq!(frame.size(), PageSize::new(100.0, 50.0));
        assert_eq!(frame.to_user(Point::new(0.0, 0.0)), (50.0, 150.0));
        assert_eq!(
            frame.rect_to_user(Rect::new(0.0, 0.0, 10.0, 10.0)),
            [50.0, 140.0, 60.0, 150.0]
        );

        assert_eq!(PageFrame::of(&doc, overhanging).bounds(), [100.0, 0.0, 200.0, 100.0]);
        assert_eq!(PageFrame::of(&doc, disjoint).bounds(), [0.0, 0.0, 200.0, 200.0]);
    }

    #[test]
    fn text_strings_round_trip() {
        for sample in ["plain ascii", "Straße – ünïcödé"] {
            let Object::String(bytes, _) = text_string(sample) else {
                panic!("expected a string object");
            };
            assert_eq!(decode_text_string(&bytes), sample);
        }
    }

    #[test]
    fn empty_document_has_a_page_tree() {
        let doc = empty_document();
        let root = pages_root(&doc).expect("pages root");
        assert!(doc.get_dictionary(root).is_ok());
        assert!(doc.get_pages().is_empty());
    }

    #[test]
    fn rect_array_normalizes_corners() {
        let doc = Document::new();
        let array = real_array(&[100.0, 200.0, 0.0, 50.0]);
        assert_eq!(rect_array(&doc, &array), Some([0.0, 50.0, 100.0, 200.0]));
    }

    #[test]
    fn flate_stream_decompresses_to_input() {
        let stream = flate_stream(Dictionary::new(), b"0 0 m 10 10 l S\n").expect("compress");
        assert_eq!(stream_data(&stream), b"0 0 m 10 10 l S\n");
    }
}
