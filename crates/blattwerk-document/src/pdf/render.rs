// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Render codec — content-level editing of pages: text, text boxes, filled
// rectangles, redaction, images and rasterization. Annotation editing lives
// in `annotations.rs`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use blattwerk_core::error::{EditorError, Result};
use blattwerk_core::types::{PageSize, Point, Rect, Rgb, TextAlign, TextBoxOptions, TextStyle};
use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::{debug, info, instrument, warn};

use super::codec::{Codec, RenderCodec};
use super::content::{
    ContentWalker, MAX_FORM_DEPTH, Mark, Matrix, add_page_resource, append_operations,
    boxes_intersect, decode_page_operations, encode_operations, form_matrix, form_resources,
    named_xobject, page_resources, replace_operations, resource_category, unused_name,
};
use super::objects::{
    PageFrame, codec_err, flate_stream, page_rotation, real_array, rect_array, stream_data,
};
use super::raster::rasterize_page;
use super::text::{
    FontMetrics, LINE_HEIGHT, base14_font, base14_font_dict, base14_short, encode_win_ansi,
    wrap_lines,
};
use crate::fonts::EmbeddedFont;

/// Content-stream view of a PDF document, plus the external fonts registered
/// for text insertion.
#[derive(Debug, Clone)]
pub struct RenderHandle {
    pub(super) document: Document,
    fonts: BTreeMap<String, Arc<EmbeddedFont>>,
}

/// A font ready to be referenced from a resource dictionary.
pub(crate) struct FontChoice {
    pub(crate) resource_name: String,
    pub(crate) id: ObjectId,
    pub(crate) metrics: FontMetrics,
}

impl Codec for RenderHandle {
    const NAME: &'static str = "render";

    #[instrument(skip_all, fields(path = %path.display()))]
    fn open(path: &Path) -> Result<Self> {
        let document = Document::load(path)
            .map_err(|err| codec_err(format!("failed to open {}", path.display()), err))?;
        Ok(Self::wrap(document))
    }

    #[instrument(skip_all, fields(bytes_len = data.len()))]
    fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| codec_err("failed to load PDF from memory", err))?;
        Ok(Self::wrap(document))
    }

    fn serialize(&self) -> Result<Vec<u8>> {
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

impl RenderCodec for RenderHandle {
    #[instrument(skip(self), fields(path = %path.display()))]
    fn insert_font(&mut self, name: &str, path: &Path) -> Result<()> {
        let font = EmbeddedFont::load(name, path)?;
        debug!(name, postscript = font.postscript_name(), "font registered");
        self.fonts.insert(name.to_string(), Arc::new(font));
        Ok(())
    }
}

impl RenderHandle {
    fn wrap(document: Document) -> Self {
        Self {
            document,
            fonts: BTreeMap::new(),
        }
    }

    /// Borrow the underlying lopdf document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// A registered external font by internal name.
    pub fn font(&self, name: &str) -> Option<&EmbeddedFont> {
        self.fonts.get(name).map(Arc::as_ref)
    }

    pub fn font_names(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(String::as_str)
    }

    pub(crate) fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.document.get_pages().into_values().nth(index)
    }

    pub(super) fn require_page(&self, index: usize) -> Result<ObjectId> {
        self.page_id(index).ok_or(EditorError::IndexOutOfRange {
            index,
            len: self.page_count(),
        })
    }

    // -- Queries --------------------------------------------------------------

    /// Page size as displayed: width and height swap for 90°/270° rotation.
    pub fn page_size(&self, index: usize) -> Option<PageSize> {
        let id = self.page_id(index)?;
        let size = PageFrame::of(&self.document, id).size();
        Some(size.rotated(page_rotation(&self.document, id)))
    }

    pub fn page_rotation(&self, index: usize) -> Option<i32> {
        self.page_id(index)
            .map(|id| page_rotation(&self.document, id))
    }

    /// Render the page at `index`.
    #[instrument(skip(self))]
    pub fn rasterize(&self, index: usize, zoom: f32) -> Result<RgbImage> {
        let page_id = self.require_page(index)?;
        rasterize_page(&self.document, page_id, zoom)
    }

    // -- Content edits --------------------------------------------------------

    /// Write `text` with its first baseline at `point`; each further line of
    /// `text` goes one line height lower. Returns `false` when nothing would
    /// be written.
    #[instrument(skip(self, text, style), fields(text_len = text.len()))]
    pub fn insert_text(&mut self, index: usize, point: Point, text: &str, style: &TextStyle) -> Result<bool> {
        let Some(page_id) = self.page_id(index) else {
            return Ok(false);
        };
        if text.trim().is_empty() || style.size <= 0.0 {
            return Ok(false);
        }

        let frame = PageFrame::of(&self.document, page_id);
        let font = self.font_choice(&style.font)?;
        let name = self.use_font_on_page(page_id, &font)?;

        let mut ops = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let baseline = Point::new(point.x, point.y + i as f32 * style.size * LINE_HEIGHT);
            ops.extend(text_line_ops(&frame, baseline, line, &name, style, 0.0));
        }
        append_operations(&mut self.document, page_id, ops)?;
        info!(index, lines = text.lines().count(), "text inserted");
        Ok(true)
    }

    /// Lay out `text` inside `rect`: clamped to the page, grown to fit at
    /// least one line, wrapped at word boundaries and aligned.
    ///
    /// Returns `true` when something was painted (text or an erased
    /// background).
    #[instrument(skip(self, text, options), fields(text_len = text.len()))]
    pub fn insert_text_box(
        &mut self,
        index: usize,
        rect: Rect,
        text: &str,
        options: &TextBoxOptions,
    ) -> Result<bool> {
        let Some(page_id) = self.page_id(index) else {
            return Ok(false);
        };
        let style = &options.style;
        let has_text = !text.trim().is_empty();
        if style.size <= 0.0 || (!has_text && !options.erase_background) {
            return Ok(false);
        }

        let frame = PageFrame::of(&self.document, page_id);
        let mut area = rect.clamped_to(frame.size());
        let min_width = (style.size * 0.6).max(10.0);
        let min_height = (style.size * 1.2).max(12.0);
        if area.width() < min_width {
            area.x1 = area.x0 + min_width;
        }
        if area.height() < min_height {
            area.y1 = area.y0 + min_height;
        }

        let mut ops = Vec::new();
        if options.erase_background {
            ops.extend(fill_rect_ops(frame.rect_to_user(area), Rgb::WHITE));
        }
        if has_text {
            let font = self.font_choice(&style.font)?;
            let name = self.use_font_on_page(page_id, &font)?;
            ops.extend(text_box_ops(&frame, area, text, &font.metrics, &name, style, options.align));
            if let Some(color) = options.underline {
                ops.extend(underline_ops(&frame, area, color));
            }
        }

        append_operations(&mut self.document, page_id, ops)?;
        info!(index, ?area, erase = options.erase_background, "text box inserted");
        Ok(true)
    }

    /// Fill `rect` with `fill`. Degenerate rectangles are rejected.
    #[instrument(skip(self))]
    pub fn draw_filled_rect(&mut self, index: usize, rect: Rect, fill: Rgb) -> Result<bool> {
        let Some(page_id) = self.page_id(index) else {
            return Ok(false);
        };
        let rect = rect.normalized();
        if rect.is_degenerate() {
            return Ok(false);
        }
        let frame = PageFrame::of(&self.document, page_id);
        append_operations(&mut self.document, page_id, fill_rect_ops(frame.rect_to_user(rect), fill))?;
        debug!(index, ?rect, "rectangle filled");
        Ok(true)
    }

    /// Remove text runs and images touching `rect` from the page content and
    /// the forms it paints, then cover the area with `fill`.
    ///
    /// Removed text is replaced by an equivalent cursor movement so the
    /// remaining text on the same line keeps its position.
    #[instrument(skip(self))]
    pub fn apply_redaction(&mut self, index: usize, rect: Rect, fill: Rgb) -> Result<bool> {
        let Some(page_id) = self.page_id(index) else {
            return Ok(false);
        };
        let rect = rect.normalized();
        if rect.is_degenerate() {
            return Ok(false);
        }

        let frame = PageFrame::of(&self.document, page_id);
        let target = frame.rect_to_user(rect);
        let operations = decode_page_operations(&self.document, page_id)?;
        let mut resources = page_resources(&self.document, page_id);

        let redacted = redact_operations(
            &mut self.document,
            operations,
            &mut resources,
            Matrix::IDENTITY,
            target,
            0,
        )?;
        if redacted.removed > 0 {
            if redacted.forms > 0 {
                self.document
                    .get_dictionary_mut(page_id)
                    .map_err(|err| codec_err("cannot update page resources", err))?
                    .set("Resources", Object::Dictionary(resources));
            }
            replace_operations(&mut self.document, page_id, redacted.operations)?;
            // The replaced streams still hold what was removed.
            let pruned = self.document.prune_objects();
            debug!(pruned = pruned.len(), "redacted streams dropped");
        }
        append_operations(&mut self.document, page_id, fill_rect_ops(target, fill))?;

        info!(index, ?rect, removed = redacted.removed, forms = redacted.forms, "redaction applied");
        Ok(true)
    }

    /// Place the image at `path` inside `rect`, scaled to fit with its aspect
    /// ratio kept and centred.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn insert_image(&mut self, index: usize, rect: Rect, path: &Path) -> Result<bool> {
        let Some(page_id) = self.page_id(index) else {
            return Ok(false);
        };
        let rect = rect.normalized();
        if rect.is_degenerate() {
            return Ok(false);
        }

        let image = image::open(path)
            .map_err(|err| EditorError::Image(format!("cannot open {}: {err}", path.display())))?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(false);
        }
        let jpeg = match ImageFormat::from_path(path) {
            Ok(ImageFormat::Jpeg) => Some(std::fs::read(path)?),
            _ => None,
        };
        let xobject = self.add_image_xobject(&image, jpeg)?;

        let scale = (rect.width() / width as f32).min(rect.height() / height as f32);
        let (w, h) = (width as f32 * scale, height as f32 * scale);
        let x0 = rect.x0 + (rect.width() - w) / 2.0;
        let y0 = rect.y0 + (rect.height() - h) / 2.0;
        let frame = PageFrame::of(&self.document, page_id);
        let placed = frame.rect_to_user(Rect::new(x0, y0, x0 + w, y0 + h));

        let name = add_page_resource(
            &mut self.document,
            page_id,
            b"XObject",
            "Im",
            Object::Reference(xobject),
            |_, _| false,
        )?;
        let ops = vec![
            Operation::new(
                "cm",
                [w, 0.0, 0.0, h, placed[0], placed[1]]
                    .into_iter()
                    .map(Object::Real)
                    .collect(),
            ),
            Operation::new("Do", vec![Object::Name(name)]),
        ];
        append_operations(&mut self.document, page_id, ops)?;
        info!(index, width, height, "image inserted");
        Ok(true)
    }

    fn add_image_xobject(&mut self, image: &DynamicImage, jpeg: Option<Vec<u8>>) -> Result<ObjectId> {
        let (width, height) = image.dimensions();
        let gray = matches!(image, DynamicImage::ImageLuma8(_) | DynamicImage::ImageLumaA8(_));
        let color_space = if gray { "DeviceGray" } else { "DeviceRGB" };
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(i64::from(width)),
            "Height" => Object::Integer(i64::from(height)),
            "ColorSpace" => color_space,
            "BitsPerComponent" => Object::Integer(8),
        };

        let has_alpha = image.color().has_alpha();
        if let Some(bytes) = jpeg.filter(|_| !has_alpha && (gray || matches!(image, DynamicImage::ImageRgb8(_)))) {
            dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
            return Ok(self.document.add_object(Stream::new(dict, bytes)));
        }

        if has_alpha {
            let alpha: Vec<u8> = image.to_rgba8().pixels().map(|p| p.0[3]).collect();
            let mask = flate_stream(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(i64::from(width)),
                    "Height" => Object::Integer(i64::from(height)),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => Object::Integer(8),
                },
                &alpha,
            )?;
            let mask_id = self.document.add_object(mask);
            dict.set("SMask", Object::Reference(mask_id));
        }

        let samples = if gray {
            image.to_luma8().into_raw()
        } else {
            image.to_rgb8().into_raw()
        };
        let stream = flate_stream(dict, &samples)?;
        Ok(self.document.add_object(stream))
    }

    // -- Fonts ----------------------------------------------------------------

    /// Resolve a style font name to a font object in the document, reusing
    /// an existing one when possible. Unknown names fall back to Helvetica.
    pub(crate) fn font_choice(&mut self, name: &str) -> Result<FontChoice> {
        if let Some(font) = self.fonts.get(name).cloned() {
            let id = match find_font(&self.document, font.postscript_name(), b"TrueType") {
                Some(id) => id,
                None => embed_font(&mut self.document, &font)?,
            };
            return Ok(FontChoice {
                resource_name: resource_name(name),
                id,
                metrics: FontMetrics::embedded(&font),
            });
        }

        let base_font = base14_font(name).unwrap_or_else(|| {
            warn!(font = name, "unknown font, falling back to Helvetica");
            "Helvetica"
        });
        let id = match find_font(&self.document, base_font, b"Type1") {
            Some(id) => id,
            None => self.document.add_object(base14_font_dict(base_font)),
        };
        Ok(FontChoice {
            resource_name: base14_short(base_font).unwrap_or("helv").to_string(),
            id,
            metrics: FontMetrics::base14(base_font),
        })
    }

    fn use_font_on_page(&mut self, page_id: ObjectId, font: &FontChoice) -> Result<Vec<u8>> {
        let id = font.id;
        add_page_resource(
            &mut self.document,
            page_id,
            b"Font",
            &font.resource_name,
            Object::Reference(id),
            move |_, existing| existing.as_reference().is_ok_and(|r| r == id),
        )
    }
}

/// A PDF name made of the characters of `name` that need no escaping.
fn resource_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "F".to_string()
    } else {
        cleaned
    }
}

/// An existing font object with the given `/BaseFont` and `/Subtype`.
fn find_font(doc: &Document, base_font: &str, subtype: &[u8]) -> Option<ObjectId> {
    doc.objects.iter().find_map(|(id, object)| {
        let dict = object.as_dict().ok()?;
        let is_match = dict.get(b"Type").and_then(Object::as_name).ok() == Some(b"Font".as_slice())
            && dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(subtype)
            && dict.get(b"BaseFont").and_then(Object::as_name).ok() == Some(base_font.as_bytes())
            && dict.get(b"Encoding").and_then(Object::as_name).ok() != Some(b"Identity-H".as_slice());
        is_match.then_some(*id)
    })
}

/// Embed a TrueType/OpenType font as a simple font with WinAnsi encoding.
fn embed_font(doc: &mut Document, font: &EmbeddedFont) -> Result<ObjectId> {
    let mut file_dict = Dictionary::new();
    let file_key = if font.is_cff() {
        file_dict.set("Subtype", Object::Name(b"OpenType".to_vec()));
        "FontFile3"
    } else {
        file_dict.set("Length1", Object::Integer(font.data().len() as i64));
        "FontFile2"
    };
    let file_id = doc.add_object(flate_stream(file_dict, font.data())?);

    let ps_name = font.postscript_name().as_bytes().to_vec();
    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => Object::Name(ps_name.clone()),
        "Flags" => Object::Integer(font.descriptor_flags()),
        "FontBBox" => real_array(&font.bbox()),
        "ItalicAngle" => Object::Integer(if font.is_italic() { -12 } else { 0 }),
        "Ascent" => Object::Real(font.ascent()),
        "Descent" => Object::Real(font.descent()),
        "CapHeight" => Object::Real(font.cap_height()),
        "StemV" => Object::Integer(80),
    };
    descriptor.set(file_key, Object::Reference(file_id));
    let descriptor_id = doc.add_object(descriptor);

    let widths: Vec<Object> = (32..=255u8)
        .map(|code| Object::Real(font.win_ansi_width(code)))
        .collect();
    let id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => Object::Name(ps_name),
        "FirstChar" => Object::Integer(32),
        "LastChar" => Object::Integer(255),
        "Widths" => Object::Array(widths),
        "Encoding" => "WinAnsiEncoding",
        "FontDescriptor" => Object::Reference(descriptor_id),
    });
    debug!(font = font.name(), ?id, bytes = font.data().len(), "font embedded");
    Ok(id)
}

// -- Operation builders -------------------------------------------------------

/// One content stream after redaction.
struct Redacted {
    operations: Vec<Operation>,
    /// Text runs and images dropped, including those inside forms.
    removed: usize,
    /// Forms replaced by filtered copies.
    forms: usize,
}

/// Drop the text runs and images of `operations` that touch `target` (user
/// space).
///
/// A form that paints into `target` is replaced by a filtered copy registered
/// in `resources` under a new name, so other pages painting the original
/// keep it. Forms that cannot be decoded are dropped whole when their bounding
/// box reaches into `target`.
fn redact_operations(
    doc: &mut Document,
    mut operations: Vec<Operation>,
    resources: &mut Dictionary,
    ctm: Matrix,
    target: [f32; 4],
    depth: usize,
) -> Result<Redacted> {
    let mut replacements: BTreeMap<usize, Vec<Operation>> = BTreeMap::new();
    let mut forms: Vec<(usize, Matrix)> = Vec::new();
    {
        let mut visit = |mark: Mark<'_>| match mark {
            Mark::Text {
                bounds,
                index: Some(i),
                placeholder,
            } if boxes_intersect(bounds, target) => {
                replacements.insert(i, placeholder);
            }
            Mark::Image {
                ctm, index: Some(i), ..
            } if boxes_intersect(ctm.transform_rect([0.0, 0.0, 1.0, 1.0]), target) => {
                replacements.insert(i, Vec::new());
            }
            Mark::Form { ctm, index: Some(i) } => forms.push((i, ctm)),
            _ => {}
        };
        ContentWalker::new(doc, &mut visit).walk_operations(&operations, resources, ctm);
    }

    let mut removed = replacements.len();
    let mut replaced: Vec<String> = Vec::new();
    if depth >= MAX_FORM_DEPTH {
        forms.clear();
    }
    for (i, placed) in forms {
        let Some(name) = operations[i]
            .operands
            .first()
            .and_then(|name| name.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).into_owned())
        else {
            continue;
        };
        let Some(form) = named_xobject(doc, resources, &operations[i].operands).cloned() else {
            continue;
        };
        let form_ctm = form_matrix(doc, &form).then(placed);
        let mut inner_resources = form_resources(doc, &form, resources);

        let inner = match Content::decode(&stream_data(&form)) {
            Ok(content) => redact_operations(
                doc,
                content.operations,
                &mut inner_resources,
                form_ctm,
                target,
                depth + 1,
            )?,
            Err(err) => {
                let bbox = form.dict.get(b"BBox").ok().and_then(|b| rect_array(doc, b));
                if bbox.is_none_or(|bbox| boxes_intersect(form_ctm.transform_rect(bbox), target)) {
                    warn!(%err, form = %name, "undecodable form dropped from redacted area");
                    replacements.insert(i, Vec::new());
                    removed += 1;
                }
                continue;
            }
        };
        if inner.removed == 0 {
            continue;
        }

        let mut dict = form.dict.clone();
        for key in [b"Filter".as_slice(), b"DecodeParms".as_slice(), b"Length".as_slice()] {
            dict.remove(key);
        }
        if inner.forms > 0 {
            dict.set("Resources", Object::Dictionary(inner_resources));
        }
        let copy = doc.add_object(flate_stream(dict, &encode_operations(inner.operations)?)?);

        let mut entries = resource_category(doc, resources, b"XObject");
        let fresh = unused_name(&entries, &name);
        entries.set(fresh.clone(), Object::Reference(copy));
        resources.set("XObject", Object::Dictionary(entries));
        operations[i].operands[0] = Object::Name(fresh.into_bytes());
        debug!(form = %name, copy = ?copy, removed = inner.removed, "form redacted");

        removed += inner.removed;
        replaced.push(name);
    }

    if !replaced.is_empty() {
        let mut entries = resource_category(doc, resources, b"XObject");
        for name in &replaced {
            let painted = operations.iter().any(|op| {
                op.operator == "Do"
                    && op.operands.first().and_then(|o| o.as_name().ok()) == Some(name.as_bytes())
            });
            if !painted {
                entries.remove(name.as_bytes());
            }
        }
        resources.set("XObject", Object::Dictionary(entries));
    }

    let mut filtered = Vec::with_capacity(operations.len());
    for (i, op) in operations.into_iter().enumerate() {
        match replacements.remove(&i) {
            Some(replacement) => filtered.extend(replacement),
            None => filtered.push(op),
        }
    }
    Ok(Redacted {
        operations: filtered,
        removed,
        forms: replaced.len(),
    })
}

fn color_op(operator: &str, color: Rgb) -> Operation {
    Operation::new(
        operator,
        vec![Object::Real(color.r), Object::Real(color.g), Object::Real(color.b)],
    )
}

/// Fill a user-space rectangle.
pub(crate) fn fill_rect_ops(user: [f32; 4], fill: Rgb) -> Vec<Operation> {
    vec![
        color_op("rg", fill),
        Operation::new(
            "re",
            vec![
                Object::Real(user[0]),
                Object::Real(user[1]),
                Object::Real(user[2] - user[0]),
                Object::Real(user[3] - user[1]),
            ],
        ),
        Operation::new("f", vec![]),
    ]
}

/// A thin rule two points above the bottom edge of `area`.
pub(crate) fn underline_ops(frame: &PageFrame, area: Rect, color: Rgb) -> Vec<Operation> {
    let (x0, y) = frame.to_user(Point::new(area.x0 + 2.0, area.y1 - 2.0));
    let (x1, _) = frame.to_user(Point::new(area.x1 - 2.0, area.y1 - 2.0));
    vec![
        color_op("RG", color),
        Operation::new("w", vec![Object::Real(0.8)]),
        Operation::new("m", vec![Object::Real(x0), Object::Real(y)]),
        Operation::new("l", vec![Object::Real(x1), Object::Real(y)]),
        Operation::new("S", vec![]),
    ]
}

/// One line of text with its baseline starting at `baseline` (page space).
pub(crate) fn text_line_ops(
    frame: &PageFrame,
    baseline: Point,
    line: &str,
    font: &[u8],
    style: &TextStyle,
    word_spacing: f32,
) -> Vec<Operation> {
    let (x, y) = frame.to_user(baseline);
    let mut ops = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(font.to_vec()), Object::Real(style.size)]),
        color_op("rg", style.color),
        Operation::new("Td", vec![Object::Real(x), Object::Real(y)]),
    ];
    if word_spacing != 0.0 {
        ops.push(Operation::new("Tw", vec![Object::Real(word_spacing)]));
    }
    ops.push(Operation::new(
        "Tj",
        vec![Object::String(encode_win_ansi(line), StringFormat::Hexadecimal)],
    ));
    ops.push(Operation::new("ET", vec![]));
    ops
}

/// Wrapped, aligned lines of `text` inside `area`.
///
/// Lines that would run past the bottom edge are dropped. When not even the
/// first line fits, the raw lines are written from the top-left corner
/// without wrapping instead.
pub(crate) fn text_box_ops(
    frame: &PageFrame,
    area: Rect,
    text: &str,
    metrics: &FontMetrics,
    font: &[u8],
    style: &TextStyle,
    align: TextAlign,
) -> Vec<Operation> {
    let size = style.size;
    let width = area.width();
    let line_height = size * LINE_HEIGHT;
    let descent = 0.22 * size;
    let first_baseline = area.y0 + metrics.ascent / 1000.0 * size;

    // (line, ends its paragraph)
    let mut lines: Vec<(String, bool)> = Vec::new();
    for paragraph in text.split('\n') {
        let wrapped = wrap_lines(paragraph, width, |s| metrics.measure(s, size));
        let count = wrapped.len();
        lines.extend(wrapped.into_iter().enumerate().map(|(i, line)| (line, i + 1 == count)));
    }

    let mut ops = Vec::new();
    let mut placed = 0;
    for (i, (line, last)) in lines.iter().enumerate() {
        let baseline = first_baseline + i as f32 * line_height;
        if baseline + descent > area.y1 {
            break;
        }
        placed += 1;
        if line.is_empty() {
            continue;
        }
        let line_width = metrics.measure(line, size);
        let slack = (width - line_width).max(0.0);
        let spaces = line.matches(' ').count();
        let (offset, word_spacing) = match align {
            TextAlign::Left => (0.0, 0.0),
            TextAlign::Center => (slack / 2.0, 0.0),
            TextAlign::Right => (slack, 0.0),
            TextAlign::Justify if !last && spaces > 0 => (0.0, slack / spaces as f32),
            TextAlign::Justify => (0.0, 0.0),
        };
        ops.extend(text_line_ops(
            frame,
            Point::new(area.x0 + offset, baseline),
            line,
            font,
            style,
            word_spacing,
        ));
    }

    if placed == 0 {
        let gap = size * 1.15;
        let mut y = area.y0 + size;
        for line in text.lines() {
            if y > area.y1 {
                break;
            }
            if !line.is_empty() {
                ops.extend(text_line_ops(frame, Point::new(area.x0, y), line, font, style, 0.0));
            }
            y += gap;
        }
    }
    ops
}

/// Text shown by `Tj`/`TJ`/`'`/`"` operators of a page, decoded as WinAnsi
/// bytes. Used to check what a page still says.
pub(crate) fn shown_text(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let Ok(operations) = decode_page_operations(doc, page_id) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let shows = |op: &&Operation| matches!(op.operator.as_str(), "Tj" | "TJ" | "'" | "\"");
    for op in operations.iter().filter(shows) {
        for operand in &op.operands {
            match operand {
                Object::String(bytes, _) => out.extend_from_slice(bytes),
                Object::Array(items) => {
                    for item in items {
                        if let Object::String(bytes, _) = item {
                            out.extend_from_slice(bytes);
                        }
                    }
                }
                _ => {}
            }
        }
        out.push(b'\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{contains, form_pdf, sample_pdf, streams_containing, write_png};

    fn handle(sizes: &[(f32, f32)]) -> RenderHandle {
        RenderHandle::from_bytes(&sample_pdf(sizes)).expect("load sample")
    }

    fn frame(width: f32, height: f32) -> PageFrame {
        let doc = crate::test_support::sample_document(&[(width, height)]);
        PageFrame::of(&doc, doc.get_pages()[&1])
    }

    fn text_of(handle: &RenderHandle, index: usize) -> Vec<u8> {
        shown_text(handle.document(), handle.page_id(index).expect("page"))
    }

    #[test]
    fn page_size_swaps_for_quarter_turns() {
        let mut doc = crate::test_support::sample_document(&[(200.0, 300.0)]);
        let page = doc.get_pages()[&1];
        doc.get_dictionary_mut(page)
            .expect("page")
            .set("Rotate", Object::Integer(90));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save");

        let h = RenderHandle::from_bytes(&bytes).expect("load");
        assert_eq!(h.page_rotation(0), Some(90));
        assert_eq!(h.page_size(0), Some(PageSize::new(300.0, 200.0)));
        assert_eq!(h.page_size(1), None);
    }

    #[test]
    fn insert_text_writes_each_line() {
        let mut h = handle(&[(300.0, 300.0)]);
        let style = TextStyle::default();
        assert!(h.insert_text(0, Point::new(20.0, 40.0), "alpha\nbeta", &style).expect("insert"));
        let text = text_of(&h, 0);
        assert!(contains(&text, b"alpha"));
        assert!(contains(&text, b"beta"));
    }

    #[test]
    fn insert_text_rejects_blank_and_out_of_range() {
        let mut h = handle(&[(300.0, 300.0)]);
        let before = h.serialize().expect("serialize");
        let style = TextStyle::default();
        assert!(!h.insert_text(0, Point::new(20.0, 40.0), "   ", &style).expect("blank"));
        assert!(!h.insert_text(5, Point::new(20.0, 40.0), "text", &style).expect("range"));
        assert_eq!(h.serialize().expect("serialize"), before);
    }

    #[test]
    fn unknown_font_falls_back_to_helvetica() {
        let mut h = handle(&[(300.0, 300.0)]);
        let style = TextStyle {
            font: "NoSuchFont".into(),
            ..TextStyle::default()
        };
        assert!(h.insert_text(0, Point::new(20.0, 40.0), "hello", &style).expect("insert"));
        assert!(find_font(h.document(), "Helvetica", b"Type1").is_some());
    }

    #[test]
    fn fonts_are_reused_across_edits() {
        let mut h = handle(&[(300.0, 300.0)]);
        let style = TextStyle {
            font: "timesb".into(),
            ..TextStyle::default()
        };
        h.insert_text(0, Point::new(20.0, 40.0), "one", &style).expect("insert");
        let count = h.document().objects.len();
        let first = h.font_choice("timesb").expect("font").id;
        h.insert_text(0, Point::new(20.0, 80.0), "two", &style).expect("insert");
        assert_eq!(h.font_choice("timesb").expect("font").id, first);
        // Only the new content stream was added.
        assert_eq!(h.document().objects.len(), count + 1);
    }

    #[test]
    fn text_box_wraps_inside_the_box() {
        let mut h = handle(&[(400.0, 400.0)]);
        let options = TextBoxOptions::default();
        let rect = Rect::new(10.0, 10.0, 110.0, 200.0);
        assert!(h
            .insert_text_box(0, rect, "several words that need wrapping here", &options)
            .expect("text box"));
        let text = text_of(&h, 0);
        let lines = text.split(|b| *b == b'\n').filter(|l| !l.is_empty()).count();
        // fixture text plus at least two wrapped lines
        assert!(lines >= 3, "expected wrapping, got {lines} lines");
    }

    #[test]
    fn text_box_falls_back_when_nothing_fits() {
        let frame_metrics = FontMetrics::base14("Helvetica");
        let frame = frame(400.0, 400.0);
        let style = TextStyle {
            size: 40.0,
            ..TextStyle::default()
        };
        // 12pt tall box cannot hold a 40pt line, so the raw line is written.
        let ops = text_box_ops(
            &frame,
            Rect::new(0.0, 0.0, 100.0, 12.0),
            "big",
            &frame_metrics,
            b"helv",
            &style,
            TextAlign::Left,
        );
        assert!(ops.iter().any(|op| op.operator == "Tj"));
    }

    #[test]
    fn text_box_erase_only_counts_as_painted() {
        let mut h = handle(&[(300.0, 300.0)]);
        let options = TextBoxOptions {
            erase_background: true,
            ..TextBoxOptions::default()
        };
        assert!(h
            .insert_text_box(0, Rect::new(0.0, 0.0, 50.0, 50.0), "", &options)
            .expect("erase"));
        let plain = TextBoxOptions::default();
        assert!(!h
            .insert_text_box(0, Rect::new(0.0, 0.0, 50.0, 50.0), "  ", &plain)
            .expect("blank"));
    }

    #[test]
    fn justify_stretches_all_but_the_last_line() {
        let metrics = FontMetrics::base14("Helvetica");
        let frame = frame(400.0, 400.0);
        let style = TextStyle {
            size: 10.0,
            ..TextStyle::default()
        };
        let ops = text_box_ops(
            &frame,
            Rect::new(0.0, 0.0, 60.0, 300.0),
            "the quick brown fox jumps",
            &metrics,
            b"helv",
            &style,
            TextAlign::Justify,
        );
        let stretched = ops.iter().filter(|op| op.operator == "Tw").count();
        let lines = ops.iter().filter(|op| op.operator == "Tj").count();
        assert!(lines >= 2);
        assert_eq!(stretched, lines - 1);
    }

    #[test]
    fn filled_rect_rejects_degenerate_rects() {
        let mut h = handle(&[(300.0, 300.0)]);
        assert!(!h
            .draw_filled_rect(0, Rect::new(10.0, 10.0, 10.0, 50.0), Rgb::BLACK)
            .expect("degenerate"));
        assert!(h
            .draw_filled_rect(0, Rect::new(50.0, 50.0, 10.0, 10.0), Rgb::BLACK)
            .expect("reversed corners"));
    }

    #[test]
    fn redaction_removes_covered_text_only() {
        let mut h = handle(&[(400.0, 400.0)]);
        let style = TextStyle::default();
        h.insert_text(0, Point::new(20.0, 100.0), "secret", &style).expect("insert");
        h.insert_text(0, Point::new(20.0, 300.0), "public", &style).expect("insert");

        assert!(h
            .apply_redaction(0, Rect::new(10.0, 80.0, 200.0, 110.0), Rgb::BLACK)
            .expect("redact"));
        let text = text_of(&h, 0);
        assert!(!contains(&text, b"secret"));
        assert!(contains(&text, b"public"));
    }

    #[test]
    fn redaction_removes_text_painted_by_a_form() {
        let mut h = RenderHandle::from_bytes(&form_pdf(1)).expect("load");
        assert!(h
            .apply_redaction(0, Rect::new(0.0, 0.0, 200.0, 200.0), Rgb::BLACK)
            .expect("redact"));

        let bytes = h.serialize().expect("serialize");
        assert_eq!(streams_containing(&bytes, b"TopSecret"), 0);
        assert_eq!(streams_containing(&bytes, b"Harmless"), 0);
    }

    #[test]
    fn form_redaction_keeps_uncovered_runs_and_other_pages() {
        let mut h = RenderHandle::from_bytes(&form_pdf(2)).expect("load");
        // User-space band y 90..120 holds only the "TopSecret" run.
        assert!(h
            .apply_redaction(0, Rect::new(0.0, 80.0, 200.0, 110.0), Rgb::BLACK)
            .expect("redact"));

        let bytes = h.serialize().expect("serialize");
        // Page 2 still paints the untouched original.
        assert_eq!(streams_containing(&bytes, b"TopSecret"), 1);
        assert_eq!(streams_containing(&bytes, b"Harmless"), 2);

        let reloaded = RenderHandle::from_bytes(&bytes).expect("reload");
        let doc = reloaded.document();
        let first = page_resources(doc, reloaded.page_id(0).expect("page"));
        let second = page_resources(doc, reloaded.page_id(1).expect("page"));
        let xobjects = resource_category(doc, &first, b"XObject");
        assert!(xobjects.has(b"Fm01"));
        assert!(!xobjects.has(b"Fm0"));
        assert_ne!(
            xobjects.get(b"Fm01").and_then(Object::as_reference).ok(),
            resource_category(doc, &second, b"XObject")
                .get(b"Fm0")
                .and_then(Object::as_reference)
                .ok()
        );
    }

    #[test]
    fn redaction_paints_the_area() {
        let mut h = handle(&[(100.0, 100.0)]);
        h.apply_redaction(0, Rect::new(10.0, 10.0, 50.0, 50.0), Rgb::BLACK)
            .expect("redact");
        let image = h.rasterize(0, 1.0).expect("rasterize");
        assert_eq!(image.get_pixel(30, 30).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(80, 80).0, [255, 255, 255]);
    }

    #[test]
    fn rasterize_paints_rects_and_rotates() {
        let mut h = handle(&[(100.0, 50.0)]);
        h.draw_filled_rect(0, Rect::new(0.0, 0.0, 20.0, 10.0), Rgb::new(1.0, 0.0, 0.0))
            .expect("rect");
        let image = h.rasterize(0, 2.0).expect("rasterize");
        assert_eq!(image.dimensions(), (200, 100));
        assert_eq!(image.get_pixel(5, 5).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(150, 80).0, [255, 255, 255]);

        assert!(matches!(
            h.rasterize(3, 1.0),
            Err(EditorError::IndexOutOfRange { index: 3, len: 1 })
        ));
        assert!(h.rasterize(0, 0.0).is_err());
    }

    #[test]
    fn image_is_embedded_and_rendered() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blue.png");
        write_png(&path, 4, 4, [0, 0, 255]);

        let mut h = handle(&[(100.0, 100.0)]);
        assert!(h
            .insert_image(0, Rect::new(0.0, 0.0, 40.0, 40.0), &path)
            .expect("image"));
        let image = h.rasterize(0, 1.0).expect("rasterize");
        assert_eq!(image.get_pixel(20, 20).0, [0, 0, 255]);
        assert_eq!(image.get_pixel(70, 70).0, [255, 255, 255]);
    }

    #[test]
    fn missing_image_is_an_image_error() {
        let mut h = handle(&[(100.0, 100.0)]);
        let err = h
            .insert_image(0, Rect::new(0.0, 0.0, 40.0, 40.0), Path::new("/no/such.png"))
            .expect_err("missing image");
        assert!(matches!(err, EditorError::Image(_)));
    }

    #[test]
    fn resource_names_are_plain() {
        assert_eq!(resource_name("My Font#1"), "MyFont1");
        assert_eq!(resource_name("()"), "F");
    }
}
