// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Annotation editing on the render codec: free-text notes with generated
// appearance streams, and translucent highlight rectangles.

use blattwerk_core::error::Result;
use blattwerk_core::types::{
    AnnotationId, AnnotationStyle, AnnotationSummary, AnnotationUpdate, Rect, Rgb, TextAlign,
    TextStyle,
};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat, dictionary};
use tracing::{debug, info, instrument};

use super::content::{append_operations, encode_operations};
use super::objects::{
    PageFrame, codec_err, decode_text_string, flate_stream, number, real_array, rect_array,
    resolve, text_string,
};
use super::render::{RenderHandle, fill_rect_ops, text_box_ops, underline_ops};

/// Inset between a note's border and its text.
const NOTE_PADDING: f32 = 2.0;

/// Annotation flag: print the annotation with the page.
const FLAG_PRINT: i64 = 4;

/// Opacity range accepted for highlights.
const MIN_OPACITY: f32 = 0.05;
const MAX_OPACITY: f32 = 1.0;

impl RenderHandle {
    /// Add a free-text note covering `rect`. Returns the id of the new
    /// annotation, or `None` when the page, rectangle or text is unusable.
    #[instrument(skip(self, text, style), fields(text_len = text.len()))]
    pub fn add_free_text(
        &mut self,
        index: usize,
        rect: Rect,
        text: &str,
        style: &AnnotationStyle,
    ) -> Result<Option<AnnotationId>> {
        let Some(page_id) = self.page_id(index) else {
            return Ok(None);
        };
        let rect = rect.normalized();
        if rect.is_degenerate() || text.trim().is_empty() || style.size <= 0.0 {
            return Ok(None);
        }

        let frame = PageFrame::of(&self.document, page_id);
        let note = NoteState {
            rect,
            text: text.to_string(),
            font: style.font.clone(),
            size: style.size,
            color: style.color,
            fill: style.fill,
        };
        let mut annotation = dictionary! {
            "Type" => "Annot",
            "Subtype" => "FreeText",
            "F" => Object::Integer(FLAG_PRINT),
            "Q" => Object::Integer(0),
            "BS" => dictionary! { "W" => Object::Integer(0) },
        };
        self.write_note(&frame, &mut annotation, &note)?;
        let id = self.attach_annotation(page_id, annotation)?;

        if style.underline {
            append_operations(&mut self.document, page_id, underline_ops(&frame, rect, style.color))?;
        }
        info!(index, id = id.0, "free-text annotation added");
        Ok(Some(AnnotationId(id.0)))
    }

    /// Free-text annotations of a page, in page order.
    pub fn list_free_text(&self, index: usize) -> Result<Vec<AnnotationSummary>> {
        let page_id = self.require_page(index)?;
        let frame = PageFrame::of(&self.document, page_id);
        Ok(page_annotations(&self.document, page_id)
            .into_iter()
            .filter_map(|id| {
                let dict = self.document.get_dictionary(id).ok()?;
                if !is_free_text(dict) {
                    return None;
                }
                let rect = dict
                    .get(b"Rect")
                    .ok()
                    .and_then(|object| rect_array(&self.document, object))?;
                Some(AnnotationSummary {
                    id: AnnotationId(id.0),
                    rect: frame.rect_from_user(rect),
                    text: contents(dict),
                })
            })
            .collect())
    }

    /// Change a free-text note. Fields left `None` keep their current value;
    /// the appearance stream is regenerated.
    #[instrument(skip(self, update))]
    pub fn update_free_text(
        &mut self,
        index: usize,
        id: AnnotationId,
        update: &AnnotationUpdate,
    ) -> Result<bool> {
        let Some(page_id) = self.page_id(index) else {
            return Ok(false);
        };
        if update.is_empty() {
            return Ok(false);
        }
        let Some(annot_id) = find_on_page(&self.document, page_id, id) else {
            return Ok(false);
        };
        let frame = PageFrame::of(&self.document, page_id);
        let mut annotation = self
            .document
            .get_dictionary(annot_id)
            .map_err(|err| codec_err("cannot read annotation", err))?
            .clone();
        if !is_free_text(&annotation) {
            return Ok(false);
        }

        let mut note = NoteState::read(&self.document, &frame, &annotation);
        if let Some(rect) = update.rect {
            let rect = rect.normalized();
            if rect.is_degenerate() {
                return Ok(false);
            }
            note.rect = rect;
        }
        if let Some(text) = &update.text {
            note.text = text.clone();
        }
        if let Some(font) = &update.font {
            note.font = font.clone();
        }
        if let Some(size) = update.size.filter(|size| *size > 0.0) {
            note.size = size;
        }
        if let Some(color) = update.color {
            note.color = color;
        }
        if update.fill.is_some() {
            note.fill = update.fill;
        }

        self.write_note(&frame, &mut annotation, &note)?;
        self.document.objects.insert(annot_id, Object::Dictionary(annotation));
        if update.underline {
            append_operations(
                &mut self.document,
                page_id,
                underline_ops(&frame, note.rect, note.color),
            )?;
        }
        info!(index, id = id.0, "free-text annotation updated");
        Ok(true)
    }

    /// Remove any annotation from a page. Returns `false` when the page does
    /// not carry it.
    #[instrument(skip(self))]
    pub fn delete_annotation(&mut self, index: usize, id: AnnotationId) -> Result<bool> {
        let Some(page_id) = self.page_id(index) else {
            return Ok(false);
        };
        let Some(annot_id) = find_on_page(&self.document, page_id, id) else {
            return Ok(false);
        };

        let remaining: Vec<Object> = page_annotations(&self.document, page_id)
            .into_iter()
            .filter(|other| *other != annot_id)
            .map(Object::Reference)
            .collect();
        let page = self
            .document
            .get_dictionary_mut(page_id)
            .map_err(|err| codec_err("cannot update page annotations", err))?;
        if remaining.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(remaining));
        }
        self.document.objects.remove(&annot_id);

        info!(index, id = id.0, "annotation deleted");
        Ok(true)
    }

    /// Add a borderless, translucent square annotation over `rect`.
    /// `opacity` is clamped to `0.05..=1.0`.
    #[instrument(skip(self))]
    pub fn add_highlight(&mut self, index: usize, rect: Rect, color: Rgb, opacity: f32) -> Result<bool> {
        let Some(page_id) = self.page_id(index) else {
            return Ok(false);
        };
        let rect = rect.normalized();
        if rect.is_degenerate() {
            return Ok(false);
        }
        // NaN lands on the minimum.
        let opacity = opacity.max(MIN_OPACITY).min(MAX_OPACITY);

        let frame = PageFrame::of(&self.document, page_id);
        let user = frame.rect_to_user(rect);
        let (width, height) = (user[2] - user[0], user[3] - user[1]);

        let state = dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(opacity),
            "CA" => Object::Real(opacity),
        };
        let mut ops = vec![Operation::new("gs", vec![Object::Name(b"GS0".to_vec())])];
        ops.extend(fill_rect_ops([0.0, 0.0, width, height], color));
        let form = flate_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => real_array(&[0.0, 0.0, width, height]),
                "Resources" => dictionary! {
                    "ExtGState" => dictionary! { "GS0" => state },
                },
            },
            &encode_operations(ops)?,
        )?;
        let form_id = self.document.add_object(form);

        let annotation = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Square",
            "Rect" => real_array(&user),
            "F" => Object::Integer(FLAG_PRINT),
            "IC" => rgb_array(color),
            "CA" => Object::Real(opacity),
            "BS" => dictionary! { "W" => Object::Integer(0) },
            "AP" => dictionary! { "N" => Object::Reference(form_id) },
        };
        let id = self.attach_annotation(page_id, annotation)?;
        info!(index, id = id.0, opacity, "highlight added");
        Ok(true)
    }

    /// Store `annotation` as a new object and list it on the page. The page
    /// gets its own `/Annots` array so pages sharing one are unaffected.
    fn attach_annotation(&mut self, page_id: ObjectId, mut annotation: Dictionary) -> Result<ObjectId> {
        annotation.set("P", Object::Reference(page_id));
        let id = self.document.add_object(annotation);
        let mut annots: Vec<Object> = page_annotations(&self.document, page_id)
            .into_iter()
            .map(Object::Reference)
            .collect();
        annots.push(Object::Reference(id));
        self.document
            .get_dictionary_mut(page_id)
            .map_err(|err| codec_err("cannot update page annotations", err))?
            .set("Annots", Object::Array(annots));
        Ok(id)
    }

    /// Write the entries of a free-text note, including a fresh appearance.
    fn write_note(&mut self, frame: &PageFrame, annotation: &mut Dictionary, note: &NoteState) -> Result<()> {
        let user = frame.rect_to_user(note.rect);
        let (width, height) = (user[2] - user[0], user[3] - user[1]);

        let font = self.font_choice(&note.font)?;
        let font_name = font.resource_name.as_bytes().to_vec();
        let style = TextStyle {
            font: note.font.clone(),
            size: note.size,
            color: note.color,
        };

        let mut ops = Vec::new();
        if let Some(fill) = note.fill {
            ops.extend(fill_rect_ops([0.0, 0.0, width, height], fill));
        }
        let inner = Rect::new(
            NOTE_PADDING,
            NOTE_PADDING,
            (width - NOTE_PADDING).max(NOTE_PADDING + 1.0),
            (height - NOTE_PADDING).max(NOTE_PADDING + 1.0),
        );
        ops.extend(text_box_ops(
            &PageFrame::from_box([0.0, 0.0, width, height]),
            inner,
            &note.text,
            &font.metrics,
            &font_name,
            &style,
            TextAlign::Left,
        ));

        let mut fonts = Dictionary::new();
        fonts.set(font_name.clone(), Object::Reference(font.id));
        let form = flate_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => real_array(&[0.0, 0.0, width, height]),
                "Resources" => dictionary! { "Font" => fonts },
            },
            &encode_operations(ops)?,
        )?;
        let form_id = self.document.add_object(form);

        annotation.set("Rect", real_array(&user));
        annotation.set("Contents", text_string(&note.text));
        annotation.set(
            "DA",
            Object::String(
                default_appearance(&font.resource_name, note.size, note.color).into_bytes(),
                StringFormat::Literal,
            ),
        );
        match note.fill {
            Some(fill) => annotation.set("C", rgb_array(fill)),
            None => {
                annotation.remove(b"C");
            }
        }
        annotation.set("AP", dictionary! { "N" => Object::Reference(form_id) });
        debug!(form = form_id.0, width, height, "note appearance generated");
        Ok(())
    }
}

/// Everything needed to regenerate a free-text note.
#[derive(Debug, Clone, PartialEq)]
struct NoteState {
    rect: Rect,
    text: String,
    font: String,
    size: f32,
    color: Rgb,
    fill: Option<Rgb>,
}

impl NoteState {
    /// Current state of an existing note; anything unreadable takes the
    /// default style.
    fn read(doc: &Document, frame: &PageFrame, annotation: &Dictionary) -> Self {
        let defaults = AnnotationStyle::default();
        let rect = annotation
            .get(b"Rect")
            .ok()
            .and_then(|object| rect_array(doc, object))
            .map_or(Rect::new(0.0, 0.0, 0.0, 0.0), |user| frame.rect_from_user(user));
        let appearance = annotation
            .get(b"DA")
            .and_then(Object::as_str)
            .map(|bytes| parse_default_appearance(&String::from_utf8_lossy(bytes)))
            .unwrap_or_default();
        let fill = annotation
            .get(b"C")
            .ok()
            .and_then(|object| resolve(doc, object))
            .and_then(|object| object.as_array().ok())
            .and_then(|array| match array.as_slice() {
                [r, g, b] => Some(Rgb::new(number(r)?, number(g)?, number(b)?)),
                _ => None,
            });

        Self {
            rect,
            text: contents(annotation),
            font: appearance.font.unwrap_or(defaults.font),
            size: appearance.size.unwrap_or(defaults.size),
            color: appearance.color.unwrap_or(defaults.color),
            fill,
        }
    }
}

/// Font, size and colour recovered from a `/DA` string.
#[derive(Debug, Default, PartialEq)]
struct DefaultAppearance {
    font: Option<String>,
    size: Option<f32>,
    color: Option<Rgb>,
}

fn default_appearance(font: &str, size: f32, color: Rgb) -> String {
    format!("/{font} {size} Tf {} {} {} rg", color.r, color.g, color.b)
}

fn parse_default_appearance(da: &str) -> DefaultAppearance {
    let tokens: Vec<&str> = da.split_whitespace().collect();
    let mut parsed = DefaultAppearance::default();
    let numbers = |slice: &[&str]| -> Option<Vec<f32>> {
        slice.iter().map(|token| token.parse::<f32>().ok()).collect()
    };

    for (i, token) in tokens.iter().enumerate() {
        match *token {
            "Tf" if i >= 2 => {
                parsed.font = tokens[i - 2].strip_prefix('/').map(str::to_string);
                parsed.size = tokens[i - 1].parse().ok();
            }
            "rg" if i >= 3 => {
                if let Some([r, g, b]) = numbers(&tokens[i - 3..i]).as_deref() {
                    parsed.color = Some(Rgb::new(*r, *g, *b));
                }
            }
            "g" if i >= 1 => {
                if let Ok(gray) = tokens[i - 1].parse::<f32>() {
                    parsed.color = Some(Rgb::new(gray, gray, gray));
                }
            }
            _ => {}
        }
    }
    parsed
}

fn rgb_array(color: Rgb) -> Object {
    real_array(&[color.r, color.g, color.b])
}

fn is_free_text(annotation: &Dictionary) -> bool {
    annotation.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"FreeText".as_slice())
}

fn contents(annotation: &Dictionary) -> String {
    annotation
        .get(b"Contents")
        .and_then(Object::as_str)
        .map(decode_text_string)
        .unwrap_or_default()
}

/// Object ids listed in a page's `/Annots`.
fn page_annotations(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_array().ok())
        .map(|array| {
            array
                .iter()
                .filter_map(|item| item.as_reference().ok())
                .collect()
        })
        .unwrap_or_default()
}

fn find_on_page(doc: &Document, page_id: ObjectId, id: AnnotationId) -> Option<ObjectId> {
    page_annotations(doc, page_id)
        .into_iter()
        .find(|annot| annot.0 == id.0)
}
