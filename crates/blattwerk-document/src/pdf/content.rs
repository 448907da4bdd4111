// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page content streams — reading and appending operations, copy-on-write
// resource dictionaries, and a small interpreter that reports what a content
// stream paints (filled paths, strokes, images, text runs) in user space.

use std::collections::HashMap;
use std::rc::Rc;

use blattwerk_core::error::Result;
use blattwerk_core::types::Rgb;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::warn;

use super::objects::{codec_err, flate_stream, inherited_attribute, number, resolve, stream_data};
use super::text::FontMetrics;

/// Form XObjects nested deeper than this are not followed.
pub(crate) const MAX_FORM_DEPTH: usize = 8;

/// Line segments used to flatten one Bézier curve.
const CURVE_STEPS: usize = 8;

// -- Geometry -----------------------------------------------------------------

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub(crate) const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub(crate) fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub(crate) fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Six numbers of a `cm`/`Tm` operator or a `/Matrix` array.
    pub(crate) fn from_objects(doc: &Document, values: &[Object]) -> Option<Self> {
        if values.len() != 6 {
            return None;
        }
        let mut n = [0.0f32; 6];
        for (slot, value) in n.iter_mut().zip(values) {
            *slot = resolve(doc, value).and_then(number)?;
        }
        Some(Self::new(n[0], n[1], n[2], n[3], n[4], n[5]))
    }

    /// `self` applied first, then `next`.
    pub(crate) fn then(self, next: Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    pub(crate) fn apply(self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Bounding box of a transformed `[x0 y0 x1 y1]` rectangle.
    pub(crate) fn transform_rect(self, rect: [f32; 4]) -> [f32; 4] {
        let corners = [
            self.apply(rect[0], rect[1]),
            self.apply(rect[2], rect[1]),
            self.apply(rect[0], rect[3]),
            self.apply(rect[2], rect[3]),
        ];
        bounds(&corners)
    }

    /// Approximate uniform scale factor, used for line widths.
    pub(crate) fn scale(self) -> f32 {
        (self.a * self.d - self.b * self.c).abs().sqrt()
    }
}

/// Bounding box of a point set.
pub(crate) fn bounds(points: &[(f32, f32)]) -> [f32; 4] {
    let mut out = [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY];
    for &(x, y) in points {
        out[0] = out[0].min(x);
        out[1] = out[1].min(y);
        out[2] = out[2].max(x);
        out[3] = out[3].max(y);
    }
    out
}

/// True when two `[x0 y0 x1 y1]` boxes overlap with positive area.
pub(crate) fn boxes_intersect(a: [f32; 4], b: [f32; 4]) -> bool {
    a[0] < b[2] && b[0] < a[2] && a[1] < b[3] && b[1] < a[3]
}

// -- Reading and writing page content ----------------------------------------

/// Ids of the content streams of a page, in painting order.
pub(crate) fn content_stream_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_reference().ok())
                .collect(),
            Ok(_) => vec![*id],
            Err(_) => Vec::new(),
        },
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_reference().ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Decoded content of a page: all streams joined with newlines so operators
/// split across stream boundaries stay separated.
pub(crate) fn page_content(doc: &Document, page_id: ObjectId) -> Vec<u8> {
    let mut content = Vec::new();
    for id in content_stream_ids(doc, page_id) {
        match doc.get_object(id).and_then(Object::as_stream) {
            Ok(stream) => {
                content.extend_from_slice(&stream_data(stream));
                content.push(b'\n');
            }
            Err(err) => warn!(?id, %err, "skipping unreadable content stream"),
        }
    }
    content
}

/// Parsed operations of a page.
pub(crate) fn decode_page_operations(doc: &Document, page_id: ObjectId) -> Result<Vec<Operation>> {
    let content = page_content(doc, page_id);
    Content::decode(&content)
        .map(|content| content.operations)
        .map_err(|err| codec_err(format!("cannot decode content of page {page_id:?}"), err))
}

/// Parsed operations of a page. Undecodable content yields no operations.
pub(crate) fn page_operations(doc: &Document, page_id: ObjectId) -> Vec<Operation> {
    decode_page_operations(doc, page_id).unwrap_or_else(|err| {
        warn!(%err, "page content ignored");
        Vec::new()
    })
}

pub(crate) fn encode_operations(operations: Vec<Operation>) -> Result<Vec<u8>> {
    let mut bytes = Content { operations }
        .encode()
        .map_err(|err| codec_err("cannot encode content stream", err))?;
    if bytes.last() != Some(&b'\n') {
        bytes.push(b'\n');
    }
    Ok(bytes)
}

/// Paint `operations` on top of the existing page content.
///
/// Existing content is bracketed in `q`/`Q` once so any transform it leaves
/// behind cannot displace the new operations, and the new operations get
/// their own `q`/`Q`. Existing streams are never modified, so pages that
/// share content streams stay independent.
pub(crate) fn append_operations(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<()> {
    let mut ids = content_stream_ids(doc, page_id);
    let already_wrapped = ids.first().is_some_and(|id| {
        doc.get_object(*id)
            .and_then(Object::as_stream)
            .is_ok_and(|stream| stream_data(stream).trim_ascii() == b"q")
    });

    let mut wrapped = Vec::with_capacity(operations.len() + 3);
    if !ids.is_empty() && !already_wrapped {
        let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        ids.insert(0, open_id);
        wrapped.push(Operation::new("Q", vec![]));
    }
    wrapped.push(Operation::new("q", vec![]));
    wrapped.extend(operations);
    wrapped.push(Operation::new("Q", vec![]));

    let stream = flate_stream(Dictionary::new(), &encode_operations(wrapped)?)?;
    ids.push(doc.add_object(stream));
    set_contents(doc, page_id, ids)
}

/// Replace the whole content of a page with `operations`.
pub(crate) fn replace_operations(
    doc: &mut Document,
    page_id: ObjectId,
    operations: Vec<Operation>,
) -> Result<()> {
    let stream = flate_stream(Dictionary::new(), &encode_operations(operations)?)?;
    let id = doc.add_object(stream);
    set_contents(doc, page_id, vec![id])
}

fn set_contents(doc: &mut Document, page_id: ObjectId, ids: Vec<ObjectId>) -> Result<()> {
    let contents = match ids.as_slice() {
        [single] => Object::Reference(*single),
        _ => Object::Array(ids.into_iter().map(Object::Reference).collect()),
    };
    doc.get_dictionary_mut(page_id)
        .map_err(|err| codec_err("cannot update page contents", err))?
        .set("Contents", contents);
    Ok(())
}

// -- Resources ----------------------------------------------------------------

/// Effective resource dictionary of a page (inherited and dereferenced).
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited_attribute(doc, page_id, b"Resources")
        .and_then(|object| {
            resolve(doc, &object)
                .and_then(|resolved| resolved.as_dict().ok())
                .cloned()
        })
        .unwrap_or_default()
}

/// One category (`/Font`, `/XObject`, `/ExtGState`) of a resource dictionary.
pub(crate) fn resource_category(doc: &Document, resources: &Dictionary, category: &[u8]) -> Dictionary {
    resources
        .get(category)
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

/// Add `value` to a page's resources under a name derived from `preferred`
/// and return the name used.
///
/// When `preferred` already exists and `reuse` accepts the existing value, it
/// is kept and its name returned. The page gets its own inline copy of the
/// resource dictionary, so resources shared with other pages never change.
pub(crate) fn add_page_resource(
    doc: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    preferred: &str,
    value: Object,
    reuse: impl Fn(&Document, &Object) -> bool,
) -> Result<Vec<u8>> {
    let mut resources = page_resources(doc, page_id);
    let mut entries = resource_category(doc, &resources, category);

    if let Ok(existing) = entries.get(preferred.as_bytes())
        && reuse(doc, existing)
    {
        return Ok(preferred.as_bytes().to_vec());
    }

    let name = unused_name(&entries, preferred);
    entries.set(name.clone(), value);
    resources.set(category.to_vec(), Object::Dictionary(entries));
    doc.get_dictionary_mut(page_id)
        .map_err(|err| codec_err("cannot update page resources", err))?
        .set("Resources", Object::Dictionary(resources));
    Ok(name.into_bytes())
}

/// `preferred`, or `preferred` with the first numeric suffix not yet taken
/// in `entries`.
pub(crate) fn unused_name(entries: &Dictionary, preferred: &str) -> String {
    let mut name = preferred.to_string();
    let mut suffix = 1;
    while entries.has(name.as_bytes()) {
        name = format!("{preferred}{suffix}");
        suffix += 1;
    }
    name
}

// -- Interpretation -----------------------------------------------------------

/// Something a content stream paints, in user-space coordinates.
pub(crate) enum Mark<'a> {
    Fill {
        subpaths: Vec<Vec<(f32, f32)>>,
        color: Rgb,
        alpha: f32,
    },
    Stroke {
        subpaths: Vec<Vec<(f32, f32)>>,
        color: Rgb,
        alpha: f32,
        width: f32,
    },
    Image {
        /// Unit square mapped through the current transform.
        ctm: Matrix,
        stream: &'a Stream,
        /// Operation index when painted by the walked stream itself, `None`
        /// inside nested forms.
        index: Option<usize>,
    },
    Text {
        bounds: [f32; 4],
        index: Option<usize>,
        /// Operations that move the text cursor exactly as the text run did,
        /// without painting anything.
        placeholder: Vec<Operation>,
    },
    /// A form XObject about to be painted. Its content is walked right after.
    Form {
        /// Transform at the `Do`, before the form's own `/Matrix`.
        ctm: Matrix,
        index: Option<usize>,
    },
}

#[derive(Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Rgb,
    stroke: Rgb,
    fill_alpha: f32,
    stroke_alpha: f32,
    line_width: f32,
    font: Option<Rc<FontMetrics>>,
    font_size: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    leading: f32,
    rise: f32,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: Rgb::BLACK,
            stroke: Rgb::BLACK,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            line_width: 1.0,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Walks content streams and reports painted marks to a visitor.
pub(crate) struct ContentWalker<'a, 'v> {
    doc: &'a Document,
    visit: &'v mut dyn FnMut(Mark<'a>),
}

impl<'a, 'v> ContentWalker<'a, 'v> {
    pub(crate) fn new(doc: &'a Document, visit: &'v mut dyn FnMut(Mark<'a>)) -> Self {
        Self { doc, visit }
    }

    /// Walk a page's own content.
    pub(crate) fn walk_page(&mut self, page_id: ObjectId, ctm: Matrix) {
        let operations = page_operations(self.doc, page_id);
        let resources = page_resources(self.doc, page_id);
        self.walk(&operations, &resources, GraphicsState::new(ctm), 0);
    }

    /// Walk parsed operations with the given resources.
    pub(crate) fn walk_operations(&mut self, operations: &[Operation], resources: &Dictionary, ctm: Matrix) {
        self.walk(operations, resources, GraphicsState::new(ctm), 0);
    }

    /// Walk a form XObject (such as an annotation appearance) placed with
    /// `ctm`. The form's own `/Matrix` is applied first.
    pub(crate) fn walk_form(&mut self, form: &'a Stream, ctm: Matrix) {
        let matrix = form_matrix(self.doc, form);
        let resources = resource_category(self.doc, &form.dict, b"Resources");
        let data = stream_data(form);
        match Content::decode(&data) {
            Ok(content) => {
                self.walk(&content.operations, &resources, GraphicsState::new(matrix.then(ctm)), 1)
            }
            Err(err) => warn!(%err, "cannot decode form content"),
        }
    }

    fn walk(&mut self, operations: &[Operation], resources: &Dictionary, initial: GraphicsState, depth: usize) {
        let doc = self.doc;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut gs = initial;
        let mut path: Vec<Vec<(f32, f32)>> = Vec::new();
        let mut fonts: HashMap<Vec<u8>, Rc<FontMetrics>> = HashMap::new();
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for (index, op) in operations.iter().enumerate() {
            let nums: Vec<f32> = op.operands.iter().filter_map(number).collect();
            let top_index = (depth == 0).then_some(index);

            match op.operator.as_str() {
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_objects(doc, &op.operands) {
                        gs.ctm = m.then(gs.ctm);
                    }
                }
                "w" => {
                    if let Some(&width) = nums.first() {
                        gs.line_width = width;
                    }
                }
                "gs" => {
                    if let Some(state) = named_resource(doc, resources, b"ExtGState", &op.operands)
                        .and_then(|o| o.as_dict().ok())
                    {
                        if let Some(ca) = resolved_number(doc, state, b"ca") {
                            gs.fill_alpha = ca.clamp(0.0, 1.0);
                        }
                        if let Some(ca) = resolved_number(doc, state, b"CA") {
                            gs.stroke_alpha = ca.clamp(0.0, 1.0);
                        }
                        if let Some(lw) = resolved_number(doc, state, b"LW") {
                            gs.line_width = lw;
                        }
                    }
                }

                // Colour
                "g" | "rg" | "k" | "sc" | "scn" => {
                    if let Some(color) = color_from(&nums) {
                        gs.fill = color;
                    }
                }
                "G" | "RG" | "K" | "SC" | "SCN" => {
                    if let Some(color) = color_from(&nums) {
                        gs.stroke = color;
                    }
                }

                // Path construction
                "m" if nums.len() >= 2 => path.push(vec![gs.ctm.apply(nums[0], nums[1])]),
                "l" if nums.len() >= 2 => {
                    let point = gs.ctm.apply(nums[0], nums[1]);
                    current_subpath(&mut path, point).push(point);
                }
                "c" | "v" | "y" => {
                    let controls = match (op.operator.as_str(), nums.as_slice()) {
                        ("c", [x1, y1, x2, y2, x3, y3, ..]) => Some((Some((*x1, *y1)), (*x2, *y2), (*x3, *y3))),
                        ("v", [x2, y2, x3, y3, ..]) => Some((None, (*x2, *y2), (*x3, *y3))),
                        ("y", [x1, y1, x3, y3, ..]) => Some((Some((*x1, *y1)), (*x3, *y3), (*x3, *y3))),
                        _ => None,
                    };
                    if let Some((first, second, end)) = controls
                        && let Some(&start) = path.last().and_then(|sub| sub.last())
                    {
                        let p1 = first.map_or(start, |(x, y)| gs.ctm.apply(x, y));
                        let p2 = gs.ctm.apply(second.0, second.1);
                        let p3 = gs.ctm.apply(end.0, end.1);
                        if let Some(sub) = path.last_mut() {
                            flatten_cubic(sub, start, p1, p2, p3);
                        }
                    }
                }
                "re" if nums.len() >= 4 => {
                    let (x, y, w, h) = (nums[0], nums[1], nums[2], nums[3]);
                    path.push(vec![
                        gs.ctm.apply(x, y),
                        gs.ctm.apply(x + w, y),
                        gs.ctm.apply(x + w, y + h),
                        gs.ctm.apply(x, y + h),
                        gs.ctm.apply(x, y),
                    ]);
                }
                "h" => {
                    if let Some(sub) = path.last_mut()
                        && let Some(&first) = sub.first()
                    {
                        sub.push(first);
                    }
                }

                // Path painting
                "f" | "F" | "f*" => {
                    (self.visit)(Mark::Fill {
                        subpaths: std::mem::take(&mut path),
                        color: gs.fill,
                        alpha: gs.fill_alpha,
                    });
                }
                "B" | "B*" | "b" | "b*" => {
                    let subpaths = std::mem::take(&mut path);
                    (self.visit)(Mark::Fill {
                        subpaths: subpaths.clone(),
                        color: gs.fill,
                        alpha: gs.fill_alpha,
                    });
                    (self.visit)(Mark::Stroke {
                        subpaths,
                        color: gs.stroke,
                        alpha: gs.stroke_alpha,
                        width: gs.line_width * gs.ctm.scale(),
                    });
                }
                "S" | "s" => {
                    (self.visit)(Mark::Stroke {
                        subpaths: std::mem::take(&mut path),
                        color: gs.stroke,
                        alpha: gs.stroke_alpha,
                        width: gs.line_width * gs.ctm.scale(),
                    });
                }
                "n" => path.clear(),

                // XObjects
                "Do" => {
                    let Some(stream) = named_xobject(doc, resources, &op.operands) else {
                        continue;
                    };
                    let subtype = stream.dict.get(b"Subtype").and_then(Object::as_name).ok();
                    if subtype == Some(b"Image".as_slice()) {
                        (self.visit)(Mark::Image {
                            ctm: gs.ctm,
                            stream,
                            index: top_index,
                        });
                    } else if subtype == Some(b"Form".as_slice()) && depth < MAX_FORM_DEPTH {
                        (self.visit)(Mark::Form {
                            ctm: gs.ctm,
                            index: top_index,
                        });
                        self.walk_nested_form(stream, resources, &gs, depth);
                    }
                }

                // Text
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(&size)) = (op.operands.first(), nums.last()) {
                        let metrics = fonts
                            .entry(name.clone())
                            .or_insert_with(|| {
                                let dict = named_resource(doc, resources, b"Font", &op.operands)
                                    .and_then(|o| o.as_dict().ok());
                                Rc::new(match dict {
                                    Some(dict) => FontMetrics::from_font_dict(doc, dict),
                                    None => FontMetrics::base14("Helvetica"),
                                })
                            })
                            .clone();
                        gs.font = Some(metrics);
                        gs.font_size = size;
                    }
                }
                "Tc" => gs.char_spacing = nums.first().copied().unwrap_or(0.0),
                "Tw" => gs.word_spacing = nums.first().copied().unwrap_or(0.0),
                "Tz" => gs.horizontal_scale = nums.first().copied().unwrap_or(100.0) / 100.0,
                "TL" => gs.leading = nums.first().copied().unwrap_or(0.0),
                "Ts" => gs.rise = nums.first().copied().unwrap_or(0.0),
                "Td" | "TD" if nums.len() >= 2 => {
                    if op.operator == "TD" {
                        gs.leading = -nums[1];
                    }
                    tlm = Matrix::translate(nums[0], nums[1]).then(tlm);
                    tm = tlm;
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_objects(doc, &op.operands) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translate(0.0, -gs.leading).then(tlm);
                    tm = tlm;
                }
                "Tj" | "TJ" | "'" | "\"" => {
                    let mut placeholder = Vec::new();
                    if op.operator == "\"" && nums.len() >= 2 {
                        gs.word_spacing = nums[0];
                        gs.char_spacing = nums[1];
                        placeholder.push(Operation::new("Tw", vec![Object::Real(nums[0])]));
                        placeholder.push(Operation::new("Tc", vec![Object::Real(nums[1])]));
                    }
                    if op.operator == "'" || op.operator == "\"" {
                        tlm = Matrix::translate(0.0, -gs.leading).then(tlm);
                        tm = tlm;
                        placeholder.push(Operation::new("T*", vec![]));
                    }

                    let start = tm;
                    let mut advance = 0.0;
                    let mut run: Vec<(f32, f32)> = Vec::new();
                    for operand in &op.operands {
                        match operand {
                            Object::String(bytes, _) => {
                                let width = show_width(&gs, bytes);
                                let (low, high) = text_extent(&gs);
                                let local = Matrix::translate(advance, 0.0).then(start).then(gs.ctm);
                                run.push(local.apply(0.0, low));
                                run.push(local.apply(width, high));
                                run.push(local.apply(0.0, high));
                                run.push(local.apply(width, low));
                                advance += width;
                            }
                            Object::Array(items) => {
                                for item in items {
                                    match item {
                                        Object::String(bytes, _) => {
                                            let width = show_width(&gs, bytes);
                                            let (low, high) = text_extent(&gs);
                                            let local = Matrix::translate(advance, 0.0).then(start).then(gs.ctm);
                                            run.push(local.apply(0.0, low));
                                            run.push(local.apply(width, high));
                                            run.push(local.apply(0.0, high));
                                            run.push(local.apply(width, low));
                                            advance += width;
                                        }
                                        other => {
                                            if let Some(n) = number(other) {
                                                advance -= n / 1000.0 * gs.font_size * gs.horizontal_scale;
                                            }
                                        }
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                    tm = Matrix::translate(advance, 0.0).then(start);

                    let scale = gs.font_size * gs.horizontal_scale;
                    let kern = if scale.abs() > f32::EPSILON {
                        -advance * 1000.0 / scale
                    } else {
                        0.0
                    };
                    placeholder.push(Operation::new(
                        "TJ",
                        vec![Object::Array(vec![Object::Real(kern)])],
                    ));
                    if !run.is_empty() {
                        (self.visit)(Mark::Text {
                            bounds: bounds(&run),
                            index: top_index,
                            placeholder,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    fn walk_nested_form(&mut self, form: &'a Stream, parent: &Dictionary, gs: &GraphicsState, depth: usize) {
        let doc = self.doc;
        let matrix = form_matrix(doc, form);
        let resources = form_resources(doc, form, parent);
        let data = stream_data(form);
        let Ok(content) = Content::decode(&data) else {
            warn!("cannot decode nested form content");
            return;
        };
        let mut state = gs.clone();
        state.ctm = matrix.then(gs.ctm);
        self.walk(&content.operations, &resources, state, depth + 1);
    }
}

/// Look up `/<category>/<name>` where `name` is the first operand.
fn named_resource<'a>(
    doc: &'a Document,
    resources: &'a Dictionary,
    category: &[u8],
    operands: &[Object],
) -> Option<&'a Object> {
    let name = operands.first()?.as_name().ok()?;
    let entries = resolve(doc, resources.get(category).ok()?)?.as_dict().ok()?;
    resolve(doc, entries.get(name).ok()?)
}

/// The form's `/Matrix`, identity when absent.
pub(crate) fn form_matrix(doc: &Document, form: &Stream) -> Matrix {
    form.dict
        .get(b"Matrix")
        .ok()
        .and_then(|m| resolve(doc, m))
        .and_then(|m| m.as_array().ok())
        .and_then(|m| Matrix::from_objects(doc, m))
        .unwrap_or(Matrix::IDENTITY)
}

/// Resources a form's content is interpreted with: its own, or those of the
/// stream that paints it.
pub(crate) fn form_resources(doc: &Document, form: &Stream, parent: &Dictionary) -> Dictionary {
    if form.dict.has(b"Resources") {
        resource_category(doc, &form.dict, b"Resources")
    } else {
        parent.clone()
    }
}

/// XObject streams are always indirect, so the result borrows the document.
pub(crate) fn named_xobject<'a>(doc: &'a Document, resources: &Dictionary, operands: &[Object]) -> Option<&'a Stream> {
    let name = operands.first()?.as_name().ok()?;
    let entries = resources.get(b"XObject").ok()?;
    let id = match entries {
        Object::Dictionary(entries) => entries.get(name).ok()?.as_reference().ok()?,
        Object::Reference(id) => doc
            .get_dictionary(*id)
            .ok()?
            .get(name)
            .ok()?
            .as_reference()
            .ok()?,
        _ => return None,
    };
    doc.get_object(id).ok()?.as_stream().ok()
}

fn resolved_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f32> {
    dict.get(key).ok().and_then(|v| resolve(doc, v)).and_then(number)
}

/// Device colour from 1 (gray), 3 (RGB) or 4 (CMYK) components.
fn color_from(components: &[f32]) -> Option<Rgb> {
    match *components {
        [gray] => Some(Rgb::new(gray, gray, gray)),
        [r, g, b] => Some(Rgb::new(r, g, b)),
        [c, m, y, k] => Some(Rgb::new(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )),
        _ => None,
    }
}

fn current_subpath(path: &mut Vec<Vec<(f32, f32)>>, point: (f32, f32)) -> &mut Vec<(f32, f32)> {
    if path.is_empty() {
        path.push(vec![point]);
    }
    let last = path.len() - 1;
    &mut path[last]
}

fn flatten_cubic(sub: &mut Vec<(f32, f32)>, p0: (f32, f32), p1: (f32, f32), p2: (f32, f32), p3: (f32, f32)) {
    for step in 1..=CURVE_STEPS {
        let t = step as f32 / CURVE_STEPS as f32;
        let u = 1.0 - t;
        let w0 = u * u * u;
        let w1 = 3.0 * u * u * t;
        let w2 = 3.0 * u * t * t;
        let w3 = t * t * t;
        sub.push((
            w0 * p0.0 + w1 * p1.0 + w2 * p2.0 + w3 * p3.0,
            w0 * p0.1 + w1 * p1.1 + w2 * p2.1 + w3 * p3.1,
        ));
    }
}

/// Advance of one shown string in unscaled text space.
fn show_width(gs: &GraphicsState, bytes: &[u8]) -> f32 {
    let glyphs: f32 = bytes
        .iter()
        .map(|&code| {
            let glyph = gs.font.as_ref().map_or(500.0, |f| f.width(code)) / 1000.0 * gs.font_size;
            let word = if code == b' ' { gs.word_spacing } else { 0.0 };
            glyph + gs.char_spacing + word
        })
        .sum();
    glyphs * gs.horizontal_scale
}

/// Vertical extent of glyphs relative to the baseline.
fn text_extent(gs: &GraphicsState) -> (f32, f32) {
    let ascent = gs.font.as_ref().map_or(718.0, |f| f.ascent) / 1000.0;
    (gs.rise - 0.22 * gs.font_size, gs.rise + ascent * gs.font_size)
}
