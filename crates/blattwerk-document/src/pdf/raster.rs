// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterizer — paints filled and stroked paths, image XObjects and
// annotation appearances onto an RGB pixel buffer using `image` and
// `imageproc`. Glyphs are not rendered.

use blattwerk_core::error::{EditorError, Result};
use blattwerk_core::types::Rgb;
use image::{GrayImage, ImageFormat, Luma, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect as PixelRect;
use lopdf::{Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use super::content::{ContentWalker, Mark, Matrix, bounds};
use super::objects::{PageFrame, number, page_rotation, rect_array, resolve, resolved_entry, stream_data};

/// Largest raster edge, in pixels.
const MAX_EDGE: f32 = 12_000.0;

/// Annotation flag bit for hidden annotations.
const FLAG_HIDDEN: i64 = 1 << 1;

/// Render one page at `zoom` (1.0 = one pixel per point), rotated as it
/// would be displayed.
pub(crate) fn rasterize_page(doc: &Document, page_id: ObjectId, zoom: f32) -> Result<RgbImage> {
    if !zoom.is_finite() || zoom <= 0.0 {
        return Err(EditorError::Image(format!("zoom must be positive, got {zoom}")));
    }
    let frame = PageFrame::of(doc, page_id);
    let size = frame.size();
    let (width, height) = (size.width * zoom, size.height * zoom);
    if width > MAX_EDGE || height > MAX_EDGE {
        return Err(EditorError::Image(format!(
            "raster of {width:.0}x{height:.0} pixels is too large"
        )));
    }

    let mut canvas = Canvas {
        image: RgbImage::from_pixel(
            (width.ceil() as u32).max(1),
            (height.ceil() as u32).max(1),
            image::Rgb([255, 255, 255]),
        ),
    };

    // User space to device pixels: y flips, origin moves to the top-left.
    let bounds = frame.bounds();
    let device = Matrix::new(zoom, 0.0, 0.0, -zoom, -bounds[0] * zoom, bounds[3] * zoom);

    {
        let mut visit = |mark: Mark<'_>| canvas.paint(doc, mark);
        let mut walker = ContentWalker::new(doc, &mut visit);
        walker.walk_page(page_id, device);
        for (form, placement) in annotation_appearances(doc, page_id) {
            walker.walk_form(form, placement.then(device));
        }
    }

    let image = match page_rotation(doc, page_id) {
        90 => image::imageops::rotate90(&canvas.image),
        180 => image::imageops::rotate180(&canvas.image),
        270 => image::imageops::rotate270(&canvas.image),
        _ => canvas.image,
    };
    debug!(?page_id, zoom, width = image.width(), height = image.height(), "page rasterized");
    Ok(image)
}

/// Normal appearance streams of the visible annotations of a page, each with
/// the matrix that maps its bounding box onto the annotation rectangle.
fn annotation_appearances(doc: &Document, page_id: ObjectId) -> Vec<(&Stream, Matrix)> {
    let Some(annots) = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| resolved_entry(doc, page, b"Annots"))
        .and_then(|annots| annots.as_array().ok())
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for annot in annots {
        let Some(dict) = resolve(doc, annot).and_then(|a| a.as_dict().ok()) else {
            continue;
        };
        let flags = resolved_entry(doc, dict, b"F").and_then(number).unwrap_or(0.0) as i64;
        if flags & FLAG_HIDDEN != 0 {
            continue;
        }
        let Some(rect) = dict.get(b"Rect").ok().and_then(|r| rect_array(doc, r)) else {
            continue;
        };
        let Some(form) = normal_appearance(doc, dict) else {
            continue;
        };

        let bbox = form
            .dict
            .get(b"BBox")
            .ok()
            .and_then(|b| rect_array(doc, b))
            .unwrap_or(rect);
        let matrix = form
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|m| resolve(doc, m))
            .and_then(|m| m.as_array().ok())
            .and_then(|m| Matrix::from_objects(doc, m))
            .unwrap_or(Matrix::IDENTITY);
        let placed = matrix.transform_rect(bbox);
        let (bw, bh) = (placed[2] - placed[0], placed[3] - placed[1]);
        if bw <= 0.0 || bh <= 0.0 {
            continue;
        }
        let sx = (rect[2] - rect[0]) / bw;
        let sy = (rect[3] - rect[1]) / bh;
        let placement = Matrix::new(sx, 0.0, 0.0, sy, rect[0] - placed[0] * sx, rect[1] - placed[1] * sy);
        out.push((form, placement));
    }
    out
}

/// `/AP /N`, picking the `/AS` state when the appearance has several.
fn normal_appearance<'a>(doc: &'a Document, annot: &'a lopdf::Dictionary) -> Option<&'a Stream> {
    let appearance = resolved_entry(doc, annot, b"AP")?.as_dict().ok()?;
    let normal = appearance.get(b"N").ok()?;
    let normal = match normal {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    match normal {
        Object::Stream(stream) => Some(stream),
        Object::Dictionary(states) => {
            let state = annot.get(b"AS").ok()?.as_name().ok()?;
            let id = states.get(state).ok()?.as_reference().ok()?;
            doc.get_object(id).ok()?.as_stream().ok()
        }
        _ => None,
    }
}

struct Canvas {
    image: RgbImage,
}

impl Canvas {
    fn paint(&mut self, doc: &Document, mark: Mark<'_>) {
        match mark {
            Mark::Fill {
                subpaths,
                color,
                alpha,
            } => self.fill(&subpaths, color, alpha),
            Mark::Stroke {
                subpaths,
                color,
                alpha,
                ..
            } => {
                if alpha <= 0.0 {
                    return;
                }
                let pixel = to_pixel(color);
                for sub in &subpaths {
                    for pair in sub.windows(2) {
                        draw_line_segment_mut(&mut self.image, pair[0], pair[1], pixel);
                    }
                }
            }
            Mark::Image { ctm, stream, .. } => self.draw_image(doc, stream, ctm),
            Mark::Text { .. } | Mark::Form { .. } => {}
        }
    }

    fn fill(&mut self, subpaths: &[Vec<(f32, f32)>], color: Rgb, alpha: f32) {
        if alpha <= 0.0 {
            return;
        }
        let (width, height) = self.image.dimensions();

        // Opaque axis-aligned rectangles are the common case.
        if alpha >= 1.0 && subpaths.len() == 1 && is_axis_aligned_rect(&subpaths[0]) {
            let [x0, y0, x1, y1] = bounds(&subpaths[0]);
            let (x0, y0) = (x0.round().max(0.0), y0.round().max(0.0));
            let (x1, y1) = (x1.round().min(width as f32), y1.round().min(height as f32));
            if x1 > x0 && y1 > y0 {
                let rect = PixelRect::at(x0 as i32, y0 as i32).of_size((x1 - x0) as u32, (y1 - y0) as u32);
                draw_filled_rect_mut(&mut self.image, rect, to_pixel(color));
            }
            return;
        }

        let all: Vec<(f32, f32)> = subpaths.iter().flatten().copied().collect();
        let [x0, y0, x1, y1] = bounds(&all);
        let left = x0.floor().max(0.0) as i32;
        let top = y0.floor().max(0.0) as i32;
        let right = (x1.ceil() as i32).min(width as i32);
        let bottom = (y1.ceil() as i32).min(height as i32);
        if right <= left || bottom <= top {
            return;
        }

        let mut mask = GrayImage::new((right - left) as u32, (bottom - top) as u32);
        for sub in subpaths {
            let polygon = polygon_points(sub, left, top);
            if polygon.len() >= 3 {
                draw_polygon_mut(&mut mask, &polygon, Luma([255]));
            }
        }

        let src = to_pixel(color).0;
        for (mx, my, coverage) in mask.enumerate_pixels() {
            if coverage.0[0] == 0 {
                continue;
            }
            let pixel = self.image.get_pixel_mut(mx + left as u32, my + top as u32);
            blend(&mut pixel.0, src, alpha.min(1.0));
        }
    }

    /// Paint an image XObject mapped through `ctm` from the unit square,
    /// sampling the source with nearest-neighbour lookup.
    fn draw_image(&mut self, doc: &Document, stream: &Stream, ctm: Matrix) {
        let Some(source) = decode_image(doc, stream) else {
            return;
        };
        let Some(inverse) = invert(ctm) else {
            return;
        };
        let (width, height) = self.image.dimensions();
        let [x0, y0, x1, y1] = ctm.transform_rect([0.0, 0.0, 1.0, 1.0]);
        let left = x0.floor().max(0.0) as u32;
        let top = y0.floor().max(0.0) as u32;
        let right = (x1.ceil().max(0.0) as u32).min(width);
        let bottom = (y1.ceil().max(0.0) as u32).min(height);
        let (sw, sh) = source.rgb.dimensions();

        for y in top..bottom {
            for x in left..right {
                let (u, v) = inverse.apply(x as f32 + 0.5, y as f32 + 0.5);
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                // Image row 0 is the top edge, at v = 1.
                let sx = ((u * sw as f32) as u32).min(sw - 1);
                let sy = (((1.0 - v) * sh as f32) as u32).min(sh - 1);
                let src = source.rgb.get_pixel(sx, sy).0;
                let alpha = source
                    .alpha
                    .as_ref()
                    .filter(|mask| mask.dimensions() == (sw, sh))
                    .map_or(1.0, |mask| f32::from(mask.get_pixel(sx, sy).0[0]) / 255.0);
                blend(&mut self.image.get_pixel_mut(x, y).0, src, alpha);
            }
        }
    }
}

struct DecodedImage {
    rgb: RgbImage,
    alpha: Option<GrayImage>,
}

/// Decode an image XObject: JPEG (`/DCTDecode`) or 8-bit raw samples in
/// DeviceGray, DeviceRGB or DeviceCMYK.
fn decode_image(doc: &Document, stream: &Stream) -> Option<DecodedImage> {
    let rgb = decode_samples(doc, stream)?;
    let alpha = stream
        .dict
        .get(b"SMask")
        .ok()
        .and_then(|s| s.as_reference().ok())
        .and_then(|id| doc.get_object(id).ok())
        .and_then(|s| s.as_stream().ok())
        .and_then(|mask| decode_samples(doc, mask))
        .map(|mask| image::DynamicImage::ImageRgb8(mask).to_luma8());
    Some(DecodedImage { rgb, alpha })
}

fn decode_samples(doc: &Document, stream: &Stream) -> Option<RgbImage> {
    let dict = &stream.dict;
    let is_dct = match dict.get(b"Filter").ok().and_then(|f| resolve(doc, f)) {
        Some(Object::Name(name)) => name == b"DCTDecode",
        Some(Object::Array(filters)) => filters
            .iter()
            .any(|f| f.as_name().is_ok_and(|name| name == b"DCTDecode")),
        _ => false,
    };
    if is_dct {
        return match image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg) {
            Ok(decoded) => Some(decoded.to_rgb8()),
            Err(err) => {
                warn!(%err, "cannot decode JPEG image");
                None
            }
        };
    }

    let width = resolved_entry(doc, dict, b"Width").and_then(number)? as u32;
    let height = resolved_entry(doc, dict, b"Height").and_then(number)? as u32;
    let bits = resolved_entry(doc, dict, b"BitsPerComponent").and_then(number).unwrap_or(8.0);
    if bits != 8.0 || width == 0 || height == 0 {
        warn!(bits, width, height, "unsupported image sample layout");
        return None;
    }
    let color_space = resolved_entry(doc, dict, b"ColorSpace").and_then(|cs| cs.as_name().ok());
    let components = match color_space {
        Some(b"DeviceRGB") => 3,
        Some(b"DeviceCMYK") => 4,
        _ => 1,
    };

    let data = stream_data(stream);
    let pixels = width as usize * height as usize;
    if data.len() < pixels * components {
        warn!(expected = pixels * components, actual = data.len(), "image data truncated");
        return None;
    }
    let mut rgb = Vec::with_capacity(pixels * 3);
    for sample in data.chunks_exact(components).take(pixels) {
        match *sample {
            [gray] => rgb.extend_from_slice(&[gray, gray, gray]),
            [r, g, b] => rgb.extend_from_slice(&[r, g, b]),
            [c, m, y, k] => {
                let (c, m, y, k) = (c as f32, m as f32, y as f32, k as f32 / 255.0);
                rgb.extend_from_slice(&[
                    ((255.0 - c) * (1.0 - k)) as u8,
                    ((255.0 - m) * (1.0 - k)) as u8,
                    ((255.0 - y) * (1.0 - k)) as u8,
                ]);
            }
            _ => return None,
        }
    }
    RgbImage::from_raw(width, height, rgb)
}

fn to_pixel(color: Rgb) -> image::Rgb<u8> {
    image::Rgb(color.to_u8())
}

fn blend(dst: &mut [u8; 3], src: [u8; 3], alpha: f32) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = (f32::from(*d) * (1.0 - alpha) + f32::from(s) * alpha).round() as u8;
    }
}

fn is_axis_aligned_rect(points: &[(f32, f32)]) -> bool {
    let corners = match points.len() {
        4 => points,
        5 if points[0] == points[4] => &points[..4],
        _ => return false,
    };
    (0..4).all(|i| {
        let (a, b) = (corners[i], corners[(i + 1) % 4]);
        (a.0 - b.0).abs() < 1e-3 || (a.1 - b.1).abs() < 1e-3
    })
}

/// Integer polygon relative to `(left, top)`, without repeated vertices or
/// a closing point equal to the first.
fn polygon_points(points: &[(f32, f32)], left: i32, top: i32) -> Vec<Point<i32>> {
    let mut polygon: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &(x, y) in points {
        let point = Point::new(x.round() as i32 - left, y.round() as i32 - top);
        if polygon.last() != Some(&point) {
            polygon.push(point);
        }
    }
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}

fn invert(m: Matrix) -> Option<Matrix> {
    let det = m.a * m.d - m.b * m.c;
    if det.abs() < f32::EPSILON {
        return None;
    }
    let a = m.d / det;
    let b = -m.b / det;
    let c = -m.c / det;
    let d = m.a / det;
    Some(Matrix::new(a, b, c, d, -(m.e * a + m.f * c), -(m.e * b + m.f * d)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_round_trips_points() {
        let m = Matrix::new(2.0, 0.5, -1.0, 3.0, 10.0, 20.0);
        let inv = invert(m).expect("invertible");
        let (x, y) = m.apply(3.0, 4.0);
        let (u, v) = inv.apply(x, y);
        assert!((u - 3.0).abs() < 1e-4 && (v - 4.0).abs() < 1e-4);
        assert!(invert(Matrix::new(0.0, 0.0, 0.0, 0.0, 1.0, 1.0)).is_none());
    }

    #[test]
    fn polygon_drops_closing_and_duplicate_points() {
        let points = [(0.0, 0.0), (10.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 0.0)];
        let polygon = polygon_points(&points, 0, 0);
        assert_eq!(polygon.len(), 3);
        assert_ne!(polygon.first(), polygon.last());
    }

    #[test]
    fn rectangle_detection() {
        let rect = [(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0), (0.0, 0.0)];
        assert!(is_axis_aligned_rect(&rect));
        let diamond = [(5.0, 0.0), (10.0, 5.0), (5.0, 10.0), (0.0, 5.0)];
        assert!(!is_axis_aligned_rect(&diamond));
    }

    #[test]
    fn blending_mixes_channels() {
        let mut pixel = [255, 255, 255];
        blend(&mut pixel, [0, 0, 0], 0.5);
        assert_eq!(pixel, [128, 128, 128]);
    }
}
