// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Blattwerk editor.
//
// Geometry is expressed in PDF points in "page space": origin at the top-left
// corner of the unrotated media box, y growing downward. The render codec
// converts to PDF user space when it writes content.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A point in page space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in page space, given by two corners.
///
/// The corners may arrive in any order (a drag from bottom-right to top-left
/// is legal); call [`Rect::normalized`] before using the coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Same rectangle with `x0 <= x1` and `y0 <= y1`.
    pub fn normalized(&self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }

    /// True when the rectangle has no area (or contains NaN coordinates).
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        let r = self.normalized();
        point.x >= r.x0 && point.x <= r.x1 && point.y >= r.y0 && point.y <= r.y1
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        let a = self.normalized();
        let b = other.normalized();
        a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
    }

    /// Clamp both corners into `[0, width] x [0, height]`.
    pub fn clamped_to(&self, size: PageSize) -> Self {
        let r = self.normalized();
        Self {
            x0: r.x0.clamp(0.0, size.width),
            y0: r.y0.clamp(0.0, size.height),
            x1: r.x1.clamp(0.0, size.width),
            y1: r.y1.clamp(0.0, size.height),
        }
    }
}

/// Page dimensions in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// ISO A4 portrait, the default for blank pages.
    pub const A4: PageSize = PageSize {
        width: 595.0,
        height: 842.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Dimensions as displayed after applying a page rotation.
    pub fn rotated(&self, rotation: i32) -> Self {
        if wrap_rotation(rotation) % 180 == 90 {
            Self {
                width: self.height,
                height: self.width,
            }
        } else {
            *self
        }
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4
    }
}

/// Normalise a rotation in degrees to `0..360`.
pub fn wrap_rotation(degrees: i32) -> i32 {
    degrees.rem_euclid(360)
}

/// An RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);
    pub const YELLOW: Rgb = Rgb::new(1.0, 1.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build from 8-bit channels.
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Convert to 8-bit channels, clamping out-of-range components.
    pub fn to_u8(&self) -> [u8; 3] {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [channel(self.r), channel(self.g), channel(self.b)]
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::BLACK
    }
}

impl FromStr for Rgb {
    type Err = String;

    /// Accepts `#RRGGBB`, `RRGGBB`, or three comma-separated floats (`1,0.5,0`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.contains(',') {
            let parts: Vec<f32> = trimmed
                .split(',')
                .map(|p| p.trim().parse::<f32>())
                .collect::<Result<_, _>>()
                .map_err(|err| format!("invalid colour component in {trimmed:?}: {err}"))?;
            return match parts.as_slice() {
                [r, g, b] => Ok(Rgb::new(*r, *g, *b)),
                _ => Err(format!("expected three components, got {}", parts.len())),
            };
        }

        let hex = trimmed.trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected #RRGGBB, got {trimmed:?}"));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|err| format!("invalid hex colour: {err}"))
        };
        Ok(Rgb::from_u8(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// Horizontal alignment inside a text box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    /// Stretch word spacing so every line but a paragraph's last fills
    /// the box.
    Justify,
}

/// Font, size and colour for inserted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Either a base-14 short name (`helv`, `times`, `cour`, ...) or the
    /// internal name of a registered external font.
    pub font: String,
    pub size: f32,
    pub color: Rgb,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font: "helv".into(),
            size: 14.0,
            color: Rgb::BLACK,
        }
    }
}

/// Options for a laid-out text box.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBoxOptions {
    pub style: TextStyle,
    pub align: TextAlign,
    /// Paint the box white before drawing the text.
    pub erase_background: bool,
    /// Draw an underline rule near the bottom edge in this colour.
    pub underline: Option<Rgb>,
}

/// Object number of an annotation dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationId(pub u32);

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Appearance of a free-text annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationStyle {
    pub font: String,
    pub size: f32,
    pub color: Rgb,
    /// Background fill; transparent when `None`.
    pub fill: Option<Rgb>,
    /// Draw an underline rule on the page below the annotation.
    pub underline: bool,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            font: "helv".into(),
            size: 14.0,
            color: Rgb::BLACK,
            fill: None,
            underline: false,
        }
    }
}

/// Partial update of a free-text annotation. `None` fields keep their value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationUpdate {
    pub text: Option<String>,
    pub rect: Option<Rect>,
    pub font: Option<String>,
    pub size: Option<f32>,
    pub color: Option<Rgb>,
    pub fill: Option<Rgb>,
    pub underline: bool,
}

impl AnnotationUpdate {
    /// True when applying the update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.rect.is_none()
            && self.font.is_none()
            && self.size.is_none()
            && self.color.is_none()
            && self.fill.is_none()
            && !self.underline
    }
}

/// A free-text annotation as listed on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationSummary {
    pub id: AnnotationId,
    pub rect: Rect,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_normalizes_reversed_corners() {
        let r = Rect::new(100.0, 80.0, 10.0, 20.0).normalized();
        assert_eq!(r, Rect::new(10.0, 20.0, 100.0, 80.0));
        assert_eq!(r.width(), 90.0);
        assert_eq!(r.height(), 60.0);
    }

    #[test]
    fn zero_area_rect_is_degenerate() {
        assert!(Rect::new(5.0, 5.0, 5.0, 50.0).is_degenerate());
        assert!(Rect::new(5.0, 5.0, 50.0, 5.0).is_degenerate());
        assert!(Rect::new(f32::NAN, 0.0, 1.0, 1.0).is_degenerate());
        assert!(!Rect::new(0.0, 0.0, 1.0, 1.0).is_degenerate());
    }

    #[test]
    fn rect_clamps_into_page() {
        let r = Rect::new(-10.0, 700.0, 650.0, 900.0).clamped_to(PageSize::A4);
        assert_eq!(r, Rect::new(0.0, 700.0, 595.0, 842.0));
    }

    #[test]
    fn rotation_wraps_negative_and_large_values() {
        assert_eq!(wrap_rotation(-90), 270);
        assert_eq!(wrap_rotation(450), 90);
        assert_eq!(wrap_rotation(360), 0);
    }

    #[test]
    fn rotated_size_swaps_for_quarter_turns() {
        let size = PageSize::new(100.0, 200.0);
        assert_eq!(size.rotated(90), PageSize::new(200.0, 100.0));
        assert_eq!(size.rotated(180), size);
        assert_eq!(size.rotated(-90), PageSize::new(200.0, 100.0));
    }

    #[test]
    fn rgb_parses_hex_and_components() {
        assert_eq!("#FFFF00".parse::<Rgb>(), Ok(Rgb::YELLOW));
        assert_eq!("000000".parse::<Rgb>(), Ok(Rgb::BLACK));
        assert_eq!("1, 1, 1".parse::<Rgb>(), Ok(Rgb::WHITE));
        assert!("#FFF".parse::<Rgb>().is_err());
        assert!("1,2".parse::<Rgb>().is_err());
    }

    #[test]
    fn rgb_round_trips_through_u8() {
        assert_eq!(Rgb::from_u8(255, 128, 0).to_u8(), [255, 128, 0]);
        assert_eq!(Rgb::new(2.0, -1.0, 0.5).to_u8(), [255, 0, 128]);
    }

    #[test]
    fn empty_annotation_update_is_detected() {
        assert!(AnnotationUpdate::default().is_empty());
        let update = AnnotationUpdate {
            text: Some("x".into()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
