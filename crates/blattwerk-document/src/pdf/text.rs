// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text layout — standard-14 font names and metrics, WinAnsi encoding, and
// width-aware line wrapping for text boxes and free-text annotations.

use lopdf::{Dictionary, Document, Object};

use super::objects::{number, resolve, resolved_entry};
use crate::fonts::EmbeddedFont;

/// Line height as a multiple of the font size.
pub(crate) const LINE_HEIGHT: f32 = 1.2;

/// Short font names accepted in text styles, with their PDF base font.
const BASE14: [(&str, &str); 14] = [
    ("helv", "Helvetica"),
    ("helvb", "Helvetica-Bold"),
    ("helvi", "Helvetica-Oblique"),
    ("helvbi", "Helvetica-BoldOblique"),
    ("times", "Times-Roman"),
    ("timesb", "Times-Bold"),
    ("timesi", "Times-Italic"),
    ("timesbi", "Times-BoldItalic"),
    ("cour", "Courier"),
    ("courb", "Courier-Bold"),
    ("couri", "Courier-Oblique"),
    ("courbi", "Courier-BoldOblique"),
    ("symbol", "Symbol"),
    ("zapfdingbats", "ZapfDingbats"),
];

/// Base font of a standard-14 short name (`helv`) or full name
/// (`Helvetica`), case-insensitively.
pub fn base14_font(name: &str) -> Option<&'static str> {
    BASE14
        .iter()
        .find(|(short, base)| short.eq_ignore_ascii_case(name) || base.eq_ignore_ascii_case(name))
        .map(|(_, base)| *base)
}

/// True when `name` denotes one of the standard-14 fonts.
pub fn is_base14(name: &str) -> bool {
    base14_font(name).is_some()
}

/// Short name of a standard-14 base font, used to derive resource names.
pub(crate) fn base14_short(base_font: &str) -> Option<&'static str> {
    BASE14
        .iter()
        .find(|(_, base)| *base == base_font)
        .map(|(short, _)| *short)
}

// -- Metrics ------------------------------------------------------------------

// Advance widths (1/1000 em) for codes 32..=126.
#[rustfmt::skip]
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

#[rustfmt::skip]
const TIMES_ROMAN: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

/// Glyph advance widths for one font, indexed by single-byte character code.
#[derive(Debug, Clone)]
pub(crate) struct FontMetrics {
    widths: [f32; 256],
    /// Ascent in 1/1000 em, used to place the first line of a box.
    pub(crate) ascent: f32,
}

impl FontMetrics {
    fn uniform(width: f32) -> Self {
        Self {
            widths: [width; 256],
            ascent: 718.0,
        }
    }

    /// Approximate AFM metrics of a standard-14 base font.
    pub(crate) fn base14(base_font: &str) -> Self {
        if base_font.starts_with("Courier") {
            return Self::uniform(600.0);
        }
        let (table, default) = if base_font.starts_with("Helvetica-Bold") {
            (&HELVETICA_BOLD, 611.0)
        } else if base_font.starts_with("Helvetica") {
            (&HELVETICA, 556.0)
        } else if base_font.starts_with("Times") {
            (&TIMES_ROMAN, 500.0)
        } else {
            return Self::uniform(600.0);
        };
        let mut metrics = Self::uniform(default);
        for (code, width) in (32..).zip(table) {
            metrics.widths[code] = f32::from(*width);
        }
        if base_font.starts_with("Times") {
            metrics.ascent = 683.0;
        }
        metrics
    }

    /// Metrics of a registered TrueType font under WinAnsi encoding.
    pub(crate) fn embedded(font: &EmbeddedFont) -> Self {
        let mut metrics = Self::uniform(500.0);
        for (code, width) in metrics.widths.iter_mut().enumerate() {
            *width = font.win_ansi_width(code as u8);
        }
        metrics.ascent = font.ascent();
        metrics
    }

    /// Metrics of an arbitrary font dictionary found in a content stream's
    /// resources: `/Widths` when present, standard-14 tables otherwise.
    pub(crate) fn from_font_dict(doc: &Document, font: &Dictionary) -> Self {
        let base_font = resolved_entry(doc, font, b"BaseFont")
            .and_then(|name| name.as_name().ok())
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .unwrap_or_default();
        let mut metrics = Self::base14(&base_font);

        let first_char = resolved_entry(doc, font, b"FirstChar")
            .and_then(number)
            .map_or(0, |value| value.max(0.0) as usize);
        if let Some(widths) = resolved_entry(doc, font, b"Widths").and_then(|w| w.as_array().ok()) {
            for (offset, width) in widths.iter().enumerate() {
                let code = first_char + offset;
                if code > 255 {
                    break;
                }
                if let Some(value) = resolve(doc, width).and_then(number) {
                    metrics.widths[code] = value;
                }
            }
        }
        metrics
    }

    /// Advance of one code in 1/1000 em.
    pub(crate) fn width(&self, code: u8) -> f32 {
        self.widths[usize::from(code)]
    }

    /// Width in points of already-encoded text at `size`.
    pub(crate) fn measure_bytes(&self, bytes: &[u8], size: f32) -> f32 {
        bytes.iter().map(|&code| self.width(code)).sum::<f32>() * size / 1000.0
    }

    /// Width in points of `text` at `size`.
    pub(crate) fn measure(&self, text: &str, size: f32) -> f32 {
        self.measure_bytes(&encode_win_ansi(text), size)
    }
}

// -- Encoding -----------------------------------------------------------------

/// Characters of the 0x80..=0x9F block of WinAnsiEncoding.
const WIN_ANSI_HIGH: [(u8, char); 27] = [
    (0x80, '€'),
    (0x82, '‚'),
    (0x83, 'ƒ'),
    (0x84, '„'),
    (0x85, '…'),
    (0x86, '†'),
    (0x87, '‡'),
    (0x88, 'ˆ'),
    (0x89, '‰'),
    (0x8A, 'Š'),
    (0x8B, '‹'),
    (0x8C, 'Œ'),
    (0x8E, 'Ž'),
    (0x91, '‘'),
    (0x92, '’'),
    (0x93, '“'),
    (0x94, '”'),
    (0x95, '•'),
    (0x96, '–'),
    (0x97, '—'),
    (0x98, '˜'),
    (0x99, '™'),
    (0x9A, 'š'),
    (0x9B, '›'),
    (0x9C, 'œ'),
    (0x9E, 'ž'),
    (0x9F, 'Ÿ'),
];

/// Encode `text` as WinAnsi bytes; unrepresentable characters become `?`.
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match u32::from(ch) {
            code @ (0x20..=0x7E | 0xA0..=0xFF) => code as u8,
            _ => WIN_ANSI_HIGH
                .iter()
                .find(|(_, mapped)| *mapped == ch)
                .map_or(b'?', |(code, _)| *code),
        })
        .collect()
}

/// Character for a WinAnsi code, if the code is assigned.
pub(crate) fn win_ansi_char(code: u8) -> Option<char> {
    match code {
        0x20..=0x7E | 0xA0..=0xFF => Some(char::from(code)),
        _ => WIN_ANSI_HIGH
            .iter()
            .find(|(mapped, _)| *mapped == code)
            .map(|(_, ch)| *ch),
    }
}

// -- Wrapping -----------------------------------------------------------------

/// Wrap `text` so that no line is wider than `max_width` according to
/// `measure`.
///
/// Existing newlines are kept as paragraph breaks, words are joined with a
/// single space, and a word wider than the whole line is broken between
/// characters.
pub(crate) fn wrap_lines(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        if words.is_empty() {
            result.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in words {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                result.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current.push_str(word);
                continue;
            }

            // Force-break the oversized word.
            for ch in word.chars() {
                current.push(ch);
                if measure(&current) > max_width && current.chars().count() > 1 {
                    current.pop();
                    result.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
        if !current.is_empty() {
            result.push(current);
        }
    }

    result
}

/// Font dictionary for a standard-14 font.
pub(crate) fn base14_font_dict(base_font: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"Font".to_vec()));
    dict.set("Subtype", Object::Name(b"Type1".to_vec()));
    dict.set("BaseFont", Object::Name(base_font.as_bytes().to_vec()));
    // Symbolic fonts carry their own built-in encoding.
    if base_font != "Symbol" && base_font != "ZapfDingbats" {
        dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
    }
    dict
}
