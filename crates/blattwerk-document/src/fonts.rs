// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font registry — discovers external TrueType/OpenType fonts in a directory
// and makes them available to the render codec under stable internal names.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use blattwerk_core::error::{EditorError, Result};
use tracing::{debug, info, instrument, warn};

use crate::pdf::codec::RenderCodec;
use crate::pdf::text::win_ansi_char;

/// File extensions picked up by [`FontRegistry::load_dir`].
const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

/// One external font known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontDef {
    /// Name shown to the user: the file stem.
    pub display_name: String,
    /// Name used in text styles and PDF resources: the file stem with spaces
    /// replaced by `_`, suffixed `_2`, `_3`, … on collision.
    pub internal_name: String,
    pub path: PathBuf,
}

/// Ordered collection of external fonts.
#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    fonts: Vec<FontDef>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add every `.ttf`/`.otf` file in `dir`, in file-name order. Returns the
    /// number of fonts added.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        let mut names: Vec<String> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        let mut added = 0;
        for file_name in names {
            let path = dir.join(&file_name);
            let is_font = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FONT_EXTENSIONS.iter().any(|f| ext.eq_ignore_ascii_case(f)));
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if !is_font {
                continue;
            }
            let stem = stem.to_string();
            self.add(stem, path);
            added += 1;
        }

        info!(added, total = self.fonts.len(), "font directory loaded");
        Ok(added)
    }

    /// Add a single font file under `display_name` and return its internal
    /// name.
    pub fn add(&mut self, display_name: impl Into<String>, path: impl Into<PathBuf>) -> &str {
        let display_name = display_name.into();
        let base = display_name.replace(' ', "_");
        let mut internal_name = base.clone();
        let mut suffix = 2;
        while self.find_by_internal(&internal_name).is_some() {
            internal_name = format!("{base}_{suffix}");
            suffix += 1;
        }

        debug!(%display_name, %internal_name, "font added");
        self.fonts.push(FontDef {
            display_name,
            internal_name,
            path: path.into(),
        });
        &self.fonts[self.fonts.len() - 1].internal_name
    }

    pub fn display_names(&self) -> Vec<&str> {
        self.fonts.iter().map(|f| f.display_name.as_str()).collect()
    }

    pub fn find_by_display(&self, display_name: &str) -> Option<&FontDef> {
        self.fonts.iter().find(|f| f.display_name == display_name)
    }

    pub fn find_by_internal(&self, internal_name: &str) -> Option<&FontDef> {
        self.fonts.iter().find(|f| f.internal_name == internal_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FontDef> {
        self.fonts.iter()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Register every font on `handle`. Fonts that fail to load are logged
    /// and skipped. Returns the number registered.
    pub fn register<R: RenderCodec>(&self, handle: &mut R) -> usize {
        let mut registered = 0;
        for font in &self.fonts {
            match handle.insert_font(&font.internal_name, &font.path) {
                Ok(()) => registered += 1,
                Err(err) => warn!(
                    font = %font.internal_name,
                    path = %font.path.display(),
                    %err,
                    "font registration failed, skipping"
                ),
            }
        }
        debug!(registered, total = self.fonts.len(), "fonts registered");
        registered
    }
}

/// A parsed external font, ready to be embedded as a simple TrueType font
/// with WinAnsi encoding.
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    name: String,
    postscript_name: String,
    data: Arc<Vec<u8>>,
    cff: bool,
    widths: [f32; 256],
    ascent: f32,
    descent: f32,
    cap_height: f32,
    bbox: [f32; 4],
    italic: bool,
    monospaced: bool,
}

impl EmbeddedFont {
    /// Read and parse the font file at `path`.
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .map_err(|err| EditorError::Font(format!("cannot read {}: {err}", path.display())))?;
        Self::parse(name, data)
    }

    /// Parse font bytes. All metrics are scaled to 1/1000 em.
    pub fn parse(name: &str, data: Vec<u8>) -> Result<Self> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|err| EditorError::Font(format!("cannot parse font {name}: {err}")))?;

        let scale = 1000.0 / f32::from(face.units_per_em().max(1));
        let notdef = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .map_or(500.0, |advance| f32::from(advance) * scale);

        let mut widths = [notdef; 256];
        for (code, width) in widths.iter_mut().enumerate() {
            if let Some(advance) = win_ansi_char(code as u8)
                .and_then(|ch| face.glyph_index(ch))
                .and_then(|glyph| face.glyph_hor_advance(glyph))
            {
                *width = f32::from(advance) * scale;
            }
        }

        let postscript_name = face
            .names()
            .into_iter()
            .find(|entry| entry.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .and_then(|entry| entry.to_string())
            .unwrap_or_else(|| name.to_string())
            .chars()
            .filter(|ch| ch.is_ascii_graphic() && !"()<>[]{}/%#".contains(*ch))
            .collect();

        let bbox = face.global_bounding_box();
        let font = Self {
            name: name.to_string(),
            postscript_name,
            cff: data.starts_with(b"OTTO"),
            widths,
            ascent: f32::from(face.ascender()) * scale,
            descent: f32::from(face.descender()) * scale,
            cap_height: face
                .capital_height()
                .map_or(f32::from(face.ascender()) * scale, |h| f32::from(h) * scale),
            bbox: [
                f32::from(bbox.x_min) * scale,
                f32::from(bbox.y_min) * scale,
                f32::from(bbox.x_max) * scale,
                f32::from(bbox.y_max) * scale,
            ],
            italic: face.is_italic(),
            monospaced: face.is_monospaced(),
            data: Arc::new(data),
        };
        debug!(name, postscript = %font.postscript_name, bytes = font.data.len(), "font parsed");
        Ok(font)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn postscript_name(&self) -> &str {
        &self.postscript_name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// True for CFF-flavoured OpenType (`OTTO`), embedded as `/FontFile3`.
    pub fn is_cff(&self) -> bool {
        self.cff
    }

    pub fn win_ansi_width(&self, code: u8) -> f32 {
        self.widths[usize::from(code)]
    }

    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    pub fn descent(&self) -> f32 {
        self.descent
    }

    pub fn cap_height(&self) -> f32 {
        self.cap_height
    }

    pub fn bbox(&self) -> [f32; 4] {
        self.bbox
    }

    /// `/Flags` value for the font descriptor.
    pub fn descriptor_flags(&self) -> i64 {
        // Nonsymbolic, plus FixedPitch and Italic where they apply.
        let mut flags = 1 << 5;
        if self.monospaced {
            flags |= 1;
        }
        if self.italic {
            flags |= 1 << 6;
        }
        flags
    }

    pub fn is_italic(&self) -> bool {
        self.italic
    }
}
