// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edit scripts — a JSON array of editing commands replayed against one
// document. Page indices in scripts are zero-based, matching the library API.
//
// ```json
// [
//   { "op": "rotate_page", "page": 0, "degrees": 90 },
//   { "op": "add_text", "page": 0, "at": { "x": 72, "y": 72 }, "text": "Draft" },
//   { "op": "undo" }
// ]
// ```

use std::path::{Path, PathBuf};

use blattwerk_core::config::EditorConfig;
use blattwerk_core::error::Result;
use blattwerk_core::types::{
    AnnotationId, AnnotationStyle, AnnotationUpdate, PageSize, Point, Rect, Rgb, TextBoxOptions,
    TextStyle,
};
use blattwerk_document::Document;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One step of an edit script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditCommand {
    RemovePage {
        page: usize,
    },
    /// Append every page of another PDF.
    InsertDocument {
        path: PathBuf,
    },
    ReorderPages {
        order: Vec<usize>,
    },
    RotatePage {
        page: usize,
        degrees: i32,
    },
    /// Insert an empty page; the size defaults to the configured blank page.
    InsertBlankPage {
        position: usize,
        #[serde(default)]
        size: Option<PageSize>,
    },
    DuplicatePage {
        page: usize,
    },
    ReplacePage {
        page: usize,
        source: PathBuf,
        #[serde(default)]
        source_page: usize,
    },
    AddText {
        page: usize,
        at: Point,
        text: String,
        #[serde(default)]
        style: Option<TextStyle>,
    },
    AddTextBox {
        page: usize,
        rect: Rect,
        text: String,
        #[serde(default)]
        options: TextBoxOptions,
    },
    DrawRect {
        page: usize,
        rect: Rect,
        #[serde(default)]
        fill: Rgb,
    },
    Redact {
        page: usize,
        rect: Rect,
        #[serde(default)]
        fill: Rgb,
    },
    AddNote {
        page: usize,
        rect: Rect,
        text: String,
        #[serde(default)]
        style: AnnotationStyle,
    },
    UpdateNote {
        page: usize,
        id: AnnotationId,
        update: AnnotationUpdate,
    },
    DeleteAnnotation {
        page: usize,
        id: AnnotationId,
    },
    /// Translucent highlight; colour and opacity default to the configured
    /// highlight settings.
    Highlight {
        page: usize,
        rect: Rect,
        #[serde(default)]
        color: Option<Rgb>,
        #[serde(default)]
        opacity: Option<f32>,
    },
    AddImage {
        page: usize,
        rect: Rect,
        path: PathBuf,
    },
    Undo,
    Redo,
}

/// Tally of a script run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// Commands that changed the document.
    pub applied: usize,
    /// Commands that were valid but had nothing to do.
    pub skipped: usize,
}

/// Read an edit script from `path`.
pub fn load_script(path: &Path) -> Result<Vec<EditCommand>> {
    let raw = std::fs::read_to_string(path)?;
    let commands: Vec<EditCommand> = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), commands = commands.len(), "script loaded");
    Ok(commands)
}

/// Run `commands` in order. Relative paths inside commands resolve against
/// `base_dir`. The first failing command stops the run; the edits before it
/// stay applied (and undoable).
pub fn run_script(
    doc: &mut Document,
    commands: &[EditCommand],
    config: &EditorConfig,
    base_dir: &Path,
) -> Result<ScriptReport> {
    let mut report = ScriptReport::default();
    for (step, command) in commands.iter().enumerate() {
        if command.apply(doc, config, base_dir)? {
            report.applied += 1;
        } else {
            warn!(step, ?command, "command had no effect");
            report.skipped += 1;
        }
    }
    info!(applied = report.applied, skipped = report.skipped, "script finished");
    Ok(report)
}

impl EditCommand {
    /// Apply this command. Returns `false` when it was a valid no-op.
    pub fn apply(&self, doc: &mut Document, config: &EditorConfig, base_dir: &Path) -> Result<bool> {
        let resolve = |path: &Path| -> PathBuf {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                base_dir.join(path)
            }
        };

        match self {
            Self::RemovePage { page } => doc.remove_page(*page),
            Self::InsertDocument { path } => Ok(doc.insert_document(&resolve(path))? > 0),
            Self::ReorderPages { order } => doc.reorder_pages(order).map(|()| true),
            Self::RotatePage { page, degrees } => doc.rotate_page(*page, *degrees),
            Self::InsertBlankPage { position, size } => {
                let size = size.unwrap_or(config.blank_page);
                Ok(doc
                    .insert_blank_page(*position, size.width, size.height)?
                    .is_some())
            }
            Self::DuplicatePage { page } => doc.duplicate_page(*page),
            Self::ReplacePage {
                page,
                source,
                source_page,
            } => doc.replace_page(*page, &resolve(source), *source_page),
            Self::AddText {
                page,
                at,
                text,
                style,
            } => {
                let style = style.as_ref().unwrap_or(&config.default_text);
                doc.add_text(*page, *at, text, style)
            }
            Self::AddTextBox {
                page,
                rect,
                text,
                options,
            } => doc.add_text_box(*page, *rect, text, options),
            Self::DrawRect { page, rect, fill } => doc.draw_filled_rect(*page, *rect, *fill),
            Self::Redact { page, rect, fill } => doc.redact_rect(*page, *rect, *fill),
            Self::AddNote {
                page,
                rect,
                text,
                style,
            } => Ok(doc.add_text_annotation(*page, *rect, text, style)?.is_some()),
            Self::UpdateNote { page, id, update } => {
                doc.update_text_annotation(*page, *id, update)
            }
            Self::DeleteAnnotation { page, id } => doc.delete_annotation(*page, *id),
            Self::Highlight {
                page,
                rect,
                color,
                opacity,
            } => doc.add_highlight_rect(
                *page,
                *rect,
                color.unwrap_or(config.highlight_color),
                opacity.unwrap_or(config.highlight_opacity),
            ),
            Self::AddImage { page, rect, path } => doc.add_image(*page, *rect, &resolve(path)),
            Self::Undo => doc.undo().map(|()| true),
            Self::Redo => doc.redo().map(|()| true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{page_count, write_pdf};
    use blattwerk_core::error::EditorError;

    fn open(dir: &Path, pages: usize) -> Document {
        let path = write_pdf(dir, "doc.pdf", pages);
        let mut doc = Document::new();
        doc.open(&path).expect("open");
        doc
    }

    #[test]
    fn script_json_parses_into_commands() {
        let script = r#"[
            { "op": "rotate_page", "page": 0, "degrees": 90 },
            { "op": "insert_blank_page", "position": 1 },
            { "op": "draw_rect", "page": 0,
              "rect": { "x0": 10, "y0": 10, "x1": 50, "y1": 40 },
              "fill": { "r": 1, "g": 0, "b": 0 } },
            { "op": "update_note", "page": 0, "id": 12, "update": { "text": "fixed" } },
            { "op": "undo" }
        ]"#;
        let commands: Vec<EditCommand> = serde_json::from_str(script).expect("parse");

        assert_eq!(
            commands[0],
            EditCommand::RotatePage {
                page: 0,
                degrees: 90
            }
        );
        assert_eq!(
            commands[1],
            EditCommand::InsertBlankPage {
                position: 1,
                size: None
            }
        );
        assert_eq!(
            commands[2],
            EditCommand::DrawRect {
                page: 0,
                rect: Rect::new(10.0, 10.0, 50.0, 40.0),
                fill: Rgb::new(1.0, 0.0, 0.0),
            }
        );
        match &commands[3] {
            EditCommand::UpdateNote { id, update, .. } => {
                assert_eq!(*id, AnnotationId(12));
                assert_eq!(update.text.as_deref(), Some("fixed"));
                assert!(update.size.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(commands[4], EditCommand::Undo);
    }

    #[test]
    fn unknown_op_is_a_serialization_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script.json");
        std::fs::write(&path, r#"[{ "op": "explode" }]"#).expect("write");
        assert!(matches!(
            load_script(&path),
            Err(EditorError::Serialization(_))
        ));
    }

    #[test]
    fn script_runs_in_order_and_counts_no_ops() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut doc = open(dir.path(), 2);
        let commands = vec![
            EditCommand::DuplicatePage { page: 0 },
            EditCommand::RemovePage { page: 9 },
            EditCommand::InsertBlankPage {
                position: 99,
                size: Some(PageSize::new(100.0, 100.0)),
            },
            EditCommand::Undo,
        ];

        let report =
            run_script(&mut doc, &commands, &EditorConfig::default(), dir.path()).expect("run");
        assert_eq!(
            report,
            ScriptReport {
                applied: 3,
                skipped: 1
            }
        );
        assert_eq!(doc.page_count(), 3);
        assert!(doc.can_redo());
    }

    #[test]
    fn blank_page_defaults_to_configured_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut doc = open(dir.path(), 1);
        let config = EditorConfig {
            blank_page: PageSize::new(300.0, 500.0),
            ..Default::default()
        };
        EditCommand::InsertBlankPage {
            position: 1,
            size: None,
        }
        .apply(&mut doc, &config, dir.path())
        .expect("insert");

        assert_eq!(
            doc.page_size(1).expect("size"),
            PageSize::new(300.0, 500.0)
        );
    }

    #[test]
    fn relative_paths_resolve_against_the_script_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pdf(dir.path(), "extra.pdf", 3);
        let mut doc = open(dir.path(), 1);

        let applied = EditCommand::InsertDocument {
            path: PathBuf::from("extra.pdf"),
        }
        .apply(&mut doc, &EditorConfig::default(), dir.path())
        .expect("insert");
        assert!(applied);
        assert_eq!(doc.page_count(), 4);
    }

    #[test]
    fn failing_command_stops_the_run_and_keeps_earlier_edits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut doc = open(dir.path(), 2);
        let commands = vec![
            EditCommand::DuplicatePage { page: 1 },
            EditCommand::ReorderPages { order: vec![0, 0, 1] },
            EditCommand::RemovePage { page: 0 },
        ];

        let err = run_script(&mut doc, &commands, &EditorConfig::default(), dir.path())
            .expect_err("invalid permutation");
        assert!(matches!(err, EditorError::InvalidPermutation { .. }));
        assert_eq!(doc.page_count(), 3);
        assert!(doc.can_undo());
    }

    #[test]
    fn notes_can_be_added_and_listed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut doc = open(dir.path(), 1);
        EditCommand::AddNote {
            page: 0,
            rect: Rect::new(20.0, 20.0, 150.0, 60.0),
            text: "Check this".into(),
            style: AnnotationStyle::default(),
        }
        .apply(&mut doc, &EditorConfig::default(), dir.path())
        .expect("note");

        let notes = doc.list_text_annotations(0).expect("list");
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].text, "Check this");

        let out = dir.path().join("out.pdf");
        doc.save_as(&out).expect("save");
        assert_eq!(page_count(&out), 1);
    }
}
