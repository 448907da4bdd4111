// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-invocation services: the loaded configuration and font registry, plus
// the open → edit → save cycle every editing subcommand goes through.

use std::path::{Path, PathBuf};

use blattwerk_core::config::{EditorConfig, default_config_path};
use blattwerk_core::error::Result;
use blattwerk_document::{Document, FontRegistry};
use tracing::{debug, info, warn};

/// Configuration and fonts shared by every document the CLI opens.
#[derive(Debug, Clone)]
pub struct Session {
    config: EditorConfig,
    fonts: Option<FontRegistry>,
}

impl Session {
    /// Load the configuration and scan the font directory.
    ///
    /// An explicit `config_path` must exist; otherwise the default location
    /// is tried and a missing file yields the defaults. A font directory
    /// given on the command line must be readable, while one taken from the
    /// configuration is skipped with a warning when it is not.
    pub fn init(config_path: Option<&Path>, font_dir: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => EditorConfig::load(path)?,
            None => EditorConfig::load_or_default(default_config_path())?,
        };

        let fonts = match (font_dir, config.font_dir.as_deref()) {
            (Some(dir), _) => Some(scan_fonts(dir)?),
            (None, Some(dir)) => match scan_fonts(dir) {
                Ok(registry) => Some(registry),
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "configured font directory unusable, continuing without it");
                    None
                }
            },
            (None, None) => None,
        };

        debug!(
            history_capacity = config.history_capacity,
            fonts = fonts.as_ref().map_or(0, FontRegistry::len),
            "session initialised"
        );
        Ok(Self { config, fonts })
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn fonts(&self) -> Option<&FontRegistry> {
        self.fonts.as_ref()
    }

    /// Open `path` with the session's settings and fonts.
    pub fn open(&self, path: &Path) -> Result<Document> {
        let mut doc = Document::with_config(&self.config);
        if let Some(fonts) = &self.fonts {
            doc.set_font_registry(fonts.clone());
        }
        doc.open(path)?;
        Ok(doc)
    }

    /// Write `doc` to `output`, or back to where it was opened from. An
    /// unchanged document is only written when an explicit output is given.
    pub fn finish(&self, doc: &mut Document, output: Option<&Path>) -> Result<Option<PathBuf>> {
        match output {
            Some(path) => {
                doc.save_as(path)?;
                Ok(Some(path.to_path_buf()))
            }
            None if doc.is_dirty() => {
                doc.save()?;
                Ok(doc.path().map(Path::to_path_buf))
            }
            None => {
                info!("no changes, input left untouched");
                Ok(None)
            }
        }
    }
}

fn scan_fonts(dir: &Path) -> Result<FontRegistry> {
    let mut registry = FontRegistry::new();
    let added = registry.load_dir(dir)?;
    info!(dir = %dir.display(), fonts = added, "font directory scanned");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_pdf;
    use blattwerk_core::error::EditorError;

    #[test]
    fn explicit_config_must_exist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            Session::init(Some(&missing), None),
            Err(EditorError::Io(_))
        ));
    }

    #[test]
    fn config_file_settings_reach_opened_documents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("config.json");
        std::fs::write(&config, r#"{ "history_capacity": 3, "stamp_on_save": false }"#)
            .expect("write config");
        let input = write_pdf(dir.path(), "in.pdf", 2);

        let session = Session::init(Some(&config), None).expect("session");
        assert_eq!(session.config().history_capacity, 3);
        assert!(session.fonts().is_none());

        let doc = session.open(&input).expect("open");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.history().capacity(), 3);
    }

    #[test]
    fn explicit_font_dir_is_scanned() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("config.json");
        std::fs::write(&config, "{}").expect("write config");
        let fonts = dir.path().join("fonts");
        std::fs::create_dir(&fonts).expect("font dir");
        std::fs::write(fonts.join("notes.txt"), "not a font").expect("write");

        let session = Session::init(Some(&config), Some(&fonts)).expect("session");
        assert_eq!(session.fonts().map(FontRegistry::len), Some(0));
    }

    #[test]
    fn unchanged_document_is_not_rewritten_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_pdf(dir.path(), "in.pdf", 1);
        let before = std::fs::read(&input).expect("read");

        let session = Session::init(Some(&crate::fixtures::empty_config(dir.path())), None)
            .expect("session");
        let mut doc = session.open(&input).expect("open");
        assert_eq!(session.finish(&mut doc, None).expect("finish"), None);
        assert_eq!(std::fs::read(&input).expect("read"), before);

        let copy = dir.path().join("copy.pdf");
        assert_eq!(
            session.finish(&mut doc, Some(&copy)).expect("finish"),
            Some(copy.clone())
        );
        assert!(copy.is_file());
    }
}
