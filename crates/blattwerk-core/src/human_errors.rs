// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for front-ends.
//
// Every technical error is mapped to a plain sentence and a suggestion. The
// severity drives how a front-end presents it (status line vs. dialog).

use crate::error::EditorError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Harmless misuse, e.g. pressing undo with nothing to undo.
    Notice,
    /// User must do something (open a file, pick a save location).
    ActionRequired,
    /// The file or environment is broken; retrying will not help.
    Permanent,
}

/// A human-readable error with a plain message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Short summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Severity level.
    pub severity: Severity,
}

/// Convert an `EditorError` into a `HumanError`.
pub fn humanize_error(err: &EditorError) -> HumanError {
    match err {
        EditorError::NotOpen => HumanError {
            message: "No document is open.".into(),
            suggestion: "Open a PDF file first.".into(),
            severity: Severity::ActionRequired,
        },

        EditorError::NoPath => HumanError {
            message: "This document hasn't been saved yet.".into(),
            suggestion: "Use \"Save as\" and choose where to store it.".into(),
            severity: Severity::ActionRequired,
        },

        EditorError::IndexOutOfRange { index, len } => HumanError {
            message: format!("Page {} doesn't exist.", index + 1),
            suggestion: format!("The document has {len} page(s)."),
            severity: Severity::Notice,
        },

        EditorError::InvalidPermutation { page_count, .. } => HumanError {
            message: "That page order isn't valid.".into(),
            suggestion: format!("List every page from 1 to {page_count} exactly once."),
            severity: Severity::ActionRequired,
        },

        EditorError::Codec(detail) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: format!(
                "The file may be damaged or use features that aren't supported. ({detail})"
            ),
            severity: Severity::Permanent,
        },

        EditorError::Font(detail) => HumanError {
            message: "A font couldn't be used.".into(),
            suggestion: format!("Check the font file, or pick a built-in font. ({detail})"),
            severity: Severity::ActionRequired,
        },

        EditorError::Image(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try saving it as a JPEG or PNG first.".into(),
            severity: Severity::Permanent,
        },

        EditorError::NoUndoAvailable => HumanError {
            message: "Nothing to undo.".into(),
            suggestion: "You're already at the oldest remembered change.".into(),
            severity: Severity::Notice,
        },

        EditorError::NoRedoAvailable => HumanError {
            message: "Nothing to redo.".into(),
            suggestion: "You're already at the newest change.".into(),
            severity: Severity::Notice,
        },

        EditorError::EmptyHistory => HumanError {
            message: "There is no edit history yet.".into(),
            suggestion: "Open a document to start recording changes.".into(),
            severity: Severity::Notice,
        },

        EditorError::Config(detail) => HumanError {
            message: "The settings file is invalid.".into(),
            suggestion: format!("Fix or delete the configuration file. ({detail})"),
            severity: Severity::ActionRequired,
        },

        EditorError::LockPoisoned => HumanError {
            message: "The editor hit an internal problem.".into(),
            suggestion: "Save your work under a new name and restart.".into(),
            severity: Severity::Permanent,
        },

        EditorError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError {
                message: "The file couldn't be found.".into(),
                suggestion: "It may have been moved or deleted. Try choosing the file again."
                    .into(),
                severity: Severity::ActionRequired,
            },
            std::io::ErrorKind::PermissionDenied => HumanError {
                message: "You don't have permission to use that file.".into(),
                suggestion: "Check the file permissions, or pick a different location.".into(),
                severity: Severity::ActionRequired,
            },
            _ => HumanError {
                message: "There was a problem reading or writing a file.".into(),
                suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                severity: Severity::Permanent,
            },
        },

        EditorError::Serialization(_) => HumanError {
            message: "A settings or script file couldn't be read.".into(),
            suggestion: "Check that the file is valid JSON.".into(),
            severity: Severity::ActionRequired,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undo_at_boundary_is_a_notice() {
        let human = humanize_error(&EditorError::NoUndoAvailable);
        assert_eq!(human.severity, Severity::Notice);
    }

    #[test]
    fn page_index_is_shown_one_based() {
        let human = humanize_error(&EditorError::IndexOutOfRange { index: 4, len: 3 });
        assert!(human.message.contains("Page 5"));
        assert!(human.suggestion.contains('3'));
    }

    #[test]
    fn missing_file_requires_action() {
        let err = EditorError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }

    #[test]
    fn codec_failure_is_permanent() {
        let human = humanize_error(&EditorError::Codec("bad xref".into()));
        assert_eq!(human.severity, Severity::Permanent);
        assert!(human.suggestion.contains("bad xref"));
    }
}
