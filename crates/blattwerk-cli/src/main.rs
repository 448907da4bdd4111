// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Blattwerk — PDF page and overlay editor
//
// Entry point. Parses the command line, initialises logging and the session,
// runs one subcommand and reports failures in plain language.

mod commands;
#[cfg(test)]
mod fixtures;
mod session;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use blattwerk_core::error::{EditorError, Result};
use blattwerk_core::human_errors::{Severity, humanize_error};
use blattwerk_core::types::{
    AnnotationStyle, Point, Rect, Rgb, TextAlign, TextBoxOptions, TextStyle,
};
use blattwerk_document::Document;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use session::Session;

/// Edit the pages and overlays of PDF files.
///
/// Pages are numbered from 1. Rectangles are `x0,y0,x1,y1` in points with
/// the origin at the top-left corner of the page.
#[derive(Debug, Parser)]
#[command(name = "blattwerk", version, about)]
struct Cli {
    /// Configuration file (JSON). Defaults to the per-user location.
    #[arg(long, global = true, env = "BLATTWERK_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of .ttf/.otf fonts usable by name in text commands.
    #[arg(long, global = true, value_name = "DIR")]
    fonts: Option<PathBuf>,

    /// Log debug detail (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// The file being edited and where the result goes.
#[derive(Debug, Args)]
struct Target {
    /// PDF to edit.
    input: PathBuf,

    /// Write the result here instead of overwriting the input.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Font, size and colour options shared by the text commands.
#[derive(Debug, Args)]
struct StyleArgs {
    /// Base-14 short name (helv, times, cour, ...) or a registered font.
    #[arg(long)]
    font: Option<String>,

    #[arg(long)]
    size: Option<f32>,

    /// `#RRGGBB` or `r,g,b` with components in 0..1.
    #[arg(long)]
    color: Option<Rgb>,
}

impl StyleArgs {
    fn resolve(&self, base: &TextStyle) -> TextStyle {
        TextStyle {
            font: self.font.clone().unwrap_or_else(|| base.font.clone()),
            size: self.size.unwrap_or(base.size),
            color: self.color.unwrap_or(base.color),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show page sizes, rotations and notes.
    Info {
        input: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Delete a page.
    Remove {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
    },

    /// Rotate a page by a multiple of 90 degrees.
    Rotate {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
        #[arg(allow_negative_numbers = true, default_value_t = 90)]
        degrees: i32,
    },

    /// Put the pages in a new order, e.g. `3,1,2`.
    Reorder {
        #[command(flatten)]
        target: Target,
        #[arg(value_delimiter = ',', required = true, value_parser = parse_page)]
        order: Vec<usize>,
    },

    /// Insert an empty page.
    Blank {
        #[command(flatten)]
        target: Target,

        /// Page number the new page gets; appended when omitted.
        #[arg(long, value_parser = parse_page)]
        at: Option<usize>,

        #[arg(long, requires = "height")]
        width: Option<f32>,

        #[arg(long, requires = "width")]
        height: Option<f32>,
    },

    /// Insert a copy of a page right after it.
    Duplicate {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
    },

    /// Replace a page with a page of another PDF.
    Replace {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
        source: PathBuf,
        #[arg(long, value_parser = parse_page, default_value = "1")]
        source_page: usize,
    },

    /// Append every page of other PDFs.
    Merge {
        #[command(flatten)]
        target: Target,
        #[arg(required = true)]
        others: Vec<PathBuf>,
    },

    /// Copy selected pages into a new PDF.
    Extract {
        input: PathBuf,
        #[arg(value_delimiter = ',', required = true, value_parser = parse_page)]
        pages: Vec<usize>,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write text at a point, or laid out inside a box with `--rect`.
    Text {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
        text: String,

        /// Baseline start as `x,y`.
        #[arg(long, value_parser = parse_point, required_unless_present = "rect")]
        at: Option<Point>,

        #[arg(long, value_parser = parse_rect, conflicts_with = "at")]
        rect: Option<Rect>,

        /// Alignment inside `--rect`.
        #[arg(long, value_enum, default_value_t = AlignArg::Left)]
        align: AlignArg,

        /// Paint the `--rect` box white first.
        #[arg(long)]
        erase: bool,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Draw a filled rectangle.
    Rect {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
        #[arg(value_parser = parse_rect)]
        rect: Rect,
        #[arg(long, default_value = "#000000")]
        fill: Rgb,
    },

    /// Remove the text and images under a rectangle and paint over it.
    Redact {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
        #[arg(value_parser = parse_rect)]
        rect: Rect,
        #[arg(long, default_value = "#000000")]
        fill: Rgb,
    },

    /// Add a translucent highlight.
    Highlight {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
        #[arg(value_parser = parse_rect)]
        rect: Rect,
        #[arg(long)]
        color: Option<Rgb>,
        #[arg(long)]
        opacity: Option<f32>,
    },

    /// Add a free-text note.
    Note {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
        #[arg(value_parser = parse_rect)]
        rect: Rect,
        text: String,
        #[command(flatten)]
        style: StyleArgs,
        /// Background colour; transparent when omitted.
        #[arg(long)]
        fill: Option<Rgb>,
        #[arg(long)]
        underline: bool,
    },

    /// Place an image inside a rectangle, keeping its aspect ratio.
    Image {
        #[command(flatten)]
        target: Target,
        #[arg(value_parser = parse_page)]
        page: usize,
        #[arg(value_parser = parse_rect)]
        rect: Rect,
        image: PathBuf,
    },

    /// Export a page as an image.
    Render {
        input: PathBuf,
        #[arg(value_parser = parse_page)]
        page: usize,
        #[arg(short, long)]
        output: PathBuf,
        /// Scale factor; defaults to the configured export zoom.
        #[arg(long)]
        zoom: Option<f32>,
    },

    /// Run a JSON edit script.
    Apply {
        #[command(flatten)]
        target: Target,
        script: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum AlignArg {
    Left,
    Center,
    Right,
    Justify,
}

impl From<AlignArg> for TextAlign {
    fn from(align: AlignArg) -> Self {
        match align {
            AlignArg::Left => TextAlign::Left,
            AlignArg::Center => TextAlign::Center,
            AlignArg::Right => TextAlign::Right,
            AlignArg::Justify => TextAlign::Justify,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            let human = humanize_error(&err);
            eprintln!("{}\n{}", human.message, human.suggestion);
            match human.severity {
                Severity::Notice | Severity::ActionRequired => ExitCode::from(1),
                Severity::Permanent => ExitCode::from(2),
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let session = Session::init(cli.config.as_deref(), cli.fonts.as_deref())?;
    let config = session.config();

    match cli.command {
        Command::Info { input, json } => {
            let doc = session.open(&input)?;
            let report = info_report(&doc)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&input, &report);
            }
            Ok(())
        }

        Command::Remove { target, page } => {
            edit(&session, &target, |doc| doc.remove_page(page))
        }

        Command::Rotate {
            target,
            page,
            degrees,
        } => edit(&session, &target, |doc| doc.rotate_page(page, degrees)),

        Command::Reorder { target, order } => edit(&session, &target, |doc| {
            doc.reorder_pages(&order).map(|()| true)
        }),

        Command::Blank {
            target,
            at,
            width,
            height,
        } => edit(&session, &target, |doc| {
            let position = at.unwrap_or(doc.page_count());
            let width = width.unwrap_or(config.blank_page.width);
            let height = height.unwrap_or(config.blank_page.height);
            Ok(doc.insert_blank_page(position, width, height)?.is_some())
        }),

        Command::Duplicate { target, page } => {
            edit(&session, &target, |doc| doc.duplicate_page(page))
        }

        Command::Replace {
            target,
            page,
            source,
            source_page,
        } => edit(&session, &target, |doc| {
            doc.replace_page(page, &source, source_page)
        }),

        Command::Merge { target, others } => edit(&session, &target, |doc| {
            let mut added = 0;
            for other in &others {
                added += doc.insert_document(other)?;
            }
            info!(added, files = others.len(), "documents merged");
            Ok(added > 0)
        }),

        Command::Extract {
            input,
            pages,
            output,
        } => {
            let doc = session.open(&input)?;
            let written = doc.extract_pages(&pages, &output)?;
            if written == 0 {
                return Err(EditorError::IndexOutOfRange {
                    index: pages.iter().copied().min().unwrap_or(0),
                    len: doc.page_count(),
                });
            }
            println!("{written} page(s) written to {}", output.display());
            Ok(())
        }

        Command::Text {
            target,
            page,
            text,
            at,
            rect,
            align,
            erase,
            style,
        } => {
            let style = style.resolve(&config.default_text);
            edit(&session, &target, |doc| match (rect, at) {
                (Some(rect), _) => {
                    let options = TextBoxOptions {
                        style,
                        align: align.into(),
                        erase_background: erase,
                        underline: None,
                    };
                    doc.add_text_box(page, rect, &text, &options)
                }
                (None, Some(at)) => doc.add_text(page, at, &text, &style),
                (None, None) => Ok(false),
            })
        }

        Command::Rect {
            target,
            page,
            rect,
            fill,
        } => edit(&session, &target, |doc| doc.draw_filled_rect(page, rect, fill)),

        Command::Redact {
            target,
            page,
            rect,
            fill,
        } => edit(&session, &target, |doc| doc.redact_rect(page, rect, fill)),

        Command::Highlight {
            target,
            page,
            rect,
            color,
            opacity,
        } => edit(&session, &target, |doc| {
            doc.add_highlight_rect(
                page,
                rect,
                color.unwrap_or(config.highlight_color),
                opacity.unwrap_or(config.highlight_opacity),
            )
        }),

        Command::Note {
            target,
            page,
            rect,
            text,
            style,
            fill,
            underline,
        } => {
            let text_style = style.resolve(&config.default_text);
            let style = AnnotationStyle {
                font: text_style.font,
                size: text_style.size,
                color: text_style.color,
                fill,
                underline,
            };
            edit(&session, &target, |doc| {
                let id = doc.add_text_annotation(page, rect, &text, &style)?;
                if let Some(id) = id {
                    println!("note {id} added");
                }
                Ok(id.is_some())
            })
        }

        Command::Image {
            target,
            page,
            rect,
            image,
        } => edit(&session, &target, |doc| doc.add_image(page, rect, &image)),

        Command::Render {
            input,
            page,
            output,
            zoom,
        } => {
            let doc = session.open(&input)?;
            doc.export_page_image(page, zoom.unwrap_or(config.export_zoom), &output)?;
            println!("page {} rendered to {}", page + 1, output.display());
            Ok(())
        }

        Command::Apply { target, script } => {
            let commands = commands::load_script(&script)?;
            let base_dir = script
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            edit(&session, &target, |doc| {
                let report = commands::run_script(doc, &commands, config, &base_dir)?;
                println!(
                    "{} command(s) applied, {} without effect",
                    report.applied, report.skipped
                );
                Ok(report.applied > 0)
            })
        }
    }
}

/// Open the target, run `operation`, and save where the target says.
fn edit(
    session: &Session,
    target: &Target,
    operation: impl FnOnce(&mut Document) -> Result<bool>,
) -> Result<()> {
    let mut doc = session.open(&target.input)?;
    if !operation(&mut doc)? {
        warn!(input = %target.input.display(), "nothing to change");
    }
    if let Some(path) = session.finish(&mut doc, target.output.as_deref())? {
        println!("saved {}", path.display());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct InfoReport {
    pages: Vec<PageInfo>,
}

#[derive(Debug, Serialize)]
struct PageInfo {
    number: usize,
    width: f32,
    height: f32,
    rotation: i32,
    notes: Vec<blattwerk_core::types::AnnotationSummary>,
}

fn info_report(doc: &Document) -> Result<InfoReport> {
    let pages = (0..doc.page_count())
        .map(|index| {
            let size = doc.page_size(index)?;
            Ok(PageInfo {
                number: index + 1,
                width: size.width,
                height: size.height,
                rotation: doc.page_rotation(index)?,
                notes: doc.list_text_annotations(index)?,
            })
        })
        .collect::<Result<_>>()?;
    Ok(InfoReport { pages })
}

fn print_report(input: &Path, report: &InfoReport) {
    println!("{}: {} page(s)", input.display(), report.pages.len());
    for page in &report.pages {
        println!(
            "  page {:>3}  {:>7.1} x {:<7.1}  rotation {:>3}",
            page.number, page.width, page.height, page.rotation
        );
        for note in &page.notes {
            println!("             note {}: {:?}", note.id, note.text);
        }
    }
}

/// A 1-based page number, returned as a 0-based index.
fn parse_page(s: &str) -> std::result::Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(0) => Err("page numbers start at 1".into()),
        Ok(n) => Ok(n - 1),
        Err(err) => Err(format!("invalid page number {s:?}: {err}")),
    }
}

fn parse_numbers<const N: usize>(s: &str) -> std::result::Result<[f32; N], String> {
    let values: Vec<f32> = s
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|err| format!("invalid number in {s:?}: {err}"))?;
    values
        .try_into()
        .map_err(|values: Vec<f32>| format!("expected {N} comma-separated numbers, got {}", values.len()))
}

fn parse_point(s: &str) -> std::result::Result<Point, String> {
    let [x, y] = parse_numbers::<2>(s)?;
    Ok(Point::new(x, y))
}

fn parse_rect(s: &str) -> std::result::Result<Rect, String> {
    let [x0, y0, x1, y1] = parse_numbers::<4>(s)?;
    Ok(Rect::new(x0, y0, x1, y1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{empty_config, page_count, write_pdf};
    use clap::CommandFactory;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("blattwerk").chain(args.iter().copied()))
            .expect("parse arguments")
    }

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pages_are_one_based_on_the_command_line() {
        assert_eq!(parse_page("1"), Ok(0));
        assert_eq!(parse_page("12"), Ok(11));
        assert!(parse_page("0").is_err());
        assert!(parse_page("two").is_err());
    }

    #[test]
    fn rect_and_point_parse_from_comma_lists() {
        assert_eq!(
            parse_rect("10, 20,110,70.5"),
            Ok(Rect::new(10.0, 20.0, 110.0, 70.5))
        );
        assert_eq!(parse_point("3,4"), Ok(Point::new(3.0, 4.0)));
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_point("1,x").is_err());
    }

    #[test]
    fn reorder_takes_a_comma_separated_order() {
        match cli(&["reorder", "in.pdf", "3,1,2"]).command {
            Command::Reorder { order, target } => {
                assert_eq!(order, vec![2, 0, 1]);
                assert_eq!(target.input, PathBuf::from("in.pdf"));
                assert!(target.output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rotate_accepts_negative_degrees() {
        match cli(&["rotate", "in.pdf", "2", "-90", "-o", "out.pdf"]).command {
            Command::Rotate {
                page,
                degrees,
                target,
            } => {
                assert_eq!(page, 1);
                assert_eq!(degrees, -90);
                assert_eq!(target.output, Some(PathBuf::from("out.pdf")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn text_needs_a_point_or_a_box() {
        let args = ["blattwerk", "text", "in.pdf", "1", "hello"];
        assert!(Cli::try_parse_from(args).is_err());
        assert!(Cli::try_parse_from(["blattwerk", "text", "in.pdf", "1", "hi", "--at", "5,5"]).is_ok());
    }

    #[test]
    fn colours_parse_as_hex_or_components() {
        match cli(&["rect", "in.pdf", "1", "0,0,10,10", "--fill", "#FF0000"]).command {
            Command::Rect { fill, .. } => assert_eq!(fill, Rgb::new(1.0, 0.0, 0.0)),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn editing_writes_the_output_and_leaves_the_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = empty_config(dir.path());
        let input = write_pdf(dir.path(), "in.pdf", 3);
        let output = dir.path().join("out.pdf");

        run(cli(&[
            "--config",
            config.to_str().expect("utf-8 path"),
            "remove",
            input.to_str().expect("utf-8 path"),
            "2",
            "--output",
            output.to_str().expect("utf-8 path"),
        ]))
        .expect("remove");

        assert_eq!(page_count(&input), 3);
        assert_eq!(page_count(&output), 2);
    }

    #[test]
    fn merge_edits_in_place_by_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = empty_config(dir.path());
        let input = write_pdf(dir.path(), "in.pdf", 1);
        let other = write_pdf(dir.path(), "other.pdf", 2);

        run(cli(&[
            "--config",
            config.to_str().expect("utf-8 path"),
            "merge",
            input.to_str().expect("utf-8 path"),
            other.to_str().expect("utf-8 path"),
        ]))
        .expect("merge");

        assert_eq!(page_count(&input), 3);
    }

    #[test]
    fn out_of_range_page_is_reported_not_saved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = empty_config(dir.path());
        let input = write_pdf(dir.path(), "in.pdf", 1);

        let err = run(cli(&[
            "--config",
            config.to_str().expect("utf-8 path"),
            "render",
            input.to_str().expect("utf-8 path"),
            "4",
            "--output",
            dir.path().join("p.png").to_str().expect("utf-8 path"),
        ]))
        .expect_err("missing page");
        assert!(matches!(err, EditorError::IndexOutOfRange { index: 3, len: 1 }));
    }

    #[test]
    fn apply_runs_a_script_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = empty_config(dir.path());
        let input = write_pdf(dir.path(), "in.pdf", 2);
        let script = dir.path().join("edits.json");
        std::fs::write(
            &script,
            r#"[
                { "op": "duplicate_page", "page": 0 },
                { "op": "rotate_page", "page": 2, "degrees": 180 },
                { "op": "draw_rect", "page": 1,
                  "rect": { "x0": 0, "y0": 0, "x1": 40, "y1": 40 } }
            ]"#,
        )
        .expect("write script");

        run(cli(&[
            "--config",
            config.to_str().expect("utf-8 path"),
            "apply",
            input.to_str().expect("utf-8 path"),
            script.to_str().expect("utf-8 path"),
        ]))
        .expect("apply");

        let mut doc = Document::new();
        doc.open(&input).expect("reopen");
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.page_rotation(2).expect("rotation"), 180);
    }

    #[test]
    fn info_report_lists_pages_and_notes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = write_pdf(dir.path(), "in.pdf", 2);
        let mut doc = Document::new();
        doc.open(&input).expect("open");
        doc.add_text_annotation(
            1,
            Rect::new(10.0, 10.0, 120.0, 50.0),
            "remark",
            &AnnotationStyle::default(),
        )
        .expect("note");

        let report = info_report(&doc).expect("report");
        assert_eq!(report.pages.len(), 2);
        assert_eq!(report.pages[0].width, 200.0);
        assert_eq!(report.pages[0].height, 300.0);
        assert!(report.pages[0].notes.is_empty());
        assert_eq!(report.pages[1].notes[0].text, "remark");
    }
}
