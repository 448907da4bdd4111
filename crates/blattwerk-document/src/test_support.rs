// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixture documents shared by the unit tests.

use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

/// A document with one page per entry of `sizes`. All pages share one
/// resource dictionary declaring `/F1` (Helvetica) and each page has a single
/// content stream writing "Page N" near the bottom-left corner.
pub(crate) fn sample_document(sizes: &[(f32, f32)]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for (i, (width, height)) in sizes.iter().enumerate() {
        let content_id = doc.add_object(page_text_stream(&format!("Page {}", i + 1)));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (*width).into(), (*height).into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => sizes.len() as i64,
        }),
    );
    finish(&mut doc, pages_id);
    doc
}

/// [`sample_document`] serialised.
pub(crate) fn sample_pdf(sizes: &[(f32, f32)]) -> Vec<u8> {
    save(sample_document(sizes))
}

/// One 200×200 page whose `/CropBox` shows only the 100×50 area
/// `[50 100 150 150]`.
pub(crate) fn cropped_pdf() -> Vec<u8> {
    let mut doc = sample_document(&[(200.0, 200.0)]);
    let page_id = doc.get_pages()[&1];
    doc.get_dictionary_mut(page_id)
        .expect("page dictionary")
        .set(
            "CropBox",
            Object::Array(vec![50.into(), 100.into(), 150.into(), 150.into()]),
        );
    save(doc)
}

/// `pages` 200×200 pages that all paint one shared form XObject `/Fm0`.
/// The form shows "TopSecret" at (20, 100) and "Harmless" at (20, 20), in
/// user space.
pub(crate) fn form_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let form = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![20.into(), 100.into()]),
            Operation::new("Tj", vec![Object::string_literal("TopSecret")]),
            Operation::new("ET", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![20.into(), 20.into()]),
            Operation::new("Tj", vec![Object::string_literal("Harmless")]),
            Operation::new("ET", vec![]),
        ],
    };
    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        },
        form.encode().expect("encode form content"),
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Fm0" => form_id },
    });

    let mut kids = Vec::new();
    for _ in 0..pages {
        let painting = Content {
            operations: vec![Operation::new("Do", vec!["Fm0".into()])],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            painting.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 200.into(), 200.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
        }),
    );
    finish(&mut doc, pages_id);
    save(doc)
}

/// Number of streams in `pdf` whose decoded bytes mention `needle`.
pub(crate) fn streams_containing(pdf: &[u8], needle: &[u8]) -> usize {
    let doc = Document::load_mem(pdf).expect("load pdf");
    doc.objects
        .values()
        .filter_map(|object| object.as_stream().ok())
        .filter(|stream| {
            let data = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            contains(&data, needle)
        })
        .count()
}

/// Three pages in a two-level tree. Page 1 sits under the root with its own
/// 100×100 box; pages 2 and 3 sit under an intermediate node and inherit its
/// 300×400 `/MediaBox`.
pub(crate) fn nested_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let root_id = doc.new_object_id();
    let middle_id = doc.new_object_id();

    let first_content = doc.add_object(page_text_stream("Page 1"));
    let first = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => root_id,
        "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
        "Contents" => first_content,
    });
    let mut middle_kids = Vec::new();
    for n in 2..=3 {
        let content_id = doc.add_object(page_text_stream(&format!("Page {n}")));
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => middle_id,
            "Contents" => content_id,
        });
        middle_kids.push(Object::Reference(page));
    }

    doc.objects.insert(
        middle_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => root_id,
            "Kids" => middle_kids,
            "Count" => 2,
            "MediaBox" => vec![0.into(), 0.into(), 300.into(), 400.into()],
        }),
    );
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(first), Object::Reference(middle_id)],
            "Count" => 3,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        }),
    );
    finish(&mut doc, root_id);
    save(doc)
}

/// A TrueType font installed on the machine, if any.
pub(crate) fn system_font() -> Option<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/Library/Fonts/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
    .into_iter()
    .map(PathBuf::from)
    .find(|path| path.is_file())
}

/// Write a solid-colour PNG.
pub(crate) fn write_png(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
    image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
        .save(path)
        .expect("write png fixture");
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

fn page_text_stream(text: &str) -> Stream {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![10.into(), 10.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    Stream::new(dictionary! {}, content.encode().expect("encode fixture content"))
}

fn finish(doc: &mut Document, pages_id: ObjectId) {
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save fixture");
    bytes
}
