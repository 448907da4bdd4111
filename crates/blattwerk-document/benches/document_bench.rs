// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the blattwerk-document crate: the full
// edit → serialise → reparse round trip, history pushes, and page
// rasterization on a synthetic document.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream, dictionary};

use blattwerk_core::{Rect, Rgb};
use blattwerk_document::{Document, HistoryLog, Snapshot};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// An A4 document with `pages` pages, each holding a line of text and a
/// filled rectangle.
fn synthetic_pdf(pages: usize) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::with_capacity(pages);
    for n in 0..pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 770.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", n + 1))]),
                Operation::new("ET", vec![]),
                Operation::new("rg", vec![Object::Real(0.8); 3]),
                Operation::new("re", vec![72.into(), 600.into(), 200.into(), 100.into()]),
                Operation::new("f", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().unwrap_or_default(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
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
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save synthetic PDF");
    bytes
}

fn open(pages: usize) -> Document {
    let mut doc = Document::new();
    doc.open_bytes(&synthetic_pdf(pages)).expect("open synthetic PDF");
    doc
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// A structural edit: rotate, round trip, push.
fn bench_structural_round_trip(c: &mut Criterion) {
    let mut doc = open(20);
    c.bench_function("rotate_page round trip (20 pages)", |b| {
        b.iter(|| {
            doc.rotate_page(black_box(3), 90).expect("rotate");
        });
    });
}

/// A content edit: filled rectangle, round trip, push.
fn bench_render_round_trip(c: &mut Criterion) {
    let mut doc = open(20);
    let rect = Rect::new(100.0, 100.0, 200.0, 150.0);
    c.bench_function("draw_filled_rect round trip (20 pages)", |b| {
        b.iter(|| {
            doc.draw_filled_rect(black_box(0), rect, Rgb::BLACK).expect("rect");
        });
    });
}

/// Pushing distinct snapshots into a full history.
fn bench_history_push(c: &mut Criterion) {
    let base = synthetic_pdf(5);
    let snapshots: Vec<Snapshot> = (0..64u8)
        .map(|n| {
            let mut bytes = base.clone();
            bytes.push(n);
            Snapshot::new(bytes)
        })
        .collect();

    c.bench_function("history push (capacity 40)", |b| {
        b.iter(|| {
            let mut log = HistoryLog::new(40);
            for snapshot in &snapshots {
                log.push(black_box(snapshot.clone()));
            }
            black_box(log.len());
        });
    });
}

fn bench_rasterize(c: &mut Criterion) {
    let doc = open(1);
    c.bench_function("page_pixmap (A4, zoom 1.0)", |b| {
        b.iter(|| {
            black_box(doc.page_pixmap(0, black_box(1.0)).expect("rasterize"));
        });
    });
}

criterion_group!(
    benches,
    bench_structural_round_trip,
    bench_render_round_trip,
    bench_history_push,
    bench_rasterize
);
criterion_main!(benches);
