// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for template merge and PDF rendering.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use docseal_core::PaperSize;
use docseal_core::types::{Document, EntityData};
use docseal_document::{PdfRenderer, TemplateRegistry, merge};

fn entity() -> EntityData {
    [
        ("name", "Ahmed Ali"),
        ("salary", "15000"),
        ("company", "Example Trading Co."),
        ("position", "Senior Accountant"),
        ("join_date", "2019-04-01"),
        ("end_date", "2026-03-31"),
        ("purpose", "a postgraduate degree"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect()
}

/// Merge every built-in template against the same entity.
fn bench_merge_builtin(c: &mut Criterion) {
    let registry = TemplateRegistry::with_builtin().expect("builtin templates");
    let templates = registry.list().expect("list templates");
    let data = entity();

    let mut group = c.benchmark_group("merge");
    for template in &templates {
        group.bench_function(template.id.as_str(), |b| {
            b.iter(|| black_box(merge(black_box(template), black_box(&data)).expect("merge")));
        });
    }
    group.finish();
}

fn bench_render_pdf(c: &mut Criterion) {
    let registry = TemplateRegistry::with_builtin().expect("builtin templates");
    let template = registry.get("experience-letter").expect("template");
    let content = merge(&template, &entity()).expect("merge");
    let document = Document::new_draft(&template, "EMP001", content, "bench", None);
    let renderer = PdfRenderer::new(PaperSize::A4, "Docseal");

    c.bench_function("render_pdf (experience letter)", |b| {
        b.iter(|| black_box(renderer.render_document(black_box(&document)).expect("render")));
    });
}

criterion_group!(benches, bench_merge_builtin, bench_render_pdf);
criterion_main!(benches);
