// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docseal-document: Template registry, placeholder merge, and PDF rendering.

pub mod merge;
pub mod pdf;
pub mod template;

pub use merge::merge;
pub use pdf::writer::PdfRenderer;
pub use template::TemplateRegistry;
