// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF renderer: printable rendition of a document using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.
//
// Layout, top to bottom: title, document metadata, merged content, signature
// block, and for sealed documents the reference number a third party uses to
// verify the copy.

use docseal_core::PaperSize;
use docseal_core::error::{DocsealError, Result};
use docseal_core::types::{Document, DocumentStatus};
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tracing::{debug, info, instrument, warn};

const BODY_SIZE_PT: f32 = 11.0;
const TITLE_SIZE_PT: f32 = 16.0;
const LINE_HEIGHT_PT: f32 = 14.0;
const MARGIN_MM: f32 = 20.0;

/// One laid-out line of output.
#[derive(Debug, Clone)]
struct Line {
    text: String,
    font: BuiltinFont,
    size: f32,
}

impl Line {
    fn body(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: BuiltinFont::Helvetica,
            size: BODY_SIZE_PT,
        }
    }

    fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: BuiltinFont::HelveticaBold,
            size: BODY_SIZE_PT,
        }
    }

    fn blank() -> Self {
        Self::body(String::new())
    }
}

/// Renders documents to PDF bytes.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    paper_size: PaperSize,
    /// Shown under the reference number on sealed documents.
    issuer: String,
}

impl PdfRenderer {
    pub fn new(paper_size: PaperSize, issuer: impl Into<String>) -> Self {
        Self {
            paper_size,
            issuer: issuer.into(),
        }
    }

    fn page_dimensions(&self) -> (Mm, Mm) {
        let (w_mm, h_mm) = self.paper_size.dimensions_mm();
        (Mm(w_mm as f32), Mm(h_mm as f32))
    }

    /// Render `document` as a PDF.
    #[instrument(skip_all, fields(document = %document.id, status = %document.status))]
    pub fn render_document(&self, document: &Document) -> Result<Vec<u8>> {
        let (page_w, page_h) = self.page_dimensions();
        let title = display_title(&document.document_type);

        // Average Helvetica glyph width is roughly 0.50 * font size, in mm
        // (1pt = 0.3528mm).
        let usable_width_mm = page_w.0 - 2.0 * MARGIN_MM;
        let avg_char_width_mm = 0.50 * BODY_SIZE_PT * 0.3528;
        let max_chars = (usable_width_mm / avg_char_width_mm) as usize;

        let lines = self.layout(document, &title, max_chars);

        let margin_pt = Mm(MARGIN_MM).into_pt().0;
        let page_h_pt = page_h.into_pt().0;
        let lines_per_page = ((page_h_pt - 2.0 * margin_pt) / LINE_HEIGHT_PT) as usize;
        if lines_per_page == 0 {
            return Err(DocsealError::Pdf("page too small for any text".into()));
        }

        let mut pages: Vec<PdfPage> = Vec::new();
        for chunk in lines.chunks(lines_per_page) {
            let mut ops: Vec<Op> = Vec::new();
            for (idx, line) in chunk.iter().enumerate() {
                if line.text.is_empty() {
                    continue;
                }
                let y_pt = page_h_pt - margin_pt - (idx as f32 * LINE_HEIGHT_PT);
                ops.push(Op::StartTextSection);
                ops.push(Op::SetTextCursor {
                    pos: Point {
                        x: Pt(margin_pt),
                        y: Pt(y_pt),
                    },
                });
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(line.size),
                    font: line.font,
                });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(line.text.clone())],
                    font: line.font,
                });
                ops.push(Op::EndTextSection);
            }
            pages.push(PdfPage::new(page_w, page_h, ops));
        }

        let mut doc = PdfDocument::new(&title);
        doc.with_pages(pages);
        debug!(lines = lines.len(), pages = doc.pages.len(), "layout complete");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "printpdf reported warnings");
        }

        info!(bytes = output.len(), "document rendered");
        Ok(output)
    }

    fn layout(&self, document: &Document, title: &str, max_chars: usize) -> Vec<Line> {
        let mut lines = vec![
            Line {
                text: title.to_owned(),
                font: BuiltinFont::HelveticaBold,
                size: TITLE_SIZE_PT,
            },
            Line::blank(),
            Line::body(format!(
                "Document {}  |  version {}  |  {}",
                document.id, document.version, document.status
            )),
            Line::body(format!("Issued {}", document.created_at.format("%Y-%m-%d"))),
            Line::blank(),
        ];

        lines.extend(wrap_text(&document.content, max_chars).into_iter().map(Line::body));

        lines.push(Line::blank());
        lines.push(Line::bold("Signatures"));
        if document.signatures.is_empty() {
            lines.push(Line::body("(none)"));
        }
        for sig in &document.signatures {
            lines.push(Line::body(format!(
                "{}: {} on {}",
                sig.role,
                sig.signer_name,
                sig.signed_at.format("%Y-%m-%d %H:%M UTC")
            )));
        }
        let pending = document.missing_roles();
        if !pending.is_empty() && document.status != DocumentStatus::Cancelled {
            let names: Vec<&str> = pending.iter().map(|r| r.as_str()).collect();
            lines.push(Line::body(format!("Awaiting: {}", names.join(", "))));
        }

        if let Some(reference) = &document.reference_number {
            lines.push(Line::blank());
            lines.push(Line::bold(format!("Reference number: {reference}")));
            lines.push(Line::body(format!(
                "Sealed by {}. Quote the reference number to verify this document.",
                self.issuer
            )));
        }
        if document.superseded_by.is_some() {
            lines.push(Line::body("This document has been superseded by a newer version."));
        }
        lines
    }
}

/// `SALARY_CERTIFICATE` -> `Salary Certificate`.
fn display_title(document_type: &str) -> String {
    document_type
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let lower = w.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Wrap a multi-line string so that no line exceeds `max_width` characters.
///
/// Splits on existing newlines first, then word-wraps each paragraph. Words
/// longer than `max_width` are force-broken on character boundaries.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    let max_width = max_width.max(1);
    let mut result = Vec::new();

    for paragraph in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if word_len > max_width {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let chars: Vec<char> = word.chars().collect();
                let mut chunks = chars.chunks(max_width).peekable();
                while let Some(chunk) = chunks.next() {
                    if chunks.peek().is_some() {
                        result.push(chunk.iter().collect());
                    } else {
                        current = chunk.iter().collect();
                        current_len = chunk.len();
                    }
                }
            } else if current.is_empty() {
                current.push_str(word);
                current_len = word_len;
            } else if current_len + 1 + word_len <= max_width {
                current.push(' ');
                current.push_str(word);
                current_len += 1 + word_len;
            } else {
                result.push(std::mem::replace(&mut current, word.to_owned()));
                current_len = word_len;
            }
        }

        result.push(current);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use docseal_core::types::{Signature, SignerRole, Template};

    fn document(content: &str) -> Document {
        let template = Template {
            id: "salary-certificate".into(),
            name: "Salary Certificate".into(),
            document_type: "SALARY_CERTIFICATE".into(),
            body: String::new(),
            required_fields: Vec::new(),
            required_signer_roles: [SignerRole::new("HR_MANAGER")].into_iter().collect(),
        };
        Document::new_draft(&template, "EMP001", content.into(), "hr-1", None)
    }

    fn page_count(bytes: &[u8]) -> usize {
        lopdf::Document::load_mem(bytes)
            .expect("rendered PDF must parse")
            .get_pages()
            .len()
    }

    #[test]
    fn renders_a_single_page_draft() {
        let renderer = PdfRenderer::new(PaperSize::A4, "Docseal");
        let bytes = renderer
            .render_document(&document("This certifies Ahmed Ali earns 15000 SAR"))
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn long_content_spills_onto_more_pages() {
        let renderer = PdfRenderer::new(PaperSize::Letter, "Docseal");
        let content = "Paragraph of certificate text.\n".repeat(200);
        let bytes = renderer.render_document(&document(&content)).unwrap();
        assert!(page_count(&bytes) > 1);
    }

    #[test]
    fn sealed_layout_carries_reference_and_signatures() {
        let renderer = PdfRenderer::new(PaperSize::A4, "Docseal HR");
        let mut doc = document("body");
        doc.signatures.push(Signature {
            signer_id: "mgr-1".into(),
            signer_name: "Dr. Verify".into(),
            role: SignerRole::new("HR_MANAGER"),
            signed_at: Utc::now(),
        });
        doc.reference_number = Some("DS-0000-0000-0000-0".into());
        doc.status = DocumentStatus::Sealed;

        let lines = renderer.layout(&doc, "Salary Certificate", 80);
        let text: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert!(text.iter().any(|l| l.starts_with("HR_MANAGER: Dr. Verify")));
        assert!(text.contains(&"Reference number: DS-0000-0000-0000-0"));
        assert!(!text.iter().any(|l| l.starts_with("Awaiting")));
    }

    #[test]
    fn draft_layout_lists_pending_roles() {
        let renderer = PdfRenderer::new(PaperSize::A4, "Docseal");
        let lines = renderer.layout(&document("body"), "Salary Certificate", 80);
        assert!(lines.iter().any(|l| l.text == "Awaiting: HR_MANAGER"));
        assert!(!lines.iter().any(|l| l.text.starts_with("Reference number")));
    }

    #[test]
    fn titles_are_humanised() {
        assert_eq!(display_title("SALARY_CERTIFICATE"), "Salary Certificate");
        assert_eq!(display_title("NOC"), "Noc");
    }

    #[test]
    fn wrap_respects_width_and_paragraphs() {
        let wrapped = wrap_text("aaa bbb ccc\n\nddd", 7);
        assert_eq!(wrapped, ["aaa bbb", "ccc", "", "ddd"]);
    }

    #[test]
    fn wrap_breaks_long_words_on_char_boundaries() {
        let wrapped = wrap_text("ééééé x", 2);
        assert_eq!(wrapped, ["éé", "éé", "é", "x"]);
    }
}
