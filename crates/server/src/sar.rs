//! Suspicious Activity Report PDF rendering.
//!
//! Plain single-column layout in the standard Courier faces, so no font
//! embedding is needed. Long narratives flow onto extra pages.

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use lexinel_core::Violation;
use lexinel_llm::assistant::evidence_field;
use lexinel_llm::Narrative;
use lexinel_rules::explain::format_usd;

/// Narrative wrap width in characters.
pub const WRAP_COLUMNS: usize = 90;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_X: i64 = 45;
const MARGIN_TOP: i64 = 60;
const MARGIN_BOTTOM: i64 = 60;
const BODY_SIZE: i64 = 9;
const LINE_HEIGHT: i64 = 12;

#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("PDF encoding failed: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Style {
    Title,
    Heading,
    Body,
}

struct Line {
    text: String,
    style: Style,
}

impl Line {
    fn body(text: impl Into<String>) -> Self {
        Self { text: text.into(), style: Style::Body }
    }

    fn blank() -> Self {
        Self::body("")
    }
}

/// Render a SAR for `violation` with the given narrative.
pub fn render_sar(violation: &Violation, narrative: &Narrative, filed_at: DateTime<Utc>) -> Result<Vec<u8>, SarError> {
    let lines = layout(violation, narrative, filed_at);
    let pages = paginate(lines);
    build_pdf(&pages, &format!("SAR {}", violation.id))
}

/// Attachment file name for a record.
pub fn file_name(violation: &Violation) -> String {
    let id: String = violation
        .id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("SAR_{}.pdf", id)
}

// ── Layout ───────────────────────────────────────────────────────────

fn layout(v: &Violation, narrative: &Narrative, filed_at: DateTime<Utc>) -> Vec<Line> {
    let evidence = v.evidence_summary.as_deref().unwrap_or("");
    let tx_id = if v.transaction_id.is_empty() { v.id.as_str() } else { v.transaction_id.as_str() };
    let field = |label: &str, value: &str| Line::body(format!("{:<22}{}", format!("{}:", label), value));

    let mut lines = vec![
        Line { text: "SUSPICIOUS ACTIVITY REPORT (SAR)".into(), style: Style::Title },
        Line::body("FinCEN SAR draft - generated by Lexinel AML Sentinel"),
        Line::blank(),
        field("Report ID", &format!("SAR-{}", v.id)),
        field("Prepared", &filed_at.format("%Y-%m-%d %H:%M UTC").to_string()),
        field("Narrative source", &narrative.mode),
        field("Filing status", "DRAFT - requires human confirmation"),
        Line::blank(),
        Line { text: "PART I - SUBJECT TRANSACTION".into(), style: Style::Heading },
        field("Transaction ID", tx_id),
        field("Amount", &v.amount.map(|a| format!("${}", format_usd(a))).unwrap_or_else(|| "n/a".into())),
        field("Timestamp", if v.timestamp.is_empty() { "n/a" } else { v.timestamp.as_str() }),
        field("Originating account", evidence_field(evidence, "Orig").unwrap_or("n/a")),
        field("Beneficiary account", evidence_field(evidence, "Dest").unwrap_or("n/a")),
        field("Risk tier", v.risk.map(|r| r.as_str()).unwrap_or("UNRATED")),
        field("Rule", v.rule_id.as_deref().unwrap_or("n/a")),
        field("Regulatory clause", v.rule_clause.as_deref().unwrap_or("n/a")),
        field("Typology", v.label.as_deref().unwrap_or("n/a")),
        field("Review status", &format!("{:?}", v.review_status)),
    ];
    if let Some(account) = &v.frozen_account {
        lines.push(field("Frozen account", account));
    }
    if !evidence.is_empty() {
        for (i, chunk) in wrap(evidence, WRAP_COLUMNS - 22).into_iter().enumerate() {
            let label = if i == 0 { "Evidence:" } else { "" };
            lines.push(Line::body(format!("{:<22}{}", label, chunk)));
        }
    }

    if !v.detections.is_empty() {
        lines.push(Line::blank());
        lines.push(Line { text: "PART II - DETECTIONS".into(), style: Style::Heading });
        for d in &v.detections {
            lines.push(Line::body(format!(
                "- {} {} ({}) severity {}",
                d.rule_id, d.rule_label, d.clause, d.severity
            )));
        }
    }

    lines.push(Line::blank());
    lines.push(Line { text: "PART V - NARRATIVE".into(), style: Style::Heading });
    for paragraph in narrative.text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(Line::blank());
            continue;
        }
        lines.extend(wrap(paragraph, WRAP_COLUMNS).into_iter().map(Line::body));
    }
    lines
}

/// Greedy word wrap; words longer than `width` are split.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(width);
            out.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current.is_empty() { word.len() } else { current.chars().count() + 1 + word.len() };
        if needed > width && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn lines_per_page() -> usize {
    ((PAGE_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM) / LINE_HEIGHT) as usize
}

fn paginate(lines: Vec<Line>) -> Vec<Vec<Line>> {
    let per_page = lines_per_page();
    let mut pages = vec![Vec::new()];
    for line in lines {
        let full = pages.last().map_or(false, |p: &Vec<Line>| p.len() >= per_page);
        if full {
            pages.push(Vec::new());
        }
        if let Some(page) = pages.last_mut() {
            page.push(line);
        }
    }
    pages
}

/// Map text onto what the standard Type1 fonts can show.
fn pdf_text(text: &str) -> Vec<u8> {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '§' => out.push_str("Sec."),
            '→' => out.push_str("->"),
            '·' | '–' | '—' => out.push('-'),
            '×' => out.push('x'),
            '‘' | '’' => out.push('\''),
            '“' | '”' => out.push('"'),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out.into_bytes()
}

// ── PDF objects ──────────────────────────────────────────────────────

fn page_operations(lines: &[Line], page_no: usize, page_count: usize) -> Vec<Operation> {
    let mut ops = Vec::new();
    let mut y = PAGE_HEIGHT - MARGIN_TOP;
    for line in lines {
        if !line.text.is_empty() {
            let (font, size) = match line.style {
                Style::Title => ("F2", 14),
                Style::Heading => ("F2", 10),
                Style::Body => ("F1", BODY_SIZE),
            };
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
            ops.push(Operation::new("Td", vec![MARGIN_X.into(), y.into()]));
            ops.push(Operation::new("Tj", vec![Object::string_literal(pdf_text(&line.text))]));
            ops.push(Operation::new("ET", vec![]));
        }
        y -= if line.style == Style::Title { LINE_HEIGHT + 6 } else { LINE_HEIGHT };
    }

    let footer = format!("CONFIDENTIAL - 31 U.S.C. 5318(g)(2)    Page {} of {}", page_no, page_count);
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec!["F1".into(), 7.into()]));
    ops.push(Operation::new("Td", vec![MARGIN_X.into(), (MARGIN_BOTTOM / 2).into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(pdf_text(&footer))]));
    ops.push(Operation::new("ET", vec![]));
    ops
}

fn build_pdf(pages: &[Vec<Line>], title: &str) -> Result<Vec<u8>, SarError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for (i, lines) in pages.iter().enumerate() {
        let content = Content {
            operations: page_operations(lines, i + 1, pages.len()),
        };
        let encoded = content.encode().map_err(|e| SarError::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(pdf_text(title)),
        "Producer" => Object::string_literal("Lexinel AML Sentinel"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| SarError::Pdf(e.to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation() -> Violation {
        serde_json::from_value(serde_json::json!({
            "id": "TXN-8821",
            "transaction_id": "TXN-8821",
            "amount": 14500.0,
            "risk": "CRITICAL",
            "label": "CTR Threshold",
            "rule_id": "AML-R01",
            "rule_clause": "BSA §1010.310",
            "evidence_summary": "Orig: ACC-4401, Dest: ACC-9977, Amount: 14500.00, Type: TRANSFER",
            "timestamp": "2024-01-15 03:22"
        }))
        .unwrap()
    }

    fn narrative(text: String) -> Narrative {
        Narrative { text, mode: "offline".into() }
    }

    #[test]
    fn renders_a_pdf() {
        let bytes = render_sar(&violation(), &narrative("Short narrative.".into()), Utc::now()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn long_narratives_span_pages() {
        let text = "The subject moved funds through a sequence of accounts. ".repeat(200);
        let bytes = render_sar(&violation(), &narrative(text), Utc::now()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("alpha beta gamma delta epsilon", 11);
        assert_eq!(lines, vec!["alpha beta", "gamma delta", "epsilon"]);
        let lines = wrap(&"x".repeat(25), 10);
        assert_eq!(lines, vec!["x".repeat(10), "x".repeat(10), "x".repeat(5)]);
        assert!(wrap(&"word ".repeat(100), WRAP_COLUMNS).iter().all(|l| l.len() <= WRAP_COLUMNS));
    }

    #[test]
    fn non_latin_text_is_mapped() {
        assert_eq!(pdf_text("§1010.310 DE→US · 4×"), b"Sec.1010.310 DE->US - 4x".to_vec());
    }

    #[test]
    fn file_name_is_sanitized() {
        let mut v = violation();
        v.id = "TXN/88 21".into();
        assert_eq!(file_name(&v), "SAR_TXN_88_21.pdf");
    }
}
