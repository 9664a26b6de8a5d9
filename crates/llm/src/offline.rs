//! Deterministic answers used when no LLM provider is reachable.
//!
//! The first topic whose keyword appears in the lowercased question wins,
//! so the table order matters.

/// One canned topic.
pub struct Topic {
    pub keywords: &'static [&'static str],
    pub answer: &'static str,
    pub citations: &'static [&'static str],
}

pub const TOPICS: &[Topic] = &[
    Topic {
        keywords: &["ctr", "threshold", "10000"],
        answer: "**Rule AML-R01 — CTR Threshold (BSA §1010.310)**\n\nLexinel flags any single transaction exceeding **$10,000** for Currency Transaction Report (CTR) filing. This includes cash deposits, withdrawals, and wire transfers. The rule also catches split transactions (structuring) across accounts within a 24-hour window.",
        citations: &["AML-R01", "BSA §1010.310"],
    },
    Topic {
        keywords: &["structur", "smurf"],
        answer: "**Rule AML-R02 — Structuring / Smurfing (FATF Rec. 10)**\n\nLexinel detects when ≥3 transactions to the same beneficiary occur within 24 hours, each below $2,000. This pattern indicates deliberate structuring to avoid CTR thresholds — a federal offense under 31 U.S.C. § 5324.",
        citations: &["AML-R02", "FATF Rec. 10"],
    },
    Topic {
        keywords: &["cross", "border", "international"],
        answer: "**Rule AML-R03 — Cross-Border Transactions (FinCEN 103.29)**\n\nAny international wire transfer exceeding **$5,000** is flagged for enhanced due diligence. High-risk jurisdictions (RU, KY, CH, BVI, PH) trigger immediate alert regardless of amount.",
        citations: &["AML-R03", "FinCEN 103.29"],
    },
    Topic {
        keywords: &["pii", "privacy", "gdpr", "data"],
        answer: "**Rule AML-R04 — PII Exposure Guard (GDPR Art. 5 + AMLD6)**\n\nLexinel verifies that all personally identifiable information (SSN, passport, email) is encrypted at rest in audit records. Unencrypted PII fields trigger an immediate compliance block and are flagged for remediation.",
        citations: &["AML-R04", "GDPR Art. 5"],
    },
    Topic {
        keywords: &["tax", "haven", "offshore"],
        answer: "**Rule AML-R05 — Tax Haven Routing (AMLD6 Art. 3(4))**\n\nTransactions routed through known tax havens (Cayman Islands, Switzerland, Luxembourg, BVI) exceeding **$3,000** are reviewed for potential layering. Lexinel checks SWIFT correspondent routes against the FATF high-risk jurisdiction list.",
        citations: &["AML-R05", "AMLD6 Art. 3(4)"],
    },
    Topic {
        keywords: &["sar", "suspicious"],
        answer: "**SAR Filing — Suspicious Activity Report**\n\nLexinel can auto-draft SARs for any violation scored CRITICAL. The draft includes: transaction ID, counterparties, amount, rule triggered, and an AI-generated narrative. SAR filing requires human confirmation in the Violation Nexus.",
        citations: &["31 CFR §1020.320"],
    },
];

pub const OVERVIEW: &str = "**Lexinel AML Compliance Assistant**\n\nI can answer questions about your active AML enforcement rules:\n\n• **AML-R01** — CTR threshold ($10,000+)\n• **AML-R02** — Structuring / smurfing detection\n• **AML-R03** — Cross-border transaction flags\n• **AML-R04** — PII encryption compliance\n• **AML-R05** — Tax haven jurisdiction routing\n\nYou can also ask about SAR filing, FATF recommendations, BSA requirements, or GDPR/AMLD6 obligations.";

/// Canned answer and citations for `question`.
pub fn respond(question: &str) -> (&'static str, &'static [&'static str]) {
    let q = question.to_lowercase();
    TOPICS
        .iter()
        .find(|t| t.keywords.iter().any(|k| q.contains(k)))
        .map(|t| (t.answer, t.citations))
        .unwrap_or((OVERVIEW, &[]))
}
