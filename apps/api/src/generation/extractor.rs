//! Response extraction — recovers the document payload from free-form model text.
//!
//! Three tiers, tried in order:
//! 1. text between the sentinel tags (the prompt always asks for them),
//! 2. the whole response, if it carries the LaTeX document signature,
//! 3. the whole response, flagged as low confidence.
//!
//! Pure string slicing. No LaTeX or schema validation happens here.

use serde::Serialize;

/// An opening/closing marker pair the model is told to wrap its answer in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinels {
    pub open: &'static str,
    pub close: &'static str,
}

pub const GENERATE_TAGS: Sentinels = Sentinels {
    open: "<GENERATE>",
    close: "</GENERATE>",
};

pub const ANALYSIS_TAGS: Sentinels = Sentinels {
    open: "<ANALYSIS>",
    close: "</ANALYSIS>",
};

const DOCUMENT_CLASS_MARKER: &str = "\\documentclass";
const BEGIN_DOCUMENT_MARKER: &str = "\\begin{document}";

/// Which tier produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionKind {
    Tagged,
    FormatSignature,
    LowConfidence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Trimmed text strictly between the sentinels.
    Tagged(String),
    /// No sentinels, but the trimmed response looks like a LaTeX document.
    FormatSignature(String),
    /// Neither sentinels nor a document signature; trimmed response, unmodified.
    LowConfidence(String),
}

impl Extraction {
    pub fn kind(&self) -> ExtractionKind {
        match self {
            Extraction::Tagged(_) => ExtractionKind::Tagged,
            Extraction::FormatSignature(_) => ExtractionKind::FormatSignature,
            Extraction::LowConfidence(_) => ExtractionKind::LowConfidence,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Extraction::Tagged(text)
            | Extraction::FormatSignature(text)
            | Extraction::LowConfidence(text) => text,
        }
    }

    /// The document text, or `None` for a low-confidence extraction.
    pub fn into_document(self) -> Option<String> {
        match self {
            Extraction::Tagged(text) | Extraction::FormatSignature(text) => Some(text),
            Extraction::LowConfidence(_) => None,
        }
    }
}

/// Extracts a generated résumé using the `<GENERATE>` sentinels.
pub fn extract(raw: &str) -> Extraction {
    extract_with(raw, GENERATE_TAGS)
}

pub fn extract_with(raw: &str, sentinels: Sentinels) -> Extraction {
    if let Some(inner) = between_tags(raw, sentinels) {
        return Extraction::Tagged(inner.trim().to_string());
    }

    let trimmed = raw.trim();
    if has_document_signature(trimmed) {
        Extraction::FormatSignature(trimmed.to_string())
    } else {
        Extraction::LowConfidence(trimmed.to_string())
    }
}

/// Single pass: first opening tag, then the first closing tag after it.
fn between_tags(raw: &str, sentinels: Sentinels) -> Option<&str> {
    let start = raw.find(sentinels.open)? + sentinels.open.len();
    let len = raw[start..].find(sentinels.close)?;
    Some(&raw[start..start + len])
}

fn has_document_signature(text: &str) -> bool {
    text.contains(DOCUMENT_CLASS_MARKER) && text.contains(BEGIN_DOCUMENT_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\\documentclass{article}\n\\begin{document}\nHello\n\\end{document}";

    #[test]
    fn test_tagged_response_returns_inner_text_without_tags() {
        let raw = format!("<GENERATE>{DOC}</GENERATE>");
        let extraction = extract(&raw);
        assert_eq!(extraction, Extraction::Tagged(DOC.to_string()));
        assert!(!extraction.text().contains("<GENERATE>"));
        assert!(!extraction.text().contains("</GENERATE>"));
    }

    #[test]
    fn test_surrounding_whitespace_and_chatter_do_not_change_result() {
        let variants = [
            format!("<GENERATE>{DOC}</GENERATE>"),
            format!("  <GENERATE>\n\n{DOC}\n  </GENERATE>\n"),
            format!("Sure! Here is your resume:\n<GENERATE>\t{DOC} </GENERATE>\nGood luck."),
        ];
        for raw in &variants {
            assert_eq!(extract(raw), Extraction::Tagged(DOC.to_string()), "{raw:?}");
        }
    }

    #[test]
    fn test_extraction_is_single_pass() {
        let raw = "<GENERATE>outer <GENERATE>inner</GENERATE> tail</GENERATE>";
        assert_eq!(
            extract(raw),
            Extraction::Tagged("outer <GENERATE>inner".to_string())
        );

        // Re-extracting text that merely mentions a tag must not strip again.
        let once = extract("<GENERATE>uses the \\verb|<GENERATE>| tag</GENERATE>");
        assert_eq!(once.text(), "uses the \\verb|<GENERATE>| tag");
    }

    #[test]
    fn test_signature_fallback_returns_trimmed_raw_text() {
        let raw = format!("\n\n{DOC}\n");
        assert_eq!(extract(&raw), Extraction::FormatSignature(DOC.to_string()));
    }

    #[test]
    fn test_signature_requires_both_markers() {
        let raw = "\\documentclass{article} but no body marker";
        assert_eq!(extract(raw).kind(), ExtractionKind::LowConfidence);
    }

    #[test]
    fn test_unclosed_tag_falls_through_to_signature_check() {
        let raw = format!("<GENERATE>{DOC}");
        assert_eq!(
            extract(&raw),
            Extraction::FormatSignature(format!("<GENERATE>{DOC}"))
        );
    }

    #[test]
    fn test_closing_tag_before_opening_is_ignored() {
        let raw = "</GENERATE> nothing useful <GENERATE>";
        assert_eq!(extract(raw).kind(), ExtractionKind::LowConfidence);
    }

    #[test]
    fn test_low_confidence_is_not_a_document() {
        let extraction = extract("  I'm sorry, I can't help with that.  ");
        assert_eq!(
            extraction,
            Extraction::LowConfidence("I'm sorry, I can't help with that.".to_string())
        );
        assert!(extraction.into_document().is_none());
    }

    #[test]
    fn test_custom_sentinels() {
        let raw = "<ANALYSIS> needs Rust </ANALYSIS>";
        assert_eq!(
            extract_with(raw, ANALYSIS_TAGS),
            Extraction::Tagged("needs Rust".to_string())
        );
        assert_eq!(extract(raw).kind(), ExtractionKind::LowConfidence);
    }
}
