//! The format detector: classifies a filing as traditional XBRL, inline XBRL, or
//! text-only, and hands back an ordered fallback list of strategies to try.
//!
//! The "duck-typed XBRL polymorphism" the source crate leans on is replaced here with
//! an explicit tagged variant, [`FactSource`], carrying exactly the evidence the
//! orchestrator needs to dispatch to [`crate::xbrl`] or [`crate::inline_xbrl`] without
//! re-sniffing the document.

use regex::Regex;
use std::sync::LazyLock;

/// Which extraction strategy produced (or should produce) a filing's fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactSource {
    /// A separate XBRL instance document was discovered alongside the primary HTML.
    TraditionalXbrl,
    /// Facts are tagged inline within the primary HTML document via `<ix:*>` elements.
    InlineXbrl,
    /// Neither was found; only the text artifact will be produced.
    TextOnly,
}

static IX_NAMESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)xmlns:ix\s*=\s*"[^"]*xbrl"#).unwrap());

static IX_ELEMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<ix:[a-zA-Z]").unwrap());

/// Classifies a filing given whether an auxiliary `*_htm.xml` instance was discovered
/// by the locator, and the raw bytes of the primary HTML document.
///
/// Returns the detected primary strategy plus the ordered fallback list (primary
/// first); if the primary parser fails, the orchestrator tries the next entry.
pub fn detect(has_xbrl_instance: bool, primary_html: &[u8]) -> (FactSource, Vec<FactSource>) {
    if has_xbrl_instance {
        return (
            FactSource::TraditionalXbrl,
            vec![FactSource::TraditionalXbrl, FactSource::InlineXbrl, FactSource::TextOnly],
        );
    }

    let text = String::from_utf8_lossy(primary_html);
    if IX_NAMESPACE.is_match(&text) || IX_ELEMENT.is_match(&text) {
        return (
            FactSource::InlineXbrl,
            vec![FactSource::InlineXbrl, FactSource::TextOnly],
        );
    }

    (FactSource::TextOnly, vec![FactSource::TextOnly])
}
