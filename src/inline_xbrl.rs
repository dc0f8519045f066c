//! Inline XBRL (iXBRL) extraction: the same context/unit/fact tables as
//! [`crate::xbrl`], read instead from `<ix:*>` elements embedded inside an HTML
//! filing.
//!
//! Contexts and units are housed in exactly the same shape the traditional instance
//! uses, so [`crate::xbrl::read_context`] and [`crate::xbrl::read_unit`] are reused
//! verbatim here rather than duplicated, giving every filer the same extraction path
//! regardless of ticker. `scraper` locates the hidden `display:none` block that
//! usually carries the definitions; `quick-xml`'s lenient `Reader` does the actual
//! tag-level walk, since the definitions and facts are still XML-shaped even though
//! the surrounding document is HTML.

use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::Event;
use scraper::Html;

use crate::error::Result;
use crate::model::{Fact, Unit};
use crate::xbrl::{ParsedXbrl, attr, local_name, read_context, read_element_text, read_unit};

/// Extracts contexts, units, and facts from an inline-XBRL HTML document.
///
/// If a hidden `display:none` block carrying `<ix:header>`/`<ix:resources>` is found,
/// contexts and units are read from it alone; otherwise the whole document is scanned,
/// covering older filings where the definitions sit inline without a hidden wrapper.
pub fn extract(html: &str) -> Result<ParsedXbrl> {
    let document = Html::parse_document(html);
    let hidden_block = find_hidden_block(&document);
    let definitions_source = hidden_block.as_deref().unwrap_or(html);

    let mut contexts = Vec::new();
    let mut units = Vec::new();
    read_contexts_and_units(definitions_source, &mut contexts, &mut units);

    let facts = read_facts(html)?;

    Ok(ParsedXbrl { contexts, units, facts })
}

/// Locates the element that carries the non-displayed iXBRL definitions: a
/// `display:none` container whose serialized content mentions `ix:header` or
/// `ix:resources`. Returns its inner HTML as a string so the caller can reparse just
/// that region with the XML reader.
fn find_hidden_block(document: &Html) -> Option<String> {
    for node in document.tree.root().descendants() {
        let element = match node.value().as_element() {
            Some(el) => el,
            None => continue,
        };
        let style = element.attr("style").unwrap_or("");
        let hides_content = style
            .split(';')
            .any(|decl| {
                let mut parts = decl.splitn(2, ':');
                matches!(
                    (parts.next().map(str::trim), parts.next().map(str::trim)),
                    (Some(p), Some(v)) if p.eq_ignore_ascii_case("display") && v.eq_ignore_ascii_case("none")
                )
            });
        if !hides_content {
            continue;
        }
        let inner: String = node
            .descendants()
            .filter_map(|n| n.value().as_text().map(|t| t.to_string()))
            .collect::<Vec<_>>()
            .join(" ");
        let has_definitions = node.descendants().any(|n| {
            n.value()
                .as_element()
                .map(|el| el.name() == "ix:header" || el.name() == "ix:resources")
                .unwrap_or(false)
        });
        if has_definitions || inner.to_ascii_lowercase().contains("ix:header") {
            return Some(scraper::ElementRef::wrap(node)?.html());
        }
    }
    None
}

/// Scans `xml` with the same lenient reader [`crate::xbrl::parse_instance`] uses,
/// picking out `context`/`unit` elements only. Shared routine so traditional and
/// inline XBRL never drift in how a context or unit is built.
fn read_contexts_and_units(xml: &str, contexts: &mut Vec<crate::model::Context>, units: &mut Vec<Unit>) {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text_start = true;
    config.trim_text_end = true;
    config.check_end_names = false;

    let mut seen_context_ids: HashMap<String, ()> = HashMap::new();

    loop {
        let event = match reader.read_event() {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "inline xbrl definitions scan recovered from a malformed event, stopping");
                break;
            }
        };
        match event {
            Event::Eof => break,
            Event::Start(ref start) | Event::Empty(ref start) => {
                let local = local_name(start.name().as_ref()).to_string();
                let is_empty = matches!(event, Event::Empty(_));
                if local == "context" {
                    let id = attr(start, "id").unwrap_or_default();
                    if seen_context_ids.contains_key(&id) {
                        tracing::warn!(id, "duplicate context id in inline xbrl, first occurrence kept");
                        continue;
                    }
                    match read_context(&mut reader, id.clone(), is_empty) {
                        Ok(Some(context)) => {
                            seen_context_ids.insert(id, ());
                            contexts.push(context);
                        }
                        Ok(None) => tracing::warn!(id, "inline xbrl context missing a usable period, dropped"),
                        Err(e) => tracing::warn!(error = %e, "failed reading inline xbrl context body"),
                    }
                } else if local == "unit" {
                    let id = attr(start, "id").unwrap_or_default();
                    match read_unit(&mut reader, id.clone(), is_empty) {
                        Ok(Some(unit)) => units.push(unit),
                        Ok(None) => tracing::warn!(id, "inline xbrl unit missing a usable measure, dropped"),
                        Err(e) => tracing::warn!(error = %e, "failed reading inline xbrl unit body"),
                    }
                }
            }
            _ => {}
        }
    }
}

/// One `<ix:continuation id="..." continuedAt="...">` fragment, chained to build up a
/// fact's full text when the filer splits a long value across several elements.
struct Continuation {
    text: String,
    continued_at: Option<String>,
}

/// Walks the whole document once, collecting every `<ix:nonNumeric>`,
/// `<ix:nonFraction>`, and `<ix:fraction>` element as a [`Fact`], resolving
/// `continuedAt` chains and applying `scale`/`sign`/`format` to numeric values.
fn read_facts(html: &str) -> Result<Vec<Fact>> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text_start = true;
    config.trim_text_end = true;
    config.check_end_names = false;

    let mut continuations: HashMap<String, Continuation> = HashMap::new();
    let mut pending: Vec<PendingFact> = Vec::new();

    loop {
        let event = match reader.read_event() {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "inline xbrl fact scan recovered from a malformed event, stopping");
                break;
            }
        };
        match event {
            Event::Eof => break,
            Event::Start(ref start) | Event::Empty(ref start) => {
                let local = local_name(start.name().as_ref()).to_string();
                let is_empty = matches!(event, Event::Empty(_));
                match local.as_str() {
                    "nonNumeric" | "nonFraction" | "fraction" => {
                        let concept = attr(start, "name").unwrap_or_default();
                        let context_ref = match attr(start, "contextRef") {
                            Some(c) => c,
                            None => {
                                if !is_empty {
                                    let _ = read_element_text(&mut reader);
                                }
                                continue;
                            }
                        };
                        let unit_ref = attr(start, "unitRef");
                        let decimals = attr(start, "decimals");
                        let scale = attr(start, "scale");
                        let sign = attr(start, "sign");
                        let format = attr(start, "format");
                        let continued_at = attr(start, "continuedAt");
                        let is_nil = attr(start, "nil").as_deref() == Some("true");
                        let text = if is_empty {
                            String::new()
                        } else {
                            read_element_text(&mut reader)?
                        };
                        pending.push(PendingFact {
                            kind: local,
                            concept,
                            context_ref,
                            unit_ref,
                            decimals,
                            scale,
                            sign,
                            format,
                            text,
                            continued_at,
                            is_nil,
                        });
                    }
                    "continuation" => {
                        let id = attr(start, "id").unwrap_or_default();
                        let continued_at = attr(start, "continuedAt");
                        let text = if is_empty {
                            String::new()
                        } else {
                            read_element_text(&mut reader)?
                        };
                        if !id.is_empty() {
                            continuations.insert(id, Continuation { text, continued_at });
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    Ok(pending
        .into_iter()
        .map(|p| p.resolve(&continuations))
        .collect())
}

struct PendingFact {
    kind: String,
    concept: String,
    context_ref: String,
    unit_ref: Option<String>,
    decimals: Option<String>,
    scale: Option<String>,
    sign: Option<String>,
    format: Option<String>,
    text: String,
    continued_at: Option<String>,
    is_nil: bool,
}

impl PendingFact {
    fn resolve(self, continuations: &HashMap<String, Continuation>) -> Fact {
        let mut value_text = self.text;
        let mut next = self.continued_at;
        let mut hops = 0;
        while let Some(id) = next {
            if hops > 64 {
                tracing::warn!(id, "ix:continuation chain exceeded 64 hops, truncating");
                break;
            }
            match continuations.get(&id) {
                Some(c) => {
                    value_text.push_str(&c.text);
                    next = c.continued_at.clone();
                }
                None => break,
            }
            hops += 1;
        }

        let normalized_value = if self.is_nil || self.kind == "nonNumeric" {
            None
        } else {
            normalize_numeric(&value_text, self.format.as_deref(), self.scale.as_deref(), self.sign.as_deref())
        };

        Fact {
            concept: self.concept,
            value_text,
            normalized_value,
            context_ref: self.context_ref,
            unit_ref: self.unit_ref,
            decimals: self.decimals,
            precision: None,
            is_nil: self.is_nil,
        }
    }
}

/// Applies iXBRL's display-to-value transform: strip formatting punctuation per
/// `format` (only the common `ixt:num-dot-decimal`/`ixt:num-comma-decimal` variants
/// are recognized; anything else falls back to a plain numeric parse), multiply by
/// `10^scale`, and flip the sign when `sign="-"`.
fn normalize_numeric(raw: &str, format: Option<&str>, scale: Option<&str>, sign: Option<&str>) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let is_comma_decimal = format
        .map(|f| f.to_ascii_lowercase())
        .map(|f| f.contains("comma-decimal") || f.contains("comma-sign"))
        .unwrap_or(false);

    let mut cleaned = String::with_capacity(trimmed.len());
    let mut negative_paren = false;
    for ch in trimmed.chars() {
        match ch {
            '(' => negative_paren = true,
            ')' => {}
            '%' | ' ' | '\u{a0}' => {}
            ',' if !is_comma_decimal => {}
            ',' if is_comma_decimal => cleaned.push('.'),
            '.' if is_comma_decimal => {}
            other => cleaned.push(other),
        }
    }

    let mut value: f64 = cleaned.parse().ok()?;
    if negative_paren {
        value = -value.abs();
    }
    if sign == Some("-") {
        value = -value;
    }
    if let Some(scale) = scale.and_then(|s| s.parse::<i32>().ok()) {
        value *= 10f64.powi(scale);
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIDDEN_BLOCK_SAMPLE: &str = r#"<html xmlns:ix="http://www.xbrl.org/2013/inlineXBRL">
<body>
<div style="display:none">
  <ix:header>
    <ix:resources>
      <context id="c1">
        <entity><identifier>0000789019</identifier></entity>
        <period><instant>2024-06-30</instant></period>
      </context>
      <unit id="usd"><measure>iso4217:USD</measure></unit>
    </ix:resources>
  </ix:header>
</div>
<p>Total assets were <ix:nonFraction name="us-gaap:Assets" contextRef="c1" unitRef="usd" decimals="-6" scale="6">1,000</ix:nonFraction> million dollars.</p>
<p><ix:nonNumeric name="dei:EntityRegistrantName" contextRef="c1">Example Corp</ix:nonNumeric></p>
</body>
</html>"#;

    #[test]
    fn extracts_context_and_unit_from_hidden_block() {
        let parsed = extract(HIDDEN_BLOCK_SAMPLE).unwrap();
        assert_eq!(parsed.contexts.len(), 1);
        assert_eq!(parsed.units.len(), 1);
        assert_eq!(parsed.contexts[0].id, "c1");
    }

    #[test]
    fn non_fraction_scale_and_display_value_are_both_retained() {
        let parsed = extract(HIDDEN_BLOCK_SAMPLE).unwrap();
        let assets = parsed.facts.iter().find(|f| f.concept == "us-gaap:Assets").unwrap();
        assert_eq!(assets.value_text, "1,000");
        assert_eq!(assets.normalized_value, Some(1_000_000_000.0));
    }

    #[test]
    fn non_numeric_fact_has_no_normalization() {
        let parsed = extract(HIDDEN_BLOCK_SAMPLE).unwrap();
        let name = parsed.facts.iter().find(|f| f.concept == "dei:EntityRegistrantName").unwrap();
        assert_eq!(name.value_text, "Example Corp");
        assert!(name.normalized_value.is_none());
    }

    #[test]
    fn missing_hidden_block_falls_back_to_scanning_whole_document() {
        let html = r#"<html xmlns:ix="http://www.xbrl.org/2013/inlineXBRL">
<body>
<context id="c1"><entity><identifier>X</identifier></entity><period><instant>2023-12-31</instant></period></context>
<unit id="usd"><measure>iso4217:USD</measure></unit>
<p><ix:nonFraction name="us-gaap:Revenues" contextRef="c1" unitRef="usd" decimals="-3">500</ix:nonFraction></p>
</body>
</html>"#;
        let parsed = extract(html).unwrap();
        assert_eq!(parsed.contexts.len(), 1);
        assert_eq!(parsed.facts.len(), 1);
    }

    #[test]
    fn continuation_chain_is_concatenated_in_document_order() {
        let html = r#"<html xmlns:ix="http://www.xbrl.org/2013/inlineXBRL">
<body>
<context id="c1"><entity><identifier>X</identifier></entity><period><instant>2023-12-31</instant></period></context>
<p><ix:nonNumeric name="us-gaap:Description" contextRef="c1" continuedAt="part2">Hello </ix:nonNumeric></p>
<ix:continuation id="part2" continuedAt="part3">World</ix:continuation>
<ix:continuation id="part3">!</ix:continuation>
</body>
</html>"#;
        let parsed = extract(html).unwrap();
        let fact = parsed.facts.iter().find(|f| f.concept == "us-gaap:Description").unwrap();
        assert_eq!(fact.value_text, "Hello World!");
    }

    #[test]
    fn negative_value_in_parens_is_normalized_negative() {
        let value = normalize_numeric("(1,234)", None, None, None);
        assert_eq!(value, Some(-1234.0));
    }

    #[test]
    fn sign_attribute_flips_an_otherwise_positive_display_value() {
        let value = normalize_numeric("500", None, None, Some("-"));
        assert_eq!(value, Some(-500.0));
    }
}
