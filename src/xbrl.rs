//! Traditional XBRL instance parsing: contexts, units, and facts read from a
//! standalone XBRL instance document via `quick-xml`'s low-level `Reader`.
//!
//! Parsing is lenient by design — an unknown namespace prefix or a mismatched close
//! tag does not halt the walk, it is logged and the reader keeps going. This mirrors
//! [`crate::inline_xbrl`], which shares the same context/unit shape and reuses the
//! dimension-parsing helpers here rather than duplicating them, so traditional and
//! inline filings are never attributed by two diverging code paths.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{IngestError, Result};
use crate::model::{Context, Fact, Period, Unit, UnitExpr};

/// Everything [`crate::xbrl::parse_instance`] and [`crate::inline_xbrl::extract`]
/// produce: the three tables a filing's fact set is built from.
#[derive(Debug, Clone, Default)]
pub struct ParsedXbrl {
    pub contexts: Vec<Context>,
    pub units: Vec<Unit>,
    pub facts: Vec<Fact>,
}

/// Strips a namespace prefix off a raw tag/attribute name, e.g. `b"us-gaap:Assets"`
/// -> `"Assets"`.
pub(crate) fn local_name(name: &[u8]) -> &str {
    let s = std::str::from_utf8(name).unwrap_or("");
    match s.find(':') {
        Some(pos) => &s[pos + 1..],
        None => s,
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

pub(crate) fn attr(start: &BytesStart, key: &str) -> Option<String> {
    start
        .attributes()
        .filter_map(|a| a.ok())
        .find(|a| local_name(a.key.as_ref()) == key)
        .map(|a| decode(&a.value))
}

/// Parses a well-formed (or near-well-formed) XBRL instance document, recovering
/// from malformed individual events rather than aborting the whole parse.
pub fn parse_instance(xml: &str) -> Result<ParsedXbrl> {
    let mut reader = Reader::from_str(xml);
    let config = reader.config_mut();
    config.trim_text_start = true;
    config.trim_text_end = true;
    config.check_end_names = false;

    let mut result = ParsedXbrl::default();
    let mut seen_context_ids: HashMap<String, ()> = HashMap::new();

    loop {
        let event = match reader.read_event() {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "xbrl parse recovered from a malformed event, stopping walk");
                break;
            }
        };

        match event {
            Event::Eof => break,
            Event::Start(ref start) | Event::Empty(ref start) => {
                let local = local_name(start.name().as_ref()).to_string();
                if local == "context" {
                    let id = attr(start, "id").unwrap_or_default();
                    let is_empty = matches!(event, Event::Empty(_));
                    if seen_context_ids.contains_key(&id) {
                        if !is_empty {
                            read_context_body(&mut reader)?;
                        }
                        tracing::warn!(id, "duplicate context id, first occurrence kept");
                        continue;
                    }
                    match read_context(&mut reader, id.clone(), is_empty)? {
                        Some(context) => {
                            seen_context_ids.insert(id, ());
                            result.contexts.push(context);
                        }
                        None => tracing::warn!(id, "context has neither a valid instant nor start/end period, dropped"),
                    }
                } else if local == "unit" {
                    let id = attr(start, "id").unwrap_or_default();
                    let is_empty = matches!(event, Event::Empty(_));
                    if let Some(unit) = read_unit(&mut reader, id, is_empty)? {
                        result.units.push(unit);
                    }
                } else if let Some(context_ref) = attr(start, "contextRef") {
                    let is_nil = attr(start, "nil").as_deref() == Some("true");
                    let is_empty = matches!(event, Event::Empty(_));
                    let text = if is_empty {
                        String::new()
                    } else {
                        read_element_text(&mut reader)?
                    };
                    let concept = decode(start.name().as_ref());
                    let unit_ref = attr(start, "unitRef");
                    let decimals = attr(start, "decimals");
                    let precision = attr(start, "precision");
                    let normalized_value = if is_nil { None } else { text.trim().parse::<f64>().ok() };
                    result.facts.push(Fact {
                        concept,
                        value_text: text,
                        normalized_value,
                        context_ref,
                        unit_ref,
                        decimals,
                        precision,
                        is_nil,
                    });
                }
                // Any other element (unknown tag, no contextRef) is simply not a fact;
                // its children stream through the same top-level loop on later iterations.
            }
            _ => {}
        }
    }

    Ok(result)
}

/// Reads one `<context id="...">` element (already consumed as far as its opening
/// tag) into a [`Context`], or `None` if it carries neither a valid instant nor a
/// start/end pair. Shared between traditional and inline XBRL, since both house
/// contexts in the identical shape and no filer-specific override is applied here.
pub(crate) fn read_context(
    reader: &mut Reader<&[u8]>,
    id: String,
    is_empty: bool,
) -> Result<Option<Context>> {
    let body = if is_empty {
        ContextBody::default()
    } else {
        read_context_body(reader)?
    };
    Ok(body.period().map(|period| Context::new(id, body.entity, period, body.dimensions)))
}

/// Reads one `<unit id="...">` element into a [`Unit`], or `None` if it carries
/// neither a single measure nor a numerator/denominator pair.
pub(crate) fn read_unit(reader: &mut Reader<&[u8]>, id: String, is_empty: bool) -> Result<Option<Unit>> {
    let expr = if is_empty { None } else { read_unit_body(reader)? };
    Ok(expr.map(|expr| Unit { id, expr }))
}

#[derive(Default)]
struct ContextBody {
    entity: String,
    instant: Option<chrono::NaiveDate>,
    start_date: Option<chrono::NaiveDate>,
    end_date: Option<chrono::NaiveDate>,
    dimensions: HashMap<String, String>,
}

impl ContextBody {
    fn period(&self) -> Option<Period> {
        match (self.instant, self.start_date, self.end_date) {
            (Some(i), None, None) => Some(Period::Instant(i)),
            (None, Some(s), Some(e)) => Some(Period::Duration { start: s, end: e }),
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => None,
            _ => None,
        }
    }
}

fn parse_date(s: &str) -> Option<chrono::NaiveDate> {
    let trimmed = s.trim();
    chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            trimmed
                .split('T')
                .next()
                .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        })
}

/// Reads everything between a `<context>` start tag and its matching end tag,
/// scanning for `identifier`, `instant`, `startDate`/`endDate`, and `explicitMember`
/// wherever they occur beneath it (regardless of whether they sit under `segment` or
/// `scenario` — lenient by the same reasoning as the top-level walk).
fn read_context_body(reader: &mut Reader<&[u8]>) -> Result<ContextBody> {
    let mut body = ContextBody::default();
    let mut depth = 1i32;
    let mut current_local: Option<String> = None;
    let mut pending_dimension: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(IngestError::XmlError)?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) => {
                depth += 1;
                let local = local_name(e.name().as_ref()).to_string();
                if local == "explicitMember" {
                    pending_dimension = attr(e, "dimension");
                }
                current_local = Some(local);
            }
            Event::Empty(_) => {}
            Event::Text(ref t) => {
                let text = decode(t.as_ref());
                match current_local.as_deref() {
                    Some("identifier") => body.entity = text,
                    Some("instant") => body.instant = parse_date(&text),
                    Some("startDate") => body.start_date = parse_date(&text),
                    Some("endDate") => body.end_date = parse_date(&text),
                    Some("explicitMember") => {
                        if let Some(dim) = pending_dimension.take() {
                            body.dimensions.insert(dim, text);
                        }
                    }
                    _ => {}
                }
            }
            Event::End(_) => {
                depth -= 1;
                current_local = None;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    Ok(body)
}

/// Reads everything between a `<unit>` start tag and its matching end tag: either a
/// single `<measure>` or a `<divide>` with numerator/denominator measures.
fn read_unit_body(reader: &mut Reader<&[u8]>) -> Result<Option<UnitExpr>> {
    let mut depth = 1i32;
    let mut current_local: Option<String> = None;
    let mut in_numerator = false;
    let mut in_denominator = false;
    let mut measure: Option<String> = None;
    let mut numerator: Option<String> = None;
    let mut denominator: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(IngestError::XmlError)?;
        match event {
            Event::Eof => break,
            Event::Start(ref e) => {
                depth += 1;
                let local = local_name(e.name().as_ref()).to_string();
                match local.as_str() {
                    "unitNumerator" => in_numerator = true,
                    "unitDenominator" => in_denominator = true,
                    _ => {}
                }
                current_local = Some(local);
            }
            Event::Empty(_) => {}
            Event::Text(ref t) => {
                if current_local.as_deref() == Some("measure") {
                    let text = decode(t.as_ref());
                    if in_numerator {
                        numerator = Some(text);
                    } else if in_denominator {
                        denominator = Some(text);
                    } else {
                        measure = Some(text);
                    }
                }
            }
            Event::End(ref e) => {
                depth -= 1;
                let local = local_name(e.name().as_ref());
                if local == "unitNumerator" {
                    in_numerator = false;
                }
                if local == "unitDenominator" {
                    in_denominator = false;
                }
                current_local = None;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }

    if let (Some(n), Some(d)) = (numerator, denominator) {
        Ok(Some(UnitExpr::Divide { numerator: n, denominator: d }))
    } else {
        Ok(measure.map(UnitExpr::Measure))
    }
}

/// Reads the concatenated text content of an element up to its matching end tag,
/// ignoring any nested markup (XBRL fact values are occasionally escaped XHTML, which
/// arrives here as plain text rather than real child elements).
pub(crate) fn read_element_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut depth = 1i32;
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(IngestError::XmlError)?;
        match event {
            Event::Eof => break,
            Event::Start(_) => depth += 1,
            Event::Empty(_) => {}
            Event::Text(ref t) | Event::CData(ref t) => {
                text.push_str(&decode(t.as_ref()));
            }
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    Ok(text.trim().to_string())
}
