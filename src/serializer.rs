//! The LLM-native serializer: a single UTF-8 text file per filing joining every fact
//! to its context and unit metadata, per spec.md §4.8.
//!
//! A pure function of parsed XBRL state and fiscal attribution — no floating-point
//! reformatting of `value_text`, no current-time stamps, no filesystem paths. Given
//! identical inputs it produces identical bytes, which is what lets the orchestrator
//! treat a sink `exists()` hit as a safe no-op rather than a potential staleness bug.

use std::collections::HashMap;

use crate::model::{Company, Context, Fact, Filing, FiscalAttribution, Unit};

/// Renders the full LLM-native artifact for one filing.
pub fn serialize(
    company: &Company,
    filing: &Filing,
    attribution: &FiscalAttribution,
    contexts: &[Context],
    units: &[Unit],
    facts: &[Fact],
) -> String {
    let mut out = String::new();

    write_header(&mut out, company, filing, attribution);
    write_context_dictionary(&mut out, contexts);
    write_unit_dictionary(&mut out, units);
    write_facts(&mut out, contexts, facts);

    out
}

fn write_header(out: &mut String, company: &Company, filing: &Filing, attribution: &FiscalAttribution) {
    out.push_str(&format!(
        "@DOCUMENT: {}-{}-{}\n",
        company.ticker,
        filing.filing_type.as_str(),
        filing.period_end_date
    ));
    out.push_str(&format!("@FILING_DATE: {}\n", filing.filing_date));
    out.push_str(&format!("@COMPANY: {}\n", company.display_name));
    out.push_str(&format!("@CIK: {}\n", company.cik));
    out.push_str(&format!("@FISCAL_YEAR: {}\n", attribution.fiscal_year));
    out.push_str(&format!(
        "@FISCAL_PERIOD: {}\n\n",
        attribution.fiscal_period.as_path_segment()
    ));
}

fn write_context_dictionary(out: &mut String, contexts: &[Context]) {
    out.push_str("@DATA_DICTIONARY: CONTEXTS\n");
    let mut sorted: Vec<&Context> = contexts.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    for context in sorted {
        out.push_str(&format!("@CONTEXT_DEF: {} | {}\n", context.id, context.label()));
    }
    out.push('\n');
}

fn write_unit_dictionary(out: &mut String, units: &[Unit]) {
    out.push_str("@DATA_DICTIONARY: UNITS\n");
    let mut sorted: Vec<&Unit> = units.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    for unit in sorted {
        out.push_str(&format!("@UNIT_DEF: {} | {}\n", unit.id, unit.label()));
    }
    out.push('\n');
}

fn write_facts(out: &mut String, contexts: &[Context], facts: &[Fact]) {
    out.push_str("@FACTS\n\n");

    let context_by_id: HashMap<&str, &Context> =
        contexts.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut ordered: Vec<&Fact> = facts.iter().collect();
    ordered.sort_by(|a, b| {
        a.concept
            .cmp(&b.concept)
            .then_with(|| period_end_of(&context_by_id, a).cmp(&period_end_of(&context_by_id, b)))
            .then_with(|| a.context_ref.cmp(&b.context_ref))
    });

    for fact in ordered {
        if !context_by_id.contains_key(fact.context_ref.as_str()) {
            tracing::warn!(
                concept = %fact.concept,
                context_ref = %fact.context_ref,
                "fact references a context not present in this filing's context table, skipping"
            );
            continue;
        }

        out.push_str(&format!("@CONCEPT: {}\n", fact.concept));
        out.push_str(&format!("@VALUE: {}\n", fact.value_text));
        if let Some(normalized) = fact.normalized_value {
            out.push_str(&format!("@NORMALIZED: {normalized}\n"));
        }
        if let Some(unit_ref) = &fact.unit_ref {
            out.push_str(&format!("@UNIT_REF: {unit_ref}\n"));
        }
        if let Some(decimals) = &fact.decimals {
            out.push_str(&format!("@DECIMALS: {decimals}\n"));
        }
        out.push_str(&format!("@CONTEXT_REF: {}\n\n", fact.context_ref));
    }
}

fn period_end_of(context_by_id: &HashMap<&str, &Context>, fact: &Fact) -> chrono::NaiveDate {
    context_by_id
        .get(fact.context_ref.as_str())
        .map(|c| c.period_end())
        .unwrap_or(chrono::NaiveDate::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FilingType;
    use crate::model::{Period, UnitExpr};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> (Company, Filing, FiscalAttribution, Vec<Context>, Vec<Unit>, Vec<Fact>) {
        let company = Company::new("MSFT", "0000789019".to_string(), "Microsoft Corp".to_string());
        let filing = Filing::new(
            FilingType::TenQ,
            "0000789019-23-000123".to_string(),
            date(2023, 10, 24),
            date(2023, 9, 30),
            "https://example.com/doc.htm".to_string(),
            Some("https://example.com/instance.xml".to_string()),
        )
        .unwrap();
        let attribution = FiscalAttribution {
            fiscal_year: 2024,
            fiscal_period: crate::model::FiscalPeriod::Q1,
            source: crate::model::AttributionSource::Registry,
            confidence: 1.0,
            overridden: false,
        };
        let contexts = vec![
            Context::new("c1".to_string(), "789019".to_string(), Period::Instant(date(2023, 9, 30)), Default::default()),
            Context::new(
                "c2".to_string(),
                "789019".to_string(),
                Period::Duration { start: date(2023, 7, 1), end: date(2023, 9, 30) },
                Default::default(),
            ),
        ];
        let units = vec![Unit { id: "usd".to_string(), expr: UnitExpr::Measure("iso4217:USD".to_string()) }];
        let facts = vec![
            Fact {
                concept: "us-gaap:Assets".to_string(),
                value_text: "1000000".to_string(),
                normalized_value: Some(1_000_000.0),
                context_ref: "c1".to_string(),
                unit_ref: Some("usd".to_string()),
                decimals: Some("-6".to_string()),
                precision: None,
                is_nil: false,
            },
            Fact {
                concept: "us-gaap:Revenues".to_string(),
                value_text: "500000".to_string(),
                normalized_value: Some(500_000.0),
                context_ref: "c2".to_string(),
                unit_ref: Some("usd".to_string()),
                decimals: Some("-6".to_string()),
                precision: None,
                is_nil: false,
            },
        ];
        (company, filing, attribution, contexts, units, facts)
    }

    #[test]
    fn header_carries_required_fields() {
        let (company, filing, attribution, contexts, units, facts) = sample();
        let out = serialize(&company, &filing, &attribution, &contexts, &units, &facts);
        assert!(out.contains("@DOCUMENT: MSFT-10-Q-2023-09-30"));
        assert!(out.contains("@FISCAL_YEAR: 2024"));
        assert!(out.contains("@FISCAL_PERIOD: Q1"));
    }

    #[test]
    fn facts_are_grouped_alphabetically_by_concept() {
        let (company, filing, attribution, contexts, units, facts) = sample();
        let out = serialize(&company, &filing, &attribution, &contexts, &units, &facts);
        let assets_pos = out.find("@CONCEPT: us-gaap:Assets").unwrap();
        let revenues_pos = out.find("@CONCEPT: us-gaap:Revenues").unwrap();
        assert!(assets_pos < revenues_pos);
    }

    #[test]
    fn fact_referencing_missing_context_is_dropped() {
        let (company, filing, attribution, contexts, units, mut facts) = sample();
        facts.push(Fact {
            concept: "us-gaap:Liabilities".to_string(),
            value_text: "1".to_string(),
            normalized_value: Some(1.0),
            context_ref: "does-not-exist".to_string(),
            unit_ref: Some("usd".to_string()),
            decimals: None,
            precision: None,
            is_nil: false,
        });
        let out = serialize(&company, &filing, &attribution, &contexts, &units, &facts);
        assert!(!out.contains("us-gaap:Liabilities"));
    }

    #[test]
    fn serialization_is_deterministic() {
        let (company, filing, attribution, contexts, units, facts) = sample();
        let first = serialize(&company, &filing, &attribution, &contexts, &units, &facts);
        let second = serialize(&company, &filing, &attribution, &contexts, &units, &facts);
        assert_eq!(first, second);
    }

    #[test]
    fn context_dictionary_renders_instant_and_duration_labels() {
        let (company, filing, attribution, contexts, units, facts) = sample();
        let out = serialize(&company, &filing, &attribution, &contexts, &units, &facts);
        assert!(out.contains("@CONTEXT_DEF: c1 | Instant: 2023-09-30"));
        assert!(out.contains("@CONTEXT_DEF: c2 | Period: 2023-07-01 to 2023-09-30"));
    }
}
