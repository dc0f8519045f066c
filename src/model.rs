//! Shared data model: the entities that flow between the locator, parser, attributor,
//! and serializer for a single filing.
//!
//! A `Filing`'s contexts/units/facts are owned exclusively by that filing's processing
//! scope — they are built during locate/parse, consumed by the serializer, and then
//! dropped. Nothing here is cached across filings within a worker.

use crate::config::FilingType;
use crate::error::{IngestError, Result};
use std::collections::HashMap;

/// A company known by its ticker and EDGAR-assigned CIK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub ticker: String,
    pub cik: String,
    pub display_name: String,
}

impl Company {
    /// Normalizes `ticker` to upper-case ASCII, as the data model requires.
    pub fn new(ticker: impl Into<String>, cik: String, display_name: String) -> Self {
        Self {
            ticker: ticker.into().to_ascii_uppercase(),
            cik,
            display_name,
        }
    }
}

/// One EDGAR submission by one issuer.
#[derive(Debug, Clone)]
pub struct Filing {
    pub filing_type: FilingType,
    pub accession_number: String,
    pub filing_date: chrono::NaiveDate,
    pub period_end_date: chrono::NaiveDate,
    pub primary_doc_url: String,
    pub instance_url: Option<String>,
}

impl Filing {
    pub fn new(
        filing_type: FilingType,
        accession_number: String,
        filing_date: chrono::NaiveDate,
        period_end_date: chrono::NaiveDate,
        primary_doc_url: String,
        instance_url: Option<String>,
    ) -> Result<Self> {
        if !is_accession_format(&accession_number) {
            return Err(IngestError::ParseError(format!(
                "malformed accession number: {accession_number}"
            )));
        }
        if period_end_date > filing_date {
            return Err(IngestError::ParseError(format!(
                "period_end_date {period_end_date} is after filing_date {filing_date}"
            )));
        }
        Ok(Self {
            filing_type,
            accession_number,
            filing_date,
            period_end_date,
            primary_doc_url,
            instance_url,
        })
    }
}

fn is_accession_format(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 20 {
        return false;
    }
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    digits(0..10) && bytes[10] == b'-' && digits(11..13) && bytes[13] == b'-' && digits(14..20)
}

/// A reporting period, scoped to one filing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    Instant(chrono::NaiveDate),
    Duration {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

/// A context: the entity/period/dimensions descriptor a fact is reported against.
#[derive(Debug, Clone)]
pub struct Context {
    pub id: String,
    pub entity: String,
    pub period: Period,
    /// dimension-concept -> member-concept
    pub dimensions: HashMap<String, String>,
}

impl Context {
    pub fn new(id: String, entity: String, period: Period, dimensions: HashMap<String, String>) -> Self {
        Self {
            id,
            entity,
            period,
            dimensions,
        }
    }

    /// The date used for sorting facts by period-end ascending in the serializer.
    pub fn period_end(&self) -> chrono::NaiveDate {
        match self.period {
            Period::Instant(d) => d,
            Period::Duration { end, .. } => end,
        }
    }

    pub fn label(&self) -> String {
        let base = match self.period {
            Period::Instant(d) => format!("Instant: {d}"),
            Period::Duration { start, end } => format!("Period: {start} to {end}"),
        };
        if self.dimensions.is_empty() {
            base
        } else {
            let segments: Vec<String> = self
                .dimensions
                .values()
                .map(|member| format!("Segment: {member}"))
                .collect();
            format!("{base} | {}", segments.join(" | "))
        }
    }
}

/// A measurement unit: a single measure, or a numerator/denominator pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitExpr {
    Measure(String),
    Divide { numerator: String, denominator: String },
}

#[derive(Debug, Clone)]
pub struct Unit {
    pub id: String,
    pub expr: UnitExpr,
}

impl Unit {
    pub fn label(&self) -> String {
        match &self.expr {
            UnitExpr::Measure(m) => m.clone(),
            UnitExpr::Divide { numerator, denominator } => format!("{numerator}/{denominator}"),
        }
    }
}

/// A single reported fact, bound to a context and optionally a unit.
#[derive(Debug, Clone)]
pub struct Fact {
    /// Namespaced concept name, e.g. `"us-gaap:Revenues"`.
    pub concept: String,
    /// The value exactly as reported; never reformatted.
    pub value_text: String,
    /// Parsed numeric normalization, when the value is numeric and well-formed.
    pub normalized_value: Option<f64>,
    pub context_ref: String,
    pub unit_ref: Option<String>,
    pub decimals: Option<String>,
    pub precision: Option<String>,
    /// True for `xsi:nil="true"` facts, retained with an empty value.
    pub is_nil: bool,
}

/// Where a filing's fiscal attribution came from, and how confident it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionSource {
    Registry,
    FilingEvidence,
    Derived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiscalPeriod {
    Q1,
    Q2,
    Q3,
    Annual,
}

impl FiscalPeriod {
    pub fn as_path_segment(&self) -> &'static str {
        match self {
            FiscalPeriod::Q1 => "Q1",
            FiscalPeriod::Q2 => "Q2",
            FiscalPeriod::Q3 => "Q3",
            FiscalPeriod::Annual => "annual",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FiscalAttribution {
    pub fiscal_year: i32,
    pub fiscal_period: FiscalPeriod,
    pub source: AttributionSource,
    /// In `[0, 1]`.
    pub confidence: f64,
    /// Set when filing evidence disagreed with a hard-invariant override.
    pub overridden: bool,
}

/// A canonically labeled section of extracted narrative text.
#[derive(Debug, Clone)]
pub struct Section {
    pub label: String,
    pub body: String,
}

#[derive(Debug, Clone, Default)]
pub struct TextDoc {
    pub sections: Vec<Section>,
}

/// Outcome of processing one filing or one ticker. Once sealed (returned from the
/// orchestrator/supervisor), never mutated.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub success: bool,
    pub artifact_paths: Vec<String>,
    pub error_kind: Option<String>,
    pub substituted_filing_type: Option<FilingType>,
    pub fiscal_attribution: Option<FiscalAttribution>,
}

impl Outcome {
    pub fn success(artifact_paths: Vec<String>, fiscal_attribution: FiscalAttribution) -> Self {
        Self {
            success: true,
            artifact_paths,
            error_kind: None,
            substituted_filing_type: None,
            fiscal_attribution: Some(fiscal_attribution),
        }
    }

    pub fn failure(error_kind: impl Into<String>) -> Self {
        Self {
            success: false,
            artifact_paths: Vec::new(),
            error_kind: Some(error_kind.into()),
            substituted_filing_type: None,
            fiscal_attribution: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn company_ticker_is_upper_cased() {
        let c = Company::new("msft", "0000789019".to_string(), "Microsoft".to_string());
        assert_eq!(c.ticker, "MSFT");
    }

    #[test]
    fn filing_rejects_malformed_accession() {
        let err = Filing::new(
            FilingType::TenK,
            "not-an-accession".to_string(),
            date(2024, 6, 30),
            date(2024, 6, 30),
            "https://example.com/doc.htm".to_string(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::ParseError(_)));
    }

    #[test]
    fn filing_rejects_period_end_after_filing_date() {
        let err = Filing::new(
            FilingType::TenK,
            "0000789019-24-000057".to_string(),
            date(2024, 1, 1),
            date(2024, 6, 30),
            "https://example.com/doc.htm".to_string(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::ParseError(_)));
    }

    #[test]
    fn filing_accepts_well_formed_accession() {
        let filing = Filing::new(
            FilingType::TenK,
            "0000789019-24-000057".to_string(),
            date(2024, 8, 1),
            date(2024, 6, 30),
            "https://example.com/doc.htm".to_string(),
            Some("https://example.com/instance.xml".to_string()),
        )
        .unwrap();
        assert_eq!(filing.accession_number, "0000789019-24-000057");
    }

    #[test]
    fn context_label_formats_instant() {
        let ctx = Context::new(
            "c1".to_string(),
            "0000789019".to_string(),
            Period::Instant(date(2024, 6, 30)),
            HashMap::new(),
        );
        assert_eq!(ctx.label(), "Instant: 2024-06-30");
    }

    #[test]
    fn context_label_formats_duration() {
        let ctx = Context::new(
            "c1".to_string(),
            "0000789019".to_string(),
            Period::Duration {
                start: date(2023, 7, 1),
                end: date(2024, 6, 30),
            },
            HashMap::new(),
        );
        assert_eq!(ctx.label(), "Period: 2023-07-01 to 2024-06-30");
    }
}
