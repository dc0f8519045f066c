//! Fiscal-period attribution: computing `(fiscal_year, fiscal_period)` for a filing
//! under heterogeneous corporate calendars, and never producing `"Q4"`.
//!
//! Resolution order is registry lookup, then `dei:*` filing evidence, then a
//! December-fiscal-year-end heuristic — with a hard invariant applied last that forces
//! `annual` for 10-K/20-F regardless of what the earlier steps concluded.

use crate::config::FilingType;
use crate::model::{AttributionSource, FiscalAttribution, FiscalPeriod};
use crate::registry::FiscalRegistry;
use chrono::{Datelike, NaiveDate};

/// `dei:DocumentFiscalYearFocus` / `dei:DocumentFiscalPeriodFocus` facts pulled from a
/// parsed filing, when present. Populated by the orchestrator from the fact table
/// before calling [`attribute`].
#[derive(Debug, Clone, Default)]
pub struct DeiEvidence {
    pub fiscal_year_focus: Option<i32>,
    pub fiscal_period_focus: Option<String>,
}

impl DeiEvidence {
    /// Scans a filing's parsed facts for `dei:DocumentFiscalYearFocus` and
    /// `dei:DocumentFiscalPeriodFocus`, ignoring any namespace prefix other than
    /// `dei` so a differently-prefixed taxonomy import still matches.
    pub fn from_facts(facts: &[crate::model::Fact]) -> Self {
        let mut evidence = Self::default();
        for fact in facts {
            match fact.concept.as_str() {
                "dei:DocumentFiscalYearFocus" => {
                    evidence.fiscal_year_focus = fact.value_text.trim().parse().ok();
                }
                "dei:DocumentFiscalPeriodFocus" => {
                    evidence.fiscal_period_focus = Some(fact.value_text.trim().to_string());
                }
                _ => {}
            }
        }
        evidence
    }
}

/// Classifies `period_end` into a `(fiscal_year, fiscal_period)` pair against a
/// company whose fiscal year ends in `fye_month` (1-12), using ±1 month tolerance
/// around the four quarter-boundary anchors.
fn classify(period_end: NaiveDate, fye_month: u32) -> (i32, FiscalPeriod) {
    let month = period_end.month() as i32;
    let offset = (month - fye_month as i32).rem_euclid(12);
    let period = match offset {
        11 | 0 | 1 => FiscalPeriod::Annual,
        2 | 3 | 4 => FiscalPeriod::Q1,
        5 | 6 | 7 => FiscalPeriod::Q2,
        8 | 9 | 10 => FiscalPeriod::Q3,
        _ => unreachable!("offset is reduced mod 12"),
    };
    let fiscal_year = if period_end.month() > fye_month {
        period_end.year() + 1
    } else {
        period_end.year()
    };
    (fiscal_year, period)
}

/// Maps a `dei:DocumentFiscalPeriodFocus` value onto our period enum. Returns `None`
/// for `"Q4"` or anything unrecognized, so the caller can fall back to a heuristic
/// rather than ever emitting the forbidden period.
fn normalize_dei_period(raw: &str) -> Option<FiscalPeriod> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "FY" => Some(FiscalPeriod::Annual),
        "Q1" => Some(FiscalPeriod::Q1),
        "Q2" => Some(FiscalPeriod::Q2),
        "Q3" => Some(FiscalPeriod::Q3),
        _ => None,
    }
}

/// Computes the fiscal attribution for one filing.
///
/// `ticker` is looked up in `registry` first (confidence 1.0, source `Registry`). If
/// unregistered, `dei` evidence is consulted next (confidence 1.0, source
/// `FilingEvidence`) unless it reports an unrecognized or `"Q4"` period, in which case
/// we fall through to the default December-calendar heuristic (confidence 0.6 for
/// 10-Q, derived). Finally, the hard invariant forces `annual` for 10-K/20-F filings
/// regardless of the above, recording `overridden = true` when that changed the
/// answer.
pub fn attribute(
    ticker: &str,
    filing_type: FilingType,
    period_end_date: NaiveDate,
    registry: &FiscalRegistry,
    dei: Option<&DeiEvidence>,
) -> FiscalAttribution {
    let registered_fye_month = registry.lookup(ticker).map(|c| c.fiscal_year_end_month);

    let (mut fiscal_year, mut fiscal_period, source, confidence) =
        if let Some(fye_month) = registered_fye_month {
            let (fy, fp) = classify(period_end_date, fye_month);
            (fy, fp, AttributionSource::Registry, 1.0)
        } else if let Some(fp) = dei
            .and_then(|d| d.fiscal_period_focus.as_deref())
            .and_then(normalize_dei_period)
        {
            let fy = dei
                .and_then(|d| d.fiscal_year_focus)
                .unwrap_or_else(|| period_end_date.year());
            (fy, fp, AttributionSource::FilingEvidence, 1.0)
        } else if matches!(filing_type, FilingType::TenK | FilingType::TwentyF) {
            (period_end_date.year(), FiscalPeriod::Annual, AttributionSource::Derived, 1.0)
        } else {
            let (fy, fp) = classify(period_end_date, 12);
            (fy, fp, AttributionSource::Derived, 0.6)
        };

    let mut overridden = false;
    if matches!(filing_type, FilingType::TenK | FilingType::TwentyF)
        && fiscal_period != FiscalPeriod::Annual
    {
        tracing::warn!(
            ticker,
            form = filing_type.as_str(),
            evidence_period = ?fiscal_period,
            "filing evidence disagreed with annual hard invariant, overriding"
        );
        let fye_month = registered_fye_month.unwrap_or(period_end_date.month());
        let (fy, _) = classify(period_end_date, fye_month);
        fiscal_year = fy;
        fiscal_period = FiscalPeriod::Annual;
        overridden = true;
    }

    FiscalAttribution {
        fiscal_year,
        fiscal_period,
        source,
        confidence,
        overridden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FiscalRegistry;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn msft_10q_september_end_is_q1_fy2024() {
        let registry = FiscalRegistry::with_known_entries();
        let attribution = attribute(
            "MSFT",
            FilingType::TenQ,
            date(2023, 9, 30),
            &registry,
            None,
        );
        assert_eq!(attribution.fiscal_year, 2024);
        assert_eq!(attribution.fiscal_period, FiscalPeriod::Q1);
        assert_eq!(attribution.source, AttributionSource::Registry);
    }

    #[test]
    fn msft_10k_forces_annual_even_with_disagreeing_evidence() {
        let registry = FiscalRegistry::with_known_entries();
        let attribution = attribute(
            "MSFT",
            FilingType::TenK,
            date(2024, 6, 30),
            &registry,
            None,
        );
        assert_eq!(attribution.fiscal_year, 2024);
        assert_eq!(attribution.fiscal_period, FiscalPeriod::Annual);
        assert!(!attribution.overridden);
    }

    #[test]
    fn nvda_10q_april_end_is_q1_not_q2() {
        let registry = FiscalRegistry::with_known_entries();
        let attribution = attribute(
            "NVDA",
            FilingType::TenQ,
            date(2023, 4, 30),
            &registry,
            None,
        );
        assert_eq!(attribution.fiscal_year, 2024);
        assert_eq!(attribution.fiscal_period, FiscalPeriod::Q1);
    }

    #[test]
    fn aapl_10k_september_end_is_fy2023() {
        let registry = FiscalRegistry::with_known_entries();
        let attribution = attribute(
            "AAPL",
            FilingType::TenK,
            date(2023, 9, 30),
            &registry,
            None,
        );
        assert_eq!(attribution.fiscal_year, 2023);
        assert_eq!(attribution.fiscal_period, FiscalPeriod::Annual);
    }

    #[test]
    fn unregistered_ticker_with_dei_evidence_uses_it() {
        let registry = FiscalRegistry::new();
        let dei = DeiEvidence {
            fiscal_year_focus: Some(2024),
            fiscal_period_focus: Some("Q2".to_string()),
        };
        let attribution = attribute(
            "ZZZZ",
            FilingType::TenQ,
            date(2024, 6, 30),
            &registry,
            Some(&dei),
        );
        assert_eq!(attribution.fiscal_year, 2024);
        assert_eq!(attribution.fiscal_period, FiscalPeriod::Q2);
        assert_eq!(attribution.source, AttributionSource::FilingEvidence);
        assert_eq!(attribution.confidence, 1.0);
    }

    #[test]
    fn unregistered_ticker_without_evidence_is_derived_and_never_q4() {
        let registry = FiscalRegistry::new();
        let attribution = attribute(
            "ZZZZ",
            FilingType::TenQ,
            date(2024, 12, 31),
            &registry,
            None,
        );
        assert_eq!(attribution.source, AttributionSource::Derived);
        assert!(attribution.confidence < 1.0);
        assert_eq!(attribution.fiscal_period, FiscalPeriod::Annual);
    }

    #[test]
    fn dei_reporting_q4_falls_back_to_heuristic_rather_than_emitting_it() {
        let registry = FiscalRegistry::new();
        let dei = DeiEvidence {
            fiscal_year_focus: Some(2024),
            fiscal_period_focus: Some("Q4".to_string()),
        };
        let attribution = attribute(
            "ZZZZ",
            FilingType::TenQ,
            date(2024, 3, 31),
            &registry,
            Some(&dei),
        );
        // `FiscalPeriod` has no Q4 variant at all, so "Q4" evidence cannot be honored;
        // it must fall back to the derived heuristic instead.
        assert_eq!(attribution.source, AttributionSource::Derived);
        assert!(attribution.confidence < 1.0);
    }

    #[test]
    fn twenty_f_always_annual() {
        let registry = FiscalRegistry::new();
        let attribution = attribute(
            "TM",
            FilingType::TwentyF,
            date(2024, 3, 31),
            &registry,
            None,
        );
        assert_eq!(attribution.fiscal_period, FiscalPeriod::Annual);
    }

    #[test]
    fn dei_evidence_is_pulled_from_matching_facts_only() {
        use crate::model::Fact;

        let facts = vec![
            Fact {
                concept: "dei:DocumentFiscalYearFocus".to_string(),
                value_text: "2024".to_string(),
                normalized_value: Some(2024.0),
                context_ref: "c1".to_string(),
                unit_ref: None,
                decimals: None,
                precision: None,
                is_nil: false,
            },
            Fact {
                concept: "dei:DocumentFiscalPeriodFocus".to_string(),
                value_text: "Q2".to_string(),
                normalized_value: None,
                context_ref: "c1".to_string(),
                unit_ref: None,
                decimals: None,
                precision: None,
                is_nil: false,
            },
            Fact {
                concept: "us-gaap:Assets".to_string(),
                value_text: "100".to_string(),
                normalized_value: Some(100.0),
                context_ref: "c1".to_string(),
                unit_ref: Some("usd".to_string()),
                decimals: None,
                precision: None,
                is_nil: false,
            },
        ];

        let evidence = DeiEvidence::from_facts(&facts);
        assert_eq!(evidence.fiscal_year_focus, Some(2024));
        assert_eq!(evidence.fiscal_period_focus.as_deref(), Some("Q2"));
    }
}
