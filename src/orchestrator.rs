//! The ingest orchestrator: the per-company worker loop — locate, fetch, parse,
//! attribute, serialize, sink — that the supervisor fans out across tickers.
//!
//! One [`process_ticker`] call owns exactly one ticker's filings end to end and never
//! touches another ticker's state; this is what lets the supervisor run many of them
//! concurrently without synchronization beyond the shared rate limiter and registry.

use tokio_util::sync::CancellationToken;

use crate::config::{FilingType, IngestConfig};
use crate::core::Edgar;
use crate::error::IngestError;
use crate::fiscal::{self, DeiEvidence};
use crate::format::{self, FactSource};
use crate::inline_xbrl;
use crate::locator::{self, FilingDocuments, FilingRef};
use crate::model::{Company, Filing, FiscalAttribution, Outcome};
use crate::registry::FiscalRegistry;
use crate::serializer;
use crate::sink::Sink;
use crate::text_extract;
use crate::xbrl::{self, ParsedXbrl};

/// Every filing outcome produced while processing one ticker, in the order the
/// filings were attempted (filing-date descending, per spec.md §5).
#[derive(Debug, Clone)]
pub struct TickerOutcome {
    pub ticker: String,
    pub filing_outcomes: Vec<Outcome>,
}

impl TickerOutcome {
    pub fn failed(ticker: &str, error_kind: impl Into<String>) -> Self {
        Self {
            ticker: ticker.to_string(),
            filing_outcomes: vec![Outcome::failure(error_kind)],
        }
    }
}

/// Processes every requested filing type for one ticker: resolves its CIK, lists and
/// locates filings (applying the 10-K/20-F substitution), then runs each through
/// [`process_filing`]. Stops dispatching new filings once `cancel` fires, but lets the
/// filing already in flight finish and record its outcome.
pub async fn process_ticker(
    edgar: &Edgar,
    sink: &dyn Sink,
    registry: &FiscalRegistry,
    ticker: &str,
    config: &IngestConfig,
    cancel: &CancellationToken,
) -> TickerOutcome {
    let cik = match locator::resolve_cik(edgar, ticker, cancel).await {
        Ok(cik) => cik,
        Err(err) => {
            tracing::warn!(ticker, error = %err, "failed to resolve CIK");
            return TickerOutcome::failed(ticker, error_kind(&err));
        }
    };

    let mut filing_outcomes = Vec::new();

    for &requested_type in &config.filing_types {
        if cancel.is_cancelled() {
            break;
        }

        let (filings, substituted) = match locator::list_filings_with_fallback(
            edgar,
            &cik,
            requested_type,
            config.start_year,
            config.end_year,
            cancel,
        )
        .await
        {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(ticker, form = requested_type.as_str(), error = %err, "failed to list filings");
                filing_outcomes.push(Outcome::failure(error_kind(&err)));
                continue;
            }
        };

        for filing_ref in &filings {
            if cancel.is_cancelled() {
                break;
            }
            let effective_type = substituted.unwrap_or(filing_ref.filing_type);
            let mut outcome = process_filing(
                edgar, sink, registry, ticker, &cik, effective_type, filing_ref, cancel,
            )
            .await;
            if let Ok(o) = outcome.as_mut() {
                o.substituted_filing_type = substituted;
            }
            filing_outcomes.push(outcome.unwrap_or_else(|err| Outcome::failure(error_kind(&err))));
        }
    }

    TickerOutcome {
        ticker: ticker.to_string(),
        filing_outcomes,
    }
}

/// Runs one filing through locate-documents -> fetch -> parse -> attribute ->
/// serialize -> sink, returning its [`Outcome`]. A `Result` wrapper only to let the
/// caller attach `substituted_filing_type`; parse failures that still leave a usable
/// text artifact are folded into a successful [`Outcome`], per spec.md §7.
async fn process_filing(
    edgar: &Edgar,
    sink: &dyn Sink,
    registry: &FiscalRegistry,
    ticker: &str,
    cik: &str,
    filing_type: FilingType,
    filing_ref: &FilingRef,
    cancel: &CancellationToken,
) -> Result<Outcome, IngestError> {
    let documents = locator::discover_documents(edgar, cik, filing_ref, cancel).await?;

    let filing = Filing::new(
        filing_type,
        filing_ref.accession_number.clone(),
        filing_ref.filing_date,
        filing_ref.period_end_date,
        documents.primary_doc_url.clone(),
        documents.instance_url.clone(),
    )?;

    let primary_html = edgar.get(&filing.primary_doc_url, cancel).await?;
    let (parsed, strategy_used) = parse_facts(edgar, &documents, &primary_html, cancel).await;

    let text_doc = text_extract::extract(&primary_html);
    if text_doc.sections.is_empty() {
        return Err(IngestError::ParseError(
            "text extraction produced no sections".to_string(),
        ));
    }

    let dei_evidence = parsed.as_ref().map(|p| DeiEvidence::from_facts(&p.facts));
    let attribution = fiscal::attribute(
        ticker,
        filing_type,
        filing.period_end_date,
        registry,
        dei_evidence.as_ref(),
    );
    if attribution.confidence < 1.0 {
        tracing::warn!(
            ticker,
            form = filing_type.as_str(),
            confidence = attribution.confidence,
            "fiscal attribution made with reduced confidence"
        );
    }

    let company = Company::new(ticker, cik.to_string(), ticker.to_string());
    let base = artifact_base_path(ticker, filing_type, &attribution);
    let mut artifact_paths = Vec::new();

    let text_path = format!("{base}/text.txt");
    commit_artifact(sink, &text_path, text_extract::render(&text_doc).into_bytes()).await?;
    artifact_paths.push(text_path);

    if let Some(parsed) = &parsed {
        let llm_artifact = serializer::serialize(
            &company,
            &filing,
            &attribution,
            &parsed.contexts,
            &parsed.units,
            &parsed.facts,
        );
        let llm_path = format!("{base}/llm.txt");
        commit_artifact(sink, &llm_path, llm_artifact.into_bytes()).await?;
        artifact_paths.push(llm_path);
    } else {
        tracing::warn!(
            ticker,
            accession = %filing.accession_number,
            ?strategy_used,
            "no fact table recovered, emitting text-only artifact"
        );
    }

    let filing_id = format!(
        "{}-{}-{}-{}",
        ticker,
        filing_type.as_str(),
        attribution.fiscal_year,
        attribution.fiscal_period.as_path_segment()
    );
    let mut attrs = std::collections::HashMap::new();
    attrs.insert("accession_number".to_string(), filing.accession_number.clone());
    attrs.insert(
        "attribution_source".to_string(),
        format!("{:?}", attribution.source),
    );
    sink.record_metadata(&filing_id, attrs).await?;

    Ok(Outcome::success(artifact_paths, attribution))
}

fn artifact_base_path(ticker: &str, filing_type: FilingType, attribution: &FiscalAttribution) -> String {
    format!(
        "companies/{}/{}/{}/{}",
        ticker,
        filing_type.as_str(),
        attribution.fiscal_year,
        attribution.fiscal_period.as_path_segment()
    )
}

/// Commits `bytes` at `path` unless the sink already has it, so a re-run of an
/// already-processed filing is a no-op after the existence check, per spec.md §8.
async fn commit_artifact(sink: &dyn Sink, path: &str, bytes: Vec<u8>) -> Result<(), IngestError> {
    if sink.exists(path).await? {
        tracing::debug!(path, "artifact already committed, skipping");
        return Ok(());
    }
    sink.put(path, &bytes).await
}

/// Tries each fallback strategy [`format::detect`] proposes in order, returning the
/// first one that yields a usable fact table. A parse failure at one stage is logged
/// and the next fallback is tried rather than aborting the filing outright.
async fn parse_facts(
    edgar: &Edgar,
    documents: &FilingDocuments,
    primary_html: &str,
    cancel: &CancellationToken,
) -> (Option<ParsedXbrl>, FactSource) {
    let (primary_strategy, fallbacks) =
        format::detect(documents.instance_url.is_some(), primary_html.as_bytes());

    for strategy in fallbacks {
        let attempt = match strategy {
            FactSource::TraditionalXbrl => match &documents.instance_url {
                Some(url) => match edgar.get(url, cancel).await {
                    Ok(xml) => xbrl::parse_instance(&xml),
                    Err(err) => Err(err),
                },
                None => continue,
            },
            FactSource::InlineXbrl => inline_xbrl::extract(primary_html),
            FactSource::TextOnly => return (None, FactSource::TextOnly),
        };

        match attempt {
            Ok(parsed) => return (Some(parsed), strategy),
            Err(err) => {
                tracing::warn!(?strategy, error = %err, "fact extraction strategy failed, trying next fallback");
            }
        }
    }

    let _ = primary_strategy;
    (None, FactSource::TextOnly)
}

fn error_kind(err: &IngestError) -> String {
    match err {
        IngestError::ConfigError(_) => "ConfigError".to_string(),
        IngestError::NotFound => "NotFound".to_string(),
        IngestError::RateLimited => "RateLimited".to_string(),
        IngestError::FetchError(_) => "FetchError".to_string(),
        IngestError::ParseError(_) => "ParseError".to_string(),
        IngestError::SerializeError(_) => "SerializeError".to_string(),
        IngestError::FiscalAmbiguous(_) => "FiscalAmbiguous".to_string(),
        IngestError::RequestError(_) => "FetchError".to_string(),
        IngestError::FileError(_) => "SerializeError".to_string(),
        IngestError::JsonError(_) => "ParseError".to_string(),
        IngestError::XmlError(_) => "ParseError".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_base_path_never_emits_q4() {
        let attribution = FiscalAttribution {
            fiscal_year: 2024,
            fiscal_period: crate::model::FiscalPeriod::Annual,
            source: crate::model::AttributionSource::Registry,
            confidence: 1.0,
            overridden: false,
        };
        let path = artifact_base_path("MSFT", FilingType::TenK, &attribution);
        assert_eq!(path, "companies/MSFT/10-K/2024/annual");
        assert!(!path.contains("Q4"));
    }

    #[test]
    fn error_kind_maps_wrapped_errors_to_closed_set_names() {
        assert_eq!(error_kind(&IngestError::NotFound), "NotFound");
        assert_eq!(error_kind(&IngestError::RateLimited), "RateLimited");
        assert_eq!(
            error_kind(&IngestError::ParseError("bad xml".to_string())),
            "ParseError"
        );
    }
}
