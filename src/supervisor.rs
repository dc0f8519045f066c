//! The parallel supervisor: fans ticker processing out across up to `W` concurrent
//! workers, then assembles a run-report summarizing successes, warnings, and errors.
//!
//! Workers are bounded by a `tokio::task::JoinSet` plus a `Semaphore` permit per
//! ticker rather than a fixed-size worker pool — tickers have wildly different filing
//! counts, so a pool of long-lived workers pulling from a channel would leave fast
//! tickers idle while slow ones still hold a slot. A permit-per-task model lets the
//! scheduler pack work evenly instead.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::IngestConfig;
use crate::core::Edgar;
use crate::model::Outcome;
use crate::orchestrator::{self, TickerOutcome};
use crate::registry::FiscalRegistry;
use crate::sink::Sink;

const MIN_WORKERS: usize = 1;
const MAX_WORKERS: usize = 5;

/// Coordinates a full ingestion run across every configured ticker.
pub struct Supervisor<S: Sink + 'static> {
    edgar: Arc<Edgar>,
    sink: Arc<S>,
    registry: Arc<FiscalRegistry>,
    config: IngestConfig,
}

impl<S: Sink + 'static> Supervisor<S> {
    /// Builds a supervisor over `edgar`/`sink`, seeding the fiscal registry with the
    /// known non-December-fiscal-year-end entries (spec.md §4.7).
    pub fn new(edgar: Edgar, sink: S, config: IngestConfig) -> Self {
        Self {
            edgar: Arc::new(edgar),
            sink: Arc::new(sink),
            registry: Arc::new(FiscalRegistry::with_known_entries()),
            config,
        }
    }

    /// As [`Supervisor::new`], but with a caller-supplied fiscal registry (e.g. one
    /// extended with additional known calendars beyond the built-in seed set).
    pub fn with_registry(edgar: Edgar, sink: S, config: IngestConfig, registry: FiscalRegistry) -> Self {
        Self {
            edgar: Arc::new(edgar),
            sink: Arc::new(sink),
            registry: Arc::new(registry),
            config,
        }
    }

    /// Runs every ticker in `config.tickers` to completion (or until `cancel` fires),
    /// with at most `clamp(config.workers, 1, 5)` running concurrently.
    pub async fn run(self, cancel: CancellationToken) -> RunReport {
        let started_at = Utc::now();
        let worker_count = self.config.workers.clamp(MIN_WORKERS, MAX_WORKERS);
        let semaphore = Arc::new(Semaphore::new(worker_count));

        let mut join_set: JoinSet<TickerOutcome> = JoinSet::new();

        for ticker in self.config.tickers.clone() {
            if cancel.is_cancelled() {
                tracing::info!("cancellation observed, stopped dispatching new tickers");
                break;
            }

            let edgar = Arc::clone(&self.edgar);
            let sink = Arc::clone(&self.sink);
            let registry = Arc::clone(&self.registry);
            let config = self.config.clone();
            let cancel = cancel.clone();
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return TickerOutcome::failed(&ticker, "ConfigError"),
                };
                tracing::info!(ticker, "starting ticker worker");
                let outcome = tokio::time::timeout(
                    config.filing_timeout.saturating_mul(worker_count as u32).max(Duration::from_secs(60)),
                    orchestrator::process_ticker(&edgar, sink.as_ref(), &registry, &ticker, &config, &cancel),
                )
                .await;
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(ticker, "ticker worker timed out");
                        TickerOutcome::failed(&ticker, "FetchError")
                    }
                }
            });
        }

        let mut ticker_outcomes = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => ticker_outcomes.push(outcome),
                Err(join_err) => {
                    tracing::error!(error = %join_err, "ticker worker task panicked");
                }
            }
        }

        RunReport {
            started_at,
            finished_at: Utc::now(),
            ticker_outcomes,
        }
    }
}

/// Summary of one supervisor run: every ticker's outcomes, plus success/warning/error
/// tallies for the human-readable report spec.md §4.10 calls for.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub ticker_outcomes: Vec<TickerOutcome>,
}

impl RunReport {
    pub fn total_filings(&self) -> usize {
        self.ticker_outcomes.iter().map(|t| t.filing_outcomes.len()).sum()
    }

    pub fn successes(&self) -> usize {
        self.all_filing_outcomes().filter(|o| o.success && !is_warning(o)).count()
    }

    pub fn warnings(&self) -> usize {
        self.all_filing_outcomes().filter(|o| o.success && is_warning(o)).count()
    }

    pub fn errors(&self) -> usize {
        self.all_filing_outcomes().filter(|o| !o.success).count()
    }

    fn all_filing_outcomes(&self) -> impl Iterator<Item = &Outcome> {
        self.ticker_outcomes.iter().flat_map(|t| t.filing_outcomes.iter())
    }

    /// Renders the run-report document spec.md §4.10 asks the supervisor to write:
    /// counts up top, then one line per ticker with its per-filing detail.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Run report: {} -> {}\n",
            self.started_at.to_rfc3339(),
            self.finished_at.to_rfc3339()
        ));
        out.push_str(&format!(
            "tickers={} filings={} successes={} warnings={} errors={}\n\n",
            self.ticker_outcomes.len(),
            self.total_filings(),
            self.successes(),
            self.warnings(),
            self.errors()
        ));

        for ticker_outcome in &self.ticker_outcomes {
            out.push_str(&format!("== {} ==\n", ticker_outcome.ticker));
            for filing_outcome in &ticker_outcome.filing_outcomes {
                if filing_outcome.success {
                    let marker = if is_warning(filing_outcome) { "WARN" } else { "OK" };
                    out.push_str(&format!(
                        "  [{marker}] {} artifact(s): {}\n",
                        marker,
                        filing_outcome.artifact_paths.join(", ")
                    ));
                } else {
                    out.push_str(&format!(
                        "  [ERROR] {}\n",
                        filing_outcome.error_kind.as_deref().unwrap_or("unknown")
                    ));
                }
            }
        }

        out
    }
}

fn is_warning(outcome: &Outcome) -> bool {
    outcome
        .fiscal_attribution
        .as_ref()
        .map(|a| a.confidence < 1.0 || a.overridden)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributionSource, FiscalAttribution, FiscalPeriod};

    fn attribution(confidence: f64, overridden: bool) -> FiscalAttribution {
        FiscalAttribution {
            fiscal_year: 2024,
            fiscal_period: FiscalPeriod::Q1,
            source: AttributionSource::Derived,
            confidence,
            overridden,
        }
    }

    #[test]
    fn run_report_classifies_low_confidence_success_as_warning() {
        let report = RunReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            ticker_outcomes: vec![TickerOutcome {
                ticker: "ZZZZ".to_string(),
                filing_outcomes: vec![Outcome::success(
                    vec!["companies/ZZZZ/10-Q/2024/Q1/text.txt".to_string()],
                    attribution(0.6, false),
                )],
            }],
        };
        assert_eq!(report.successes(), 0);
        assert_eq!(report.warnings(), 1);
        assert_eq!(report.errors(), 0);
    }

    #[test]
    fn run_report_counts_failures_as_errors() {
        let report = RunReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            ticker_outcomes: vec![TickerOutcome::failed("ZZZZ", "NotFound")],
        };
        assert_eq!(report.errors(), 1);
        assert_eq!(report.successes(), 0);
    }

    #[test]
    fn render_includes_ticker_and_counts() {
        let report = RunReport {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            ticker_outcomes: vec![TickerOutcome {
                ticker: "MSFT".to_string(),
                filing_outcomes: vec![Outcome::success(
                    vec!["companies/MSFT/10-Q/2024/Q1/text.txt".to_string()],
                    attribution(1.0, false),
                )],
            }],
        };
        let rendered = report.render();
        assert!(rendered.contains("== MSFT =="));
        assert!(rendered.contains("successes=1"));
    }
}
