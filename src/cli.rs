//! Command-line surface for the `edgar-ingest` binary: the minimum flag set spec.md §6
//! calls for, parsed with `clap`'s derive API the way the rest of this crate's
//! configuration types are built up from layered defaults.

use std::time::Duration;

use clap::Parser;

use crate::config::{EdgarConfig, FilingType, IngestConfig};

/// Ingests SEC EDGAR filings into plain-text and LLM-native XBRL fact dumps.
#[derive(Debug, Parser)]
#[command(name = "edgar-ingest", version, about)]
pub struct Cli {
    /// Ticker to ingest. Repeat or pass --tickers for more than one.
    #[arg(long = "ticker")]
    pub ticker: Vec<String>,

    /// Tickers to ingest, comma- or space-separated.
    #[arg(long = "tickers", value_delimiter = ',')]
    pub tickers: Vec<String>,

    /// Filing types to request. Repeatable; defaults to all three.
    #[arg(long = "filing-type", value_enum)]
    pub filing_type: Vec<CliFilingType>,

    /// Inclusive lower bound on filing year.
    #[arg(long)]
    pub start_year: Option<i32>,

    /// Inclusive upper bound on filing year.
    #[arg(long)]
    pub end_year: Option<i32>,

    /// Number of concurrent ticker workers, clamped to [1, 5].
    #[arg(long, default_value_t = 3)]
    pub workers: usize,

    /// Write artifacts to a local directory instead of the upload sink.
    #[arg(long)]
    pub skip_upload: bool,

    /// Local directory to write artifacts under when --skip-upload is set.
    #[arg(long, default_value = "./out")]
    pub out_dir: String,

    /// Contact email for the required SEC User-Agent header. Falls back to
    /// `EDGAR_CONTACT_EMAIL` if unset.
    #[arg(long)]
    pub email: Option<String>,

    /// Destination bucket for the upload sink. Falls back to `EDGAR_SINK_BUCKET`.
    #[arg(long)]
    pub sink_bucket: Option<String>,

    /// Requests per second against EDGAR; SEC's published fair-access limit is 10.
    #[arg(long, default_value_t = 10)]
    pub rate_limit: u32,

    /// Per-filing processing timeout, in seconds.
    #[arg(long, default_value_t = 300)]
    pub filing_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFilingType {
    #[value(name = "10-K")]
    TenK,
    #[value(name = "10-Q")]
    TenQ,
    #[value(name = "20-F")]
    TwentyF,
}

impl From<CliFilingType> for FilingType {
    fn from(value: CliFilingType) -> Self {
        match value {
            CliFilingType::TenK => FilingType::TenK,
            CliFilingType::TenQ => FilingType::TenQ,
            CliFilingType::TwentyF => FilingType::TwentyF,
        }
    }
}

/// Error produced when required configuration (the contact email) is missing from
/// both the CLI flags and the environment.
#[derive(Debug, thiserror::Error)]
#[error("missing required configuration: {0}")]
pub struct CliConfigError(pub String);

impl Cli {
    /// Merges parsed flags with environment fallbacks into an [`IngestConfig`].
    /// Fails with [`CliConfigError`] when the contact email is unavailable anywhere,
    /// matching the fetcher's `User-Agent` requirement.
    pub fn into_ingest_config(self) -> Result<IngestConfig, CliConfigError> {
        let email = self
            .email
            .or_else(IngestConfig::contact_email_from_env)
            .ok_or_else(|| {
                CliConfigError("contact email required via --email or EDGAR_CONTACT_EMAIL".to_string())
            })?;

        let mut tickers: Vec<String> = self.ticker;
        tickers.extend(self.tickers);
        tickers = tickers
            .into_iter()
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty())
            .collect();
        if tickers.is_empty() {
            return Err(CliConfigError("at least one --ticker is required".to_string()));
        }

        let filing_types: Vec<FilingType> = if self.filing_type.is_empty() {
            vec![FilingType::TenK, FilingType::TenQ, FilingType::TwentyF]
        } else {
            self.filing_type.into_iter().map(FilingType::from).collect()
        };

        let sink_bucket = self.sink_bucket.or_else(IngestConfig::sink_bucket_from_env);
        if !self.skip_upload && sink_bucket.is_none() {
            return Err(CliConfigError(
                "a sink bucket is required via --sink-bucket or EDGAR_SINK_BUCKET unless --skip-upload is set"
                    .to_string(),
            ));
        }

        let edgar = EdgarConfig::new(
            format!("edgar-ingest/{} ({email})", env!("CARGO_PKG_VERSION")),
            self.rate_limit,
            Duration::from_secs(30),
            None,
        );

        Ok(IngestConfig {
            edgar,
            tickers,
            filing_types,
            start_year: self.start_year,
            end_year: self.end_year,
            workers: self.workers.clamp(1, 5),
            skip_upload: self.skip_upload,
            sink_bucket,
            filing_timeout: Duration::from_secs(self.filing_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_cli() -> Cli {
        Cli {
            ticker: vec!["msft".to_string()],
            tickers: Vec::new(),
            filing_type: Vec::new(),
            start_year: None,
            end_year: None,
            workers: 3,
            skip_upload: true,
            out_dir: "./out".to_string(),
            email: Some("me@example.com".to_string()),
            sink_bucket: None,
            rate_limit: 10,
            filing_timeout_secs: 300,
        }
    }

    #[test]
    fn ticker_is_upper_cased_and_deduplicated_input_preserved() {
        let config = base_cli().into_ingest_config().unwrap();
        assert_eq!(config.tickers, vec!["MSFT".to_string()]);
    }

    #[test]
    fn missing_email_without_skip_upload_is_an_error() {
        let mut cli = base_cli();
        cli.email = None;
        let err = cli.into_ingest_config().unwrap_err();
        assert!(err.0.contains("contact email"));
    }

    #[test]
    fn missing_sink_bucket_without_skip_upload_is_an_error() {
        let mut cli = base_cli();
        cli.skip_upload = false;
        let err = cli.into_ingest_config().unwrap_err();
        assert!(err.0.contains("sink bucket"));
    }

    #[test]
    fn no_tickers_is_an_error() {
        let mut cli = base_cli();
        cli.ticker.clear();
        let err = cli.into_ingest_config().unwrap_err();
        assert!(err.0.contains("ticker"));
    }

    #[test]
    fn empty_filing_types_defaults_to_all_three() {
        let config = base_cli().into_ingest_config().unwrap();
        assert_eq!(config.filing_types.len(), 3);
    }

    #[test]
    fn workers_flag_is_clamped_to_five() {
        let mut cli = base_cli();
        cli.workers = 20;
        let config = cli.into_ingest_config().unwrap();
        assert_eq!(config.workers, 5);
    }
}
