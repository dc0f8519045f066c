//! Configuration types for customizing Edgar client behavior.
//!
//! The configuration system allows you to control rate limiting, HTTP timeouts,
//! base URLs, and user agent strings. Most users can rely on the defaults provided
//! by `Edgar::new()`, but custom configurations are useful for testing, research
//! applications with specific performance requirements, or compliance scenarios.

use std::time::Duration;

/// Configuration settings for the Edgar HTTP client.
///
/// This struct contains all the settings needed to customize how the Edgar client
/// behaves, including network timeouts, rate limiting, and service endpoints. The
/// default configuration is optimized for general use and SEC.gov compliance, but
/// you can adjust these settings based on your application's needs.
///
/// # Examples
///
/// Using defaults:
/// ```rust
/// # use edgar_ingest::EdgarConfig;
/// let config = EdgarConfig::default();
/// ```
///
/// Custom configuration:
/// ```rust
/// # use edgar_ingest::{EdgarConfig, EdgarUrls};
/// # use std::time::Duration;
/// let config = EdgarConfig::new(
///     "research_app/1.0 contact@university.edu",
///     5,  // More conservative rate
///     Duration::from_secs(45),
///     None,  // Use default URLs
/// );
/// ```
#[derive(Debug, Clone)]
pub struct EdgarConfig {
    /// User agent string for HTTP requests (required by SEC)
    pub user_agent: String,

    /// Rate limit in requests per second (default: 10)
    pub rate_limit: u32,

    /// HTTP request timeout duration
    pub timeout: Duration,

    /// Base URLs for different EDGAR services
    pub base_urls: EdgarUrls,
}

/// Base URLs for the different SEC EDGAR service endpoints.
///
/// The SEC EDGAR system is distributed across multiple domains, each serving
/// different types of content. The archives domain hosts historical filings,
/// the data domain provides structured API access, and the files domain serves
/// various data files. You typically won't need to change these unless you're
/// running tests against a mock server.
#[derive(Debug, Clone)]
pub struct EdgarUrls {
    /// Archives base URL (historical filings)
    pub archives: String,

    /// Data API base URL (structured data)
    pub data: String,

    /// Files base URL (company tickers, etc.)
    pub files: String,

    /// Search API base URL
    pub search: String,
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self {
            user_agent: "edgar-ingest/0.1.0".to_string(),
            rate_limit: 10,
            timeout: Duration::from_secs(30),
            base_urls: EdgarUrls {
                archives: "https://www.sec.gov/Archives/edgar".to_string(),
                data: "https://data.sec.gov".to_string(),
                files: "https://www.sec.gov/files".to_string(),
                search: "https://efts.sec.gov/LATEST/search-index/".to_string(),
            },
        }
    }
}

impl EdgarConfig {
    /// Creates custom Edgar configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use edgar_ingest::{EdgarConfig, EdgarUrls};
    /// use std::time::Duration;
    ///
    /// let config = EdgarConfig::new(
    ///     "MyApp contact@example.com",
    ///     10,
    ///     Duration::from_secs(30),
    ///     None,
    /// );
    /// ```
    pub fn new(
        user_agent: impl Into<String>,
        rate_limit: u32,
        timeout: Duration,
        base_urls: Option<EdgarUrls>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            rate_limit,
            timeout,
            base_urls: base_urls.unwrap_or_default(),
        }
    }
}

impl Default for EdgarUrls {
    fn default() -> Self {
        Self {
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
            data: "https://data.sec.gov".to_string(),
            files: "https://www.sec.gov/files".to_string(),
            search: "https://efts.sec.gov/LATEST/search-index/".to_string(),
        }
    }
}

/// Filing types this crate knows how to ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilingType {
    TenK,
    TenQ,
    TwentyF,
}

impl FilingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilingType::TenK => "10-K",
            FilingType::TenQ => "10-Q",
            FilingType::TwentyF => "20-F",
        }
    }
}

impl std::str::FromStr for FilingType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "10-K" => Ok(FilingType::TenK),
            "10-Q" => Ok(FilingType::TenQ),
            "20-F" => Ok(FilingType::TwentyF),
            other => Err(format!("unsupported filing type: {other}")),
        }
    }
}

/// Run-level configuration for an ingestion pass, layered on top of the
/// client-level [`EdgarConfig`].
///
/// Built from CLI flags with environment-variable fallback for the contact
/// email (`EDGAR_CONTACT_EMAIL`) and sink bucket (`EDGAR_SINK_BUCKET`).
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Underlying HTTP client configuration (user agent, rate limit, timeouts).
    pub edgar: EdgarConfig,

    /// Tickers to ingest, upper-cased.
    pub tickers: Vec<String>,

    /// Filing types to request; empty means all of 10-K/10-Q/20-F.
    pub filing_types: Vec<FilingType>,

    /// Inclusive filing-date year range, if bounded.
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,

    /// Number of concurrent ticker workers. Clamped to [1, 5] by the supervisor.
    pub workers: usize,

    /// If true, artifacts are written to a local directory rather than the
    /// cloud sink.
    pub skip_upload: bool,

    /// Destination bucket name for the sink, when not skipping upload.
    pub sink_bucket: Option<String>,

    /// Per-filing processing timeout.
    pub filing_timeout: Duration,
}

impl IngestConfig {
    pub fn contact_email_from_env() -> Option<String> {
        std::env::var("EDGAR_CONTACT_EMAIL").ok()
    }

    pub fn sink_bucket_from_env() -> Option<String> {
        std::env::var("EDGAR_SINK_BUCKET").ok()
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            edgar: EdgarConfig::default(),
            tickers: Vec::new(),
            filing_types: vec![FilingType::TenK, FilingType::TenQ, FilingType::TwentyF],
            start_year: None,
            end_year: None,
            workers: 3,
            skip_upload: false,
            sink_bucket: None,
            filing_timeout: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filing_type_round_trips_through_str() {
        for ft in [FilingType::TenK, FilingType::TenQ, FilingType::TwentyF] {
            let parsed: FilingType = ft.as_str().parse().unwrap();
            assert_eq!(parsed, ft);
        }
    }

    #[test]
    fn filing_type_rejects_unknown() {
        assert!("8-K".parse::<FilingType>().is_err());
    }

    #[test]
    fn default_ingest_config_has_sane_worker_bounds() {
        let cfg = IngestConfig::default();
        assert!(cfg.workers >= 1 && cfg.workers <= 5);
    }
}
