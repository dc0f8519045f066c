//! # edgar-ingest — SEC EDGAR filing ingestion pipeline
//!
//! This crate discovers, fetches, and parses 10-K/10-Q/20-F filings directly from the
//! SEC EDGAR archive, producing two durable artifacts per filing: a plain-text
//! rendering of the narrative document, and an LLM-native dump of every XBRL fact
//! joined to its context and unit metadata.
//!
//! ## Pipeline
//!
//! ```text
//! supervisor -> orchestrator -> locator -> fetcher (core::Edgar)
//!                            -> format detector -> xbrl | inline_xbrl
//!                            -> text_extract
//!                            -> fiscal attributor
//!                            -> serializer -> sink
//! ```
//!
//! ## Basic usage
//!
//! ```no_run
//! use edgar_ingest::{Edgar, IngestConfig};
//! use edgar_ingest::sink::LocalSink;
//! use edgar_ingest::supervisor::Supervisor;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = IngestConfig::default();
//!     config.tickers = vec!["MSFT".to_string()];
//!     let edgar = Edgar::with_config(config.edgar.clone())?;
//!     let sink = LocalSink::new("./out");
//!     let supervisor = Supervisor::new(edgar, sink, config);
//!     let report = supervisor.run(CancellationToken::new()).await;
//!     println!("processed {} tickers", report.ticker_outcomes.len());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod fiscal;
pub mod format;
pub mod inline_xbrl;
pub mod locator;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod serializer;
pub mod sink;
pub mod supervisor;
pub mod text_extract;
pub mod xbrl;

pub use config::{EdgarConfig, EdgarUrls, FilingType, IngestConfig};
pub use core::Edgar;
pub use error::{IngestError, Result};
pub use model::{
    AttributionSource, Company, Context, Fact, Filing, FiscalAttribution, FiscalPeriod, Outcome,
    Period, Section, TextDoc, Unit, UnitExpr,
};

/// Current crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
