//! Binary entry point: wires the CLI surface to the supervisor, with a progress bar
//! over tickers and a run-report printed on completion.

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;

use edgar_ingest::cli::Cli;
use edgar_ingest::core::Edgar;
use edgar_ingest::sink::LocalSink;
use edgar_ingest::supervisor::Supervisor;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let out_dir = cli.out_dir.clone();
    let config = match cli.into_ingest_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("edgar-ingest: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let edgar = match Edgar::with_config(config.edgar.clone()) {
        Ok(edgar) => edgar,
        Err(err) => {
            eprintln!("edgar-ingest: {err}");
            return std::process::ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("received interrupt, winding down in-flight workers");
            cancel_on_signal.cancel();
        }
    });

    let progress = ProgressBar::new(config.tickers.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    // LocalSink is the only sink this binary ships with; a cloud-backed Sink
    // implementation is expected to be supplied by the embedding application via the
    // library API rather than this CLI.
    let sink = LocalSink::new(out_dir);
    let supervisor = Supervisor::new(edgar, sink, config);

    progress.set_message("ingesting...");
    let report = supervisor.run(cancel).await;
    progress.finish_and_clear();

    println!("{}", report.render());

    if report.errors() > 0 {
        std::process::ExitCode::FAILURE
    } else {
        std::process::ExitCode::SUCCESS
    }
}
