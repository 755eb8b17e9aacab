//! # Press Summary Report
//!
//! Fetches recent press coverage of a company from the NewsCatcher search
//! API, asks a completion model to rate how positively each article treats
//! the company (the Positivity Index, PI, 0-10), and renders the results into
//! a dated, self-contained HTML report.
//!
//! ## Usage
//!
//! ```sh
//! NEWSCATCHER_API_KEY=... OPENAI_API_KEY=... press_summary_report
//! press_summary_report -q '"S-OIL"' -l ko -n 25 -o ./output --json
//! ```
//!
//! ## Architecture
//!
//! The run is a straight line, single-threaded and one request at a time:
//! 1. **Configuration**: CLI flags, environment, settings file, key files
//! 2. **Fetching**: one search request, retried with backoff
//! 3. **Scoring**: one completion request per article, retried with backoff
//! 4. **Output**: average PI, tier colors, HTML (and optional JSON) file
//!
//! Exit status is non-zero when configuration, fetching or writing fails.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analyzer;
mod api;
mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod report;
mod search;
mod utils;

use analyzer::CompletionClient;
use api::http_client;
use cli::Cli;
use config::Configuration;
use search::NewsCatcherClient;

/// Log to stderr and, when `log_dir` is given, to `log_dir/psr_YYYYMMDD.log`.
fn init_tracing(log_dir: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tfmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(UtcTime::rfc_3339());

    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let path = dir.join(format!("psr_{}.log", Local::now().format("%Y%m%d")));
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tfmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_timer(UtcTime::rfc_3339()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env file is fine; real environment variables still apply.
    dotenv::dotenv().ok();

    let args = Cli::parse();
    init_tracing(args.log_dir.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "press_summary_report starting up");

    let config = match Configuration::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Configuration failed; nothing was fetched");
            return Err(e.into());
        }
    };
    info!(
        query = %config.search.query,
        language = %config.search.language,
        page_size = config.search.page_size,
        model = %config.completion.model,
        output_dir = %config.report.output_dir.display(),
        "Configuration loaded"
    );

    let http = http_client(config.timeout)?;
    let search = NewsCatcherClient::new(
        http.clone(),
        config.search.endpoint.clone(),
        config.newscatcher_api_key.clone(),
    );
    let completion = CompletionClient::new(
        http,
        config.completion.endpoint.clone(),
        config.openai_api_key.clone(),
    );

    match pipeline::run(&config, &search, &completion).await {
        Ok(summary) => {
            println!(
                "Report successfully generated: {}",
                summary.written.html.display()
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Run failed; no report was written");
            Err(e.into())
        }
    }
}
