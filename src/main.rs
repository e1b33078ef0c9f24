//! # Andorra Press Crawler
//!
//! Collects news articles and their comment threads from Andorran news sites
//! for a set of search terms within a date window.
//!
//! ## Sources
//!
//! L'Altaveu, Periòdic d'Andorra, Ara Andorra, Bondia.ad, Diari d'Andorra and
//! fòrum.ad. Each has its own result listing, pagination protocol and comment
//! system; some are plain HTML, others need a real browser.
//!
//! ## Usage
//!
//! ```sh
//! andorra_press_crawler --config config.yaml -i 20240101 -e 20240131
//! ```
//!
//! ## Architecture
//!
//! 1. **Bootstrap**: read config and flags, resolve the date window, seed the
//!    dedup sets from a previous run
//! 2. **Crawl**: sources × terms, one at a time, through each source's
//!    pagination strategy
//! 3. **Output**: articles, comments and article texts as JSON

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod comments;
mod config;
mod crawl;
mod dedup;
mod error;
mod fetch;
mod models;
mod outputs;
mod progress;
mod scrapers;
mod sources;
#[cfg(test)]
mod testing;
mod utils;
mod window;

use cli::Cli;
use config::CrawlConfig;
use crawl::{CrawlContext, CrawlPlan, Crawler};
use dedup::SeenIds;
use fetch::PageFetcher;
use fetch::chrome::ChromeDriver;
use fetch::http::{HttpFetcher, RetryFetch};
use outputs::json;
use progress::ConsoleProgress;
use sources::SourceRegistry;
use utils::ensure_writable_dir;
use window::DateWindow;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("andorra_press_crawler starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration ----
    let file_config = match &args.config {
        Some(path) => CrawlConfig::load(path)?,
        None => CrawlConfig::default(),
    };
    let config = args.apply(file_config)?;
    if config.search_terms.is_empty() {
        error!("No search terms; set search_terms in the config file or pass --terms");
        return Err("no search terms".into());
    }

    let now = Local::now().naive_local();
    let window = DateWindow::resolve(now, args.from.as_deref(), args.to.as_deref())?;
    info!(lower = %window.lower, upper = %window.upper, "Date window");

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let seen = match &config.known_ids_dir {
        Some(dir) => json::load_known_ids(dir).await?,
        None => SeenIds::new(),
    };

    // ---- Crawl ----
    let registry = SourceRegistry::new(&config.descriptors);
    let http = RetryFetch::new(
        HttpFetcher::new(&config.http.user_agent, config.http.timeout())?,
        config.http.max_retries,
        config.http.base_delay(),
    );
    let browser = ChromeDriver::new(config.browser.chrome_options());
    let ctx = CrawlContext::new(window, now, seen, Box::new(ConsoleProgress));
    let mut crawler = Crawler::new(PageFetcher::new(http, browser), registry, ctx);

    let plan = CrawlPlan {
        terms: config.search_terms.clone(),
        sources: config.sources.clone(),
        out_of_order: config.out_of_order.clone(),
    };
    let output = crawler.run(&plan).await;

    // ---- Output ----
    if output.is_empty() {
        warn!("Nothing new found; no files written");
    } else if let Err(e) = json::write_output(&output, &config.output_dir, now).await {
        error!(error = %e, "Failed to write crawl output");
        return Err(e);
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        articles = output.articles.len(),
        comments = output.comments.len(),
        "Execution complete"
    );

    Ok(())
}
