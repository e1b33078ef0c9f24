//! Command-line interface definitions.
//!
//! Flags override the matching `config.yaml` fields. Paths can also be given
//! through environment variables.

use crate::config::CrawlConfig;
use crate::error::ConfigError;
use crate::sources::SourceId;
use clap::Parser;
use std::path::PathBuf;

/// Crawl Andorran news sites for articles and comments matching search terms.
///
/// # Examples
///
/// ```sh
/// # Last month, every source, terms from config.yaml
/// andorra_press_crawler --config config.yaml
///
/// # January 2024, two sources, terms on the command line
/// andorra_press_crawler -i 20240101 -e 20240131 --sources diari,bondia --terms "consell general,habitatge"
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.yaml
    #[arg(short, long, env = "PRESS_CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// First day of the window, YYYYMMDD (default: one month before the end)
    #[arg(short = 'i', long = "from")]
    pub from: Option<String>,

    /// Last day of the window, YYYYMMDD (default: now)
    #[arg(short = 'e', long = "to")]
    pub to: Option<String>,

    /// Comma-separated search terms
    #[arg(long, value_delimiter = ',')]
    pub terms: Vec<String>,

    /// Comma-separated source ids, in crawl order
    #[arg(long, value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Output directory for the JSON files
    #[arg(short, long, env = "PRESS_CRAWLER_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Previous output directory whose ids are skipped
    #[arg(long, env = "PRESS_CRAWLER_KNOWN_IDS_DIR")]
    pub known_ids_dir: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub no_headless: bool,

    /// Chrome or Chromium binary
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration.
    pub fn apply(&self, mut config: CrawlConfig) -> Result<CrawlConfig, ConfigError> {
        let terms: Vec<String> = self
            .terms
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if !terms.is_empty() {
            config.search_terms = terms;
        }
        if !self.sources.is_empty() {
            config.sources = self
                .sources
                .iter()
                .map(|s| s.parse::<SourceId>())
                .collect::<Result<_, _>>()?;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.known_ids_dir {
            config.known_ids_dir = Some(dir.clone());
        }
        if self.no_headless {
            config.browser.headless = false;
        }
        if let Some(path) = &self.chrome_path {
            config.browser.chrome_path = Some(path.clone());
        }
        Ok(config)
    }
}
