//! Run configuration loaded from `config.yaml`.
//!
//! Every field has a default, so an empty file (or no file at all) crawls all
//! six sources with the built-in descriptors. Command-line flags override the
//! file; see [`crate::cli`].

use crate::error::ConfigError;
use crate::fetch::chrome::ChromeOptions;
use crate::sources::{SourceDescriptor, SourceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub search_terms: Vec<String>,
    /// Sources in crawl order.
    pub sources: Vec<SourceId>,
    pub out_of_order: BTreeSet<SourceId>,
    pub output_dir: String,
    /// Directory of a previous run's output whose ids must not be emitted again.
    pub known_ids_dir: Option<String>,
    pub browser: BrowserConfig,
    pub http: HttpConfig,
    /// Replacements for built-in source descriptors.
    pub descriptors: BTreeMap<SourceId, SourceDescriptor>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            search_terms: Vec::new(),
            sources: SourceId::ALL.to_vec(),
            out_of_order: BTreeSet::new(),
            output_dir: "./output".to_string(),
            known_ids_dir: None,
            browser: BrowserConfig::default(),
            http: HttpConfig::default(),
            descriptors: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let defaults = ChromeOptions::default();
        Self {
            headless: defaults.headless,
            chrome_path: None,
            window_width: defaults.window_size.0,
            window_height: defaults.window_size.1,
        }
    }
}

impl BrowserConfig {
    pub fn chrome_options(&self) -> ChromeOptions {
        ChromeOptions {
            headless: self.headless,
            path: self.chrome_path.clone(),
            window_size: (self.window_width, self.window_height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 500,
            user_agent: concat!("andorra_press_crawler/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

impl CrawlConfig {
    /// Read a YAML config file.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&raw)?;
        info!(
            terms = config.search_terms.len(),
            sources = config.sources.len(),
            overrides = config.descriptors.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PaginationStrategy;
    use std::io::Write;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = CrawlConfig::from_yaml("").unwrap();
        assert_eq!(config, CrawlConfig::default());
        assert_eq!(config.sources.len(), 6);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_partial_yaml() {
        let config = CrawlConfig::from_yaml(
            r#"
search_terms: ["consell general", "habitatge"]
sources: [diari, bondia]
out_of_order: [periodic]
http:
  max_retries: 5
browser:
  headless: false
"#,
        )
        .unwrap();
        assert_eq!(config.search_terms, ["consell general", "habitatge"]);
        assert_eq!(config.sources, [SourceId::Diari, SourceId::Bondia]);
        assert!(config.out_of_order.contains(&SourceId::Periodic));
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.timeout_secs, 30);
        assert!(!config.browser.chrome_options().headless);
    }

    #[test]
    fn test_descriptor_override() {
        let mut ara = SourceDescriptor::builtin(SourceId::Ara);
        ara.strategy = PaginationStrategy::SinglePage;
        let mut config = CrawlConfig::default();
        config.descriptors.insert(SourceId::Ara, ara.clone());

        let yaml = serde_yaml::to_string(&config).unwrap();
        let back = CrawlConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back.descriptors[&SourceId::Ara], ara);
    }

    #[test]
    fn test_unknown_source_rejected() {
        assert!(CrawlConfig::from_yaml("sources: [ser]").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "output_dir: /tmp/press").unwrap();
        let config = CrawlConfig::load(file.path()).unwrap();
        assert_eq!(config.output_dir, "/tmp/press");
        assert!(CrawlConfig::load("/definitely/not/here.yaml").is_err());
    }
}
