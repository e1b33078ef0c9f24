//! Error taxonomy for the crawler.
//!
//! Errors are split by where they are recovered:
//!
//! - [`FetchError`]: a page could not be obtained (network, status, browser).
//!   The caller skips the page or entry.
//! - [`ExtractError`]: the DOM did not have the expected shape, or a date did
//!   not parse. The caller skips the field or entry.
//! - [`ConfigError`]: a source descriptor or the run configuration is invalid.
//!   Fatal for the affected source only, except at bootstrap.
//! - [`CrawlError`]: anything that ends the traversal of one source/term pair.
//!   The orchestrator logs it and moves on.

use crate::sources::SourceId;
use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: StatusCode },
    #[error("browser error: {0}")]
    Browser(String),
    #[error("could not load {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("timed out waiting for {what}")]
    Timeout { what: String },
    #[error("no page at {url}")]
    NotFound { url: String },
}

impl FetchError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            FetchError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::Timeout { .. } => true,
            FetchError::Browser(_)
            | FetchError::Navigation { .. }
            | FetchError::NotFound { .. } => false,
        }
    }

    /// The server says there is no such page.
    pub fn is_missing_page(&self) -> bool {
        match self {
            FetchError::NotFound { .. } => true,
            FetchError::Status { status, .. } => *status == StatusCode::NOT_FOUND,
            _ => false,
        }
    }

    /// The browser session itself is gone; nothing else on this source can run.
    pub fn is_session_loss(&self) -> bool {
        matches!(self, FetchError::Browser(_))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("{site}: missing {what}")]
    MissingNode { site: SourceId, what: &'static str },
    #[error("date {raw:?} matches none of {formats:?}")]
    UnparseableDate { raw: String, formats: Vec<String> },
    #[error("not a number: {raw:?}")]
    BadNumber { raw: String },
}

impl ExtractError {
    pub fn missing(site: SourceId, what: &'static str) -> Self {
        ExtractError::MissingNode { site, what }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid descriptor for {site}: {reason}")]
    InvalidDescriptor { site: SourceId, reason: String },
    #[error("invalid date window: {lower} is after {upper}")]
    InvalidWindow {
        lower: chrono::NaiveDateTime,
        upper: chrono::NaiveDateTime,
    },
    #[error("invalid date {raw:?}, expected YYYYMMDD")]
    InvalidDate { raw: String },
    #[error("unknown source {0:?}")]
    UnknownSource(String),
}

#[derive(thiserror::Error, Debug)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CrawlError {
    /// Whether the traversal of the current source/term must stop, as opposed
    /// to skipping the entry that raised it.
    pub fn halts_traversal(&self) -> bool {
        match self {
            CrawlError::Fetch(e) => e.is_session_loss(),
            CrawlError::Extract(_) => false,
            CrawlError::Config(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transience() {
        let busy = FetchError::Status {
            url: "https://example.com".into(),
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        let gone = FetchError::Status {
            url: "https://example.com".into(),
            status: StatusCode::NOT_FOUND,
        };
        let throttled = FetchError::Status {
            url: "https://example.com".into(),
            status: StatusCode::TOO_MANY_REQUESTS,
        };
        assert!(busy.is_transient());
        assert!(!gone.is_transient());
        assert!(throttled.is_transient());
        assert!(!FetchError::Browser("crashed".into()).is_transient());
    }

    #[test]
    fn test_only_browser_loss_halts() {
        let lost: CrawlError = FetchError::Browser("target closed".into()).into();
        let missing: CrawlError = FetchError::NotFound {
            url: "https://example.com".into(),
        }
        .into();
        let unloaded: CrawlError = FetchError::Navigation {
            url: "https://example.com".into(),
            reason: "net::ERR_CONNECTION_RESET".into(),
        }
        .into();
        let undated: CrawlError = ExtractError::missing(SourceId::Ara, "date").into();
        assert!(lost.halts_traversal());
        assert!(!missing.halts_traversal());
        assert!(!unloaded.halts_traversal());
        assert!(!undated.halts_traversal());
    }

    #[test]
    fn test_missing_node_message() {
        let e = ExtractError::missing(SourceId::Diari, "comment author");
        assert_eq!(e.to_string(), "diari: missing comment author");
    }
}
