//! Source registry: the static description of every news site we crawl.
//!
//! A [`SourceDescriptor`] carries everything about a site that is data rather
//! than code: its search URL and word-joining rule, which pagination strategy
//! drives it, whether its pages need a browser, the locators of its consent
//! dialogs and "show more" controls, and the date formats it prints.
//!
//! The structural extraction rules (which DOM node holds the title, how a reply
//! points at its parent) are code and live in [`crate::scrapers`].
//!
//! Built-in descriptors cover every [`SourceId`]; a config file may replace any
//! of them. Descriptors are validated once when the registry is built, and a
//! source whose descriptor is invalid is disabled for the run.

use crate::error::ConfigError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{error, instrument};
use url::Url;

/// One news outlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Altaveu,
    Periodic,
    Ara,
    Bondia,
    Diari,
    Forum,
}

impl SourceId {
    pub const ALL: [SourceId; 6] = [
        SourceId::Altaveu,
        SourceId::Periodic,
        SourceId::Ara,
        SourceId::Bondia,
        SourceId::Diari,
        SourceId::Forum,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceId::Altaveu => "altaveu",
            SourceId::Periodic => "periodic",
            SourceId::Ara => "ara",
            SourceId::Bondia => "bondia",
            SourceId::Diari => "diari",
            SourceId::Forum => "forum",
        }
    }

    /// Two-letter uppercase prefix used in article ids.
    pub fn prefix(self) -> String {
        self.as_str().chars().take(2).collect::<String>().to_uppercase()
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SourceId::Altaveu => "L'Altaveu",
            SourceId::Periodic => "Periòdic d'Andorra",
            SourceId::Ara => "Ara Andorra",
            SourceId::Bondia => "Bondia.ad",
            SourceId::Diari => "Diari d'Andorra",
            SourceId::Forum => "fòrum.ad",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SourceId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownSource(s.to_string()))
    }
}

/// How an element is located in a live browser page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", content = "query", rename_all = "lowercase")]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(q: &str) -> Self {
        Locator::Css(q.to_string())
    }

    pub fn xpath(q: &str) -> Self {
        Locator::XPath(q.to_string())
    }

    pub fn query(&self) -> &str {
        match self {
            Locator::Css(q) | Locator::XPath(q) => q,
        }
    }

    /// Substitute `{page}` in the query.
    pub fn for_page(&self, page: u32) -> Locator {
        let fill = |q: &str| q.replace("{page}", &page.to_string());
        match self {
            Locator::Css(q) => Locator::Css(fill(q)),
            Locator::XPath(q) => Locator::XPath(fill(q)),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(q) => write!(f, "css:{q}"),
            Locator::XPath(q) => write!(f, "xpath:{q}"),
        }
    }
}

/// Whether a page can be fetched with plain HTTP or needs a rendered browser tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Render {
    Static,
    Dynamic,
}

/// How the words of a search term are joined into the search URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermJoin {
    /// `a+b`
    Plus,
    /// `a%20b`
    Percent20,
    /// `"a%20b"`
    QuotedPercent20,
    /// `%22a+b%22&submit=Search`
    QuotedPlus,
}

/// How the URL of page `n` (1-based) is derived from the search URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextPage {
    /// Append `&{key}={n}` (or `n - 1` when zero based).
    QueryParam { key: String, zero_based: bool },
    /// Insert `/{segment}/{n}/` in front of the query string.
    PathSegment { segment: String },
}

/// Traversal protocol of a source's result listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaginationStrategy {
    NumberedPages {
        next_page: NextPage,
    },
    SinglePage,
    LoadMorePage {
        button: Locator,
        /// Container that appears once per successful click.
        revealed: Locator,
    },
    DynamicNumberedPages {
        /// Page link locator; `{page}` is replaced by the page number.
        page_button: Locator,
    },
}

impl PaginationStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            PaginationStrategy::NumberedPages { .. } => "numbered_pages",
            PaginationStrategy::SinglePage => "single_page",
            PaginationStrategy::LoadMorePage { .. } => "load_more_page",
            PaginationStrategy::DynamicNumberedPages { .. } => "dynamic_numbered_pages",
        }
    }
}

/// Site-specific actions run right after a browser navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OpeningAction {
    /// Type the quoted search term into a search box and submit it. Only run
    /// when opening the search URL.
    SubmitSearch {
        input: Locator,
        button: Locator,
        settle_ms: u64,
    },
    /// Click through an interstitial advert if one shows up.
    Interstitial { link: Locator },
}

/// Where an article's comments come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommentLoading {
    None,
    /// Comments are already in the statically fetched article DOM.
    Inline,
    /// Open the article in the primary browser tab and expand all comments.
    Browser { load_more: Locator },
    /// Open the article in a second tab so the primary tab keeps its state.
    SecondaryTab { load_more: Locator },
}

/// How a comment's displayed time is turned into a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "formats", rename_all = "snake_case")]
pub enum CommentTime {
    Formats(Vec<String>),
    /// Catalan relative phrases such as "Fa 3 hores".
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    /// Upper bound for explicit waits on DOM elements.
    pub wait_timeout_ms: u64,
    /// Settle delay after a simulated click.
    pub settle_ms: u64,
}

impl Timings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 15_000,
            settle_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub id: SourceId,
    pub search_url: String,
    pub term_join: TermJoin,
    pub strategy: PaginationStrategy,
    pub list_render: Render,
    pub article_render: Render,
    /// Element to wait for before a dynamic list page is snapshotted.
    #[serde(default)]
    pub list_locator: Option<Locator>,
    #[serde(default)]
    pub cookies: Option<Locator>,
    #[serde(default)]
    pub notifications: Option<Locator>,
    #[serde(default)]
    pub opening: Vec<OpeningAction>,
    pub date_formats: Vec<String>,
    /// The list page lacks the precise time; open the permalink to read it.
    pub date_in_article: bool,
    pub comments: CommentLoading,
    #[serde(default = "default_comment_time")]
    pub comment_time: CommentTime,
    #[serde(default)]
    pub timings: Timings,
}

fn default_comment_time() -> CommentTime {
    CommentTime::Formats(Vec::new())
}

impl SourceDescriptor {
    /// Build the search results URL for a term.
    pub fn search_url_for(&self, term: &str) -> String {
        let words: Vec<String> = term
            .split_whitespace()
            .map(|w| urlencoding::encode(w).into_owned())
            .collect();
        match self.term_join {
            TermJoin::Plus => format!("{}{}", self.search_url, words.iter().join("+")),
            TermJoin::Percent20 => format!("{}{}", self.search_url, words.iter().join("%20")),
            TermJoin::QuotedPercent20 => {
                format!("{}\"{}\"", self.search_url, words.iter().join("%20"))
            }
            TermJoin::QuotedPlus => format!(
                "{}%22{}%22&submit=Search",
                self.search_url,
                words.iter().join("+")
            ),
        }
    }

    /// Check the descriptor is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDescriptor {
            site: self.id,
            reason: reason.to_string(),
        };

        if self.search_url.trim().is_empty() {
            return Err(invalid("empty search url"));
        }
        Url::parse(&self.search_url).map_err(|e| invalid(&format!("bad search url: {e}")))?;
        if self.date_formats.is_empty() {
            return Err(invalid("no date formats"));
        }
        match &self.strategy {
            PaginationStrategy::LoadMorePage { .. }
            | PaginationStrategy::DynamicNumberedPages { .. }
                if self.list_render != Render::Dynamic =>
            {
                return Err(invalid("browser-driven pagination needs a dynamic list"));
            }
            PaginationStrategy::DynamicNumberedPages { page_button }
                if !page_button.query().contains("{page}") =>
            {
                return Err(invalid("page button locator lacks a {page} placeholder"));
            }
            _ => {}
        }
        // The results tab holds the page state; articles and comments must not
        // navigate it away.
        if matches!(self.strategy, PaginationStrategy::DynamicNumberedPages { .. }) {
            if self.article_render != Render::Static {
                return Err(invalid("dynamic numbered pages need static articles"));
            }
            if matches!(self.comments, CommentLoading::Browser { .. }) {
                return Err(invalid(
                    "dynamic numbered pages cannot load comments in the primary tab",
                ));
            }
        }
        if self.list_render == Render::Dynamic && self.list_locator.is_none() {
            return Err(invalid("dynamic list without a list locator"));
        }
        if let CommentTime::Formats(f) = &self.comment_time {
            if f.is_empty() && self.comments != CommentLoading::None {
                return Err(invalid("comments enabled without comment date formats"));
            }
        }
        Ok(())
    }

    /// Built-in descriptor of a source.
    pub fn builtin(id: SourceId) -> Self {
        let fmts = |f: &[&str]| f.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        match id {
            SourceId::Altaveu => Self {
                id,
                search_url: "https://www.altaveu.com/cercador.html?search=".into(),
                term_join: TermJoin::Plus,
                strategy: PaginationStrategy::NumberedPages {
                    next_page: NextPage::QueryParam {
                        key: "page".into(),
                        zero_based: false,
                    },
                },
                list_render: Render::Static,
                article_render: Render::Static,
                list_locator: None,
                cookies: Some(Locator::xpath(r#"//*[contains(text(), "AGREE")]"#)),
                notifications: Some(Locator::css(
                    "button.align-right.secondary.slidedown-button",
                )),
                opening: Vec::new(),
                date_formats: fmts(&["%d/%m/%Y (%H:%M CET)"]),
                date_in_article: true,
                comments: CommentLoading::Browser {
                    load_more: Locator::css("div.c-paginator > a"),
                },
                comment_time: CommentTime::Relative,
                timings: Timings::default(),
            },
            SourceId::Forum => Self {
                id,
                search_url: "https://forum.ad/?s=".into(),
                term_join: TermJoin::QuotedPlus,
                strategy: PaginationStrategy::NumberedPages {
                    next_page: NextPage::PathSegment {
                        segment: "page".into(),
                    },
                },
                list_render: Render::Static,
                article_render: Render::Static,
                list_locator: None,
                cookies: None,
                notifications: None,
                opening: Vec::new(),
                date_formats: fmts(&["%d/%m/%y %H:%M", "%d/%m/%Y %H:%M"]),
                date_in_article: false,
                comments: CommentLoading::None,
                comment_time: default_comment_time(),
                timings: Timings::default(),
            },
            SourceId::Bondia => Self {
                id,
                search_url: "https://www.bondia.ad/cercador?search=".into(),
                term_join: TermJoin::Plus,
                strategy: PaginationStrategy::NumberedPages {
                    next_page: NextPage::QueryParam {
                        key: "page".into(),
                        zero_based: true,
                    },
                },
                list_render: Render::Static,
                article_render: Render::Static,
                list_locator: None,
                cookies: None,
                notifications: None,
                opening: Vec::new(),
                date_formats: fmts(&["%Y-%m-%d %H:%M:%S"]),
                date_in_article: false,
                comments: CommentLoading::Inline,
                comment_time: CommentTime::Formats(fmts(&["%Y-%m-%dT%H:%M:%S"])),
                timings: Timings::default(),
            },
            SourceId::Periodic => Self {
                id,
                search_url: "https://www.elperiodic.ad/cerca?que=".into(),
                term_join: TermJoin::Percent20,
                strategy: PaginationStrategy::SinglePage,
                list_render: Render::Dynamic,
                article_render: Render::Dynamic,
                list_locator: Some(Locator::css("li.item.article.article_llistat")),
                cookies: None,
                notifications: Some(Locator::css(
                    "button.align-right.secondary.slidedown-button",
                )),
                opening: vec![OpeningAction::Interstitial {
                    link: Locator::css("div.interstitial__link > a"),
                }],
                date_formats: fmts(&["%d.%m.%Y - %H:%M h"]),
                date_in_article: false,
                comments: CommentLoading::None,
                comment_time: default_comment_time(),
                timings: Timings::default(),
            },
            SourceId::Ara => Self {
                id,
                search_url: "https://www.ara.ad/cercador?text=".into(),
                term_join: TermJoin::QuotedPercent20,
                strategy: PaginationStrategy::LoadMorePage {
                    button: Locator::css("button.ara-button.secondary"),
                    revealed: Locator::css("div.page-container"),
                },
                list_render: Render::Dynamic,
                article_render: Render::Dynamic,
                list_locator: Some(Locator::css("article.ara-card.ara-card--article")),
                cookies: Some(Locator::css("button#didomi-notice-agree-button")),
                notifications: None,
                opening: Vec::new(),
                date_formats: fmts(&["%Y-%m-%dT%H:%M:%S"]),
                date_in_article: true,
                comments: CommentLoading::None,
                comment_time: default_comment_time(),
                timings: Timings::default(),
            },
            SourceId::Diari => Self {
                id,
                search_url: "https://www.diariandorra.ad/search/?query=".into(),
                term_join: TermJoin::Plus,
                strategy: PaginationStrategy::DynamicNumberedPages {
                    page_button: Locator::xpath(
                        r#"//ul[contains(@class, "pagination")]//a[normalize-space(text())="{page}"]"#,
                    ),
                },
                list_render: Render::Dynamic,
                // The live tab holds the pagination state, so articles are
                // fetched over plain HTTP.
                article_render: Render::Static,
                list_locator: Some(Locator::css("ul.resultadosBusquedaBS > li")),
                cookies: Some(Locator::css("button.cky-btn.cky-btn-accept")),
                notifications: Some(Locator::css("div.cancel-notification")),
                opening: vec![OpeningAction::SubmitSearch {
                    input: Locator::css(r#"input[placeholder="Paraula a buscar"]"#),
                    button: Locator::css("input#busc_btn"),
                    settle_ms: 5_000,
                }],
                date_formats: fmts(&["%d.%m.%Y | %H:%M"]),
                date_in_article: false,
                comments: CommentLoading::SecondaryTab {
                    load_more: Locator::css("a.next_com"),
                },
                comment_time: CommentTime::Formats(fmts(&["(%d/%m/%y %H:%M)"])),
                timings: Timings {
                    wait_timeout_ms: 15_000,
                    settle_ms: 5_000,
                },
            },
        }
    }
}

/// URL of result page `page` (1-based). Page 1 is the search URL itself.
pub fn numbered_page_url(search_url: &str, next_page: &NextPage, page: u32) -> String {
    if page <= 1 {
        return search_url.to_string();
    }
    match next_page {
        NextPage::QueryParam { key, zero_based } => {
            let n = if *zero_based { page - 1 } else { page };
            let sep = if search_url.contains('?') { '&' } else { '?' };
            format!("{search_url}{sep}{key}={n}")
        }
        NextPage::PathSegment { segment } => match search_url.split_once('?') {
            Some((base, query)) => {
                format!("{}/{segment}/{page}/?{query}", base.trim_end_matches('/'))
            }
            None => format!("{}/{segment}/{page}/", search_url.trim_end_matches('/')),
        },
    }
}

/// Validated descriptors keyed by source id.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    descriptors: BTreeMap<SourceId, SourceDescriptor>,
}

impl SourceRegistry {
    /// Built-in descriptors with `overrides` applied. Invalid descriptors are
    /// logged and left out, which disables that source.
    #[instrument(level = "info", skip_all, fields(overrides = overrides.len()))]
    pub fn new(overrides: &BTreeMap<SourceId, SourceDescriptor>) -> Self {
        let mut descriptors = BTreeMap::new();
        for id in SourceId::ALL {
            let descriptor = overrides
                .get(&id)
                .cloned()
                .unwrap_or_else(|| SourceDescriptor::builtin(id));
            if descriptor.id != id {
                error!(
                    source = %id,
                    declared = %descriptor.id,
                    "Descriptor id mismatch; source disabled"
                );
                continue;
            }
            match descriptor.validate() {
                Ok(()) => {
                    descriptors.insert(id, descriptor);
                }
                Err(e) => error!(source = %id, error = %e, "Invalid descriptor; source disabled"),
            }
        }
        Self { descriptors }
    }

    pub fn get(&self, id: SourceId) -> Option<&SourceDescriptor> {
        self.descriptors.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix() {
        assert_eq!(SourceId::Diari.prefix(), "DI");
        assert_eq!(SourceId::Altaveu.prefix(), "AL");
        assert_eq!(SourceId::Forum.prefix(), "FO");
    }

    #[test]
    fn test_source_id_from_str() {
        assert_eq!("Bondia".parse::<SourceId>().unwrap(), SourceId::Bondia);
        assert_eq!(" ara ".parse::<SourceId>().unwrap(), SourceId::Ara);
        assert!("ser".parse::<SourceId>().is_err());
    }

    #[test]
    fn test_search_url_joining() {
        let term = "consell general";
        assert_eq!(
            SourceDescriptor::builtin(SourceId::Altaveu).search_url_for(term),
            "https://www.altaveu.com/cercador.html?search=consell+general"
        );
        assert_eq!(
            SourceDescriptor::builtin(SourceId::Periodic).search_url_for(term),
            "https://www.elperiodic.ad/cerca?que=consell%20general"
        );
        assert_eq!(
            SourceDescriptor::builtin(SourceId::Ara).search_url_for(term),
            "https://www.ara.ad/cercador?text=\"consell%20general\""
        );
        assert_eq!(
            SourceDescriptor::builtin(SourceId::Forum).search_url_for(term),
            "https://forum.ad/?s=%22consell+general%22&submit=Search"
        );
    }

    #[test]
    fn test_search_url_encodes_words() {
        assert_eq!(
            SourceDescriptor::builtin(SourceId::Bondia).search_url_for("pressupost ús"),
            "https://www.bondia.ad/cercador?search=pressupost+%C3%BAs"
        );
    }

    #[test]
    fn test_numbered_page_url_query() {
        let np = NextPage::QueryParam {
            key: "page".into(),
            zero_based: false,
        };
        let base = "https://www.altaveu.com/cercador.html?search=habitatge";
        assert_eq!(numbered_page_url(base, &np, 1), base);
        assert_eq!(
            numbered_page_url(base, &np, 3),
            "https://www.altaveu.com/cercador.html?search=habitatge&page=3"
        );
    }

    #[test]
    fn test_numbered_page_url_zero_based() {
        let np = NextPage::QueryParam {
            key: "page".into(),
            zero_based: true,
        };
        assert_eq!(
            numbered_page_url("https://www.bondia.ad/cercador?search=x", &np, 2),
            "https://www.bondia.ad/cercador?search=x&page=1"
        );
    }

    #[test]
    fn test_numbered_page_url_path_segment() {
        let np = NextPage::PathSegment {
            segment: "page".into(),
        };
        assert_eq!(
            numbered_page_url("https://forum.ad/?s=%22x%22&submit=Search", &np, 2),
            "https://forum.ad/page/2/?s=%22x%22&submit=Search"
        );
    }

    #[test]
    fn test_builtins_are_valid() {
        for id in SourceId::ALL {
            let d = SourceDescriptor::builtin(id);
            assert_eq!(d.id, id);
            d.validate().unwrap();
        }
    }

    #[test]
    fn test_invalid_override_disables_source() {
        let mut broken = SourceDescriptor::builtin(SourceId::Ara);
        broken.date_formats.clear();
        let overrides = BTreeMap::from([(SourceId::Ara, broken)]);
        let registry = SourceRegistry::new(&overrides);
        assert!(registry.get(SourceId::Ara).is_none());
        assert!(registry.get(SourceId::Diari).is_some());
    }

    #[test]
    fn test_dynamic_pagination_requires_dynamic_list() {
        let mut d = SourceDescriptor::builtin(SourceId::Diari);
        d.list_render = Render::Static;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_dynamic_pages_keep_primary_tab() {
        let mut d = SourceDescriptor::builtin(SourceId::Diari);
        d.comments = CommentLoading::Browser {
            load_more: Locator::css("a.next_com"),
        };
        assert!(d.validate().is_err());

        let mut d = SourceDescriptor::builtin(SourceId::Diari);
        d.article_render = Render::Dynamic;
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_page_locator() {
        let button = Locator::xpath(r#"//a[text()="{page}"]"#);
        assert_eq!(button.for_page(3), Locator::xpath(r#"//a[text()="3"]"#));
    }

    #[test]
    fn test_descriptor_yaml_round_trip() {
        let d = SourceDescriptor::builtin(SourceId::Diari);
        let yaml = serde_yaml::to_string(&d).unwrap();
        let back: SourceDescriptor = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, d);
    }
}
