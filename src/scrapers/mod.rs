//! Per-site structural extraction rules.
//!
//! Every source maps its own markup onto the same small capability set,
//! expressed by [`SiteRules`]:
//!
//! 1. **Listing**: which nodes of a results page are article entries, and the
//!    title, link and category of each
//! 2. **Article**: the raw publication time (from the entry or the article
//!    page), subtitle and body
//! 3. **Comments**: which nodes are comments, their fields, and how a reply
//!    points at its parent
//!
//! # Supported Sources
//!
//! | Source | Module | Entries | Date from | Comments |
//! |--------|--------|---------|-----------|----------|
//! | L'Altaveu | [`altaveu`] | `div.c-news-list__wrapper` | article page | nested `div.children` |
//! | Periòdic d'Andorra | [`periodic`] | `li.item.article.article_llistat` | list | none |
//! | Ara Andorra | [`ara`] | `article.ara-card` | article `<meta>` | none |
//! | Bondia.ad | [`bondia`] | `div.flex.flex-col.gap-1` | list | RDFa `sioc:Post` |
//! | Diari d'Andorra | [`diari`] | `ul.resultadosBusquedaBS > li` | list | `a.ancla_referencia` |
//! | fòrum.ad | [`forum`] | `article.entry` | list | none |
//!
//! The set is closed: [`rules`] dispatches on [`SourceId`].
//!
//! Rules only read the DOM. Date parsing against the descriptor's formats,
//! link resolution and id assignment happen in the crawl loop.

pub mod altaveu;
pub mod ara;
pub mod bondia;
pub mod diari;
pub mod forum;
pub mod periodic;

use crate::error::ExtractError;
use crate::sources::SourceId;
use crate::utils::squash_whitespace;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Title, link and raw category of one list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFields {
    pub title: String,
    /// `href` as found in the page; may be relative.
    pub link: String,
    pub category: String,
}

/// Subtitle and body text of an article. Both degrade to empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleBody {
    pub subtitle: String,
    pub body: String,
}

/// One comment as read from the DOM, before ids are namespaced by article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawComment {
    pub local_id: String,
    pub author: String,
    pub displayed_time: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub likes: Option<u32>,
    pub dislikes: Option<u32>,
}

pub trait SiteRules: Sync {
    fn id(&self) -> SourceId;

    /// Article entries of a results page, in page order.
    fn list_entries<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>>;

    /// Entries revealed by the `batch`-th (0-based) "show more" click.
    fn revealed_entries<'a>(&self, _doc: &'a Html, _batch: usize) -> Vec<ElementRef<'a>> {
        Vec::new()
    }

    fn list_fields(&self, entry: ElementRef<'_>) -> Result<ListFields, ExtractError>;

    /// Unparsed publication time. `article` is set for sources whose list
    /// lacks the precise time.
    fn raw_timestamp(
        &self,
        entry: ElementRef<'_>,
        article: Option<&Html>,
    ) -> Result<String, ExtractError>;

    fn body(&self, article: &Html) -> ArticleBody;

    /// Comment nodes in DOM order.
    fn comment_nodes<'a>(&self, _doc: &'a Html) -> Vec<ElementRef<'a>> {
        Vec::new()
    }

    fn comment(&self, _node: ElementRef<'_>) -> Result<RawComment, ExtractError> {
        Err(ExtractError::missing(self.id(), "comment support"))
    }

    /// Site-local id of the comment `node` answers, or `None` for a thread root.
    fn parent_id(&self, _node: ElementRef<'_>) -> Option<String> {
        None
    }
}

pub fn rules(id: SourceId) -> &'static dyn SiteRules {
    match id {
        SourceId::Altaveu => &altaveu::Altaveu,
        SourceId::Periodic => &periodic::Periodic,
        SourceId::Ara => &ara::Ara,
        SourceId::Bondia => &bondia::Bondia,
        SourceId::Diari => &diari::Diari,
        SourceId::Forum => &forum::Forum,
    }
}

/// Compile a selector known at build time.
pub(crate) fn css(query: &'static str) -> Selector {
    Selector::parse(query).unwrap_or_else(|e| panic!("invalid selector {query:?}: {e}"))
}

/// Compile a regex known at build time.
pub(crate) fn pattern(re: &'static str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid pattern {re:?}: {e}"))
}

pub(crate) fn first<'a>(scope: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    scope.select(selector).next()
}

/// Follow a chain of "first matching descendant" steps from `scope`.
pub(crate) fn descend<'a>(scope: ElementRef<'a>, path: &[&Selector]) -> Option<ElementRef<'a>> {
    path.iter().try_fold(scope, |el, step| first(el, step))
}

pub(crate) fn first_in<'a>(doc: &'a Html, selector: &Selector) -> Option<ElementRef<'a>> {
    doc.select(selector).next()
}

pub(crate) fn require<'a>(
    site: SourceId,
    scope: ElementRef<'a>,
    selector: &Selector,
    what: &'static str,
) -> Result<ElementRef<'a>, ExtractError> {
    first(scope, selector).ok_or_else(|| ExtractError::missing(site, what))
}

pub(crate) fn attr(
    site: SourceId,
    el: ElementRef<'_>,
    name: &str,
    what: &'static str,
) -> Result<String, ExtractError> {
    el.value()
        .attr(name)
        .map(|v| v.trim().to_string())
        .ok_or_else(|| ExtractError::missing(site, what))
}

/// Text content, trimmed.
pub(crate) fn text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Text content with whitespace runs collapsed.
pub(crate) fn flat_text(el: ElementRef<'_>) -> String {
    squash_whitespace(&el.text().collect::<String>())
}

/// Text of the first match inside `doc`, or an empty string.
pub(crate) fn optional_text(doc: &Html, selector: &Selector) -> String {
    first_in(doc, selector).map(text).unwrap_or_default()
}

pub(crate) fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

/// Vote counter text as a number. Empty counters read as zero.
pub(crate) fn count(raw: &str) -> Result<u32, ExtractError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse().map_err(|_| ExtractError::BadNumber {
        raw: trimmed.to_string(),
    })
}

/// Keep only ASCII digits; error when none are left.
pub(crate) fn numeric_id(raw: &str) -> Result<String, ExtractError> {
    let digits: String = raw.trim().chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(ExtractError::BadNumber {
            raw: raw.to_string(),
        });
    }
    Ok(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_dispatch_matches_id() {
        for id in SourceId::ALL {
            assert_eq!(rules(id).id(), id);
        }
    }

    #[test]
    fn test_descend_stays_inside_scope() {
        let doc = Html::parse_document(
            r#"<div><div><article><a id="title">T</a><div><div><a id="cat">C</a></div></div></article></div></div>"#,
        );
        let article = first_in(&doc, &css("article")).unwrap();
        let div = css("div");
        let a = css("a");
        let found = descend(article, &[&div, &div, &a]).unwrap();
        assert_eq!(found.value().attr("id"), Some("cat"));
        assert!(descend(article, &[&div, &div, &div]).is_none());
    }

    #[test]
    fn test_count() {
        assert_eq!(count(" 12 ").unwrap(), 12);
        assert_eq!(count("").unwrap(), 0);
        assert!(count("molts").is_err());
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(numeric_id(" 4815 ").unwrap(), "4815");
        assert_eq!(numeric_id("'77'").unwrap(), "77");
        assert!(numeric_id("abc").is_err());
    }

    #[test]
    fn test_sources_without_comments() {
        let doc = Html::parse_document("<div data-type='comment'></div>");
        for id in [SourceId::Forum, SourceId::Periodic, SourceId::Ara] {
            assert!(rules(id).comment_nodes(&doc).is_empty());
        }
    }
}
