//! Periòdic d'Andorra (`elperiodic.ad`).
//!
//! All results render on one dynamic page. The category is encoded in the
//! entry's class list (`article_<category>`); plain news carry no such class.

use super::{
    ArticleBody, ListFields, SiteRules, attr, css, first, flat_text, optional_text, pattern, require,
    text,
};
use crate::error::ExtractError;
use crate::sources::SourceId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static ITEM: Lazy<Selector> = Lazy::new(|| css("li"));
static ITEM_CLASS: Lazy<Regex> = Lazy::new(|| pattern(r"^item article article_llistat"));
static LINK: Lazy<Selector> = Lazy::new(|| css("a"));
static TITLE: Lazy<Selector> = Lazy::new(|| css("a h2"));
static TIME: Lazy<Selector> = Lazy::new(|| css("time"));
static SUBTITLE: Lazy<Selector> = Lazy::new(|| css("h2.noticia-header__subtitle"));
static BODY: Lazy<Selector> = Lazy::new(|| css("div.noticia-main__content"));

const SITE: SourceId = SourceId::Periodic;
const DEFAULT_CATEGORY: &str = "notícia";

pub struct Periodic;

impl SiteRules for Periodic {
    fn id(&self) -> SourceId {
        SITE
    }

    fn list_entries<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&ITEM)
            .filter(|li| {
                li.value()
                    .attr("class")
                    .is_some_and(|c| ITEM_CLASS.is_match(c.trim()))
            })
            .collect()
    }

    fn list_fields(&self, entry: ElementRef<'_>) -> Result<ListFields, ExtractError> {
        let link = require(SITE, entry, &LINK, "entry link")?;
        let category = entry
            .value()
            .classes()
            .filter(|c| *c != "article_llistat")
            .find_map(|c| c.strip_prefix("article_"))
            .unwrap_or(DEFAULT_CATEGORY)
            .to_string();
        Ok(ListFields {
            title: flat_text(require(SITE, entry, &TITLE, "entry title")?),
            link: attr(SITE, link, "href", "entry href")?,
            category,
        })
    }

    fn raw_timestamp(
        &self,
        entry: ElementRef<'_>,
        _article: Option<&Html>,
    ) -> Result<String, ExtractError> {
        first(entry, &TIME)
            .map(text)
            .ok_or_else(|| ExtractError::missing(SITE, "entry time"))
    }

    fn body(&self, article: &Html) -> ArticleBody {
        ArticleBody {
            subtitle: optional_text(article, &SUBTITLE),
            body: optional_text(article, &BODY),
        }
    }
}
