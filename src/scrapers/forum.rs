//! fòrum.ad, a WordPress site. Entries and categories come from post classes.

use super::{
    ArticleBody, ListFields, SiteRules, attr, css, first, flat_text, optional_text, pattern, require,
    text,
};
use crate::error::ExtractError;
use crate::sources::SourceId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static POST: Lazy<Selector> = Lazy::new(|| css("article"));
static POST_CLASS: Lazy<Regex> = Lazy::new(|| pattern(r"^entry author-.* post-.*"));
static HEADLINE: Lazy<Selector> = Lazy::new(|| css("header h2 a"));
static TIME: Lazy<Selector> = Lazy::new(|| css("time"));
static BODY: Lazy<Selector> = Lazy::new(|| css("div.entry-the-content"));

const SITE: SourceId = SourceId::Forum;

pub struct Forum;

impl SiteRules for Forum {
    fn id(&self) -> SourceId {
        SITE
    }

    fn list_entries<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&POST)
            .filter(|a| {
                a.value()
                    .attr("class")
                    .is_some_and(|c| POST_CLASS.is_match(c.trim()))
            })
            .collect()
    }

    fn list_fields(&self, entry: ElementRef<'_>) -> Result<ListFields, ExtractError> {
        let headline = require(SITE, entry, &HEADLINE, "headline link")?;
        // Uncategorised posts have no category- class.
        let category = entry
            .value()
            .classes()
            .find_map(|c| c.strip_prefix("category-"))
            .unwrap_or_default()
            .to_string();
        Ok(ListFields {
            title: flat_text(headline),
            link: attr(SITE, headline, "href", "headline href")?,
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
            .ok_or_else(|| ExtractError::missing(SITE, "post time"))
    }

    fn body(&self, article: &Html) -> ArticleBody {
        ArticleBody {
            subtitle: String::new(),
            body: optional_text(article, &BODY),
        }
    }
}
