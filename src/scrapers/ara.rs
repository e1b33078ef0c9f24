//! Ara Andorra (`ara.ad`).
//!
//! Results grow behind a "show more" button; each click appends one
//! `div.page-container` under `div.next-page`. The list shows no date, the
//! article's `article:modified_time` meta tag is used instead.

use super::{
    ArticleBody, ListFields, SiteRules, attr, css, descend, first_in, optional_text, require, text,
};
use crate::error::ExtractError;
use crate::sources::SourceId;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static CARD: Lazy<Selector> = Lazy::new(|| css("article.ara-card.ara-card--article"));
static REVEALED: Lazy<Selector> = Lazy::new(|| css("div.next-page div.page-container"));
static LINK: Lazy<Selector> = Lazy::new(|| css("a"));
static DIV: Lazy<Selector> = Lazy::new(|| css("div"));
static MODIFIED: Lazy<Selector> = Lazy::new(|| css(r#"meta[property="article:modified_time"]"#));
static SUBTITLE: Lazy<Selector> = Lazy::new(|| css("h2.subtitle"));
static BODY: Lazy<Selector> = Lazy::new(|| css("div.ara-body"));

const SITE: SourceId = SourceId::Ara;

pub struct Ara;

impl SiteRules for Ara {
    fn id(&self) -> SourceId {
        SITE
    }

    fn list_entries<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&CARD).collect()
    }

    fn revealed_entries<'a>(&self, doc: &'a Html, batch: usize) -> Vec<ElementRef<'a>> {
        doc.select(&REVEALED)
            .nth(batch)
            .map(|page| page.select(&CARD).collect())
            .unwrap_or_default()
    }

    fn list_fields(&self, entry: ElementRef<'_>) -> Result<ListFields, ExtractError> {
        let link = require(SITE, entry, &LINK, "card link")?;
        Ok(ListFields {
            title: attr(SITE, link, "title", "card title")?,
            link: attr(SITE, link, "href", "card href")?,
            category: descend(entry, &[&*DIV, &*DIV, &*LINK])
                .map(text)
                .unwrap_or_default(),
        })
    }

    /// `2024-01-15T09:30:00+01:00` with the offset dropped.
    fn raw_timestamp(
        &self,
        _entry: ElementRef<'_>,
        article: Option<&Html>,
    ) -> Result<String, ExtractError> {
        let meta = article
            .and_then(|doc| first_in(doc, &MODIFIED))
            .ok_or_else(|| ExtractError::missing(SITE, "article:modified_time"))?;
        let content = attr(SITE, meta, "content", "modified_time content")?;
        Ok(content.split('+').next().unwrap_or_default().to_string())
    }

    fn body(&self, article: &Html) -> ArticleBody {
        ArticleBody {
            subtitle: optional_text(article, &SUBTITLE),
            body: optional_text(article, &BODY),
        }
    }
}
