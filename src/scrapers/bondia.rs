//! Bondia.ad, a Drupal site.
//!
//! Results live in `section.col-span-12` as Tailwind-styled divs. Comments
//! are inlined in the article page with RDFa annotations: the comment id is in
//! the `about` attribute (`/comment/123#comment-123`) and a reply carries a
//! `resource="/comment/<parent>"` span and sits in an `indented` container.

use super::{
    ArticleBody, ListFields, RawComment, SiteRules, attr, css, descend, first, first_in,
    flat_text, numeric_id, optional_text, parent_element, require, text,
};
use crate::error::ExtractError;
use crate::sources::SourceId;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static RESULTS: Lazy<Selector> = Lazy::new(|| css("section.col-span-12"));
static CARD: Lazy<Selector> = Lazy::new(|| css("div"));
static LINK: Lazy<Selector> = Lazy::new(|| css("a"));
static DATE: Lazy<Selector> = Lazy::new(|| css("div.flex.flex-row.gap-2.italic.text-sm span"));
static BODY: Lazy<Selector> = Lazy::new(|| css(r#"div[property*="content:encoded"]"#));
static COMMENT: Lazy<Selector> = Lazy::new(|| css(r#"div[typeof="sioc:Post sioct:Comment"]"#));
static USERNAME: Lazy<Selector> = Lazy::new(|| css("span.username"));
static CREATED: Lazy<Selector> = Lazy::new(|| css(r#"span[property="dc:date dc:created"]"#));
static COMMENT_BODY: Lazy<Selector> = Lazy::new(|| css(r#"div[property="content:encoded"]"#));
static REPLY_OF: Lazy<Selector> = Lazy::new(|| css(r#"span[resource^="/comment"]"#));

const SITE: SourceId = SourceId::Bondia;
const CARD_CLASS: &str = "flex flex-col gap-1";

pub struct Bondia;

/// `/comment/123#comment-123` -> `123`
fn comment_ref(raw: &str) -> Result<String, ExtractError> {
    let id = raw
        .split('/')
        .nth(2)
        .and_then(|tail| tail.split('#').next())
        .unwrap_or_default();
    numeric_id(id)
}

impl SiteRules for Bondia {
    fn id(&self) -> SourceId {
        SITE
    }

    fn list_entries<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        let Some(results) = first_in(doc, &RESULTS) else {
            return Vec::new();
        };
        results
            .select(&CARD)
            .filter(|div| div.value().attr("class").map(str::trim) == Some(CARD_CLASS))
            .collect()
    }

    fn list_fields(&self, entry: ElementRef<'_>) -> Result<ListFields, ExtractError> {
        let link = require(SITE, entry, &LINK, "entry link")?;
        Ok(ListFields {
            title: flat_text(link),
            link: attr(SITE, link, "href", "entry href")?,
            category: descend(entry, &[&*CARD, &*CARD, &*CARD])
                .map(text)
                .unwrap_or_default(),
        })
    }

    fn raw_timestamp(
        &self,
        entry: ElementRef<'_>,
        _article: Option<&Html>,
    ) -> Result<String, ExtractError> {
        first(entry, &DATE)
            .map(text)
            .ok_or_else(|| ExtractError::missing(SITE, "entry date"))
    }

    fn body(&self, article: &Html) -> ArticleBody {
        ArticleBody {
            subtitle: String::new(),
            body: optional_text(article, &BODY),
        }
    }

    fn comment_nodes<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&COMMENT)
            .filter(|c| c.value().classes().any(|class| class.contains("comment")))
            .collect()
    }

    fn comment(&self, node: ElementRef<'_>) -> Result<RawComment, ExtractError> {
        let created = require(SITE, node, &CREATED, "comment date")?;
        let created = attr(SITE, created, "content", "comment date content")?;
        Ok(RawComment {
            local_id: comment_ref(&attr(SITE, node, "about", "comment about")?)?,
            author: text(require(SITE, node, &USERNAME, "comment author")?),
            displayed_time: created.split('+').next().unwrap_or_default().to_string(),
            content: text(require(SITE, node, &COMMENT_BODY, "comment body")?),
            parent_id: self.parent_id(node),
            likes: None,
            dislikes: None,
        })
    }

    fn parent_id(&self, node: ElementRef<'_>) -> Option<String> {
        let container = parent_element(node)?;
        if container.value().classes().next() != Some("indented") {
            return None;
        }
        let reply_of = first(node, &REPLY_OF)?;
        comment_ref(reply_of.value().attr("resource")?).ok()
    }
}
