//! L'Altaveu (`altaveu.com`).
//!
//! The results list has no time of day, so the timestamp comes from the
//! article page (`time.c-mainarticle__time`). Comments are rendered client
//! side and nest replies inside a `div.children` container of the comment they
//! answer; every comment carries its id on its "like" button.

use super::{
    ArticleBody, ListFields, RawComment, SiteRules, attr, count, css, first, first_in, flat_text,
    numeric_id, optional_text, parent_element, require, text,
};
use crate::error::ExtractError;
use crate::sources::SourceId;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static ENTRY: Lazy<Selector> = Lazy::new(|| css("div.c-news-list__wrapper"));
static HEADLINE: Lazy<Selector> = Lazy::new(|| css("h2 a"));
static CATEGORY: Lazy<Selector> = Lazy::new(|| css("p a"));
static TIME: Lazy<Selector> = Lazy::new(|| css("time.c-mainarticle__time"));
static SUBTITLE: Lazy<Selector> = Lazy::new(|| css("h2.c-mainarticle__subtitle"));
static OPENING: Lazy<Selector> = Lazy::new(|| css("div.c-mainarticle__opening"));
static BODY: Lazy<Selector> = Lazy::new(|| css("div.c-mainarticle__body"));
static COMMENT: Lazy<Selector> = Lazy::new(|| css(r#"div[data-type="comment"]"#));
static LIKE: Lazy<Selector> = Lazy::new(|| css("a.valuation.up.like"));
static DISLIKE: Lazy<Selector> = Lazy::new(|| css("a.valuation.down.dislike"));
static AUTHOR: Lazy<Selector> = Lazy::new(|| css("div.comment_info strong"));
static POSTED: Lazy<Selector> = Lazy::new(|| css("div.comment_info small"));
static CONTENT: Lazy<Selector> = Lazy::new(|| css("div.comment_text"));

pub struct Altaveu;

const SITE: SourceId = SourceId::Altaveu;

/// The comment's own `div.comment_buttons`; replies nested below have theirs.
fn own_buttons(comment: ElementRef<'_>) -> Result<ElementRef<'_>, ExtractError> {
    comment
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().classes().any(|c| c == "comment_buttons"))
        .ok_or_else(|| ExtractError::missing(SITE, "comment buttons"))
}

fn vote_id(comment: ElementRef<'_>) -> Result<String, ExtractError> {
    let like = require(SITE, own_buttons(comment)?, &LIKE, "comment like button")?;
    numeric_id(&attr(SITE, like, "data-comment-vote", "comment vote id")?)
}

impl SiteRules for Altaveu {
    fn id(&self) -> SourceId {
        SITE
    }

    fn list_entries<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&ENTRY).collect()
    }

    fn list_fields(&self, entry: ElementRef<'_>) -> Result<ListFields, ExtractError> {
        let headline = require(SITE, entry, &HEADLINE, "headline link")?;
        Ok(ListFields {
            title: flat_text(headline),
            link: attr(SITE, headline, "href", "headline href")?,
            category: first(entry, &CATEGORY).map(text).unwrap_or_default(),
        })
    }

    fn raw_timestamp(
        &self,
        _entry: ElementRef<'_>,
        article: Option<&Html>,
    ) -> Result<String, ExtractError> {
        article
            .and_then(|doc| first_in(doc, &TIME))
            .map(text)
            .ok_or_else(|| ExtractError::missing(SITE, "article time"))
    }

    fn body(&self, article: &Html) -> ArticleBody {
        let opening = optional_text(article, &OPENING);
        let main = optional_text(article, &BODY);
        let body = if opening.is_empty() {
            main
        } else {
            format!("{opening}\n{main}")
        };
        ArticleBody {
            subtitle: optional_text(article, &SUBTITLE),
            body,
        }
    }

    fn comment_nodes<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&COMMENT).collect()
    }

    fn comment(&self, node: ElementRef<'_>) -> Result<RawComment, ExtractError> {
        let buttons = own_buttons(node)?;
        let like = require(SITE, buttons, &LIKE, "comment like button")?;
        let dislikes = first(buttons, &DISLIKE).map(|d| count(&text(d))).transpose()?;
        Ok(RawComment {
            local_id: vote_id(node)?,
            author: text(require(SITE, node, &AUTHOR, "comment author")?),
            displayed_time: text(require(SITE, node, &POSTED, "comment time")?),
            content: text(require(SITE, node, &CONTENT, "comment text")?),
            parent_id: self.parent_id(node),
            likes: Some(count(&text(like))?),
            dislikes,
        })
    }

    /// Replies sit in a `div.children` whose parent is the answered comment.
    fn parent_id(&self, node: ElementRef<'_>) -> Option<String> {
        let container = parent_element(node)?;
        if !container.value().classes().any(|c| c == "children") {
            return None;
        }
        vote_id(parent_element(container)?).ok()
    }
}
