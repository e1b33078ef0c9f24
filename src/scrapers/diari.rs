//! Diari d'Andorra (`diariandorra.ad`).
//!
//! Results are driven by a search box and paginated client side, so the list
//! page is always a browser snapshot. The category is the first path segment
//! of the article link. Replies embed a quote of the answered comment and
//! point at it through an `onmouseover="...(<id>, ...)"` handler.

use super::{
    ArticleBody, ListFields, RawComment, SiteRules, attr, css, first, first_in, flat_text,
    numeric_id, require, text,
};
use crate::error::ExtractError;
use crate::sources::SourceId;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static ENTRY: Lazy<Selector> = Lazy::new(|| css("ul.resultadosBusquedaBS > li"));
static HEADLINE: Lazy<Selector> = Lazy::new(|| css("h2.c-article__title a"));
static DATE: Lazy<Selector> = Lazy::new(|| css("time.c-article__date"));
static BODY: Lazy<Selector> = Lazy::new(|| css("div.c-detail__body"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| css("p"));
static THREAD: Lazy<Selector> = Lazy::new(|| css("div.lst-com.con.brr"));
static THREAD_LIST: Lazy<Selector> = Lazy::new(|| css("ul"));
static COMMENT: Lazy<Selector> = Lazy::new(|| css(r#"li[class^="con"]"#));
static BODY_P: Lazy<Selector> = Lazy::new(|| css("div.comment p"));
static SPAN: Lazy<Selector> = Lazy::new(|| css("span"));
static AUTHOR: Lazy<Selector> = Lazy::new(|| css("p.author strong"));
static POSTED: Lazy<Selector> = Lazy::new(|| css("p.author em"));
static QUOTE_REF: Lazy<Selector> = Lazy::new(|| css("a.ancla_referencia"));

const SITE: SourceId = SourceId::Diari;

pub struct Diari;

/// First path segment of an article link, absolute or not.
fn section_of(link: &str) -> String {
    let path = match Url::parse(link) {
        Ok(url) => url.path().to_string(),
        Err(_) => link.to_string(),
    };
    path.trim_start_matches('/')
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

impl SiteRules for Diari {
    fn id(&self) -> SourceId {
        SITE
    }

    fn list_entries<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        doc.select(&ENTRY).collect()
    }

    fn list_fields(&self, entry: ElementRef<'_>) -> Result<ListFields, ExtractError> {
        let headline = require(SITE, entry, &HEADLINE, "headline link")?;
        let link = attr(SITE, headline, "href", "headline href")?;
        Ok(ListFields {
            title: flat_text(headline),
            category: section_of(&link),
            link,
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
        let body = first_in(article, &BODY)
            .map(|b| b.select(&PARAGRAPH).map(text).collect::<Vec<_>>().join("\n"))
            .unwrap_or_default();
        ArticleBody {
            subtitle: String::new(),
            body,
        }
    }

    fn comment_nodes<'a>(&self, doc: &'a Html) -> Vec<ElementRef<'a>> {
        let Some(list) = first_in(doc, &THREAD).and_then(|t| first(t, &THREAD_LIST)) else {
            return Vec::new();
        };
        list.select(&COMMENT).collect()
    }

    fn comment(&self, node: ElementRef<'_>) -> Result<RawComment, ExtractError> {
        let paragraph = require(SITE, node, &BODY_P, "comment paragraph")?;
        // p#comentario-123
        let raw_id = attr(SITE, paragraph, "id", "comment id")?;
        let local_id = numeric_id(raw_id.split('-').nth(1).unwrap_or_default())?;
        // Replies quote the answered comment first; the reply is the last line.
        let content = first(paragraph, &SPAN)
            .map(|s| {
                s.text()
                    .collect::<String>()
                    .trim()
                    .lines()
                    .last()
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            })
            .unwrap_or_default();
        Ok(RawComment {
            local_id,
            author: text(require(SITE, node, &AUTHOR, "comment author")?),
            displayed_time: text(require(SITE, node, &POSTED, "comment time")?),
            content,
            parent_id: self.parent_id(node),
            likes: None,
            dislikes: None,
        })
    }

    /// `onmouseover="mostrarComentario(123, this)"` -> `123`
    fn parent_id(&self, node: ElementRef<'_>) -> Option<String> {
        let anchor = first(node, &QUOTE_REF)?;
        let handler = anchor.value().attr("onmouseover")?;
        let args = handler.split('(').nth(1)?;
        numeric_id(args.split(',').next()?).ok()
    }
}
