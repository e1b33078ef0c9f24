//! Visiting one list entry: dating it, and when it falls inside the window,
//! extracting its body and comments into records.

use super::CrawlContext;
use crate::comments::{load_comments, to_records};
use crate::dedup::article_id;
use crate::error::CrawlError;
use crate::fetch::{BrowserDriver, PageFetcher, StaticFetch};
use crate::models::{ArticleRecord, ArticleText, ContentType, CrawlOutput};
use crate::progress::ProgressEvent;
use crate::scrapers::{self, ListFields};
use crate::sources::SourceDescriptor;
use crate::utils::{normalize_category, parse_datetime};
use crate::window::Position;
use chrono::NaiveDateTime;
use scraper::{ElementRef, Html};
use tracing::{debug, instrument, warn};
use url::Url;

/// Absolute form of an entry link; left as is when it cannot be joined.
pub(crate) fn resolve_link(base: &str, href: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(href.trim()))
        .map(String::from)
        .unwrap_or_else(|_| href.trim().to_string())
}

/// Date one entry and record it if it is inside the window and not yet seen.
///
/// Returns the entry's publish timestamp so the caller can decide whether to
/// keep scanning. An `Err` means the entry could not be dated.
#[instrument(level = "debug", skip_all, fields(source = %source.id, term = %term))]
pub(crate) async fn visit_entry<H: StaticFetch, B: BrowserDriver>(
    fetcher: &mut PageFetcher<H, B>,
    ctx: &mut CrawlContext,
    source: &SourceDescriptor,
    term: &str,
    entry: ElementRef<'_>,
    out: &mut CrawlOutput,
) -> Result<NaiveDateTime, CrawlError> {
    let rules = scrapers::rules(source.id);
    let fields = rules.list_fields(entry)?;
    let link = resolve_link(&source.search_url, &fields.link);

    let mut article = None;
    if source.date_in_article {
        article = Some(fetcher.fetch(source, &link, source.article_render).await?);
    }
    let raw = rules.raw_timestamp(entry, article.as_ref())?;
    let published = parse_datetime(&raw, &source.date_formats)?;

    if ctx.window.position(published) != Position::Inside {
        return Ok(published);
    }
    let id = article_id(source.id, published);
    if ctx.seen.has_article(&id) {
        debug!(%id, "Already seen; skipping");
        return Ok(published);
    }

    let article = match article {
        Some(doc) => doc,
        None => match fetcher.fetch(source, &link, source.article_render).await {
            Ok(doc) => doc,
            Err(e) if e.is_session_loss() => return Err(e.into()),
            Err(e) => {
                warn!(%link, error = %e, "Article page unavailable; skipping entry");
                return Ok(published);
            }
        },
    };

    let candidate = Candidate {
        id,
        fields,
        link,
        published,
    };
    record_article(fetcher, ctx, source, term, candidate, &article, out).await?;
    Ok(published)
}

/// An entry that passed the window and dedup checks.
struct Candidate {
    id: String,
    fields: ListFields,
    link: String,
    published: NaiveDateTime,
}

async fn record_article<H: StaticFetch, B: BrowserDriver>(
    fetcher: &mut PageFetcher<H, B>,
    ctx: &mut CrawlContext,
    source: &SourceDescriptor,
    term: &str,
    candidate: Candidate,
    article: &Html,
    out: &mut CrawlOutput,
) -> Result<(), CrawlError> {
    let Candidate {
        id,
        fields,
        link,
        published,
    } = candidate;
    let body = scrapers::rules(source.id).body(article);
    ctx.emit(ProgressEvent::ArticleFound {
        published,
        title: fields.title.clone(),
    });

    let (raw, lost) = match load_comments(fetcher, source, &link, article).await {
        Ok(raw) => (raw, None),
        Err(e) if e.is_session_loss() => (Vec::new(), Some(e)),
        Err(e) => {
            warn!(%link, error = %e, "Comments unavailable; recording article without them");
            (Vec::new(), None)
        }
    };
    let comments: Vec<_> = to_records(source, &id, raw, ctx.now)
        .into_iter()
        .filter(|c| ctx.seen.mark_comment(&c.id))
        .collect();
    ctx.emit(ProgressEvent::CommentsFound {
        count: comments.len(),
    });
    ctx.seen.mark_article(&id);

    out.articles.push(ArticleRecord {
        id: id.clone(),
        discovered_at: ctx.now,
        source: source.id,
        search_term: term.to_string(),
        publish_timestamp: published,
        content_type: ContentType::from_category(&fields.category),
        category: normalize_category(&fields.category),
        title: fields.title.clone(),
        link,
        comment_count: comments.len(),
    });
    out.texts.push(ArticleText {
        article_id: id,
        title: fields.title,
        subtitle: body.subtitle,
        body: body.body,
    });
    out.comments.extend(comments);

    match lost {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_link() {
        let base = "https://www.ara.ad/cercador?text=x";
        assert_eq!(
            resolve_link(base, "/societat/n1.html"),
            "https://www.ara.ad/societat/n1.html"
        );
        assert_eq!(
            resolve_link(base, " https://forum.ad/a/ "),
            "https://forum.ad/a/"
        );
        assert_eq!(resolve_link("not a url", "/a"), "/a");
    }
}
