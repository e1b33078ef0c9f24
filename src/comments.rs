//! Comment loading and threading.
//!
//! Where comments come from is a per-source [`CommentLoading`] mode:
//!
//! | Mode | Fetch | Notes |
//! |------|-------|-------|
//! | `None` | none | returns immediately |
//! | `Inline` | none | parsed from the article DOM already in hand |
//! | `Browser` | primary tab | "show more" clicked until gone |
//! | `SecondaryTab` | second tab | primary tab restored afterwards, also on failure |
//!
//! Comments keep DOM order. Threading is carried only by `parent_id`.

use crate::dedup::comment_id;
use crate::error::FetchError;
use crate::fetch::{BrowserDriver, PageFetcher, StaticFetch};
use crate::models::CommentRecord;
use crate::scrapers::{self, RawComment, SiteRules};
use crate::sources::{CommentLoading, CommentTime, Locator, SourceDescriptor};
use crate::utils::{parse_datetime, parse_relative, truncate_for_log};
use chrono::NaiveDateTime;
use scraper::Html;
use tracing::{debug, instrument, warn};

/// Load every comment of the article at `link`.
///
/// `article` is the article DOM already fetched by the caller; it is only
/// read by inline sources.
#[instrument(level = "debug", skip(fetcher, source, article), fields(source = %source.id))]
pub async fn load_comments<H: StaticFetch, B: BrowserDriver>(
    fetcher: &mut PageFetcher<H, B>,
    source: &SourceDescriptor,
    link: &str,
    article: &Html,
) -> Result<Vec<RawComment>, FetchError> {
    let rules = scrapers::rules(source.id);
    match &source.comments {
        CommentLoading::None => Ok(Vec::new()),
        CommentLoading::Inline => Ok(parse_comments(rules, article)),
        CommentLoading::Browser { load_more } => {
            fetcher.open(source, link, None).await?;
            let doc = expand(fetcher, source, load_more).await?;
            Ok(parse_comments(rules, &doc))
        }
        CommentLoading::SecondaryTab { load_more } => {
            fetcher.open_secondary(link).await?;
            let expanded = expand(fetcher, source, load_more).await;
            // Close before looking at the result so the primary tab is back
            // in focus whatever happened.
            fetcher.close_secondary().await?;
            Ok(parse_comments(rules, &expanded?))
        }
    }
}

async fn expand<H: StaticFetch, B: BrowserDriver>(
    fetcher: &mut PageFetcher<H, B>,
    source: &SourceDescriptor,
    load_more: &Locator,
) -> Result<Html, FetchError> {
    let clicks = fetcher.click_until_gone(load_more, source.timings).await?;
    debug!(clicks, "Expanded comment list");
    fetcher.snapshot().await
}

/// Parse every comment node; nodes that do not parse are skipped.
pub fn parse_comments(rules: &dyn SiteRules, doc: &Html) -> Vec<RawComment> {
    rules
        .comment_nodes(doc)
        .into_iter()
        .filter_map(|node| match rules.comment(node) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!(
                    source = %rules.id(),
                    error = %e,
                    node_preview = %truncate_for_log(&node.html(), 200),
                    "Skipping comment"
                );
                None
            }
        })
        .collect()
}

/// Resolve a displayed comment time. `None` when it cannot be read.
pub fn comment_time(
    mode: &CommentTime,
    displayed: &str,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    match mode {
        CommentTime::Formats(formats) => parse_datetime(displayed, formats).ok(),
        CommentTime::Relative => parse_relative(displayed, now),
    }
}

/// Attach article-scoped ids and parsed times.
pub fn to_records(
    source: &SourceDescriptor,
    article_id: &str,
    raw: Vec<RawComment>,
    now: NaiveDateTime,
) -> Vec<CommentRecord> {
    raw.into_iter()
        .map(|c| CommentRecord {
            id: comment_id(article_id, &c.local_id),
            article_id: article_id.to_string(),
            parsed_time: comment_time(&source.comment_time, &c.displayed_time, now),
            author: c.author,
            displayed_time: c.displayed_time,
            content: c.content,
            parent_id: c.parent_id,
            likes: c.likes,
            dislikes: c.dislikes,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceId;
    use crate::testing::{FakeHttp, ScriptedBrowser};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn diari_comment(id: u32, body: &str) -> String {
        format!(
            r#"<li class="con-{id}"><p class="author"><strong>u{id}</strong><em>(05/03/24 11:00)</em></p>
               <div class="comment"><p id="comentario-{id}"><span>{body}</span></p></div></li>"#
        )
    }

    #[tokio::test]
    async fn test_sources_without_comments_fetch_nothing() {
        let browser = ScriptedBrowser::default();
        let navigations = browser.navigation_log();
        let mut fetcher = PageFetcher::new(FakeHttp::default(), browser);
        let source = SourceDescriptor::builtin(SourceId::Forum);
        let article = Html::parse_document("<p></p>");

        let comments = load_comments(&mut fetcher, &source, "https://forum.ad/x/", &article)
            .await
            .unwrap();
        assert!(comments.is_empty());
        assert!(navigations.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_inline_comments_use_article_dom() {
        let mut fetcher = PageFetcher::new(FakeHttp::default(), ScriptedBrowser::default());
        let source = SourceDescriptor::builtin(SourceId::Bondia);
        let article = Html::parse_document(
            r#"<div class="comment" typeof="sioc:Post sioct:Comment" about="/comment/9#comment-9">
                 <span class="username">x</span>
                 <span property="dc:date dc:created" content="2024-03-05T10:00:00+01:00"></span>
                 <div property="content:encoded">ok</div>
               </div>
               <div class="comment" typeof="sioc:Post sioct:Comment">broken</div>"#,
        );
        let comments = load_comments(&mut fetcher, &source, "https://www.bondia.ad/a", &article)
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].local_id, "9");
    }

    #[tokio::test(start_paused = true)]
    async fn test_secondary_tab_expands_and_restores_primary() {
        let first = format!(
            r#"<div class="lst-com con brr"><ul>{}</ul></div><a class="next_com">+</a>"#,
            diari_comment(1, "hola")
        );
        let all = format!(
            r#"<div class="lst-com con brr"><ul>{}{}</ul></div>"#,
            diari_comment(1, "hola"),
            diari_comment(2, "adeu")
        );
        let browser = ScriptedBrowser::default()
            .with_page("https://d.ad/results", "<ul class='resultadosBusquedaBS'></ul>")
            .with_page("https://d.ad/article", &first)
            .with_clicks("a.next_com", vec![all]);
        let mut fetcher = PageFetcher::new(FakeHttp::default(), browser);
        let source = SourceDescriptor::builtin(SourceId::Diari);
        fetcher.open(&source, "https://d.ad/results", None).await.unwrap();

        let article = Html::parse_document("");
        let comments = load_comments(&mut fetcher, &source, "https://d.ad/article", &article)
            .await
            .unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].content, "adeu");

        let primary = fetcher.browser().page_source().await.unwrap();
        assert!(primary.contains("resultadosBusquedaBS"));
    }

    #[tokio::test]
    async fn test_secondary_tab_closed_when_article_missing() {
        let browser = ScriptedBrowser::default().with_page("https://d.ad/results", "<p>list</p>");
        let mut fetcher = PageFetcher::new(FakeHttp::default(), browser);
        let source = SourceDescriptor::builtin(SourceId::Diari);
        fetcher.open(&source, "https://d.ad/results", None).await.unwrap();

        let article = Html::parse_document("");
        let result = load_comments(&mut fetcher, &source, "https://d.ad/missing", &article).await;
        assert!(result.is_err());
        let primary = fetcher.browser().page_source().await.unwrap();
        assert!(primary.contains("list"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unloadable_secondary_tab_leaves_no_tab_behind() {
        let browser = ScriptedBrowser::default()
            .with_page("https://d.ad/results", "<p>list</p>")
            .with_unreachable("https://d.ad/broken")
            .with_page(
                "https://d.ad/article",
                &format!(r#"<div class="lst-com con brr"><ul>{}</ul></div>"#, diari_comment(3, "bé")),
            );
        let mut fetcher = PageFetcher::new(FakeHttp::default(), browser);
        let source = SourceDescriptor::builtin(SourceId::Diari);
        fetcher.open(&source, "https://d.ad/results", None).await.unwrap();
        let article = Html::parse_document("");

        let err = load_comments(&mut fetcher, &source, "https://d.ad/broken", &article)
            .await
            .unwrap_err();
        assert!(!err.is_session_loss());
        assert_eq!(fetcher.browser().open_tabs(), 1);

        let comments = load_comments(&mut fetcher, &source, "https://d.ad/article", &article)
            .await
            .unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(fetcher.browser().open_tabs(), 1);
        let primary = fetcher.browser().page_source().await.unwrap();
        assert!(primary.contains("list"));
    }

    #[test]
    fn test_records_get_scoped_ids_and_times() {
        let source = SourceDescriptor::builtin(SourceId::Altaveu);
        let raw = vec![
            RawComment {
                local_id: "101".into(),
                author: "anna".into(),
                displayed_time: "Fa 2 hores".into(),
                content: "Primer".into(),
                parent_id: None,
                likes: Some(3),
                dislikes: Some(0),
            },
            RawComment {
                local_id: "102".into(),
                author: "pere".into(),
                displayed_time: "ahir".into(),
                content: "Resposta".into(),
                parent_id: Some("101".into()),
                likes: Some(0),
                dislikes: Some(0),
            },
        ];
        let records = to_records(&source, "AL20240310090000", raw, now());
        assert_eq!(records[0].id, "AL20240310090000-101");
        assert_eq!(records[0].parsed_time, Some(now() - chrono::Duration::hours(2)));
        assert_eq!(records[1].parsed_time, None);
        assert_eq!(records[1].parent_id.as_deref(), Some("101"));
        assert_eq!(records[1].article_id, "AL20240310090000");
    }

    #[test]
    fn test_comment_time_formats() {
        let mode = CommentTime::Formats(vec!["(%d/%m/%y %H:%M)".into()]);
        assert_eq!(
            comment_time(&mode, "(05/03/24 11:00)", now()),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap().and_hms_opt(11, 0, 0)
        );
    }
}
