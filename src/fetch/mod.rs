//! Page fetching: DOM snapshots from plain HTTP or from a live browser session.
//!
//! Two transports sit behind small traits so the crawl logic can be driven by
//! in-memory fakes:
//!
//! - [`StaticFetch`]: one GET, body as text ([`http::HttpFetcher`])
//! - [`BrowserDriver`]: a long-lived browser with tabs, element waits and
//!   clicks ([`chrome::ChromeDriver`])
//!
//! [`PageFetcher`] combines them. It owns the per-source dialog state
//! (`cookies_clicked`, `notifs_clicked`), runs each source's opening actions
//! after a navigation, and offers the secondary-tab mode used to load comments
//! without losing the primary tab's list page.

pub mod chrome;
pub mod http;

use crate::error::FetchError;
use crate::sources::{Locator, OpeningAction, Render, SourceDescriptor};
use scraper::Html;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// One-shot HTTP GET.
pub trait StaticFetch {
    async fn get(&self, url: &str) -> Result<String, FetchError>;
}

/// A single interactive browser session. Only one caller drives it at a time.
///
/// Element absence is reported as a value (`false`/`0`), never as an error.
pub trait BrowserDriver {
    /// Navigate the active tab and wait for the load to finish.
    async fn navigate(&mut self, url: &str) -> Result<(), FetchError>;
    /// Rendered HTML of the active tab.
    async fn page_source(&mut self) -> Result<String, FetchError>;
    async fn count(&mut self, locator: &Locator) -> Result<usize, FetchError>;
    /// Wait up to `timeout` for an element to be present.
    async fn wait_for(&mut self, locator: &Locator, timeout: Duration) -> Result<bool, FetchError>;
    /// Click the first matching element through JavaScript.
    async fn click(&mut self, locator: &Locator) -> Result<bool, FetchError>;
    async fn type_text(&mut self, locator: &Locator, text: &str) -> Result<(), FetchError>;
    /// Open `url` in a new tab and make it active.
    async fn open_tab(&mut self, url: &str) -> Result<(), FetchError>;
    /// Close the active tab and give focus back to the previous one.
    async fn close_tab(&mut self) -> Result<(), FetchError>;
}

pub struct PageFetcher<H, B> {
    http: H,
    browser: B,
    cookies_clicked: bool,
    notifs_clicked: bool,
    secondary_open: bool,
}

impl<H: StaticFetch, B: BrowserDriver> PageFetcher<H, B> {
    pub fn new(http: H, browser: B) -> Self {
        Self {
            http,
            browser,
            cookies_clicked: false,
            notifs_clicked: false,
            secondary_open: false,
        }
    }

    /// Forget dismissed dialogs; called when a new source starts.
    pub fn reset_dialogs(&mut self) {
        self.cookies_clicked = false;
        self.notifs_clicked = false;
    }

    pub fn browser(&mut self) -> &mut B {
        &mut self.browser
    }

    /// DOM snapshot of `url`, rendered the way `render` asks for.
    #[instrument(level = "debug", skip(self, source), fields(source = %source.id))]
    pub async fn fetch(
        &mut self,
        source: &SourceDescriptor,
        url: &str,
        render: Render,
    ) -> Result<Html, FetchError> {
        match render {
            Render::Static => {
                let body = self.http.get(url).await?;
                Ok(Html::parse_document(&body))
            }
            Render::Dynamic => {
                self.open(source, url, None).await?;
                self.snapshot().await
            }
        }
    }

    /// Navigate the active tab, dismiss dialogs and run opening actions.
    ///
    /// `term` is set only when opening a search URL; search-box actions are
    /// skipped otherwise.
    #[instrument(level = "debug", skip(self, source), fields(source = %source.id))]
    pub async fn open(
        &mut self,
        source: &SourceDescriptor,
        url: &str,
        term: Option<&str>,
    ) -> Result<(), FetchError> {
        self.browser.navigate(url).await?;
        self.dismiss_dialogs(source).await?;
        self.opening_actions(source, term).await
    }

    pub async fn snapshot(&mut self) -> Result<Html, FetchError> {
        let source = self.browser.page_source().await?;
        Ok(Html::parse_document(&source))
    }

    async fn dismiss_dialogs(&mut self, source: &SourceDescriptor) -> Result<(), FetchError> {
        if !self.cookies_clicked {
            if let Some(locator) = &source.cookies {
                if self.browser.click(locator).await? {
                    debug!(source = %source.id, "Dismissed cookie consent");
                    self.cookies_clicked = true;
                }
            }
        }
        if !self.notifs_clicked {
            if let Some(locator) = &source.notifications {
                if self.browser.click(locator).await? {
                    debug!(source = %source.id, "Dismissed notification prompt");
                    self.notifs_clicked = true;
                }
            }
        }
        Ok(())
    }

    async fn opening_actions(
        &mut self,
        source: &SourceDescriptor,
        term: Option<&str>,
    ) -> Result<(), FetchError> {
        for action in &source.opening {
            match action {
                OpeningAction::SubmitSearch {
                    input,
                    button,
                    settle_ms,
                } => {
                    let Some(term) = term else { continue };
                    self.browser.type_text(input, &format!("\"{term}\"")).await?;
                    if !self.browser.click(button).await? {
                        return Err(FetchError::Timeout {
                            what: format!("search button {button}"),
                        });
                    }
                    // No load signal after submitting; fixed settle delay.
                    sleep(Duration::from_millis(*settle_ms)).await;
                }
                OpeningAction::Interstitial { link } => {
                    let timeout = source.timings.wait_timeout();
                    if self.browser.wait_for(link, timeout).await? {
                        self.browser.click(link).await?;
                        info!(source = %source.id, "Clicked through interstitial");
                        self.dismiss_dialogs(source).await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Click `control` until it disappears or stops being found within the
    /// bounded wait. Returns the number of clicks.
    #[instrument(level = "debug", skip(self, timings))]
    pub async fn click_until_gone(
        &mut self,
        control: &Locator,
        timings: crate::sources::Timings,
    ) -> Result<u32, FetchError> {
        let mut clicks = 0;
        while self.browser.count(control).await? > 0 {
            if !self.browser.wait_for(control, timings.wait_timeout()).await? {
                break;
            }
            if !self.browser.click(control).await? {
                break;
            }
            clicks += 1;
            // The control lingers briefly after the click; no event tells us
            // when the new batch is in, so settle before looking again.
            sleep(timings.settle()).await;
        }
        Ok(clicks)
    }

    /// Open `url` in a second tab. Must be paired with [`Self::close_secondary`].
    pub async fn open_secondary(&mut self, url: &str) -> Result<(), FetchError> {
        self.browser.open_tab(url).await?;
        self.secondary_open = true;
        Ok(())
    }

    /// Close the second tab and give focus back to the primary one.
    pub async fn close_secondary(&mut self) -> Result<(), FetchError> {
        if !self.secondary_open {
            warn!("close_secondary called without an open secondary tab");
            return Ok(());
        }
        self.secondary_open = false;
        self.browser.close_tab().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceId;
    use crate::testing::{FakeHttp, ScriptedBrowser};

    #[tokio::test]
    async fn test_static_fetch_parses_body() {
        let http = FakeHttp::default().with_page("https://a.ad/1", "<p class='x'>hola</p>");
        let mut fetcher = PageFetcher::new(http, ScriptedBrowser::default());
        let source = SourceDescriptor::builtin(SourceId::Forum);
        let doc = fetcher
            .fetch(&source, "https://a.ad/1", Render::Static)
            .await
            .unwrap();
        let p = scraper::Selector::parse("p.x").unwrap();
        assert_eq!(doc.select(&p).count(), 1);
    }

    #[tokio::test]
    async fn test_static_fetch_failure_is_error() {
        let mut fetcher = PageFetcher::new(FakeHttp::default(), ScriptedBrowser::default());
        let source = SourceDescriptor::builtin(SourceId::Forum);
        assert!(
            fetcher
                .fetch(&source, "https://a.ad/missing", Render::Static)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_dialogs_dismissed_once_per_source() {
        let page = r#"<button class="cky-btn cky-btn-accept">OK</button>
                      <div class="cancel-notification">x</div>"#;
        let browser = ScriptedBrowser::default()
            .with_page("https://d.ad/1", page)
            .with_page("https://d.ad/2", page);
        let clicks = browser.click_log();
        let mut fetcher = PageFetcher::new(FakeHttp::default(), browser);
        let source = SourceDescriptor::builtin(SourceId::Diari);

        fetcher.open(&source, "https://d.ad/1", None).await.unwrap();
        fetcher.open(&source, "https://d.ad/2", None).await.unwrap();
        assert_eq!(clicks.borrow().len(), 2);

        fetcher.reset_dialogs();
        fetcher.open(&source, "https://d.ad/1", None).await.unwrap();
        assert_eq!(clicks.borrow().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_search_types_quoted_term() {
        let page = r#"<input placeholder="Paraula a buscar"><input id="busc_btn" type="submit">"#;
        let browser = ScriptedBrowser::default().with_page("https://d.ad/s", page);
        let typed = browser.typed_log();
        let mut fetcher = PageFetcher::new(FakeHttp::default(), browser);
        let source = SourceDescriptor::builtin(SourceId::Diari);

        fetcher.open(&source, "https://d.ad/s", Some("consell general")).await.unwrap();
        assert_eq!(typed.borrow().as_slice(), ["\"consell general\""]);

        // Non-search navigations never touch the search box.
        fetcher.open(&source, "https://d.ad/s", None).await.unwrap();
        assert_eq!(typed.borrow().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_until_gone_counts_clicks() {
        let control = Locator::css("a.next_com");
        let browser = ScriptedBrowser::default()
            .with_page("https://d.ad/a", "<a class='next_com'>+</a><ul></ul>")
            .with_clicks(
                "a.next_com",
                vec![
                    "<a class='next_com'>+</a><ul><li>1</li></ul>".into(),
                    "<ul><li>1</li><li>2</li></ul>".into(),
                ],
            );
        let mut fetcher = PageFetcher::new(FakeHttp::default(), browser);
        let source = SourceDescriptor::builtin(SourceId::Diari);
        fetcher.open(&source, "https://d.ad/a", None).await.unwrap();

        let clicks = fetcher
            .click_until_gone(&control, source.timings)
            .await
            .unwrap();
        assert_eq!(clicks, 2);
    }

    #[tokio::test]
    async fn test_secondary_tab_restores_primary() {
        let browser = ScriptedBrowser::default()
            .with_page("https://d.ad/list", "<p>list</p>")
            .with_page("https://d.ad/article", "<p>article</p>");
        let mut fetcher = PageFetcher::new(FakeHttp::default(), browser);
        let source = SourceDescriptor::builtin(SourceId::Diari);
        fetcher.open(&source, "https://d.ad/list", None).await.unwrap();

        fetcher.open_secondary("https://d.ad/article").await.unwrap();
        let html = fetcher.browser().page_source().await.unwrap();
        assert!(html.contains("article"));
        fetcher.close_secondary().await.unwrap();

        let html = fetcher.browser().page_source().await.unwrap();
        assert!(html.contains("list"));
    }
}
