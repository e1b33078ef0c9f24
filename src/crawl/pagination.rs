//! The four traversal protocols.
//!
//! Every strategy feeds batches of list entries to one scan loop with the
//! same inclusion rule: entries newer than the window are skipped, entries
//! inside it are visited, and the first entry older than the window ends the
//! whole traversal. Result listings are assumed to be sorted newest first.

use super::CrawlContext;
use super::article::{resolve_link, visit_entry};
use crate::error::{CrawlError, FetchError};
use crate::fetch::{BrowserDriver, PageFetcher, StaticFetch};
use crate::models::CrawlOutput;
use crate::progress::ProgressEvent;
use crate::scrapers::{self, SiteRules};
use crate::sources::{
    Locator, NextPage, PaginationStrategy, Render, SourceDescriptor, numbered_page_url,
};
use crate::window::Position;
use scraper::{ElementRef, Html};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Why a traversal ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// An entry older than the window was reached (`dateInInterval = false`).
    BelowWindow,
    /// The source ran out of entries (`moreArticles = false`).
    Exhausted,
}

/// Outcome of scanning one batch of entries.
#[derive(Debug)]
pub enum PageOutcome {
    Continue,
    StopNormal(StopReason),
    StopError(CrawlError),
}

/// Result of one source/term traversal. Records found before a failure are
/// kept.
#[derive(Debug)]
pub struct Traversal {
    pub output: CrawlOutput,
    pub end: Result<StopReason, CrawlError>,
}

/// Run the source's pagination strategy for one search term.
#[instrument(level = "info", skip(fetcher, ctx, source), fields(source = %source.id, strategy = source.strategy.name()))]
pub async fn traverse<H: StaticFetch, B: BrowserDriver>(
    fetcher: &mut PageFetcher<H, B>,
    ctx: &mut CrawlContext,
    source: &SourceDescriptor,
    term: &str,
) -> Traversal {
    let url = source.search_url_for(term);
    let mut output = CrawlOutput::default();
    let mut walk = Walk {
        fetcher,
        ctx,
        source,
        term,
        url: &url,
        out: &mut output,
    };
    let end = match &source.strategy {
        PaginationStrategy::NumberedPages { next_page } => walk.numbered_pages(next_page).await,
        PaginationStrategy::SinglePage => walk.single_page().await,
        PaginationStrategy::LoadMorePage { button, revealed } => {
            walk.load_more_page(button, revealed).await
        }
        PaginationStrategy::DynamicNumberedPages { page_button } => {
            walk.dynamic_numbered_pages(page_button).await
        }
    };
    Traversal { output, end }
}

/// Borrowed state of one traversal.
struct Walk<'w, H, B> {
    fetcher: &'w mut PageFetcher<H, B>,
    ctx: &'w mut CrawlContext,
    source: &'w SourceDescriptor,
    term: &'w str,
    url: &'w str,
    out: &'w mut CrawlOutput,
}

impl<H: StaticFetch, B: BrowserDriver> Walk<'_, H, B> {
    fn rules(&self) -> &'static dyn SiteRules {
        scrapers::rules(self.source.id)
    }

    fn page_started(&mut self, page: u32) {
        self.ctx.emit(ProgressEvent::PageStarted {
            source: self.source.id,
            page,
        });
    }

    /// Visit entries in order until one falls below the window.
    async fn scan(&mut self, entries: &[ElementRef<'_>]) -> PageOutcome {
        for entry in entries {
            let visited =
                visit_entry(self.fetcher, self.ctx, self.source, self.term, *entry, self.out).await;
            match visited {
                Ok(published) => {
                    if self.ctx.window.position(published) == Position::Before {
                        debug!(%published, "Entry below the window");
                        return PageOutcome::StopNormal(StopReason::BelowWindow);
                    }
                }
                Err(e) if e.halts_traversal() => return PageOutcome::StopError(e),
                Err(e) => {
                    warn!(source = %self.source.id, term = self.term, error = %e, "Skipping entry")
                }
            }
        }
        PageOutcome::Continue
    }

    /// List page at `url`, rendered the way the source needs.
    async fn list_page(&mut self, url: &str) -> Result<Html, FetchError> {
        match self.source.list_render {
            Render::Static => self.fetcher.fetch(self.source, url, Render::Static).await,
            Render::Dynamic => {
                self.fetcher.open(self.source, url, Some(self.term)).await?;
                self.wait_for_list().await?;
                self.fetcher.snapshot().await
            }
        }
    }

    /// Wait for the list container. `false` when it never showed up.
    async fn wait_for_list(&mut self) -> Result<bool, FetchError> {
        match &self.source.list_locator {
            Some(locator) => {
                let timeout = self.source.timings.wait_timeout();
                self.fetcher.browser().wait_for(locator, timeout).await
            }
            None => Ok(true),
        }
    }

    fn entry_links(&self, entries: &[ElementRef<'_>]) -> Vec<String> {
        let rules = self.rules();
        entries
            .iter()
            .filter_map(|e| rules.list_fields(*e).ok())
            .map(|f| resolve_link(self.url, &f.link))
            .collect()
    }

    async fn numbered_pages(&mut self, next_page: &NextPage) -> Result<StopReason, CrawlError> {
        let mut previous = Vec::new();
        let mut page = 1;
        loop {
            self.page_started(page);
            let page_url = numbered_page_url(self.url, next_page, page);
            // A page that cannot be fetched ends the traversal
            // (`successfulAccess = false`); a missing page past the first one
            // is just the end of the results.
            let doc = match self.list_page(&page_url).await {
                Ok(doc) => doc,
                Err(e) if page > 1 && e.is_missing_page() => return Ok(StopReason::Exhausted),
                Err(e) => return Err(e.into()),
            };
            let entries = self.rules().list_entries(&doc);
            if entries.is_empty() {
                return Ok(StopReason::Exhausted);
            }
            // Some sites serve their last page again past the end.
            let links = self.entry_links(&entries);
            if links == previous {
                info!(page, "Page repeats the previous one");
                return Ok(StopReason::Exhausted);
            }
            match self.scan(&entries).await {
                PageOutcome::Continue => {}
                PageOutcome::StopNormal(reason) => return Ok(reason),
                PageOutcome::StopError(e) => return Err(e),
            }
            previous = links;
            page += 1;
        }
    }

    async fn single_page(&mut self) -> Result<StopReason, CrawlError> {
        self.page_started(1);
        let doc = self.list_page(self.url).await?;
        let entries = self.rules().list_entries(&doc);
        match self.scan(&entries).await {
            PageOutcome::Continue => Ok(StopReason::Exhausted),
            PageOutcome::StopNormal(reason) => Ok(reason),
            PageOutcome::StopError(e) => Err(e),
        }
    }

    async fn load_more_page(
        &mut self,
        button: &Locator,
        revealed: &Locator,
    ) -> Result<StopReason, CrawlError> {
        self.page_started(1);
        let mut doc = self.list_page(self.url).await?;
        let mut batch: Option<usize> = None;
        loop {
            let outcome = {
                let entries = match batch {
                    None => self.rules().list_entries(&doc),
                    Some(b) => self.rules().revealed_entries(&doc, b),
                };
                if batch.is_some() && entries.is_empty() {
                    return Ok(StopReason::Exhausted);
                }
                self.scan(&entries).await
            };
            match outcome {
                PageOutcome::Continue => {}
                PageOutcome::StopNormal(reason) => return Ok(reason),
                PageOutcome::StopError(e) => return Err(e),
            }

            // Visiting articles may have navigated the tab away; rebuild the
            // listing and reveal one more batch than before.
            let next = batch.map_or(0, |b| b + 1);
            self.page_started(next as u32 + 2);
            self.fetcher.open(self.source, self.url, Some(self.term)).await?;
            if !self.reveal(button, revealed, next + 1).await? {
                return Ok(StopReason::Exhausted);
            }
            doc = self.fetcher.snapshot().await?;
            batch = Some(next);
        }
    }

    /// Click `button` until `wanted` revealed containers are present.
    async fn reveal(
        &mut self,
        button: &Locator,
        revealed: &Locator,
        wanted: usize,
    ) -> Result<bool, FetchError> {
        let timings = self.source.timings;
        let browser = self.fetcher.browser();
        while browser.count(revealed).await? < wanted {
            if !browser.wait_for(button, timings.wait_timeout()).await? {
                debug!(%button, "Load-more control gone");
                return Ok(false);
            }
            if !browser.click(button).await? {
                return Ok(false);
            }
            sleep(timings.settle()).await;
        }
        browser.wait_for(revealed, timings.wait_timeout()).await
    }

    async fn dynamic_numbered_pages(
        &mut self,
        page_button: &Locator,
    ) -> Result<StopReason, CrawlError> {
        self.fetcher.open(self.source, self.url, Some(self.term)).await?;
        let mut previous = Vec::new();
        let mut page = 1;
        loop {
            self.page_started(page);
            if !self.wait_for_list().await? {
                return Ok(StopReason::Exhausted);
            }
            let doc = self.fetcher.snapshot().await?;
            let entries = self.rules().list_entries(&doc);
            let links = self.entry_links(&entries);
            if entries.is_empty() || links == previous {
                return Ok(StopReason::Exhausted);
            }
            match self.scan(&entries).await {
                PageOutcome::Continue => {}
                PageOutcome::StopNormal(reason) => return Ok(reason),
                PageOutcome::StopError(e) => return Err(e),
            }
            previous = links;
            page += 1;
            if !self.fetcher.browser().click(&page_button.for_page(page)).await? {
                return Ok(StopReason::Exhausted);
            }
            sleep(self.source.timings.settle()).await;
        }
    }
}
