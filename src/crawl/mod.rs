//! Crawl orchestration.
//!
//! [`Crawler::run`] walks sources × search terms strictly in sequence. Each
//! pair is one [`pagination::traverse`] call; whatever it found is merged into
//! the run's output even when it ended in an error, and the next pair starts
//! regardless.
//!
//! All mutable run state (date window, run start, dedup sets, progress sink)
//! lives in one [`CrawlContext`] threaded through every call. The browser
//! dialog flags live in the [`PageFetcher`].

mod article;
pub mod pagination;

use crate::dedup::SeenIds;
use crate::fetch::{BrowserDriver, PageFetcher, StaticFetch};
use crate::models::CrawlOutput;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::sources::{SourceId, SourceRegistry};
use crate::window::DateWindow;
use chrono::NaiveDateTime;
use pagination::{StopReason, traverse};
use std::collections::BTreeSet;
use tracing::{error, info, instrument};

/// Run-scoped crawl state.
pub struct CrawlContext {
    pub window: DateWindow,
    /// Run start, stamped on every record as its discovery time.
    pub now: NaiveDateTime,
    pub seen: SeenIds,
    progress: Box<dyn ProgressSink>,
}

impl CrawlContext {
    pub fn new(
        window: DateWindow,
        now: NaiveDateTime,
        seen: SeenIds,
        progress: Box<dyn ProgressSink>,
    ) -> Self {
        Self {
            window,
            now,
            seen,
            progress,
        }
    }

    pub fn emit(&mut self, event: ProgressEvent) {
        self.progress.emit(event);
    }
}

/// What to crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlPlan {
    pub terms: Vec<String>,
    /// Sources in crawl order.
    pub sources: Vec<SourceId>,
    /// Sources announced as under maintenance and skipped.
    pub out_of_order: BTreeSet<SourceId>,
}

pub struct Crawler<H, B> {
    fetcher: PageFetcher<H, B>,
    registry: SourceRegistry,
    ctx: CrawlContext,
}

impl<H: StaticFetch, B: BrowserDriver> Crawler<H, B> {
    pub fn new(fetcher: PageFetcher<H, B>, registry: SourceRegistry, ctx: CrawlContext) -> Self {
        Self {
            fetcher,
            registry,
            ctx,
        }
    }

    #[cfg(test)]
    pub fn context(&self) -> &CrawlContext {
        &self.ctx
    }

    /// Crawl every planned source/term pair and return everything found.
    #[instrument(
        level = "info",
        skip_all,
        fields(terms = plan.terms.len(), sources = plan.sources.len())
    )]
    pub async fn run(&mut self, plan: &CrawlPlan) -> CrawlOutput {
        self.ctx.emit(ProgressEvent::RunStarted {
            terms: plan.terms.clone(),
            window: self.ctx.window,
        });

        let mut output = CrawlOutput::default();
        for &id in &plan.sources {
            self.ctx.emit(ProgressEvent::SourceStarted { source: id });
            if plan.out_of_order.contains(&id) {
                self.ctx.emit(ProgressEvent::OutOfOrder { source: id });
                continue;
            }
            let Some(source) = self.registry.get(id) else {
                error!(source = %id, "No valid descriptor; skipping source");
                continue;
            };
            self.fetcher.reset_dialogs();

            for term in &plan.terms {
                self.ctx.emit(ProgressEvent::TermStarted {
                    source: id,
                    term: term.clone(),
                });
                let traversal = traverse(&mut self.fetcher, &mut self.ctx, source, term).await;
                let found = traversal.output.articles.len();
                match traversal.end {
                    Ok(StopReason::BelowWindow) => {
                        info!(source = %id, term, found, "Reached the start of the window")
                    }
                    Ok(StopReason::Exhausted) => {
                        info!(source = %id, term, found, "No more results")
                    }
                    Err(e) => error!(source = %id, term, found, error = %e, "Search aborted"),
                }
                output.extend(traversal.output);
            }
        }

        if output.is_empty() {
            self.ctx.emit(ProgressEvent::NoResults);
        }
        info!(
            articles = output.articles.len(),
            comments = output.comments.len(),
            "Crawl finished"
        );
        output
    }
}
