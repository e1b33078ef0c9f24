//! Human-readable progress reporting.
//!
//! The crawl core emits [`ProgressEvent`]s through a [`ProgressSink`] and never
//! assumes where they end up. The binary prints them to stdout with
//! [`ConsoleProgress`]; tests record them.

use crate::sources::SourceId;
use crate::window::DateWindow;
use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    RunStarted {
        terms: Vec<String>,
        window: DateWindow,
    },
    SourceStarted {
        source: SourceId,
    },
    OutOfOrder {
        source: SourceId,
    },
    TermStarted {
        source: SourceId,
        term: String,
    },
    PageStarted {
        source: SourceId,
        page: u32,
    },
    ArticleFound {
        published: NaiveDateTime,
        title: String,
    },
    CommentsFound {
        count: usize,
    },
    NoResults,
}

const RULE: &str =
    "----------------------------------------------------------------------------------";

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::RunStarted { terms, window } => {
                writeln!(f, "{RULE}")?;
                writeln!(
                    f,
                    "Searching articles with the following search terms: {}",
                    terms.join(", ")
                )?;
                write!(
                    f,
                    "Searching articles between {} and {}",
                    window.lower.format("%Y-%m-%d - %H:%M"),
                    window.upper.format("%Y-%m-%d - %H:%M")
                )
            }
            ProgressEvent::SourceStarted { source } => {
                writeln!(f, "{RULE}")?;
                write!(f, "Searching at {}", source.display_name())
            }
            ProgressEvent::OutOfOrder { source } => {
                writeln!(
                    f,
                    ":( Under maintenance. {} is currently out of order.",
                    source.display_name()
                )?;
                write!(f, "--> Searching methods are currently being updated.")
            }
            ProgressEvent::TermStarted { term, .. } => write!(f, "--> SEARCHING TERM {term} ..."),
            ProgressEvent::PageStarted { page, .. } => write!(f, "  page {page}"),
            ProgressEvent::ArticleFound { published, title } => {
                write!(f, "    - {published} -> {title}")
            }
            ProgressEvent::CommentsFound { count: 1 } => write!(f, "1 comment"),
            ProgressEvent::CommentsFound { count } => write!(f, "{count} comments"),
            ProgressEvent::NoResults => write!(f, "No articles found for the given search."),
        }
    }
}

/// Destination of progress events.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

/// Prints each event on stdout.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&mut self, event: ProgressEvent) {
        // Zero comments are not worth a line.
        if matches!(event, ProgressEvent::CommentsFound { count: 0 }) {
            return;
        }
        println!("{event}");
    }
}

/// Keeps every event. Clones share the same log.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    events: std::rc::Rc<std::cell::RefCell<Vec<ProgressEvent>>>,
}

#[cfg(test)]
impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.borrow().clone()
    }
}

#[cfg(test)]
impl ProgressSink for RecordingProgress {
    fn emit(&mut self, event: ProgressEvent) {
        self.events.borrow_mut().push(event);
    }
}
