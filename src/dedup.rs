//! Article and comment identity, and the run-scoped "already seen" sets.
//!
//! Article ids are `PREFIX + YYYYMMDDHHMMSS` where the prefix is the first two
//! letters of the source id in uppercase. Two articles of the same source
//! published within the same second share an id; the second one is treated as
//! a duplicate.

#[cfg(test)]
use crate::models::CrawlOutput;
use crate::sources::SourceId;
use chrono::NaiveDateTime;
use std::collections::HashSet;

pub fn article_id(source: SourceId, published: NaiveDateTime) -> String {
    format!("{}{}", source.prefix(), published.format("%Y%m%d%H%M%S"))
}

pub fn comment_id(article_id: &str, local_id: &str) -> String {
    format!("{article_id}-{local_id}")
}

/// Ids already emitted in this run or known from a previous one.
#[derive(Debug, Clone, Default)]
pub struct SeenIds {
    articles: HashSet<String>,
    comments: HashSet<String>,
}

impl SeenIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from ids produced by an earlier run.
    pub fn seeded<A, C>(articles: A, comments: C) -> Self
    where
        A: IntoIterator<Item = String>,
        C: IntoIterator<Item = String>,
    {
        Self {
            articles: articles.into_iter().collect(),
            comments: comments.into_iter().collect(),
        }
    }

    /// Seed from a previous run's output.
    #[cfg(test)]
    pub fn from_output(output: &CrawlOutput) -> Self {
        Self::seeded(
            output.articles.iter().map(|a| a.id.clone()),
            output.comments.iter().map(|c| c.id.clone()),
        )
    }

    pub fn has_article(&self, id: &str) -> bool {
        self.articles.contains(id)
    }

    /// Record an article id. Returns `false` if it was already present.
    pub fn mark_article(&mut self, id: &str) -> bool {
        self.articles.insert(id.to_string())
    }

    /// Record a comment id. Returns `false` if it was already present.
    pub fn mark_comment(&mut self, id: &str) -> bool {
        self.comments.insert(id.to_string())
    }

    pub fn article_count(&self) -> usize {
        self.articles.len()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}
