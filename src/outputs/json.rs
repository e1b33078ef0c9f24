//! JSON output for the persistence side.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── 20240305_articles.json   # Vec<ArticleRecord>
//! ├── 20240305_comments.json   # Vec<CommentRecord>
//! └── texts/
//!     ├── DI20240305100000.json
//!     └── ...
//! ```
//!
//! Files are keyed by the run's date. A second run on the same day appends to
//! the day's files instead of replacing them.
//!
//! The same files are read back to seed the dedup sets of a later run.

use crate::dedup::SeenIds;
use crate::models::{ArticleRecord, ArticleText, CommentRecord, CrawlOutput};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

const ARTICLES_SUFFIX: &str = "_articles.json";
const COMMENTS_SUFFIX: &str = "_comments.json";

/// Paths written by [`write_output`].
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenFiles {
    pub articles: PathBuf,
    pub comments: PathBuf,
    pub texts: usize,
}

/// Write a crawl's articles, comments and per-article texts under `output_dir`.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_output(
    output: &CrawlOutput,
    output_dir: &str,
    run_started: NaiveDateTime,
) -> Result<WrittenFiles, Box<dyn Error>> {
    let dir = Path::new(output_dir);
    let day = run_started.format("%Y%m%d");

    let articles = dir.join(format!("{day}{ARTICLES_SUFFIX}"));
    append_records(&articles, &output.articles).await?;

    let comments = dir.join(format!("{day}{COMMENTS_SUFFIX}"));
    append_records(&comments, &output.comments).await?;

    let texts_dir = dir.join("texts");
    if let Err(e) = fs::create_dir_all(&texts_dir).await {
        error!(path = %texts_dir.display(), error = %e, "Failed to create texts dir");
        return Err(e.into());
    }
    for text in &output.texts {
        write_text(&texts_dir, text).await?;
    }

    info!(
        articles = output.articles.len(),
        comments = output.comments.len(),
        texts = output.texts.len(),
        "Wrote crawl output"
    );
    Ok(WrittenFiles {
        articles,
        comments,
        texts: output.texts.len(),
    })
}

async fn append_records<T>(path: &Path, records: &[T]) -> Result<(), Box<dyn Error>>
where
    T: Serialize + DeserializeOwned + Clone,
{
    let mut all: Vec<T> = match fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let existing = all.len();
    all.extend_from_slice(records);

    info!(path = %path.display(), existing, added = records.len(), "Writing JSON");
    fs::write(path, serde_json::to_string_pretty(&all)?).await?;
    Ok(())
}

async fn write_text(dir: &Path, text: &ArticleText) -> Result<(), Box<dyn Error>> {
    let path = dir.join(format!("{}.json", text.article_id));
    debug!(path = %path.display(), "Writing article text");
    fs::write(&path, serde_json::to_string_pretty(text)?).await?;
    Ok(())
}

/// Collect the ids of every `*_articles.json` and `*_comments.json` in `dir`.
///
/// Unreadable files are skipped with a warning.
#[instrument(level = "info", skip_all, fields(dir = %dir))]
pub async fn load_known_ids(dir: &str) -> Result<SeenIds, Box<dyn Error>> {
    let mut articles = Vec::new();
    let mut comments = Vec::new();

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.ends_with(ARTICLES_SUFFIX) {
            match read_records::<ArticleRecord>(&path).await {
                Ok(records) => articles.extend(records.into_iter().map(|a| a.id)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable articles file"),
            }
        } else if name.ends_with(COMMENTS_SUFFIX) {
            match read_records::<CommentRecord>(&path).await {
                Ok(records) => comments.extend(records.into_iter().map(|c| c.id)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable comments file"),
            }
        }
    }

    let seen = SeenIds::seeded(articles, comments);
    info!(
        articles = seen.article_count(),
        comments = seen.comment_count(),
        "Loaded known ids"
    );
    Ok(seen)
}

async fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, Box<dyn Error>> {
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}
