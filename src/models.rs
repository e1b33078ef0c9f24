//! Data models for crawled articles and comments.
//!
//! - [`ArticleRecord`]: one article discovered within the date window
//! - [`ArticleText`]: the article's title, subtitle and body, kept apart so the
//!   article table stays small
//! - [`CommentRecord`]: one comment, threaded through its parent's local id
//! - [`CrawlOutput`]: everything a run produced, in discovery order
//!
//! Records are immutable once appended to a [`CrawlOutput`].

use crate::sources::SourceId;
use crate::utils::normalize_category;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Coarse content type derived from a site's category label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Opinion,
    Report,
    Image,
    Video,
    Editorial,
    Interview,
    Article,
}

impl ContentType {
    /// Classify a raw category label. Diacritics and case are ignored.
    ///
    /// Exact or substring match on the normalised label, in vocabulary order;
    /// anything unrecognised is an [`ContentType::Article`].
    pub fn from_category(raw: &str) -> Self {
        let c = normalize_category(raw);
        const RULES: [(&[&str], ContentType); 6] = [
            (&["opinio", "opinion", "tribuna", "carta"], ContentType::Opinion),
            (&["reportatge", "reportaje", "report"], ContentType::Report),
            (&["imatge", "foto", "galeria", "image"], ContentType::Image),
            (&["video"], ContentType::Video),
            (&["editorial"], ContentType::Editorial),
            (&["entrevista", "interview"], ContentType::Interview),
        ];
        RULES
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| c == *n || c.contains(n)))
            .map(|(_, t)| *t)
            .unwrap_or(ContentType::Article)
    }
}

/// One article within the date window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub id: String,
    pub discovered_at: NaiveDateTime,
    pub source: SourceId,
    pub search_term: String,
    pub publish_timestamp: NaiveDateTime,
    /// Normalised category label.
    pub category: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    pub link: String,
    pub comment_count: usize,
}

/// Text side artifact of an article, keyed by article id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleText {
    pub article_id: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
}

/// One comment on an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    pub id: String,
    pub article_id: String,
    pub author: String,
    pub displayed_time: String,
    pub parsed_time: Option<NaiveDateTime>,
    pub content: String,
    /// Site-local id of the comment this one answers; `None` for thread roots.
    pub parent_id: Option<String>,
    pub likes: Option<u32>,
    pub dislikes: Option<u32>,
}

/// Everything collected by a crawl, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlOutput {
    pub articles: Vec<ArticleRecord>,
    pub comments: Vec<CommentRecord>,
    pub texts: Vec<ArticleText>,
}

impl CrawlOutput {
    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn extend(&mut self, other: CrawlOutput) {
        self.articles.extend(other.articles);
        self.comments.extend(other.comments);
        self.texts.extend(other.texts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_content_type_vocabulary() {
        assert_eq!(ContentType::from_category("Opinió"), ContentType::Opinion);
        assert_eq!(ContentType::from_category("reportatges"), ContentType::Report);
        assert_eq!(ContentType::from_category("fotogaleria"), ContentType::Image);
        assert_eq!(ContentType::from_category("Vídeos"), ContentType::Video);
        assert_eq!(ContentType::from_category("EDITORIAL"), ContentType::Editorial);
        assert_eq!(ContentType::from_category("L'entrevista"), ContentType::Interview);
        assert_eq!(ContentType::from_category("nacional"), ContentType::Article);
        assert_eq!(ContentType::from_category(""), ContentType::Article);
    }

    #[test]
    fn test_content_type_ignores_accents_and_case() {
        for (a, b) in [("Opinió", "OPINIO"), ("Vídeo", "video"), ("Imatge", "IMATGE")] {
            assert_eq!(ContentType::from_category(a), ContentType::from_category(b));
        }
    }

    #[test]
    fn test_article_record_serialization() {
        let article = ArticleRecord {
            id: "DI20240305100000".into(),
            discovered_at: ts(),
            source: SourceId::Diari,
            search_term: "habitatge".into(),
            publish_timestamp: ts(),
            category: "nacional".into(),
            content_type: ContentType::Article,
            title: "Títol".into(),
            link: "https://www.diariandorra.ad/noticies/nacional/x".into(),
            comment_count: 2,
        };
        let json = serde_json::to_string(&article).unwrap();
        assert!(json.contains("\"publishTimestamp\":\"2024-03-05T10:00:00\""));
        assert!(json.contains("\"type\":\"article\""));
        assert!(json.contains("\"source\":\"diari\""));
        let back: ArticleRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, article);
    }

    #[test]
    fn test_comment_root_serializes_null_parent() {
        let comment = CommentRecord {
            id: "DI20240305100000-42".into(),
            article_id: "DI20240305100000".into(),
            author: "anna".into(),
            displayed_time: "(05/03/24 11:00)".into(),
            parsed_time: None,
            content: "Molt bé".into(),
            parent_id: None,
            likes: None,
            dislikes: None,
        };
        let json = serde_json::to_string(&comment).unwrap();
        assert!(json.contains("\"parentId\":null"));
    }

    #[test]
    fn test_crawl_output_extend() {
        let mut a = CrawlOutput::default();
        assert!(a.is_empty());
        let mut b = CrawlOutput::default();
        b.texts.push(ArticleText {
            article_id: "X".into(),
            title: "t".into(),
            subtitle: String::new(),
            body: "b".into(),
        });
        a.extend(b);
        assert_eq!(a.texts.len(), 1);
    }
}
