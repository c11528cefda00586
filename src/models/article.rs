use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// An article as stored in the cache, partitioned by topic.
///
/// Identity is `(url, topic)`; the same article may be cached under several
/// topics but never twice under one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub source: String,
    pub published_at: i64,
    pub url: String,
    pub topic: String,
}

/// The view of a cached article handed to callers: a record without its topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub source: String,
    /// Milliseconds since the Unix epoch.
    pub published_at: i64,
    pub url: String,
}

impl From<ArticleRecord> for Article {
    fn from(record: ArticleRecord) -> Self {
        Self {
            title: record.title,
            description: record.description,
            image_url: record.image_url,
            source: record.source,
            published_at: record.published_at,
            url: record.url,
        }
    }
}

/// Project records to articles, collapsing entries equal by value.
/// Keeps the first occurrence so the input order survives.
pub fn into_articles(records: Vec<ArticleRecord>) -> Vec<Article> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .map(Article::from)
        .filter(|article| seen.insert(article.clone()))
        .collect()
}
