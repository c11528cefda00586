use std::collections::HashSet;

use futures::stream::Stream;
use rusqlite::{params, params_from_iter, Row};

use crate::error::Result;
use crate::models::{into_articles, Article, ArticleRecord};

use super::repository::{Repository, StoreChange};

// Inserts nothing once the topic has been unsubscribed, so a sync racing an
// unsubscribe cannot bring evicted articles back.
const MERGE_SQL: &str = r#"
    INSERT OR IGNORE INTO articles (url, topic, title, description, image_url, source, published_at)
    SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7
    WHERE EXISTS (SELECT 1 FROM subscriptions WHERE topic = ?2)
"#;

/// Per-topic article storage with insert-if-absent writes.
#[derive(Clone)]
pub struct ArticleCache {
    repo: Repository,
}

impl ArticleCache {
    pub(crate) fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Insert every record whose `(url, topic)` is not cached yet and return
    /// how many were new. Existing records are never overwritten.
    ///
    /// The batch commits as one transaction.
    pub async fn merge(&self, topic: &str, records: Vec<ArticleRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let key = topic.to_string();
        let inserted = self
            .repo
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                {
                    let mut stmt = tx.prepare_cached(MERGE_SQL)?;
                    for record in &records {
                        inserted += stmt.execute(params![
                            record.url,
                            key,
                            record.title,
                            record.description,
                            record.image_url,
                            record.source,
                            record.published_at,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;

        if inserted > 0 {
            self.repo.publish(StoreChange::articles([topic]));
        }
        Ok(inserted)
    }

    /// Delete every cached article for `topics`. Subscriptions stay.
    pub async fn evict(&self, topics: &[String]) -> Result<usize> {
        if topics.is_empty() {
            return Ok(0);
        }

        let keys = topics.to_vec();
        let deleted = self
            .repo
            .connection()
            .call(move |conn| {
                let sql = format!("DELETE FROM articles WHERE topic IN ({})", placeholders(keys.len()));
                let deleted = conn.execute(&sql, params_from_iter(keys.iter()))?;
                Ok(deleted)
            })
            .await?;

        if deleted > 0 {
            self.repo.publish(StoreChange::articles(topics.iter().cloned()));
        }
        Ok(deleted)
    }

    /// Raw records for `topics`, newest first.
    pub async fn records(&self, topics: &[String]) -> Result<Vec<ArticleRecord>> {
        if topics.is_empty() {
            return Ok(Vec::new());
        }

        let keys = topics.to_vec();
        let records = self
            .repo
            .connection()
            .call(move |conn| {
                let sql = format!(
                    r#"SELECT title, description, image_url, source, published_at, url, topic
                       FROM articles
                       WHERE topic IN ({})
                       ORDER BY published_at DESC, url, topic"#,
                    placeholders(keys.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map(params_from_iter(keys.iter()), record_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(records)
            })
            .await?;
        Ok(records)
    }

    /// Articles for `topics`, newest first, with value-equal duplicates collapsed.
    pub async fn articles(&self, topics: &[String]) -> Result<Vec<Article>> {
        Ok(into_articles(self.records(topics).await?))
    }

    /// Live view over `topics`: the current articles, then a fresh list after
    /// every change touching one of those topics.
    pub fn query_by_topics(
        &self,
        topics: Vec<String>,
    ) -> impl Stream<Item = Result<Vec<Article>>> + Send + 'static {
        let watched: HashSet<String> = topics.iter().cloned().collect();
        let cache = self.clone();
        self.repo.observe(
            move |change| match change {
                StoreChange::Articles(changed) => changed.iter().any(|t| watched.contains(t)),
                StoreChange::Subscriptions => false,
            },
            move || {
                let cache = cache.clone();
                let topics = topics.clone();
                async move { cache.articles(&topics).await }
            },
        )
    }
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

fn record_from_row(row: &Row) -> rusqlite::Result<ArticleRecord> {
    Ok(ArticleRecord {
        title: row.get(0)?,
        description: row.get(1)?,
        image_url: row.get(2)?,
        source: row.get(3)?,
        published_at: row.get(4)?,
        url: row.get(5)?,
        topic: row.get(6)?,
    })
}
