use futures::stream::Stream;
use rusqlite::params;

use crate::error::{AppError, Result};

use super::repository::{Repository, StoreChange};

/// Trim a user-entered topic; empty topics are rejected.
pub fn normalize_topic(topic: &str) -> Result<String> {
    let trimmed = topic.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidTopic(topic.to_string()));
    }
    Ok(trimmed.to_string())
}

/// The persistent set of subscribed topics, in insertion order.
#[derive(Clone)]
pub struct SubscriptionStore {
    repo: Repository,
}

impl SubscriptionStore {
    pub(crate) fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Subscribe to `topic`. Returns `false` if it was already subscribed.
    pub async fn add(&self, topic: &str) -> Result<bool> {
        let topic = normalize_topic(topic)?;
        let inserted = self
            .repo
            .connection()
            .call(move |conn| {
                let changed = conn.execute(
                    "INSERT OR IGNORE INTO subscriptions (topic) VALUES (?1)",
                    params![topic],
                )?;
                Ok(changed > 0)
            })
            .await?;

        if inserted {
            self.repo.publish(StoreChange::Subscriptions);
        }
        Ok(inserted)
    }

    /// Unsubscribe from `topic`, deleting its cached articles in the same
    /// transaction. Returns `false` if it was not subscribed.
    pub async fn remove(&self, topic: &str) -> Result<bool> {
        let topic = normalize_topic(topic)?;
        let key = topic.clone();
        let (removed, evicted) = self
            .repo
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;
                let evicted = tx.execute("DELETE FROM articles WHERE topic = ?1", params![key])?;
                let removed =
                    tx.execute("DELETE FROM subscriptions WHERE topic = ?1", params![key])?;
                tx.commit()?;
                Ok((removed > 0, evicted))
            })
            .await?;

        if evicted > 0 {
            self.repo.publish(StoreChange::articles([topic]));
        }
        if removed {
            self.repo.publish(StoreChange::Subscriptions);
        }
        Ok(removed)
    }

    /// One-shot read of the current topics.
    pub async fn snapshot(&self) -> Result<Vec<String>> {
        let topics = self
            .repo
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT topic FROM subscriptions ORDER BY rowid")?;
                let topics = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<String>, _>>()?;
                Ok(topics)
            })
            .await?;
        Ok(topics)
    }

    pub async fn contains(&self, topic: &str) -> Result<bool> {
        let topic = topic.to_string();
        let exists = self
            .repo
            .connection()
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE topic = ?1)",
                    params![topic],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?;
        Ok(exists)
    }

    /// Live view of the topic list: the current list first, then a fresh list
    /// after every subscribe or unsubscribe.
    pub fn list(&self) -> impl Stream<Item = Result<Vec<String>>> + Send + 'static {
        let store = self.clone();
        self.repo.observe(
            |change| matches!(change, StoreChange::Subscriptions),
            move || {
                let store = store.clone();
                async move { store.snapshot().await }
            },
        )
    }
}
