use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::db::{ArticleCache, SubscriptionStore};
use crate::error::{AppError, Result};
use crate::feed::{to_records, ArticleSource};
use crate::models::Language;

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Fetches remote articles per topic and merges them into the cache.
#[derive(Clone)]
pub struct SyncEngine {
    subscriptions: SubscriptionStore,
    cache: ArticleCache,
    source: Arc<dyn ArticleSource>,
    max_concurrent: usize,
}

impl SyncEngine {
    pub fn new(
        subscriptions: SubscriptionStore,
        cache: ArticleCache,
        source: Arc<dyn ArticleSource>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            subscriptions,
            cache,
            source,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Refresh one topic and return how many new articles were cached.
    ///
    /// Fetch failures are logged and count as zero results. Storage failures
    /// and cancellation are returned. Once a merge has started it runs to
    /// completion, so cancelling never leaves a partial batch behind.
    pub async fn sync_topic(
        &self,
        topic: &str,
        language: Language,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = self.source.fetch(topic, language) => result,
        };

        let remote = match fetched {
            Ok(articles) => articles,
            Err(e) => {
                tracing::warn!(topic, error = %e, "Failed to fetch articles, keeping cached ones");
                return Ok(0);
            }
        };

        let fetched_count = remote.len();
        let records = to_records(remote, topic, Utc::now().timestamp_millis());

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let inserted = self.cache.merge(topic, records).await?;
        tracing::debug!(topic, fetched = fetched_count, inserted, "Synced topic");
        Ok(inserted)
    }

    /// Refresh every subscribed topic concurrently and return the topics that
    /// received at least one new article.
    ///
    /// The topic list is read once up front. One topic failing never stops
    /// the others; after all have finished, cancellation wins over a storage
    /// failure, which wins over success.
    pub async fn sync_all(
        &self,
        language: Language,
        cancel: &CancellationToken,
    ) -> Result<BTreeSet<String>> {
        let topics = self.subscriptions.snapshot().await?;
        if topics.is_empty() {
            tracing::debug!("No subscriptions to sync");
            return Ok(BTreeSet::new());
        }

        let total = topics.len();
        let mut results = stream::iter(topics)
            .map(|topic| async move {
                let result = self.sync_topic(&topic, language, cancel).await;
                (topic, result)
            })
            .buffer_unordered(self.max_concurrent);

        let mut updated = BTreeSet::new();
        let mut cancelled = false;
        let mut storage_failure = None;

        while let Some((topic, result)) = results.next().await {
            match result {
                Ok(0) => {}
                Ok(_) => {
                    updated.insert(topic);
                }
                Err(AppError::Cancelled) => cancelled = true,
                Err(e) => {
                    tracing::error!(topic = %topic, error = %e, "Failed to store articles");
                    storage_failure.get_or_insert(e);
                }
            }
        }

        if cancelled {
            tracing::info!("Sync cycle cancelled");
            return Err(AppError::Cancelled);
        }
        if let Some(e) = storage_failure {
            return Err(e);
        }

        tracing::info!(topics = total, updated = updated.len(), "Sync cycle finished");
        Ok(updated)
    }
}
