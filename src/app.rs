use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::Stream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::db::{normalize_topic, ArticleCache, Repository, SubscriptionStore};
use crate::error::{AppError, Result};
use crate::feed::ArticleSource;
use crate::models::{Article, Settings};
use crate::services::{
    HostScheduler, NotificationSink, RefreshJob, RefreshScheduler, SyncEngine,
};

/// The wired-up engine, not yet running.
pub struct Engine {
    repository: Repository,
    sync: SyncEngine,
    host: Arc<dyn HostScheduler>,
    sink: Arc<dyn NotificationSink>,
}

impl Engine {
    pub fn new(
        repository: Repository,
        source: Arc<dyn ArticleSource>,
        host: Arc<dyn HostScheduler>,
        sink: Arc<dyn NotificationSink>,
        max_concurrent_fetches: usize,
    ) -> Self {
        let sync = SyncEngine::new(
            repository.subscriptions(),
            repository.articles(),
            source,
            max_concurrent_fetches,
        );
        Self {
            repository,
            sync,
            host,
            sink,
        }
    }

    pub fn subscriptions(&self) -> SubscriptionStore {
        self.repository.subscriptions()
    }

    pub fn cache(&self) -> ArticleCache {
        self.repository.articles()
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    /// Start background refresh driven by `settings`. Call once per process.
    pub fn start(&self, settings: watch::Receiver<Settings>) -> EngineHandle {
        let shutdown = CancellationToken::new();

        let job = Arc::new(RefreshJob::new(
            self.sync.clone(),
            settings.clone(),
            Arc::clone(&self.sink),
        ));
        let scheduler = RefreshScheduler::new(Arc::clone(&self.host), job);
        let scheduler_task = tokio::spawn(scheduler.run(settings.clone(), shutdown.clone()));

        tracing::info!("Engine started");

        EngineHandle {
            subscriptions: self.subscriptions(),
            cache: self.cache(),
            sync: self.sync.clone(),
            settings,
            shutdown,
            workers: TaskTracker::new(),
            scheduler_task,
        }
    }
}

/// A running engine. User actions go through here so their background work
/// is owned by the engine and stopped with it.
pub struct EngineHandle {
    subscriptions: SubscriptionStore,
    cache: ArticleCache,
    sync: SyncEngine,
    settings: watch::Receiver<Settings>,
    shutdown: CancellationToken,
    workers: TaskTracker,
    scheduler_task: JoinHandle<()>,
}

impl EngineHandle {
    /// Subscribe to `topic` and queue its first sync on the worker pool.
    /// Returns once the sync is queued, not when it finishes.
    pub async fn subscribe(&self, topic: &str) -> Result<()> {
        let topic = normalize_topic(topic)?;
        self.subscriptions.add(&topic).await?;

        let sync = self.sync.clone();
        let language = self.settings.borrow().language;
        let cancel = self.shutdown.child_token();
        self.workers.spawn(async move {
            match sync.sync_topic(&topic, language, &cancel).await {
                Ok(inserted) => tracing::debug!(topic = %topic, inserted, "Initial sync done"),
                Err(AppError::Cancelled) => tracing::debug!(topic = %topic, "Initial sync cancelled"),
                Err(e) => tracing::error!(topic = %topic, error = %e, "Initial sync failed"),
            }
        });
        Ok(())
    }

    /// Unsubscribe from `topic`, dropping its cached articles with it.
    pub async fn unsubscribe(&self, topic: &str) -> Result<bool> {
        self.subscriptions.remove(topic).await
    }

    /// Run one sync cycle now, outside the schedule. Never notifies.
    pub async fn refresh(&self) -> Result<BTreeSet<String>> {
        let language = self.settings.borrow().language;
        self.sync.sync_all(language, &self.shutdown).await
    }

    /// Drop cached articles for `topics` but keep the subscriptions.
    pub async fn clear_articles(&self, topics: &[String]) -> Result<usize> {
        self.cache.evict(topics).await
    }

    pub fn subscriptions(&self) -> impl Stream<Item = Result<Vec<String>>> + Send + 'static {
        self.subscriptions.list()
    }

    pub fn articles(
        &self,
        topics: Vec<String>,
    ) -> impl Stream<Item = Result<Vec<Article>>> + Send + 'static {
        self.cache.query_by_topics(topics)
    }

    /// Wait until every queued subscribe sync has finished.
    pub async fn wait_idle(&self) {
        self.workers.close();
        self.workers.wait().await;
        self.workers.reopen();
    }

    /// Cancel the scheduled job and all in-flight syncs, then wait for them.
    pub async fn stop(self) {
        self.shutdown.cancel();
        self.workers.close();
        self.workers.wait().await;
        if let Err(e) = self.scheduler_task.await {
            tracing::warn!(error = %e, "Scheduler task failed");
        }
        tracing::info!("Engine stopped");
    }
}
