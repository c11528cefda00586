use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_rusqlite::Connection;

use crate::error::Result;

use super::schema::SCHEMA;
use super::{ArticleCache, SubscriptionStore};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A committed mutation, published after the write transaction finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Subscriptions,
    Articles(Arc<BTreeSet<String>>),
}

impl StoreChange {
    pub(crate) fn articles<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StoreChange::Articles(Arc::new(topics.into_iter().map(Into::into).collect()))
    }
}

/// Shared handle to the SQLite database plus its change channel.
///
/// Cloning is cheap; all clones talk to the same background connection thread.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
    changes: broadcast::Sender<StoreChange>,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { conn, changes })
    }

    pub fn subscriptions(&self) -> SubscriptionStore {
        SubscriptionStore::new(self.clone())
    }

    pub fn articles(&self) -> ArticleCache {
        ArticleCache::new(self.clone())
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn publish(&self, change: StoreChange) {
        // No receivers is fine: nobody is observing right now.
        let _ = self.changes.send(change);
    }

    /// Build a live view: yields `load()` immediately, then again after every
    /// change accepted by `relevant`. Dropping the stream unsubscribes.
    pub(crate) fn observe<T, R, L, Fut>(
        &self,
        relevant: R,
        load: L,
    ) -> impl Stream<Item = Result<T>> + Send + 'static
    where
        T: Send + 'static,
        R: Fn(&StoreChange) -> bool + Send + Sync + 'static,
        L: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        // Subscribe before the first load so no change can slip between them.
        let rx = self.changes.subscribe();

        stream::unfold(
            (rx, relevant, load, true),
            |(mut rx, relevant, load, first)| async move {
                if !first && !wait_for_change(&mut rx, &relevant).await {
                    return None;
                }
                let value = load().await;
                Some((value, (rx, relevant, load, false)))
            },
        )
    }
}

async fn wait_for_change<R>(rx: &mut broadcast::Receiver<StoreChange>, relevant: &R) -> bool
where
    R: Fn(&StoreChange) -> bool,
{
    loop {
        match rx.recv().await {
            Ok(change) if relevant(&change) => return true,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Change observer lagged, reloading");
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}
