/// Receives the topics that gained new articles during a sync cycle.
///
/// Called at most once per cycle and never with an empty list.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, topics: &[String]);
}

/// Reports new articles through the log.
#[derive(Debug, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, topics: &[String]) {
        tracing::info!(
            count = topics.len(),
            "New articles in {} subscriptions: {}",
            topics.len(),
            topics.join(", ")
        );
    }
}
