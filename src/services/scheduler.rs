//! Periodic refresh scheduling.
//!
//! [`RefreshScheduler`] watches the settings source, projects every value to a
//! [`RefreshPolicy`] and (re)installs the refresh job with the host whenever the
//! policy actually changes. The job itself is [`RefreshJob`]: one sync cycle
//! followed by an optional notification.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{RefreshPolicy, Settings};

use super::notifier::NotificationSink;
use super::sync::SyncEngine;

/// Logical name of the refresh job at the host.
pub const REFRESH_JOB_NAME: &str = "refresh-articles";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkConstraint {
    Any,
    Unmetered,
}

/// What the host is asked to honour when running a periodic job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSpec {
    pub minimum_interval_minutes: u32,
    pub network: NetworkConstraint,
    /// Declared only; enforcement belongs to the host.
    pub battery_not_low: bool,
}

impl From<RefreshPolicy> for JobSpec {
    fn from(policy: RefreshPolicy) -> Self {
        Self {
            minimum_interval_minutes: policy.interval.minutes(),
            network: if policy.wifi_only {
                NetworkConstraint::Unmetered
            } else {
                NetworkConstraint::Any
            },
            battery_not_low: true,
        }
    }
}

#[async_trait]
pub trait PeriodicJob: Send + Sync {
    async fn run(&self, cancel: CancellationToken) -> Result<()>;
}

/// The execution environment that runs periodic jobs.
///
/// Enqueueing under a name that is already registered cancels the existing
/// job (including a running invocation) and installs the new one.
pub trait HostScheduler: Send + Sync {
    fn enqueue_unique_periodic(&self, name: &str, spec: JobSpec, job: Arc<dyn PeriodicJob>);
    fn cancel_unique(&self, name: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    Unscheduled,
    Scheduled(RefreshPolicy),
    Cancelled,
}

pub struct RefreshScheduler {
    host: Arc<dyn HostScheduler>,
    job: Arc<dyn PeriodicJob>,
    state: ScheduleState,
}

impl RefreshScheduler {
    pub fn new(host: Arc<dyn HostScheduler>, job: Arc<dyn PeriodicJob>) -> Self {
        Self {
            host,
            job,
            state: ScheduleState::Unscheduled,
        }
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    /// Install the job for `policy` unless that exact policy is already
    /// installed. Returns whether the host was called.
    pub fn apply(&mut self, policy: RefreshPolicy) -> bool {
        match self.state {
            ScheduleState::Scheduled(current) if current == policy => {
                tracing::debug!(?policy, "Refresh policy unchanged, keeping job");
                return false;
            }
            ScheduleState::Cancelled => return false,
            _ => {}
        }

        let spec = JobSpec::from(policy);
        self.host
            .enqueue_unique_periodic(REFRESH_JOB_NAME, spec, Arc::clone(&self.job));
        tracing::info!(
            interval_minutes = spec.minimum_interval_minutes,
            network = ?spec.network,
            "Scheduled background refresh"
        );
        self.state = ScheduleState::Scheduled(policy);
        true
    }

    pub fn cancel(&mut self) {
        if let ScheduleState::Scheduled(_) = self.state {
            self.host.cancel_unique(REFRESH_JOB_NAME);
            tracing::info!("Cancelled background refresh");
        }
        self.state = ScheduleState::Cancelled;
    }

    /// Follow `settings` until it closes or `shutdown` fires, then cancel the job.
    pub async fn run(mut self, mut settings: watch::Receiver<Settings>, shutdown: CancellationToken) {
        loop {
            let policy = settings.borrow_and_update().refresh_policy();
            self.apply(policy);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = settings.changed() => {
                    if changed.is_err() {
                        tracing::debug!("Settings source closed");
                        break;
                    }
                }
            }
        }
        self.cancel();
    }
}

/// One background sync cycle: sync everything, then notify if enabled.
pub struct RefreshJob {
    sync: SyncEngine,
    settings: watch::Receiver<Settings>,
    sink: Arc<dyn NotificationSink>,
}

impl RefreshJob {
    pub fn new(
        sync: SyncEngine,
        settings: watch::Receiver<Settings>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            sync,
            settings,
            sink,
        }
    }
}

#[async_trait]
impl PeriodicJob for RefreshJob {
    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        tracing::debug!("Refresh job started");
        let settings = *self.settings.borrow();

        let updated = self.sync.sync_all(settings.language, &cancel).await?;
        if !updated.is_empty() && settings.notifications_enabled {
            let topics: Vec<String> = updated.into_iter().collect();
            self.sink.notify(&topics);
        }

        tracing::debug!("Refresh job finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Repository;
    use crate::error::AppError;
    use crate::models::{Interval, Language};
    use crate::test_support::{remote, FakeHost, FakeSource, HostEvent, RecordingSink};

    struct NoopJob;

    #[async_trait]
    impl PeriodicJob for NoopJob {
        async fn run(&self, _cancel: CancellationToken) -> Result<()> {
            Ok(())
        }
    }

    fn policy(minutes: u32, wifi_only: bool) -> RefreshPolicy {
        RefreshPolicy {
            interval: Interval::try_from(minutes).unwrap(),
            wifi_only,
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<HostEvent>) -> Vec<HostEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn job_spec_maps_network_constraint() {
        let spec = JobSpec::from(policy(30, true));
        assert_eq!(spec.minimum_interval_minutes, 30);
        assert_eq!(spec.network, NetworkConstraint::Unmetered);
        assert!(spec.battery_not_low);
        assert_eq!(JobSpec::from(policy(60, false)).network, NetworkConstraint::Any);
    }

    #[tokio::test]
    async fn identical_policy_installs_once() {
        let (host, mut events) = FakeHost::new();
        let mut scheduler = RefreshScheduler::new(host, Arc::new(NoopJob));

        assert!(scheduler.apply(policy(30, true)));
        assert!(!scheduler.apply(policy(30, true)));

        assert_eq!(
            drain(&mut events),
            vec![HostEvent::Enqueued(
                REFRESH_JOB_NAME.to_string(),
                JobSpec::from(policy(30, true))
            )]
        );
        assert_eq!(scheduler.state(), ScheduleState::Scheduled(policy(30, true)));
    }

    #[tokio::test]
    async fn distinct_policy_replaces_job() {
        let (host, mut events) = FakeHost::new();
        let mut scheduler = RefreshScheduler::new(host, Arc::new(NoopJob));

        scheduler.apply(policy(30, true));
        scheduler.apply(policy(30, false));
        scheduler.apply(policy(60, false));

        assert_eq!(drain(&mut events).len(), 3);
        assert_eq!(scheduler.state(), ScheduleState::Scheduled(policy(60, false)));
    }

    #[tokio::test]
    async fn cancel_is_terminal() {
        let (host, mut events) = FakeHost::new();
        let mut scheduler = RefreshScheduler::new(host, Arc::new(NoopJob));

        scheduler.apply(policy(15, false));
        scheduler.cancel();
        assert!(!scheduler.apply(policy(30, false)));

        let events = drain(&mut events);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], HostEvent::Cancelled(REFRESH_JOB_NAME.to_string()));
        assert_eq!(scheduler.state(), ScheduleState::Cancelled);
    }

    #[tokio::test]
    async fn run_follows_settings_and_suppresses_irrelevant_changes() {
        let (host, mut events) = FakeHost::new();
        let (settings_tx, settings_rx) = watch::channel(Settings::default());
        let shutdown = CancellationToken::new();
        let scheduler = RefreshScheduler::new(host, Arc::new(NoopJob));
        let task = tokio::spawn(scheduler.run(settings_rx, shutdown.clone()));

        let first = events.recv().await.unwrap();
        assert_eq!(
            first,
            HostEvent::Enqueued(REFRESH_JOB_NAME.to_string(), JobSpec::from(policy(15, false)))
        );

        // Language and notifications are not part of the policy.
        settings_tx.send_modify(|s| {
            s.language = Language::Russian;
            s.notifications_enabled = true;
        });
        settings_tx.send_modify(|s| s.wifi_only = true);

        let second = events.recv().await.unwrap();
        assert_eq!(
            second,
            HostEvent::Enqueued(REFRESH_JOB_NAME.to_string(), JobSpec::from(policy(15, true)))
        );

        shutdown.cancel();
        task.await.unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::Cancelled(REFRESH_JOB_NAME.to_string())
        );
    }

    async fn refresh_job(
        notifications_enabled: bool,
    ) -> (Arc<FakeSource>, Arc<RecordingSink>, RefreshJob) {
        let repo = Repository::in_memory().await.unwrap();
        repo.subscriptions().add("go").await.unwrap();
        repo.subscriptions().add("rust").await.unwrap();

        let source = Arc::new(FakeSource::new());
        let sink = Arc::new(RecordingSink::default());
        let sync = SyncEngine::new(repo.subscriptions(), repo.articles(), source.clone(), 2);
        let (_tx, settings) = watch::channel(Settings {
            notifications_enabled,
            ..Settings::default()
        });
        let job = RefreshJob::new(sync, settings, sink.clone());
        (source, sink, job)
    }

    #[tokio::test]
    async fn refresh_job_notifies_updated_topics() {
        let (source, sink, job) = refresh_job(true).await;
        source.respond("rust", vec![remote("https://x/1", "2024-01-01T00:00:00Z")]);

        job.run(CancellationToken::new()).await.unwrap();

        assert_eq!(sink.calls(), vec![vec!["rust".to_string()]]);
    }

    #[tokio::test]
    async fn refresh_job_stays_quiet_when_disabled() {
        let (source, sink, job) = refresh_job(false).await;
        source.respond("rust", vec![remote("https://x/1", "2024-01-01T00:00:00Z")]);

        job.run(CancellationToken::new()).await.unwrap();

        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn refresh_job_stays_quiet_without_new_articles() {
        let (source, sink, job) = refresh_job(true).await;
        source.respond("rust", vec![remote("https://x/1", "2024-01-01T00:00:00Z")]);
        job.run(CancellationToken::new()).await.unwrap();

        job.run(CancellationToken::new()).await.unwrap();

        assert_eq!(sink.calls().len(), 1);
    }

    #[tokio::test]
    async fn refresh_job_propagates_cancellation() {
        let (_source, sink, job) = refresh_job(true).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = job.run(cancel).await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert!(sink.calls().is_empty());
    }
}
