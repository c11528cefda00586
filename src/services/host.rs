use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::scheduler::{HostScheduler, JobSpec, PeriodicJob};

struct RegisteredJob {
    spec: JobSpec,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// In-process host: each job runs on a tokio task, once right away and then
/// every `minimum_interval_minutes`.
///
/// This host has no view of the network type or battery level, so those
/// constraints are only logged.
#[derive(Default)]
pub struct TokioHostScheduler {
    jobs: Mutex<HashMap<String, RegisteredJob>>,
    /// Cancelled or replaced invocations that may still be winding down.
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioHostScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spec(&self, name: &str) -> Option<JobSpec> {
        self.lock_jobs().get(name).map(|job| job.spec)
    }

    /// Cancel every job and wait for running invocations to finish,
    /// including ones cancelled earlier through `cancel_unique`.
    pub async fn shutdown(&self) {
        let jobs: Vec<RegisteredJob> = self.lock_jobs().drain().map(|(_, job)| job).collect();
        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            job.cancel.cancel();
            handles.push(job.handle);
        }
        let retired = std::mem::take(&mut *self.lock_retired());
        handles.extend(retired);

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Periodic job task failed");
            }
        }
    }

    fn retire(&self, job: RegisteredJob) {
        job.cancel.cancel();
        let mut retired = self.lock_retired();
        retired.retain(|handle| !handle.is_finished());
        retired.push(job.handle);
    }

    fn lock_jobs(&self) -> MutexGuard<'_, HashMap<String, RegisteredJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_retired(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.retired.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HostScheduler for TokioHostScheduler {
    fn enqueue_unique_periodic(&self, name: &str, spec: JobSpec, job: Arc<dyn PeriodicJob>) {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_periodic(name.to_string(), spec, job, cancel.clone()));

        let previous = self.lock_jobs().insert(
            name.to_string(),
            RegisteredJob {
                spec,
                cancel,
                handle,
            },
        );
        if let Some(previous) = previous {
            self.retire(previous);
            tracing::debug!(job = name, "Replaced periodic job");
        }
    }

    fn cancel_unique(&self, name: &str) {
        let removed = self.lock_jobs().remove(name);
        if let Some(job) = removed {
            self.retire(job);
        }
    }
}

async fn run_periodic(
    name: String,
    spec: JobSpec,
    job: Arc<dyn PeriodicJob>,
    cancel: CancellationToken,
) {
    // A zero period would panic in `interval`.
    let period = Duration::from_secs(u64::from(spec.minimum_interval_minutes.max(1)) * 60);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        job = %name,
        interval_minutes = spec.minimum_interval_minutes,
        network = ?spec.network,
        battery_not_low = spec.battery_not_low,
        "Periodic job installed"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match job.run(cancel.clone()).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => break,
            Err(e) => tracing::error!(job = %name, error = %e, "Periodic job failed"),
        }
    }

    tracing::debug!(job = %name, "Periodic job stopped");
}
