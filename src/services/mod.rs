mod host;
mod notifier;
mod scheduler;
mod sync;

pub use host::TokioHostScheduler;
pub use notifier::{LogNotificationSink, NotificationSink};
pub use scheduler::{
    HostScheduler, JobSpec, NetworkConstraint, PeriodicJob, RefreshJob, RefreshScheduler,
    ScheduleState, REFRESH_JOB_NAME,
};
pub use sync::{SyncEngine, DEFAULT_MAX_CONCURRENT_FETCHES};
