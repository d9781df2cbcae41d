//! Background sync scheduling.
//!
//! Every sync, whether cron-driven, run at startup or triggered through the
//! API, goes through [`SyncRunner`], which allows at most one run at a time.

use std::sync::Arc;

use shelfsync_core::{RegionAllowlist, RegionId};
use shelfsync_scraper::HttpTransport;
use shelfsync_sync::{PgCatalogStore, SyncEngine, SyncOptions};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tokio_util::sync::CancellationToken;

pub type ServerEngine = SyncEngine<HttpTransport, PgCatalogStore>;

/// Starts sync runs in the background, one at a time.
#[derive(Clone)]
pub struct SyncRunner {
    engine: Arc<ServerEngine>,
    allowlist: Option<RegionAllowlist>,
    run_lock: Arc<Mutex<()>>,
    shutdown: CancellationToken,
}

impl SyncRunner {
    pub fn new(
        engine: Arc<ServerEngine>,
        allowlist: Option<RegionAllowlist>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            engine,
            allowlist,
            run_lock: Arc::new(Mutex::new(())),
            shutdown,
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Spawns a run unless one is already active. Returns whether a run was
    /// started.
    ///
    /// The run's cancellation token is a child of the server's shutdown
    /// token, so shutting down cancels it.
    pub fn try_start(&self, trigger_source: &str, regions: Option<Vec<RegionId>>) -> bool {
        let Ok(guard) = Arc::clone(&self.run_lock).try_lock_owned() else {
            tracing::warn!(trigger = trigger_source, "sync already running, not starting another");
            return false;
        };

        let mut options =
            SyncOptions::new(trigger_source).with_allowlist(self.allowlist.clone());
        if let Some(regions) = regions {
            options = options.with_regions(regions);
        }

        let engine = Arc::clone(&self.engine);
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            let _guard = guard;
            match engine.sync_all_regions(&options, cancel).await {
                Ok(summary) => tracing::info!(
                    sync_run_id = ?summary.sync_run_id,
                    regions_synced = summary.regions_synced(),
                    regions_failed = summary.regions_failed(),
                    cancelled = summary.cancelled,
                    "scheduler: sync run complete"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: sync run failed"),
            }
        });
        true
    }
}

#[cfg(test)]
impl SyncRunner {
    /// Holds the run lock the way an active run does.
    pub(crate) fn hold_run_lock(&self) -> tokio::sync::OwnedMutexGuard<()> {
        Arc::clone(&self.run_lock)
            .try_lock_owned()
            .expect("run lock already held")
    }
}

/// Builds and starts the background job scheduler.
///
/// Registers the recurring sync on `cron` and, when `run_on_startup` is set,
/// starts one run immediately. The returned handle must be kept alive for
/// the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    runner: SyncRunner,
    cron: &str,
    run_on_startup: bool,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_sync_job(&scheduler, runner.clone(), cron).await?;
    scheduler.start().await?;

    if run_on_startup {
        tracing::info!("scheduler: starting sync at startup");
        runner.try_start("startup", None);
    }

    Ok(scheduler)
}

/// A tick that finds a run still active is skipped rather than queued.
async fn register_sync_job(
    scheduler: &JobScheduler,
    runner: SyncRunner,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let runner = runner.clone();
        Box::pin(async move {
            if runner.try_start("scheduler", None) {
                tracing::info!("scheduler: sync tick started a run");
            } else {
                tracing::info!("scheduler: previous sync still active, skipping tick");
            }
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: sync job registered");
    Ok(())
}
