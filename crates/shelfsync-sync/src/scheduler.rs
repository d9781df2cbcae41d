//! Two-level concurrency bound for a sync run.
//!
//! At most `R` regions hold a [`RegionSlot`] at once, and each slot admits at
//! most `K` page fetches in flight. Every permit is an RAII guard, so slots
//! are released exactly once on success, error, and cancellation alike.
//! Every wait is raced against the run's [`CancellationToken`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shelfsync_scraper::ScraperError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::SyncError;

#[derive(Debug, Clone)]
pub struct Scheduler {
    region_slots: Arc<Semaphore>,
    requests_per_region: usize,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Both limits are clamped to at least 1.
    #[must_use]
    pub fn new(max_regions: usize, requests_per_region: usize, cancel: CancellationToken) -> Self {
        Self {
            region_slots: Arc::new(Semaphore::new(max_regions.max(1))),
            requests_per_region: requests_per_region.max(1),
            cancel,
        }
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn available_region_slots(&self) -> usize {
        self.region_slots.available_permits()
    }

    /// Waits for a free region slot.
    ///
    /// Callers must acquire the slot *before* acquiring a session, so the
    /// number of live sessions never exceeds the region limit.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if the run is cancelled while waiting.
    pub async fn region_slot(&self) -> Result<RegionSlot, SyncError> {
        let permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(SyncError::Cancelled),
            permit = Arc::clone(&self.region_slots).acquire_owned() => {
                permit.map_err(|_| SyncError::Cancelled)?
            }
        };

        Ok(RegionSlot {
            _permit: permit,
            requests: Arc::new(Semaphore::new(self.requests_per_region)),
            cancel: self.cancel.clone(),
        })
    }
}

/// A held region slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct RegionSlot {
    _permit: OwnedSemaphorePermit,
    requests: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl RegionSlot {
    #[must_use]
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn available_request_slots(&self) -> usize {
        self.requests.available_permits()
    }

    /// Runs one fetch while holding a request permit for this region.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if the run is cancelled while waiting
    /// for a permit or while the fetch is in flight; the fetch future is
    /// dropped in that case. Fetch failures surface as [`SyncError::Fetch`].
    pub async fn fetch<T, Fut>(&self, fetch: Fut) -> Result<T, SyncError>
    where
        Fut: Future<Output = Result<T, ScraperError>>,
    {
        let _permit = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(SyncError::Cancelled),
            permit = self.requests.acquire() => permit.map_err(|_| SyncError::Cancelled)?,
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(SyncError::Cancelled),
            result = fetch => result.map_err(SyncError::from),
        }
    }

    /// Races an arbitrary step (e.g. session acquisition) against cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if the run is cancelled first.
    pub async fn until_cancelled<T, Fut>(&self, step: Fut) -> Result<T, SyncError>
    where
        Fut: Future<Output = T>,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(SyncError::Cancelled),
            value = step => Ok(value),
        }
    }

    /// Sleeps for `delay`, waking early if the run is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if the run is cancelled first.
    pub async fn pause(&self, delay: Duration) -> Result<(), SyncError> {
        if delay.is_zero() {
            return Ok(());
        }
        self.until_cancelled(tokio::time::sleep(delay)).await
    }
}
