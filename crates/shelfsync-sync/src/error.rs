use shelfsync_core::ConfigError;
use shelfsync_db::DbError;
use shelfsync_scraper::{ScraperError, SessionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The region list could not be obtained; the run cannot start.
    #[error("failed to enumerate regions: {0}")]
    RegionDiscovery(#[source] ScraperError),

    #[error("failed to list categories: {0}")]
    CategoryDiscovery(#[source] ScraperError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Fetch(#[from] ScraperError),

    #[error("catalog store error: {0}")]
    Store(#[from] DbError),

    #[error("sync cancelled")]
    Cancelled,
}
