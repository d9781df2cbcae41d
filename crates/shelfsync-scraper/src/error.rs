use shelfsync_core::RegionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {url} (retry after {retry_after_secs}s)")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("pagination limit reached for {context}: exceeded {max_pages} pages")]
    PaginationLimit { context: String, max_pages: u32 },

    #[error("invalid retailer URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Failure to obtain a region-bound session. Always scoped to one region;
/// callers skip that region and carry on.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("region {region_id}: select-region response did not set the {cookie} cookie")]
    MissingToken {
        region_id: RegionId,
        cookie: &'static str,
    },

    #[error("region {region_id}: select-region call failed: {source}")]
    Transport {
        region_id: RegionId,
        #[source]
        source: ScraperError,
    },
}

impl SessionError {
    #[must_use]
    pub fn region_id(&self) -> RegionId {
        match self {
            SessionError::MissingToken { region_id, .. }
            | SessionError::Transport { region_id, .. } => *region_id,
        }
    }
}
