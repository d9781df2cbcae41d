use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub retailer_base_url: String,
    /// Optional YAML allowlist restricting which regions are synced.
    pub regions_path: Option<PathBuf>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_page_size: u32,
    /// Safety ceiling on listing pages per category. Guards against a server
    /// that never returns an empty page; not a property of the catalog.
    pub scraper_max_pages: u32,
    pub scraper_max_concurrent_regions: usize,
    pub scraper_max_concurrent_requests: usize,
    pub scraper_inter_request_delay_ms: u64,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_ms: u64,
    pub sync_cron: String,
    pub sync_on_startup: bool,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("retailer_base_url", &self.retailer_base_url)
            .field("regions_path", &self.regions_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field("scraper_page_size", &self.scraper_page_size)
            .field("scraper_max_pages", &self.scraper_max_pages)
            .field(
                "scraper_max_concurrent_regions",
                &self.scraper_max_concurrent_regions,
            )
            .field(
                "scraper_max_concurrent_requests",
                &self.scraper_max_concurrent_requests,
            )
            .field(
                "scraper_inter_request_delay_ms",
                &self.scraper_inter_request_delay_ms,
            )
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_ms",
                &self.scraper_retry_backoff_base_ms,
            )
            .field("sync_cron", &self.sync_cron)
            .field("sync_on_startup", &self.sync_on_startup)
            .finish()
    }
}
