use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files — useful for testing
/// or when the caller manages env setup.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_limit = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        let value = raw
            .parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(value)
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected a boolean, got \"{other}\""),
            }),
        }
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("SHELFSYNC_ENV", "development"))?;

    let bind_addr = parse_addr("SHELFSYNC_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("SHELFSYNC_LOG_LEVEL", "info");
    let retailer_base_url = or_default(
        "SHELFSYNC_RETAILER_BASE_URL",
        "https://www.woolworths.co.nz",
    )
    .trim_end_matches('/')
    .to_string();
    let regions_path = lookup("SHELFSYNC_REGIONS_PATH").ok().map(PathBuf::from);

    let db_max_connections = parse_u32("SHELFSYNC_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SHELFSYNC_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SHELFSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs = parse_u64("SHELFSYNC_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default("SHELFSYNC_SCRAPER_USER_AGENT", "api-client/1.0");
    let scraper_page_size = parse_u32("SHELFSYNC_SCRAPER_PAGE_SIZE", "120")?;
    let scraper_max_pages = parse_u32("SHELFSYNC_SCRAPER_MAX_PAGES", "1000")?;
    let scraper_max_concurrent_regions = parse_limit("SHELFSYNC_SCRAPER_MAX_CONCURRENT_REGIONS", "3")?;
    let scraper_max_concurrent_requests =
        parse_limit("SHELFSYNC_SCRAPER_MAX_CONCURRENT_REQUESTS", "5")?;
    let scraper_inter_request_delay_ms = parse_u64("SHELFSYNC_SCRAPER_INTER_REQUEST_DELAY_MS", "300")?;
    let scraper_max_retries = parse_u32("SHELFSYNC_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_ms = parse_u64("SHELFSYNC_SCRAPER_RETRY_BACKOFF_BASE_MS", "1000")?;

    let sync_cron = or_default("SHELFSYNC_SYNC_CRON", "0 0 * * * *");
    let sync_on_startup = parse_bool("SHELFSYNC_SYNC_ON_STARTUP", "true")?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        retailer_base_url,
        regions_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_page_size,
        scraper_max_pages,
        scraper_max_concurrent_regions,
        scraper_max_concurrent_requests,
        scraper_inter_request_delay_ms,
        scraper_max_retries,
        scraper_retry_backoff_base_ms,
        sync_cron,
        sync_on_startup,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "SHELFSYNC_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
