//! Offline unit tests for shelfsync-db pool configuration and row types.
//! These tests do not require a live database connection.

use shelfsync_core::{AppConfig, Environment, ProductKey, StoreType};
use shelfsync_db::{DbError, PoolConfig, ProductRow, RunTotals, SyncRunRow};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        retailer_base_url: "https://www.woolworths.co.nz".to_string(),
        regions_path: None,
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        scraper_request_timeout_secs: 30,
        scraper_user_agent: "ua".to_string(),
        scraper_page_size: 120,
        scraper_max_pages: 1000,
        scraper_max_concurrent_regions: 3,
        scraper_max_concurrent_requests: 5,
        scraper_inter_request_delay_ms: 300,
        scraper_max_retries: 3,
        scraper_retry_backoff_base_ms: 1000,
        sync_cron: "0 0 * * * *".to_string(),
        sync_on_startup: true,
    }
}

fn product_row(store_type: i16) -> ProductRow {
    use chrono::Utc;

    ProductRow {
        id: 42_i64,
        public_id: uuid::Uuid::new_v4(),
        sku: "282765".to_string(),
        store_type,
        name: "Anchor Blue Top Milk 2L".to_string(),
        brand: Some("anchor".to_string()),
        image_url: None,
        max_quantity: 20,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn product_row_key_decodes_store_type() {
    let row = product_row(StoreType::Woolworths.as_i16());
    let key = row.key().expect("known store type");
    assert_eq!(key, ProductKey::new("282765", StoreType::Woolworths));
}

#[test]
fn product_row_key_rejects_unknown_store_type() {
    let row = product_row(99);
    let err = row.key().unwrap_err();
    assert!(
        matches!(err, DbError::UnknownStoreType { id: 42, store_type: 99 }),
        "expected UnknownStoreType, got: {err:?}"
    );
}

/// Compile-time smoke test: confirm that [`SyncRunRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn sync_run_row_has_expected_fields() {
    use chrono::Utc;
    use uuid::Uuid;

    let row = SyncRunRow {
        id: 1_i64,
        public_id: Uuid::new_v4(),
        trigger_source: "scheduler".to_string(),
        status: "queued".to_string(),
        started_at: None,
        completed_at: None,
        regions_total: 0,
        regions_failed: 0,
        products_inserted: 0,
        products_updated: 0,
        error_message: None,
        created_at: Utc::now(),
    };

    assert_eq!(row.trigger_source, "scheduler");
    assert_eq!(row.status, "queued");
    assert!(row.started_at.is_none());
    assert!(row.error_message.is_none());
}

#[test]
fn run_totals_default_to_zero() {
    let totals = RunTotals::default();
    assert_eq!(totals.regions_total, 0);
    assert_eq!(totals.products_inserted, 0);
}
