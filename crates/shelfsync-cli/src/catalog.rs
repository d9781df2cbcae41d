//! Read-only retailer queries: regions, departments and live search.

use shelfsync_core::{AppConfig, RegionId};
use shelfsync_scraper::RetailerClient;
use shelfsync_sync::{PgCatalogStore, RegionalProduct, SyncEngine, SyncLimits};

pub(crate) async fn run_regions(config: &AppConfig) -> anyhow::Result<()> {
    let client = RetailerClient::from_app_config(config)?;
    let regions = client.list_regions().await?;

    if regions.is_empty() {
        println!("the retailer returned no regions");
        return Ok(());
    }

    println!("{:<10}NAME", "ID");
    for region in &regions {
        println!("{:<10}{}", region.id.0, region.name);
    }
    println!("{} region(s)", regions.len());
    Ok(())
}

pub(crate) async fn run_categories(config: &AppConfig) -> anyhow::Result<()> {
    let client = RetailerClient::from_app_config(config)?;
    let categories = client.list_categories().await?;

    println!("{:<8}{:<30}SLUG", "ID", "LABEL");
    for category in &categories {
        println!("{:<8}{:<30}{}", category.id, category.label, category.slug);
    }
    Ok(())
}

/// Searches each region with its own session. Nothing is written.
pub(crate) async fn run_search(
    config: &AppConfig,
    term: &str,
    regions: &[i64],
) -> anyhow::Result<()> {
    let pool = crate::connect(config).await?;
    let engine = SyncEngine::new(
        RetailerClient::from_app_config(config)?,
        PgCatalogStore::new(pool),
        SyncLimits::from_app_config(config),
    );

    let region_ids: Vec<RegionId> = regions.iter().copied().map(RegionId).collect();
    let results = engine
        .search_by_term(term, &region_ids, crate::cancel_on_ctrl_c())
        .await?;

    if results.is_empty() {
        println!("no sellable products matched '{term}'");
        return Ok(());
    }

    print_results(&results);
    Ok(())
}

fn print_results(results: &[RegionalProduct]) {
    println!("{:<8}{:<12}{:>10}  NAME", "REGION", "SKU", "PRICE");
    for item in results {
        println!(
            "{:<8}{:<12}{:>10}  {}",
            item.region_id.0,
            item.product.sku,
            item.product.price.to_string(),
            item.product.name
        );
    }
    println!("{} result(s)", results.len());
}
