//! Sync command handlers.
//!
//! Region failures are printed in the summary rather than returned; the
//! command only errors when the run as a whole could not happen.

use shelfsync_core::{AppConfig, RegionId};
use shelfsync_scraper::RetailerClient;
use shelfsync_sync::{
    CatalogStore, DryRunStore, PgCatalogStore, RunLedger, RunSummary, SyncEngine, SyncLimits,
    SyncOptions,
};

/// Runs one sync from the command line.
///
/// With `dry_run` the catalog is fetched and reconciled against the stored
/// rows, but nothing is written and no run is recorded.
///
/// # Errors
///
/// Returns an error if the regions file cannot be loaded, the retailer
/// client cannot be built, or the run cannot start.
pub(crate) async fn run_sync(
    config: &AppConfig,
    pool: sqlx::PgPool,
    regions: &[i64],
    dry_run: bool,
) -> anyhow::Result<()> {
    let allowlist = config
        .regions_path
        .as_deref()
        .map(shelfsync_core::load_region_allowlist)
        .transpose()?;

    let mut options = SyncOptions::new("cli").with_allowlist(allowlist);
    if !regions.is_empty() {
        options = options.with_regions(regions.iter().copied().map(RegionId).collect());
    }

    let client = RetailerClient::from_app_config(config)?;
    let limits = SyncLimits::from_app_config(config);
    let store = PgCatalogStore::new(pool);

    let summary = if dry_run {
        println!("dry run: nothing will be written");
        execute(SyncEngine::new(client, DryRunStore::new(store), limits), &options).await?
    } else {
        execute(SyncEngine::new(client, store, limits), &options).await?
    };

    print_summary(&summary, dry_run);
    Ok(())
}

async fn execute<S>(
    engine: SyncEngine<shelfsync_scraper::HttpTransport, S>,
    options: &SyncOptions,
) -> anyhow::Result<RunSummary>
where
    S: CatalogStore + RunLedger,
{
    let summary = engine
        .sync_all_regions(options, crate::cancel_on_ctrl_c())
        .await?;
    Ok(summary)
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    println!(
        "{:<10}{:<24}{:<11}{:>8}{:>10}{:>10}  ERROR",
        "REGION", "NAME", "STATUS", "ITEMS", "INSERTED", "UPDATED"
    );
    for report in &summary.regions {
        let counts = report.outcome.counts();
        println!(
            "{:<10}{:<24}{:<11}{:>8}{:>10}{:>10}  {}",
            report.region.id.0,
            report.region.name,
            report.outcome.status(),
            counts.items_fetched,
            counts.inserted,
            counts.updated,
            report.outcome.error_message().unwrap_or_default()
        );
    }

    let label = if dry_run { "would insert" } else { "inserted" };
    println!(
        "{} region(s) synced, {} failed; {label} {}, updated {}{}",
        summary.regions_synced(),
        summary.regions_failed(),
        summary.products_inserted(),
        summary.products_updated(),
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    if let Some(id) = summary.sync_run_id {
        println!("recorded as sync run {id}");
    }
}

/// Show recent sync runs, newest first.
pub(crate) async fn run_list_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = shelfsync_db::list_sync_runs(pool, limit.clamp(1, 200)).await?;

    if runs.is_empty() {
        println!("no sync runs recorded; run `sync` first");
        return Ok(());
    }

    println!(
        "{:<8}{:<12}{:<11}{:<18}{:>8}{:>8}{:>10}{:>10}",
        "ID", "TRIGGER", "STATUS", "STARTED", "REGIONS", "FAILED", "INSERTED", "UPDATED"
    );
    for run in &runs {
        let started = run
            .started_at
            .map_or_else(|| "-".to_owned(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{:<8}{:<12}{:<11}{:<18}{:>8}{:>8}{:>10}{:>10}",
            run.id,
            run.trigger_source,
            run.status,
            started,
            run.regions_total,
            run.regions_failed,
            run.products_inserted,
            run.products_updated
        );
    }
    Ok(())
}
