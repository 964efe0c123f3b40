//! The `fixip` run: audit and repair subnet assignments of all IP addresses.

use super::catalog::build_catalog;
use super::collector::ObjectWindows;
use super::dispatch::Dispatcher;
use super::engine::Reconciler;
use crate::cmdb::CmdbApi;
use crate::config::ReconciliationConfig;
use crate::error::Result;
use crate::models::RunStatistics;

/// Reconcile every IP address in the CMDB.
///
/// The subnet catalog is built once, then object windows are fetched,
/// reconciled and dispatched one after the other. Dry-run and real runs
/// share every step except the final write, so `broken` and `lost` are the
/// same for both; a dry run always reports `fixed == 0`.
///
/// # Errors
/// Any [`crate::error::Error`] aborts the run: inconsistent subnet or IP
/// reads, transport and API failures.
pub fn reconcile<A: CmdbApi>(api: &A, config: &ReconciliationConfig) -> Result<RunStatistics> {
    log::info!(
        "#Start reconcile() dry_run={} limit={} batch_limit={}",
        config.dry_run,
        config.limit,
        config.batch_limit
    );

    let catalog = build_catalog(api, config)?;
    let reconciler = Reconciler::new(&catalog);
    let dispatcher = Dispatcher::new(api, config.dry_run, config.batch_limit);
    let mut stats = RunStatistics::default();
    let mut objects = 0;
    let mut requests = 0;

    let mut windows = ObjectWindows::new(api, config)?;
    for window in windows.by_ref() {
        let window = window?;
        objects += window.len();
        let report = reconciler.reconcile_window(&window, &mut stats);
        let warnings = report.warnings().count();
        if warnings > 0 {
            log::info!(
                "{warnings} data-quality warning(s) among {} objects",
                window.len()
            );
        }
        requests += dispatcher.dispatch(&report.updates, &mut stats)?;
        log::debug!("after window: {stats}");
    }

    log::info!(
        "#End reconcile() windows={} objects={objects} write_requests={requests} {stats}",
        windows.windows_read()
    );
    Ok(stats)
}
