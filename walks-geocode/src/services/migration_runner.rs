//! Location backfill batch
//!
//! Processes selected walks strictly one at a time. Each walk gets at most
//! two writes: the removal of grid reference fields that do not parse, and
//! one combined update holding the field corrections plus exactly one audit
//! event. Only store errors stop the run; lookup failures are recorded on
//! the walk and counted.
//!
//! Resolved walks gain a postcode and stop matching the selection, so an
//! interrupted run is resumed by simply running again. At most one runner
//! may work on a database at a time; nothing here locks.

use crate::db::{group_events, migration_runs};
use crate::models::{MigrationRecord, MigrationRun, MigrationStats, RecordUpdate, ResolutionOutcome};
use crate::services::audit_trail::{build_failure_event, build_success_event, field_updates_for, is_repeat_failure};
use crate::services::grid_reference::GridReferenceCodec;
use crate::services::resolution_orchestrator::ResolutionOrchestrator;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, info, instrument, warn};
use walks_common::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Resolve and report without writing to walk documents
    pub dry_run: bool,
    /// Process at most this many selected walks
    pub limit: Option<usize>,
}

pub struct MigrationRunner {
    pool: SqlitePool,
    orchestrator: ResolutionOrchestrator,
    options: MigrationOptions,
}

/// Unset every stored grid reference that does not parse
pub fn invalid_grid_reference_update(record: &MigrationRecord, codec: &GridReferenceCodec) -> (RecordUpdate, usize) {
    let mut update = RecordUpdate::new();
    let mut cleared = 0;
    for (field, raw) in record.grid_references() {
        if let Err(e) = codec.parse(raw) {
            debug!(field = field.path(), value = %raw, error = %e, "Clearing invalid grid reference");
            update = update.unset(field.path());
            cleared += 1;
        }
    }
    (update, cleared)
}

impl MigrationRunner {
    pub fn new(pool: SqlitePool, orchestrator: ResolutionOrchestrator, options: MigrationOptions) -> Self {
        Self {
            pool,
            orchestrator,
            options,
        }
    }

    /// Run the backfill over every selected walk
    pub async fn run(&self) -> Result<MigrationRun> {
        let mut run = MigrationRun::start(self.options.dry_run);
        migration_runs::save_run(&self.pool, &run).await?;

        let stats = self.execute(&run).await?;

        run.finish(stats);
        migration_runs::save_run(&self.pool, &run).await?;

        info!(
            run_id = %run.run_id,
            dry_run = run.dry_run,
            "Location backfill complete: {}",
            run.stats.display_string()
        );
        Ok(run)
    }

    #[instrument(name = "migration_run", skip_all, fields(run_id = %run.run_id, dry_run = run.dry_run))]
    async fn execute(&self, run: &MigrationRun) -> Result<MigrationStats> {
        let mut stats = MigrationStats::default();

        let rows = group_events::find_location_candidates(&self.pool).await?;
        info!(candidates = rows.len(), limit = ?self.options.limit, "Selected walks without a postcode");

        for row in rows {
            if self.options.limit.is_some_and(|limit| stats.processed >= limit) {
                info!("Limit reached, stopping");
                break;
            }

            let document: Value = match row.parse() {
                Ok(document) => document,
                Err(e) => {
                    warn!(id = %row.id, error = %e, "Skipping unreadable walk document");
                    stats.skipped += 1;
                    continue;
                }
            };
            let record = match MigrationRecord::from_document(&row.id, &document) {
                Ok(record) => record,
                Err(e) => {
                    warn!(id = %row.id, error = %e, "Skipping walk with unexpected document shape");
                    stats.skipped += 1;
                    continue;
                }
            };
            if !record.needs_location_backfill() {
                continue;
            }

            stats.processed += 1;
            self.process_record(record, document, &mut stats).await?;
        }

        Ok(stats)
    }

    #[instrument(name = "walk", skip_all, fields(id = %record.id))]
    async fn process_record(&self, mut record: MigrationRecord, mut document: Value, stats: &mut MigrationStats) -> Result<()> {
        let (clear, cleared) = invalid_grid_reference_update(&record, self.orchestrator.codec());
        if cleared > 0 {
            stats.invalid_grid_references_cleared += cleared;
            self.write(&record.id, &clear).await?;
            clear
                .apply_to(&mut document)
                .map_err(|e| Error::Internal(format!("Failed to clear grid references: {}", e)))?;
            record = MigrationRecord::from_document(&record.id, &document)
                .map_err(|e| Error::Internal(format!("Failed to re-read walk {}: {}", record.id, e)))?;
        }

        if record.coordinate().is_none() && record.grid_references().is_empty() && !record.has_text() {
            info!("No usable location signal, skipping");
            stats.skipped += 1;
            return Ok(());
        }

        let now = walks_common::time::now();
        match self.orchestrator.resolve(&record).await {
            ResolutionOutcome::Resolved(result) => {
                let fields = field_updates_for(&record, &result);
                let event = build_success_event(&document, &result, &fields, now)
                    .map_err(|e| Error::Internal(format!("Failed to build audit event: {}", e)))?;
                self.write(&record.id, &fields.with_event(event)).await?;
                stats.updated += 1;
                info!(
                    postcode = %result.postcode,
                    match_type = ?result.match_type,
                    "Start location postcode resolved"
                );
            }
            ResolutionOutcome::Failed { attempts } => {
                stats.failed_lookups += 1;
                let event = build_failure_event(&document, &attempts, now);
                if is_repeat_failure(&record, &event) {
                    debug!("Failure already recorded on this walk");
                } else {
                    self.write(&record.id, &RecordUpdate::new().with_event(event)).await?;
                }
                info!(attempts = attempts.len(), "No postcode found");
            }
        }

        Ok(())
    }

    async fn write(&self, id: &str, update: &RecordUpdate) -> Result<()> {
        if self.options.dry_run {
            debug!(set = update.set.len(), unset = update.unset.len(), "Dry run, not writing update");
            return Ok(());
        }
        group_events::apply_update(&self.pool, id, update).await
    }
}
