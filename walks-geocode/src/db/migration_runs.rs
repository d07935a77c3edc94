//! Migration run history

use crate::models::{MigrationRun, MigrationStats};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use walks_common::{Error, Result};

/// Insert or update a run row
pub async fn save_run(pool: &SqlitePool, run: &MigrationRun) -> Result<()> {
    let stats = &run.stats;

    sqlx::query(
        r#"
        INSERT INTO migration_runs (
            run_id, started_at, ended_at, dry_run,
            processed, updated, failed_lookups, skipped, cleared
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(run_id) DO UPDATE SET
            ended_at = excluded.ended_at,
            processed = excluded.processed,
            updated = excluded.updated,
            failed_lookups = excluded.failed_lookups,
            skipped = excluded.skipped,
            cleared = excluded.cleared
        "#,
    )
    .bind(run.run_id.to_string())
    .bind(run.started_at.to_rfc3339())
    .bind(run.ended_at.map(|dt| dt.to_rfc3339()))
    .bind(run.dry_run)
    .bind(stats.processed as i64)
    .bind(stats.updated as i64)
    .bind(stats.failed_lookups as i64)
    .bind(stats.skipped as i64)
    .bind(stats.invalid_grid_references_cleared as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent runs first
pub async fn list_runs(pool: &SqlitePool, limit: i64) -> Result<Vec<MigrationRun>> {
    let rows = sqlx::query(
        r#"
        SELECT run_id, started_at, ended_at, dry_run,
               processed, updated, failed_lookups, skipped, cleared
        FROM migration_runs
        ORDER BY started_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let run_id: String = row.get("run_id");
            let started_at: String = row.get("started_at");
            let ended_at: Option<String> = row.get("ended_at");

            Ok(MigrationRun {
                run_id: Uuid::parse_str(&run_id)
                    .map_err(|e| Error::Internal(format!("Invalid run id {}: {}", run_id, e)))?,
                started_at: parse_timestamp(&started_at)?,
                ended_at: ended_at.as_deref().map(parse_timestamp).transpose()?,
                dry_run: row.get("dry_run"),
                stats: MigrationStats {
                    processed: row.get::<i64, _>("processed") as usize,
                    updated: row.get::<i64, _>("updated") as usize,
                    failed_lookups: row.get::<i64, _>("failed_lookups") as usize,
                    skipped: row.get::<i64, _>("skipped") as usize,
                    invalid_grid_references_cleared: row.get::<i64, _>("cleared") as usize,
                },
            })
        })
        .collect()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp {}: {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_save_and_list_runs() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();

        let mut run = MigrationRun::start(false);
        save_run(&pool, &run).await.unwrap();

        run.finish(MigrationStats {
            processed: 4,
            updated: 2,
            failed_lookups: 1,
            skipped: 1,
            invalid_grid_references_cleared: 3,
        });
        save_run(&pool, &run).await.unwrap();

        let runs = list_runs(&pool, 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, run.run_id);
        assert_eq!(runs[0].stats, run.stats);
        assert!(!runs[0].dry_run);
        assert!(runs[0].ended_at.is_some());
    }
}
