//! Migration run statistics and history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counters for one migration run
///
/// Display: "N processed, N updated, N failed lookups, N skipped, N invalid grid references cleared"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStats {
    /// Selected walks that were examined
    pub processed: usize,
    /// Walks that received a postcode
    pub updated: usize,
    /// Walks where every stage was exhausted
    pub failed_lookups: usize,
    /// Walks left with no coordinate, grid reference or text once invalid grid
    /// references were cleared, or whose document could not be read
    pub skipped: usize,
    /// Grid reference fields removed because they did not parse
    pub invalid_grid_references_cleared: usize,
}

impl MigrationStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} processed, {} updated, {} failed lookups, {} skipped, {} invalid grid references cleared",
            self.processed,
            self.updated,
            self.failed_lookups,
            self.skipped,
            self.invalid_grid_references_cleared
        )
    }
}

/// Persisted history row for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRun {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub stats: MigrationStats,
}

impl MigrationRun {
    pub fn start(dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: walks_common::time::now(),
            ended_at: None,
            dry_run,
            stats: MigrationStats::default(),
        }
    }

    pub fn finish(&mut self, stats: MigrationStats) {
        self.stats = stats;
        self.ended_at = Some(walks_common::time::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_string() {
        let stats = MigrationStats {
            processed: 12,
            updated: 9,
            failed_lookups: 2,
            skipped: 1,
            invalid_grid_references_cleared: 3,
        };
        assert_eq!(
            stats.display_string(),
            "12 processed, 9 updated, 2 failed lookups, 1 skipped, 3 invalid grid references cleared"
        );
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = MigrationRun::start(true);
        assert!(run.ended_at.is_none());
        run.finish(MigrationStats { processed: 1, ..Default::default() });
        assert!(run.ended_at.unwrap() >= run.started_at);
        assert_eq!(run.stats.processed, 1);
    }
}
