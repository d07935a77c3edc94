//! Database Test Utilities

use anyhow::Result;
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// Create temporary test database with tables initialized
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_walks.db");

    let pool = walks_geocode::db::init_database_pool(&db_path).await?;

    Ok((temp_dir, pool))
}

pub async fn seed_walk(pool: &SqlitePool, id: &str, document: Value) {
    walks_geocode::db::group_events::insert_document(pool, id, &document)
        .await
        .unwrap();
}
