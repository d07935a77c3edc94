//! Walk document storage
//!
//! Documents are opaque JSON to the store. Updates are applied by reading
//! the document, applying the `RecordUpdate` in memory, and writing it back
//! inside one transaction, so field corrections and the audit event land
//! together or not at all.

use crate::models::RecordUpdate;
use serde_json::Value;
use sqlx::SqlitePool;
use walks_common::{Error, Result};

/// Raw row; the document may not be valid JSON
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub document: String,
}

impl StoredDocument {
    pub fn parse(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.document)
    }
}

/// Insert or replace a walk document
pub async fn insert_document(pool: &SqlitePool, id: &str, document: &Value) -> Result<()> {
    let text = serde_json::to_string(document)
        .map_err(|e| Error::Internal(format!("Failed to serialize document: {}", e)))?;

    sqlx::query(
        "INSERT INTO group_events (id, document) VALUES (?, ?)
         ON CONFLICT(id) DO UPDATE SET document = excluded.document",
    )
    .bind(id)
    .bind(text)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_document(pool: &SqlitePool, id: &str) -> Result<Option<Value>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT document FROM group_events WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|(text,)| {
        serde_json::from_str(&text).map_err(|e| Error::Internal(format!("Stored document {} is not JSON: {}", id, e)))
    })
    .transpose()
}

/// Walks without a postcode that were not typed in by hand
///
/// A coarse prefilter; the caller applies the full selection criterion.
/// Rows whose document is not valid JSON are returned too so they can be
/// counted as skipped.
pub async fn find_location_candidates(pool: &SqlitePool) -> Result<Vec<StoredDocument>> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        r#"
        SELECT id, document FROM group_events
        WHERE CASE WHEN json_valid(document) THEN
            COALESCE(TRIM(json_extract(document, '$.groupEvent.start_location.postcode')), '') = ''
            AND COALESCE(json_extract(document, '$.fields.inputSource'), '') <> 'manually-created'
        ELSE 1 END
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, document)| StoredDocument { id, document })
        .collect())
}

/// Apply one update atomically
pub async fn apply_update(pool: &SqlitePool, id: &str, update: &RecordUpdate) -> Result<()> {
    let mut tx = pool.begin().await?;

    let row: Option<(String,)> = sqlx::query_as("SELECT document FROM group_events WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    let (text,) = row.ok_or_else(|| Error::NotFound(format!("group event {}", id)))?;

    let mut document: Value = serde_json::from_str(&text)
        .map_err(|e| Error::Internal(format!("Stored document {} is not JSON: {}", id, e)))?;
    update
        .apply_to(&mut document)
        .map_err(|e| Error::Internal(format!("Failed to apply update to {}: {}", id, e)))?;
    let text = serde_json::to_string(&document)
        .map_err(|e| Error::Internal(format!("Failed to serialize document: {}", e)))?;

    sqlx::query("UPDATE group_events SET document = ? WHERE id = ?")
        .bind(text)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::paths;
    use crate::models::update::get_path;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_candidate_prefilter() {
        let pool = setup_test_db().await;
        insert_document(&pool, "a", &json!({"groupEvent": {"start_location": {"latitude": 51.28}}}))
            .await
            .unwrap();
        insert_document(&pool, "b", &json!({"groupEvent": {"start_location": {"postcode": "CT1 2EH"}}}))
            .await
            .unwrap();
        insert_document(&pool, "c", &json!({"groupEvent": {"start_location": {"postcode": "  "}}}))
            .await
            .unwrap();
        insert_document(&pool, "d", &json!({"fields": {"inputSource": "manually-created"}}))
            .await
            .unwrap();
        sqlx::query("INSERT INTO group_events (id, document) VALUES ('e', '{not json')")
            .execute(&pool)
            .await
            .unwrap();

        let ids: Vec<String> = find_location_candidates(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.id)
            .collect();
        assert_eq!(ids, vec!["a", "c", "e"]);
    }

    #[tokio::test]
    async fn test_apply_update_sets_and_pushes() {
        let pool = setup_test_db().await;
        insert_document(
            &pool,
            "walk-1",
            &json!({"groupEvent": {"title": "Wye", "start_location": {"grid_reference_6": "XX"}}, "other": 1}),
        )
        .await
        .unwrap();

        let update = RecordUpdate::new()
            .set(paths::POSTCODE, "TN25 5AR")
            .unset(paths::GRID_REFERENCE_6);
        apply_update(&pool, "walk-1", &update).await.unwrap();

        let doc = load_document(&pool, "walk-1").await.unwrap().unwrap();
        assert_eq!(get_path(&doc, paths::POSTCODE), Some(&json!("TN25 5AR")));
        assert_eq!(get_path(&doc, paths::GRID_REFERENCE_6), None);
        assert_eq!(doc["other"], json!(1));
    }

    #[tokio::test]
    async fn test_apply_update_missing_document() {
        let pool = setup_test_db().await;
        let result = apply_update(&pool, "nope", &RecordUpdate::new().set(paths::POSTCODE, "CT1 2EH")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(load_document(&pool, "nope").await.unwrap().is_none());
    }
}
