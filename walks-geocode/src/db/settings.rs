//! Settings database operations
//!
//! Key-value accessors for the area settings the migration reads at start.

use crate::models::Coordinate;
use sqlx::{Pool, Sqlite};
use walks_common::{Error, Result};

const AREA_PREFERRED_COUNTY: &str = "area_preferred_county";
const AREA_CENTER: &str = "area_center";

/// County used to disambiguate place searches
pub async fn get_area_preferred_county(db: &Pool<Sqlite>) -> Result<Option<String>> {
    Ok(get_setting::<String>(db, AREA_PREFERRED_COUNTY)
        .await?
        .map(|county| county.trim().to_string())
        .filter(|county| !county.is_empty()))
}

pub async fn set_area_preferred_county(db: &Pool<Sqlite>, county: &str) -> Result<()> {
    set_setting(db, AREA_PREFERRED_COUNTY, county).await
}

/// Area center stored as `[lat,lng]`
pub async fn get_area_center(db: &Pool<Sqlite>) -> Result<Option<Coordinate>> {
    match get_setting::<String>(db, AREA_CENTER).await? {
        Some(value) => parse_center(&value).map(Some),
        None => Ok(None),
    }
}

pub async fn set_area_center(db: &Pool<Sqlite>, center: Coordinate) -> Result<()> {
    set_setting(db, AREA_CENTER, format!("[{},{}]", center.lat, center.lng)).await
}

/// Parse `[lat,lng]` (also accepts bare `lat,lng`)
pub fn parse_center(value: &str) -> Result<Coordinate> {
    let trimmed = value.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    let parts: Vec<f64> = inner
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::InvalidInput(format!("Invalid area center {:?}: {}", value, e)))?;

    match parts.as_slice() {
        [lat, lng] => {
            let center = Coordinate::new(*lat, *lng);
            if center.is_plausible() {
                Ok(center)
            } else {
                Err(Error::InvalidInput(format!("Area center {:?} is out of range", value)))
            }
        }
        _ => Err(Error::InvalidInput(format!("Area center {:?} must be [lat,lng]", value))),
    }
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

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
    async fn test_area_settings_absent() {
        let pool = setup_test_db().await;
        assert_eq!(get_area_preferred_county(&pool).await.unwrap(), None);
        assert_eq!(get_area_center(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_area_settings_round_trip() {
        let pool = setup_test_db().await;
        set_area_preferred_county(&pool, "Kent").await.unwrap();
        set_area_center(&pool, Coordinate::new(51.2798, 1.0828)).await.unwrap();

        assert_eq!(get_area_preferred_county(&pool).await.unwrap().as_deref(), Some("Kent"));
        assert_eq!(get_area_center(&pool).await.unwrap(), Some(Coordinate::new(51.2798, 1.0828)));

        // Update in place
        set_area_preferred_county(&pool, "East Sussex").await.unwrap();
        assert_eq!(get_area_preferred_county(&pool).await.unwrap().as_deref(), Some("East Sussex"));
    }

    #[tokio::test]
    async fn test_blank_county_is_absent() {
        let pool = setup_test_db().await;
        set_area_preferred_county(&pool, "  ").await.unwrap();
        assert_eq!(get_area_preferred_county(&pool).await.unwrap(), None);
    }

    #[test]
    fn test_parse_center() {
        assert_eq!(parse_center("[51.2798, 1.0828]").unwrap(), Coordinate::new(51.2798, 1.0828));
        assert_eq!(parse_center("51.5,-0.12").unwrap(), Coordinate::new(51.5, -0.12));
        assert!(matches!(parse_center("[51.5]"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_center("[0,0]"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_center("north"), Err(Error::InvalidInput(_))));
    }
}
