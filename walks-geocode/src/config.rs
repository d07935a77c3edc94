//! Area settings resolution for walks-geocode
//!
//! Provides multi-tier resolution with Database → ENV → TOML priority for
//! the preferred county and the area center. Missing settings are not an
//! error: without a county place search disambiguation skips the county
//! step, and without a center the plausibility check is a no-op.

use crate::db::settings;
use crate::models::Coordinate;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use walks_common::config::TomlConfig;
use walks_common::Result;

pub const AREA_COUNTY_ENV_VAR: &str = "WALKS_AREA_COUNTY";
pub const AREA_CENTER_ENV_VAR: &str = "WALKS_AREA_CENTER";

/// Resolved area settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct AreaSettings {
    pub preferred_county: Option<String>,
    pub center: Option<Coordinate>,
    pub threshold_miles: f64,
    pub unreliable_grid_prefixes: Vec<String>,
}

/// Resolve area settings from database, environment and TOML
pub async fn resolve_area_settings(db: &Pool<Sqlite>, toml_config: &TomlConfig) -> Result<AreaSettings> {
    let env_county = std::env::var(AREA_COUNTY_ENV_VAR).ok();
    let preferred_county = resolve_tier(
        "Preferred county",
        settings::get_area_preferred_county(db).await?,
        env_county.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
        toml_config
            .area
            .preferred_county
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
    );

    let env_center = match std::env::var(AREA_CENTER_ENV_VAR) {
        Ok(value) => match settings::parse_center(&value) {
            Ok(center) => Some(center),
            Err(e) => {
                warn!("Ignoring {}: {}", AREA_CENTER_ENV_VAR, e);
                None
            }
        },
        Err(_) => None,
    };
    let toml_center = toml_config
        .area
        .center
        .map(|[lat, lng]| Coordinate::new(lat, lng))
        .filter(Coordinate::is_plausible);
    let center = resolve_tier("Area center", settings::get_area_center(db).await?, env_center, toml_center);

    if center.is_none() {
        warn!("No area center configured; plausibility checks are disabled");
    }

    Ok(AreaSettings {
        preferred_county,
        center,
        threshold_miles: toml_config.area.plausibility_threshold_miles,
        unreliable_grid_prefixes: toml_config.area.unreliable_grid_prefixes.clone(),
    })
}

/// Pick the highest priority value, warning when several sources set it
fn resolve_tier<T>(name: &str, database: Option<T>, environment: Option<T>, toml: Option<T>) -> Option<T> {
    let sources: Vec<&str> = [
        ("database", database.is_some()),
        ("environment", environment.is_some()),
        ("TOML", toml.is_some()),
    ]
    .iter()
    .filter(|(_, present)| *present)
    .map(|(source, _)| *source)
    .collect();

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }
    if let Some(source) = sources.first() {
        info!("{} loaded from {}", name, source);
    }

    database.or(environment).or(toml)
}
