//! Area settings priority: database, then environment, then TOML

mod helpers;

use helpers::{create_test_db, CANTERBURY};
use serial_test::serial;
use std::env;
use walks_common::config::parse_toml_config;
use walks_geocode::config::{resolve_area_settings, AREA_CENTER_ENV_VAR, AREA_COUNTY_ENV_VAR};
use walks_geocode::db::settings;
use walks_geocode::models::Coordinate;

const TOML: &str = r#"
[area]
preferred_county = "East Sussex"
center = [50.8225, -0.1372]
plausibility_threshold_miles = 30.0
unreliable_grid_prefixes = ["SV", "HP"]
"#;

fn clear_env() {
    env::remove_var(AREA_COUNTY_ENV_VAR);
    env::remove_var(AREA_CENTER_ENV_VAR);
}

#[tokio::test]
#[serial]
async fn test_toml_only() {
    clear_env();
    let (_dir, pool) = create_test_db().await.unwrap();
    let config = parse_toml_config(TOML).unwrap();

    let area = resolve_area_settings(&pool, &config).await.unwrap();

    assert_eq!(area.preferred_county.as_deref(), Some("East Sussex"));
    assert_eq!(area.center, Some(Coordinate::new(50.8225, -0.1372)));
    assert_eq!(area.threshold_miles, 30.0);
    assert_eq!(area.unreliable_grid_prefixes, vec!["SV", "HP"]);
}

#[tokio::test]
#[serial]
async fn test_environment_overrides_toml() {
    clear_env();
    env::set_var(AREA_COUNTY_ENV_VAR, "Kent");
    env::set_var(AREA_CENTER_ENV_VAR, "[51.2798,1.0828]");
    let (_dir, pool) = create_test_db().await.unwrap();
    let config = parse_toml_config(TOML).unwrap();

    let area = resolve_area_settings(&pool, &config).await.unwrap();
    clear_env();

    assert_eq!(area.preferred_county.as_deref(), Some("Kent"));
    assert_eq!(area.center, Some(CANTERBURY));
}

#[tokio::test]
#[serial]
async fn test_database_overrides_environment() {
    clear_env();
    env::set_var(AREA_COUNTY_ENV_VAR, "Kent");
    let (_dir, pool) = create_test_db().await.unwrap();
    settings::set_area_preferred_county(&pool, "Surrey").await.unwrap();
    settings::set_area_center(&pool, Coordinate::new(51.25, -0.45)).await.unwrap();
    let config = parse_toml_config(TOML).unwrap();

    let area = resolve_area_settings(&pool, &config).await.unwrap();
    clear_env();

    assert_eq!(area.preferred_county.as_deref(), Some("Surrey"));
    assert_eq!(area.center, Some(Coordinate::new(51.25, -0.45)));
}

#[tokio::test]
#[serial]
async fn test_invalid_environment_center_is_ignored() {
    clear_env();
    env::set_var(AREA_CENTER_ENV_VAR, "somewhere in Kent");
    let (_dir, pool) = create_test_db().await.unwrap();
    let config = parse_toml_config(TOML).unwrap();

    let area = resolve_area_settings(&pool, &config).await.unwrap();
    clear_env();

    assert_eq!(area.center, Some(Coordinate::new(50.8225, -0.1372)));
}

#[tokio::test]
#[serial]
async fn test_nothing_configured() {
    clear_env();
    let (_dir, pool) = create_test_db().await.unwrap();
    let config = parse_toml_config("").unwrap();

    let area = resolve_area_settings(&pool, &config).await.unwrap();

    assert_eq!(area.preferred_county, None);
    assert_eq!(area.center, None);
    assert_eq!(area.threshold_miles, 50.0);
    assert_eq!(area.unreliable_grid_prefixes, vec!["SV"]);
}
