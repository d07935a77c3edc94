//! Test Helper Utilities
//!
//! Shared utilities for testing walks-geocode

#![allow(dead_code)]

pub mod db_utils;
pub mod fakes;

pub use db_utils::{create_test_db, seed_walk};
pub use fakes::{place, place_with_postcode, postcode_result, FakeCoordinateLookup, FakePlaceSearch};

use walks_geocode::models::Coordinate;

pub const CANTERBURY: Coordinate = Coordinate { lat: 51.2798, lng: 1.0828 };
pub const DOVER: Coordinate = Coordinate { lat: 51.1279, lng: 1.3134 };
