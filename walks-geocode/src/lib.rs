//! walks-geocode library interface
//!
//! Exposes the location backfill pipeline for the binary and for
//! integration tests.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{LocationError, LookupError};
