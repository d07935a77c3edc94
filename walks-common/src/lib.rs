//! # Walks Common Library
//!
//! Shared code for the walks tooling:
//! - Error and result types
//! - Bootstrap configuration loading
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
