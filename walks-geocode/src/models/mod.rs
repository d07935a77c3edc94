//! Data models for walks-geocode
//!
//! - Walk documents as read from the store
//! - Resolution results and failed attempts
//! - Audit events appended to each corrected walk
//! - Store updates and migration run statistics

pub mod audit;
pub mod migration;
pub mod record;
pub mod resolution;
pub mod update;

pub use audit::{AuditEvent, AuditEventType, MIGRATION_ACTOR};
pub use migration::{MigrationRun, MigrationStats};
pub use record::{GridReferenceField, MigrationRecord, StartLocation, MANUALLY_CREATED};
pub use resolution::{Coordinate, MatchType, ResolutionAttempt, ResolutionOutcome, ResolutionResult};
pub use update::RecordUpdate;
