//! Location resolution services
//!
//! Pure building blocks (grid codec, distance, text extraction, audit
//! events), the two HTTP lookup clients behind traits, and the orchestrator
//! and batch runner that drive them.

pub mod audit_trail;
pub mod coordinate_lookup;
pub mod distance;
pub mod grid_reference;
pub mod migration_runner;
pub mod place_resolver;
pub mod rate_limiter;
pub mod resolution_orchestrator;
pub mod text_extractor;

pub use coordinate_lookup::{AddressResponse, CoordinateLookup, CoordinateLookupClient};
pub use distance::{haversine_miles, is_within_area, DistanceValidator};
pub use grid_reference::{GridReference, GridReferenceCodec, GridReferencePrecisions};
pub use migration_runner::{MigrationOptions, MigrationRunner};
pub use place_resolver::{select_best, NominatimClient, PlaceAddress, PlaceNameResolver, PlaceResult, PlaceSearch};
pub use rate_limiter::RateLimiter;
pub use resolution_orchestrator::ResolutionOrchestrator;
pub use text_extractor::{best_location, CandidateKind, LocationCandidate, LocationTextExtractor, SourceField};
