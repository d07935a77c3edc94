//! Per-record location resolution
//!
//! Runs the resolution stages in fixed order and stops at the first one
//! that yields a postcode:
//!
//! 1. Existing coordinates, reverse geocoded
//! 2. First parseable grid reference field (10, 8, then 6 digits), checked
//!    against the area center
//! 3. Free text from title and description, only when the walk has no
//!    usable coordinates:
//!    a. best extracted candidate if it is a postcode or grid reference
//!    b. the first two title place names combined, `"A, B"`
//!    c. the best extracted place name
//!    d. each title place name in order
//!    e. each start location phrase in the description
//!
//! Every signal that fails is recorded so a failure audit event can say
//! what was tried. The ordering of 3b before 3c is a heuristic and may be
//! tuned; it favours route titles such as "Canterbury to Whitstable".

use crate::error::LocationError;
use crate::models::{MatchType, MigrationRecord, ResolutionAttempt, ResolutionOutcome, ResolutionResult};
use crate::services::coordinate_lookup::CoordinateLookup;
use crate::services::distance::DistanceValidator;
use crate::services::grid_reference::{GridReference, GridReferenceCodec};
use crate::services::place_resolver::PlaceNameResolver;
use crate::services::text_extractor::{best_location, title_place_names, CandidateKind, LocationCandidate, LocationTextExtractor, SourceField};
use std::collections::HashSet;
use std::sync::Arc;

pub struct ResolutionOrchestrator {
    coordinate_lookup: Arc<dyn CoordinateLookup>,
    place_resolver: PlaceNameResolver,
    codec: GridReferenceCodec,
    extractor: LocationTextExtractor,
    distance: DistanceValidator,
}

/// Signals tried so far for one record
#[derive(Default)]
struct AttemptLog {
    attempts: Vec<ResolutionAttempt>,
    tried: HashSet<String>,
}

impl AttemptLog {
    /// False if the same query was already tried for this record
    fn begin(&mut self, key: &str) -> bool {
        self.tried.insert(key.to_lowercase())
    }

    fn fail(&mut self, signal: String, failure: LocationError) {
        tracing::debug!(signal = %signal, reason = %failure, "Resolution attempt failed");
        self.attempts.push(ResolutionAttempt::new(signal, failure));
    }

    /// Tag the producing stage; a result without a postcode is a failed attempt
    fn accept(&mut self, signal: &str, result: ResolutionResult, match_type: MatchType) -> Option<ResolutionResult> {
        let result = result.with_match_type(match_type);
        if !result.is_successful() {
            self.fail(signal.to_string(), LocationError::NoMatchFound(signal.to_string()));
            return None;
        }
        tracing::debug!(postcode = %result.postcode, match_type = %match_type, "Resolved location");
        Some(result)
    }
}

impl ResolutionOrchestrator {
    pub fn new(
        coordinate_lookup: Arc<dyn CoordinateLookup>,
        place_resolver: PlaceNameResolver,
        codec: GridReferenceCodec,
        distance: DistanceValidator,
    ) -> Self {
        Self {
            coordinate_lookup,
            place_resolver,
            extractor: LocationTextExtractor::new(codec.clone()),
            codec,
            distance,
        }
    }

    pub fn codec(&self) -> &GridReferenceCodec {
        &self.codec
    }

    pub async fn resolve(&self, record: &MigrationRecord) -> ResolutionOutcome {
        let mut log = AttemptLog::default();

        let coordinate = record.coordinate();
        if let Some(coordinate) = coordinate {
            let signal = format!("coordinates {}", coordinate);
            match self.coordinate_lookup.reverse_geocode(coordinate).await {
                Ok(result) => {
                    if let Some(result) = log.accept(&signal, result, MatchType::Coordinates) {
                        return ResolutionOutcome::Resolved(result);
                    }
                }
                Err(failure) => log.fail(signal, failure),
            }
        }

        if let Some(grid) = self.first_valid_grid_reference(record, &mut log) {
            let signal = format!("grid reference {}", grid.normalized());
            log.begin(&grid.normalized());
            match self.resolve_grid_reference(&grid).await {
                Ok(result) => {
                    if let Some(result) = log.accept(&signal, result, MatchType::GridReference) {
                        return ResolutionOutcome::Resolved(result);
                    }
                }
                Err(failure) => log.fail(signal, failure),
            }
        }

        if coordinate.is_none() {
            if let Some(result) = self.resolve_free_text(record, &mut log).await {
                return ResolutionOutcome::Resolved(result);
            }
        }

        if log.attempts.is_empty() {
            log.fail(
                "location signals".to_string(),
                LocationError::NoMatchFound("any location signal in this walk".to_string()),
            );
        }
        ResolutionOutcome::Failed { attempts: log.attempts }
    }

    /// Most precise field that parses; unparseable fields are recorded
    fn first_valid_grid_reference(&self, record: &MigrationRecord, log: &mut AttemptLog) -> Option<GridReference> {
        for (field, raw) in record.grid_references() {
            match self.codec.parse(raw) {
                Ok(grid) => return Some(grid),
                Err(failure) => log.fail(format!("{} {:?}", field.path(), raw), failure),
            }
        }
        None
    }

    async fn resolve_grid_reference(&self, grid: &GridReference) -> Result<ResolutionResult, LocationError> {
        let coordinate = grid.coordinate();
        let mut result = self.coordinate_lookup.grid_reference_lookup(coordinate).await?;

        let distance_from_center = self.distance.check(coordinate)?;
        if result.distance_miles.is_none() {
            result.distance_miles = distance_from_center;
        }
        if result.coordinate.is_none() {
            result.coordinate = Some(coordinate);
        }
        Ok(result)
    }

    async fn resolve_free_text(&self, record: &MigrationRecord, log: &mut AttemptLog) -> Option<ResolutionResult> {
        let title = record.title();
        let candidates = self.extractor.extract_locations(title, record.description());
        tracing::debug!(candidates = candidates.len(), "Extracted location candidates");

        // a. postcode or grid reference found in the text
        if let Some(best) = best_location(&candidates) {
            let match_type = match best.kind {
                CandidateKind::Postcode => Some(MatchType::Postcode),
                CandidateKind::GridReference => Some(MatchType::GridReference),
                CandidateKind::PlaceName => None,
            };
            if let Some(match_type) = match_type {
                if let Some(result) = self.try_candidate(best, match_type, log).await {
                    return Some(result);
                }
            }
        }

        // b. route title, "A to B"
        let title_names = title_place_names(title);
        if title_names.len() >= 2 {
            let combined = format!("{}, {}", title_names[0], title_names[1]);
            if let Some(result) = self.try_query(&combined, "title places", MatchType::TitleExtraction, log).await {
                return Some(result);
            }
        }

        // c. best single place name
        if let Some(name) = candidates.iter().find(|c| c.kind == CandidateKind::PlaceName) {
            if let Some(result) = self.try_query(&name.value, "place name", MatchType::PlaceName, log).await {
                return Some(result);
            }
        }

        // d. each title place name
        for name in &title_names {
            if let Some(result) = self.try_query(name, "title place", MatchType::TitleExtraction, log).await {
                return Some(result);
            }
        }

        // e. explicit start location phrases
        for candidate in candidates
            .iter()
            .filter(|c| c.source_field == SourceField::Description && c.is_start_location())
        {
            if let Some(result) = self.try_candidate(candidate, MatchType::StartLocation, log).await {
                return Some(result);
            }
        }

        None
    }

    async fn try_candidate(
        &self,
        candidate: &LocationCandidate,
        match_type: MatchType,
        log: &mut AttemptLog,
    ) -> Option<ResolutionResult> {
        match candidate.kind {
            CandidateKind::GridReference => {
                let grid = match self.codec.parse(&candidate.value) {
                    Ok(grid) => grid,
                    Err(failure) => {
                        log.fail(format!("grid reference in text {:?}", candidate.value), failure);
                        return None;
                    }
                };
                if !log.begin(&grid.normalized()) {
                    return None;
                }
                let signal = format!("grid reference in text {}", grid.normalized());
                match self.resolve_grid_reference(&grid).await {
                    Ok(result) => log.accept(&signal, result, match_type),
                    Err(failure) => {
                        log.fail(signal, failure);
                        None
                    }
                }
            }
            CandidateKind::Postcode => self.try_query(&candidate.value, "postcode in text", match_type, log).await,
            CandidateKind::PlaceName => self.try_query(&candidate.value, "place name", match_type, log).await,
        }
    }

    /// Place search for a query not yet tried on this record
    async fn try_query(
        &self,
        query: &str,
        label: &str,
        match_type: MatchType,
        log: &mut AttemptLog,
    ) -> Option<ResolutionResult> {
        if !log.begin(query) {
            tracing::debug!(query = %query, "Skipping query already tried");
            return None;
        }
        let signal = format!("{} {:?}", label, query);
        match self.place_resolver.resolve(query).await {
            Ok(result) => log.accept(&signal, result, match_type),
            Err(failure) => {
                log.fail(signal, failure);
                None
            }
        }
    }
}
