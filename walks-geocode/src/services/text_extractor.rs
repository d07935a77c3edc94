//! Location candidates from free text
//!
//! Walk titles and descriptions often name the start point even when the
//! structured location is missing: `"Canterbury to Whitstable - moderate
//! (9 miles)"`, `"Start: Wye station car park, TN25 5AR"`. This module
//! classifies such text into typed candidates ranked by how precisely they
//! locate the walk: postcode, then grid reference, then place name.

use crate::services::grid_reference::GridReferenceCodec;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Context tag of candidates taken from an explicit start/meeting point phrase
pub const START_LOCATION: &str = "start location";

static POSTCODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z]{1,2}[0-9][A-Z0-9]?)\s*([0-9][A-Z]{2})\b").expect("postcode pattern")
});

static GRID_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([HJNOST][A-HJ-Z])\s?(\d{3,5}\s?\d{3,5}|\d{6}|\d{8}|\d{10})\b")
        .expect("grid reference pattern")
});

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("parenthetical pattern"));

static DISTANCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:miles?|mi|kms?|kilometres?|kilometers?)\b").expect("distance pattern")
});

/// Route separators in titles: "A to B", "A via B", "A - moderate", "A/B", "A & B"
static TITLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(?:to|via|and|then)\s+|\s+[-–—]+\s+|[/&,:;|+]").expect("separator pattern")
});

const CAPITALIZED_RUN: &str = r"[A-Z][\w'’.-]*(?:\s+(?:(?:on|upon|by|at|in|le|the|under|next|cum|de|en)\s+)?[A-Z][\w'’.-]*){0,4}";

static PLACE_AFTER_PREPOSITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"\b(?:from|at|in|near|around|via|to)\s+({})", CAPITALIZED_RUN))
        .expect("preposition pattern")
});

static FIRST_CAPITALIZED_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(CAPITALIZED_RUN).expect("capitalized run pattern"));

static START_PHRASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:start(?:ing)?(?:\s+(?:point|location|from))?|meet(?:ing)?(?:\s+(?:point|place))?)\s*(?::|\bat\b|\bfrom\b|-)\s*([^.;\n()]+)",
    )
    .expect("start phrase pattern")
});

/// Grade, route and distance words that trail or lead place names in titles
const DESCRIPTIVE_WORDS: &[&str] = &[
    "a", "about", "an", "and", "approx", "challenging", "circular", "day", "easy", "evening",
    "flat", "gentle", "hard", "hike", "hilly", "km", "leisurely", "level", "linear", "long",
    "loop", "medium", "mile", "miles", "moderate", "morning", "afternoon", "or", "plus",
    "ramble", "return", "route", "short", "stroll", "strenuous", "trail", "walk", "walks",
];

const LEADING_WORDS: &[&str] = &["around", "at", "from", "in", "near", "round", "start", "starting"];

/// Lower-case words allowed inside a place name ("Westgate on Sea", "St Margaret's at Cliffe")
const CONNECTORS: &[&str] = &[
    "on", "upon", "by", "at", "in", "le", "the", "under", "next", "cum", "de", "en", "of", "super", "sub", "la",
];

/// Capitalized words that are never places on their own
const NOT_PLACES: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday",
    "Saturday", "Sunday", "The", "Walk", "Start", "Meet", "Please", "Lunch", "Parking",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    Postcode,
    GridReference,
    PlaceName,
}

impl CandidateKind {
    /// Higher locates more precisely
    pub fn priority(&self) -> u8 {
        match self {
            CandidateKind::Postcode => 3,
            CandidateKind::GridReference => 2,
            CandidateKind::PlaceName => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceField {
    Title,
    Description,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationCandidate {
    pub kind: CandidateKind,
    pub value: String,
    pub source_field: SourceField,
    pub context: Option<String>,
}

impl LocationCandidate {
    fn new(kind: CandidateKind, value: impl Into<String>, source_field: SourceField) -> Self {
        Self {
            kind,
            value: value.into(),
            source_field,
            context: None,
        }
    }

    fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn is_start_location(&self) -> bool {
        self.context.as_deref() == Some(START_LOCATION)
    }
}

impl fmt::Display for LocationCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CandidateKind::Postcode => "postcode",
            CandidateKind::GridReference => "grid reference",
            CandidateKind::PlaceName => "place name",
        };
        write!(f, "{} {:?}", kind, self.value)
    }
}

/// Free-text classifier
///
/// Holds the grid reference codec so text references are held to the same
/// validity rules (including unreliable squares) as the structured fields.
#[derive(Debug, Clone, Default)]
pub struct LocationTextExtractor {
    codec: GridReferenceCodec,
}

impl LocationTextExtractor {
    pub fn new(codec: GridReferenceCodec) -> Self {
        Self { codec }
    }

    /// All candidates, title first, in extraction order within each field
    pub fn extract_locations(&self, title: &str, description: &str) -> Vec<LocationCandidate> {
        let mut candidates = Vec::new();

        self.push_codes(&mut candidates, title, SourceField::Title);
        for name in title_place_names(title) {
            push_unique(&mut candidates, LocationCandidate::new(CandidateKind::PlaceName, name, SourceField::Title));
        }

        self.push_codes(&mut candidates, description, SourceField::Description);
        for candidate in self.start_locations(description) {
            push_unique(&mut candidates, candidate);
        }
        for captures in PLACE_AFTER_PREPOSITION.captures_iter(description) {
            let name = clean_place_name(&captures[1]);
            if looks_like_place_name(&name) {
                push_unique(
                    &mut candidates,
                    LocationCandidate::new(CandidateKind::PlaceName, name, SourceField::Description),
                );
            }
        }

        candidates
    }

    fn push_codes(&self, candidates: &mut Vec<LocationCandidate>, text: &str, source_field: SourceField) {
        for postcode in find_postcodes(text) {
            push_unique(candidates, LocationCandidate::new(CandidateKind::Postcode, postcode, source_field));
        }
        for reference in self.find_grid_references(text) {
            push_unique(candidates, LocationCandidate::new(CandidateKind::GridReference, reference, source_field));
        }
    }

    fn find_grid_references(&self, text: &str) -> Vec<String> {
        GRID_REFERENCE
            .find_iter(text)
            .filter_map(|m| self.codec.parse(m.as_str()).ok())
            .map(|grid| grid.normalized())
            .collect()
    }

    /// Candidates from "Start: ...", "meet at ...", "starting from ..." phrases
    fn start_locations(&self, description: &str) -> Vec<LocationCandidate> {
        let mut found = Vec::new();
        for captures in START_PHRASE.captures_iter(description) {
            let segment = &captures[1];
            let candidate = if let Some(postcode) = find_postcodes(segment).into_iter().next() {
                LocationCandidate::new(CandidateKind::Postcode, postcode, SourceField::Description)
            } else if let Some(reference) = self.find_grid_references(segment).into_iter().next() {
                LocationCandidate::new(CandidateKind::GridReference, reference, SourceField::Description)
            } else if let Some(name) = FIRST_CAPITALIZED_RUN
                .find(segment)
                .map(|m| clean_place_name(m.as_str()))
                .filter(|name| looks_like_place_name(name))
            {
                LocationCandidate::new(CandidateKind::PlaceName, name, SourceField::Description)
            } else {
                continue;
            };
            found.push(candidate.with_context(START_LOCATION));
        }
        found
    }
}

/// Append unless already present; a repeat seen in a start phrase tags the original
fn push_unique(candidates: &mut Vec<LocationCandidate>, candidate: LocationCandidate) {
    let existing = candidates.iter_mut().find(|c| {
        c.kind == candidate.kind
            && c.source_field == candidate.source_field
            && c.value.eq_ignore_ascii_case(&candidate.value)
    });
    match existing {
        Some(existing) => {
            if existing.context.is_none() {
                existing.context = candidate.context;
            }
        }
        None => candidates.push(candidate),
    }
}

fn find_postcodes(text: &str) -> Vec<String> {
    POSTCODE
        .captures_iter(text)
        .map(|c| format!("{} {}", &c[1], &c[2]))
        .collect()
}

/// Highest priority candidate; earlier candidates win ties
pub fn best_location(candidates: &[LocationCandidate]) -> Option<&LocationCandidate> {
    candidates
        .iter()
        .reduce(|best, c| if c.kind.priority() > best.kind.priority() { c } else { best })
}

/// Ordered, de-duplicated place names from a title
pub fn title_place_names(title: &str) -> Vec<String> {
    let without_asides = PARENTHETICAL.replace_all(title, " ");
    let mut names: Vec<String> = Vec::new();
    for part in TITLE_SEPARATOR.split(&without_asides) {
        let name = clean_place_name(part);
        if looks_like_place_name(&name) && !names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            names.push(name);
        }
    }
    names
}

fn normalize_word(word: &str) -> String {
    word.trim_matches(|c: char| ".,;:!?-–—'\"".contains(c)).to_lowercase()
}

fn is_not_place(word: &str) -> bool {
    let word = normalize_word(word);
    NOT_PLACES.iter().any(|p| p.eq_ignore_ascii_case(&word))
}

fn is_numeric(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Strip asides, distances and descriptive words from a raw place name
pub fn clean_place_name(raw: &str) -> String {
    let without_asides = PARENTHETICAL.replace_all(raw, " ");
    let without_distances = DISTANCE.replace_all(&without_asides, " ");
    let mut words: Vec<&str> = without_distances.split_whitespace().collect();

    let is_trailing_noise = |word: &str| {
        let word = normalize_word(word);
        word.is_empty() || is_numeric(&word) || DESCRIPTIVE_WORDS.contains(&word.as_str())
    };
    let is_leading_noise = |word: &str| {
        let normalized = normalize_word(word);
        is_trailing_noise(word) || LEADING_WORDS.contains(&normalized.as_str())
    };

    while let Some(&last) = words.last() {
        if is_trailing_noise(last) {
            words.pop();
        } else if words.len() > 1 && is_not_place(last) {
            // "Barham Downs in June"
            words.pop();
            while words.last().is_some_and(|w| CONNECTORS.contains(&normalize_word(w).as_str())) {
                words.pop();
            }
        } else {
            break;
        }
    }
    while words.first().is_some_and(|w| is_leading_noise(*w)) {
        words.remove(0);
    }

    words
        .join(" ")
        .trim_matches(|c: char| c.is_whitespace() || ".,;:!?-–—".contains(c))
        .to_string()
}

/// Capitalized words, optionally joined by lower-case connectors
fn looks_like_place_name(name: &str) -> bool {
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.is_empty() || words.len() > 5 || NOT_PLACES.contains(&name) || name.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let capitalized = |w: &str| w.chars().next().is_some_and(char::is_uppercase);
    capitalized(words[0])
        && words.iter().all(|w| capitalized(w) || CONNECTORS.contains(w))
}
