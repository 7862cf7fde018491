use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or compiling a vocabulary
#[derive(Debug, Error)]
pub enum VocabularyError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid vocabulary file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid vocabulary pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Invalid vocabulary entry: {0}")]
    InvalidEntry(String),
}

/// A named place from the gazetteer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEntry {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Broader region used for partial location credit
    pub region: String,
}

/// A controlled-vocabulary term (amenity or culture keyword) and the phrases that name it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermEntry {
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// Gazetteer, amenity and culture vocabulary shared by extraction and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationEntry>,
    #[serde(default = "default_amenities")]
    pub amenities: Vec<TermEntry>,
    #[serde(default = "default_culture")]
    pub culture: Vec<TermEntry>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            amenities: default_amenities(),
            culture: default_culture(),
        }
    }
}

fn location(name: &str, aliases: &[&str], region: &str) -> LocationEntry {
    LocationEntry {
        name: name.to_string(),
        aliases: aliases.iter().map(|a| a.to_string()).collect(),
        region: region.to_string(),
    }
}

fn term(name: &str, synonyms: &[&str]) -> TermEntry {
    TermEntry {
        name: name.to_string(),
        synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
    }
}

fn default_locations() -> Vec<LocationEntry> {
    vec![
        location("downtown", &["city center", "city centre", "cbd"], "central"),
        location("midtown", &["mid town"], "central"),
        location("financial district", &["financial", "fidi"], "central"),
        location("uptown", &["up town"], "north"),
        location("university district", &["campus"], "north"),
        location("arts district", &["arts", "creative district"], "east"),
        location("waterfront", &["harbor", "harbour"], "east"),
        location("old town", &["historic district"], "west"),
    ]
}

fn default_amenities() -> Vec<TermEntry> {
    vec![
        term("parking", &["garage", "car park", "parking spaces"]),
        term("elevator", &["lift"]),
        term("loading dock", &["loading bay", "loading area"]),
        term("conference room", &["meeting room", "boardroom"]),
        term("kitchen", &["kitchenette", "break room"]),
        term("gym", &["fitness center", "fitness centre"]),
        term("reception", &["lobby", "front desk"]),
        term("24/7 access", &["24/7", "24 hour access", "after hours access"]),
        term("bike storage", &["bicycle storage", "bike room"]),
        term("showers", &["shower"]),
    ]
}

fn default_culture() -> Vec<TermEntry> {
    vec![
        term("collaborative", &["open plan", "collaboration"]),
        term("modern", &["contemporary", "sleek"]),
        term("traditional", &["classic"]),
        term("creative", &["artsy"]),
        term("corporate", &["executive"]),
        term("startup", &["start up"]),
        term("professional", &[]),
        term("casual", &["relaxed", "laid back"]),
        term("innovative", &["cutting edge"]),
        term("tech", &["technology"]),
    ]
}

impl Vocabulary {
    pub fn from_toml_str(source: &str) -> Result<Self, VocabularyError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, VocabularyError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Compile every entry into word-boundary matchers
    pub fn compile(&self) -> Result<CompiledVocabulary, VocabularyError> {
        let locations = self
            .locations
            .iter()
            .map(|entry| {
                let name = normalize(&entry.name);
                if name.is_empty() {
                    return Err(VocabularyError::InvalidEntry("location with empty name".to_string()));
                }
                let aliases: Vec<String> = entry.aliases.iter().map(|a| normalize(a)).filter(|a| !a.is_empty()).collect();
                Ok(CompiledLocation {
                    name_pattern: phrase_pattern(std::slice::from_ref(&name))?,
                    alias_pattern: if aliases.is_empty() { None } else { Some(phrase_pattern(&aliases)?) },
                    name,
                    region: normalize(&entry.region),
                })
            })
            .collect::<Result<Vec<_>, VocabularyError>>()?;

        Ok(CompiledVocabulary {
            locations,
            amenities: compile_terms(&self.amenities, "amenity")?,
            culture: compile_terms(&self.culture, "culture keyword")?,
        })
    }
}

fn compile_terms(entries: &[TermEntry], kind: &str) -> Result<Vec<CompiledTerm>, VocabularyError> {
    entries
        .iter()
        .map(|entry| {
            let name = normalize(&entry.name);
            if name.is_empty() {
                return Err(VocabularyError::InvalidEntry(format!("{} with empty name", kind)));
            }
            let mut phrases = vec![name.clone()];
            phrases.extend(entry.synonyms.iter().map(|s| normalize(s)).filter(|s| !s.is_empty()));
            Ok(CompiledTerm {
                pattern: phrase_pattern(&phrases)?,
                name,
            })
        })
        .collect()
}

/// Lowercase and collapse runs of whitespace
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Alternation of escaped phrases with optional plural and loose inner spacing
fn phrase_pattern(phrases: &[String]) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = phrases
        .iter()
        .map(|p| {
            p.split(' ')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"[\s-]+")
        })
        .collect();
    Regex::new(&format!(r"\b(?:{})s?\b", alternatives.join("|")))
}

#[derive(Debug, Clone)]
pub struct CompiledLocation {
    pub name: String,
    pub region: String,
    name_pattern: Regex,
    alias_pattern: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct CompiledTerm {
    pub name: String,
    pattern: Regex,
}

impl CompiledTerm {
    fn is_whole(&self, phrase: &str) -> bool {
        self.pattern.find(phrase).is_some_and(|m| m.start() == 0 && m.end() == phrase.len())
    }
}

/// A location mention found in text
#[derive(Debug, Clone, Copy)]
pub struct LocationHit<'a> {
    pub entry: &'a CompiledLocation,
    pub start: usize,
    pub by_alias: bool,
}

/// An amenity or culture keyword mention found in text
#[derive(Debug, Clone, Copy)]
pub struct TermHit<'a> {
    pub entry: &'a CompiledTerm,
    pub start: usize,
}

/// Vocabulary with prebuilt matchers
#[derive(Debug, Clone)]
pub struct CompiledVocabulary {
    locations: Vec<CompiledLocation>,
    amenities: Vec<CompiledTerm>,
    culture: Vec<CompiledTerm>,
}

impl CompiledVocabulary {
    /// Every gazetteer mention in already normalized text, ordered by position
    pub fn find_locations<'a>(&'a self, text: &str) -> Vec<LocationHit<'a>> {
        let mut hits = Vec::new();
        for entry in &self.locations {
            if let Some(m) = entry.name_pattern.find(text) {
                hits.push(LocationHit { entry, start: m.start(), by_alias: false });
            } else if let Some(m) = entry.alias_pattern.as_ref().and_then(|p| p.find(text)) {
                hits.push(LocationHit { entry, start: m.start(), by_alias: true });
            }
        }
        hits.sort_by_key(|hit| (hit.start, hit.by_alias));
        hits
    }

    /// Every amenity mention in already normalized text, ordered by position
    pub fn find_amenities<'a>(&'a self, text: &str) -> Vec<TermHit<'a>> {
        find_terms(&self.amenities, text)
    }

    /// Every culture keyword mention in already normalized text, ordered by position
    pub fn find_culture<'a>(&'a self, text: &str) -> Vec<TermHit<'a>> {
        find_terms(&self.culture, text)
    }

    /// Resolve free text (an address or a spoken place) to one gazetteer entry.
    /// Name matches beat alias matches; among equals the earliest mention wins.
    pub fn resolve_location(&self, text: &str) -> Option<&CompiledLocation> {
        let text = normalize(text);
        let hits = self.find_locations(&text);
        hits.iter()
            .find(|hit| !hit.by_alias)
            .or_else(|| hits.first())
            .map(|hit| hit.entry)
    }

    /// Canonical amenity name for a phrase, if it belongs to the vocabulary
    pub fn canonical_amenity(&self, phrase: &str) -> Option<&str> {
        let phrase = normalize(phrase);
        self.amenities.iter().find(|entry| entry.is_whole(&phrase)).map(|entry| entry.name.as_str())
    }

    pub fn canonical_culture(&self, phrase: &str) -> Option<&str> {
        let phrase = normalize(phrase);
        self.culture.iter().find(|entry| entry.is_whole(&phrase)).map(|entry| entry.name.as_str())
    }
}

fn find_terms<'a>(terms: &'a [CompiledTerm], text: &str) -> Vec<TermHit<'a>> {
    let mut hits: Vec<TermHit<'a>> = terms
        .iter()
        .filter_map(|entry| entry.pattern.find(text).map(|m| TermHit { entry, start: m.start() }))
        .collect();
    hits.sort_by_key(|hit| hit.start);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled() -> CompiledVocabulary {
        Vocabulary::default().compile().unwrap()
    }

    #[test]
    fn test_find_location_by_name_and_alias() {
        let vocab = compiled();
        let hits = vocab.find_locations("somewhere near the city center or uptown");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.name, "downtown");
        assert!(hits[0].by_alias);
        assert_eq!(hits[1].entry.name, "uptown");
    }

    #[test]
    fn test_resolve_address() {
        let vocab = compiled();
        let entry = vocab.resolve_location("654 Executive Tower Financial District").unwrap();
        assert_eq!(entry.name, "financial district");
        assert_eq!(entry.region, "central");

        assert!(vocab.resolve_location("1 Nowhere Lane").is_none());
    }

    #[test]
    fn test_word_boundaries() {
        let vocab = compiled();
        // "lift" must not fire inside "uplifting"
        assert!(vocab.find_amenities("an uplifting space").is_empty());
        let hits = vocab.find_amenities("we need a lift and two meeting rooms");
        let names: Vec<&str> = hits.iter().map(|h| h.entry.name.as_str()).collect();
        assert_eq!(names, vec!["elevator", "conference room"]);
    }

    #[test]
    fn test_canonical_amenity() {
        let vocab = compiled();
        assert_eq!(vocab.canonical_amenity("Garage"), Some("parking"));
        assert_eq!(vocab.canonical_amenity("Loading Bay"), Some("loading dock"));
        assert_eq!(vocab.canonical_amenity("rooftop bar"), None);
    }

    #[test]
    fn test_vocabulary_from_toml() {
        let source = r#"
            [[locations]]
            name = "Harbour Point"
            aliases = ["the point"]
            region = "East"

            [[amenities]]
            name = "rooftop"
            synonyms = ["roof deck"]

            [[culture]]
            name = "quiet"
            synonyms = ["calm"]
        "#;
        let vocab = Vocabulary::from_toml_str(source).unwrap().compile().unwrap();
        let entry = vocab.resolve_location("an office at the point").unwrap();
        assert_eq!(entry.name, "harbour point");
        assert_eq!(entry.region, "east");
        assert_eq!(vocab.canonical_amenity("roof deck"), Some("rooftop"));
        assert_eq!(vocab.canonical_culture("Calm"), Some("quiet"));
        assert_eq!(vocab.canonical_culture("modern"), None);
    }

    #[test]
    fn test_find_culture_keywords() {
        let vocab = compiled();
        let hits = vocab.find_culture("a sleek, open plan space for a start-up");
        let names: Vec<&str> = hits.iter().map(|h| h.entry.name.as_str()).collect();
        assert_eq!(names, vec!["modern", "collaborative", "startup"]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let vocab = Vocabulary {
            locations: vec![location("  ", &[], "central")],
            amenities: vec![],
            culture: vec![],
        };
        assert!(matches!(vocab.compile(), Err(VocabularyError::InvalidEntry(_))));
    }
}
