use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// One turn of transcribed speech with its session metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "turnIndex")]
    pub turn_index: u32,
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    pub fn new(session_id: impl Into<String>, turn_index: u32, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: session_id.into(),
            turn_index,
            timestamp: Utc::now(),
        }
    }
}

/// Prosodic features computed by the upstream audio extractor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcousticFeatures {
    #[serde(rename = "pitchVariance")]
    pub pitch_variance: f64,
    pub energy: f64,
    #[serde(rename = "speechRate")]
    pub speech_rate: f64,
    #[serde(rename = "pauseRatio")]
    pub pause_ratio: f64,
}

impl AcousticFeatures {
    /// A feature set is usable only when every cue is a finite number
    pub fn is_usable(&self) -> bool {
        self.pitch_variance.is_finite()
            && self.energy.is_finite()
            && self.speech_rate.is_finite()
            && self.pause_ratio.is_finite()
    }
}

/// The four emotion dimensions tracked per turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionDimension {
    Enthusiasm,
    Professionalism,
    Confidence,
    Uncertainty,
}

/// Categorical emotion scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionProfile {
    pub enthusiasm: f64,
    pub professionalism: f64,
    pub confidence: f64,
    pub uncertainty: f64,
    /// Set when the profile came from the lexical fallback instead of acoustics
    #[serde(rename = "lowConfidence")]
    pub low_confidence: bool,
}

impl EmotionProfile {
    pub fn get(&self, dimension: EmotionDimension) -> f64 {
        match dimension {
            EmotionDimension::Enthusiasm => self.enthusiasm,
            EmotionDimension::Professionalism => self.professionalism,
            EmotionDimension::Confidence => self.confidence,
            EmotionDimension::Uncertainty => self.uncertainty,
        }
    }

    /// Average of a window of profiles. `low_confidence` holds only if every
    /// profile in the window was low confidence.
    pub fn mean(profiles: &[EmotionProfile]) -> Option<EmotionProfile> {
        if profiles.is_empty() {
            return None;
        }
        let n = profiles.len() as f64;
        let sum = |f: fn(&EmotionProfile) -> f64| profiles.iter().map(f).sum::<f64>() / n;

        Some(EmotionProfile {
            enthusiasm: sum(|p| p.enthusiasm),
            professionalism: sum(|p| p.professionalism),
            confidence: sum(|p| p.confidence),
            uncertainty: sum(|p| p.uncertainty),
            low_confidence: profiles.iter().all(|p| p.low_confidence),
        })
    }
}

/// A value paired with the confidence of the extraction that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extracted<T> {
    pub value: T,
    pub confidence: f64,
}

impl<T> Extracted<T> {
    pub fn new(value: T, confidence: f64) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self { value, confidence }
    }
}

// Caller-supplied vectors go through the same clamp as extracted ones
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Extracted<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw<V> {
            value: V,
            confidence: f64,
        }

        let raw = Raw::<T>::deserialize(deserializer)?;
        Ok(Extracted::new(raw.value, raw.confidence))
    }
}

/// Requirement fields in their canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequirementField {
    Location,
    SqftMin,
    SqftMax,
    BudgetMax,
    Amenities,
    LeaseTermMonths,
    Culture,
}

/// Partially populated space requirements. Unset fields are `None`, never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementVector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Extracted<String>>,
    #[serde(rename = "sqftMin", default, skip_serializing_if = "Option::is_none")]
    pub sqft_min: Option<Extracted<u32>>,
    #[serde(rename = "sqftMax", default, skip_serializing_if = "Option::is_none")]
    pub sqft_max: Option<Extracted<u32>>,
    /// Monthly rent ceiling
    #[serde(rename = "budgetMax", default, skip_serializing_if = "Option::is_none")]
    pub budget_max: Option<Extracted<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Extracted<BTreeSet<String>>>,
    #[serde(rename = "leaseTermMonths", default, skip_serializing_if = "Option::is_none")]
    pub lease_term_months: Option<Extracted<u32>>,
    /// Workplace style keywords ("modern", "corporate", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub culture: Option<Extracted<BTreeSet<String>>>,
}

impl RequirementVector {
    pub fn is_empty(&self) -> bool {
        self.populated_fields().is_empty()
    }

    pub fn populated_fields(&self) -> Vec<RequirementField> {
        let mut fields = Vec::new();
        if self.location.is_some() {
            fields.push(RequirementField::Location);
        }
        if self.sqft_min.is_some() {
            fields.push(RequirementField::SqftMin);
        }
        if self.sqft_max.is_some() {
            fields.push(RequirementField::SqftMax);
        }
        if self.budget_max.is_some() {
            fields.push(RequirementField::BudgetMax);
        }
        if self.amenities.as_ref().is_some_and(|a| !a.value.is_empty()) {
            fields.push(RequirementField::Amenities);
        }
        if self.lease_term_months.is_some() {
            fields.push(RequirementField::LeaseTermMonths);
        }
        if self.culture.as_ref().is_some_and(|c| !c.value.is_empty()) {
            fields.push(RequirementField::Culture);
        }
        fields
    }

    /// Merge another vector into this one.
    ///
    /// A populated field is replaced only by a strictly more confident value and
    /// is never cleared. Amenity and culture sets accumulate. Merging the same
    /// vector twice leaves the same result as merging it once.
    pub fn merge(&mut self, other: &RequirementVector) {
        merge_field(&mut self.location, &other.location);
        merge_field(&mut self.sqft_min, &other.sqft_min);
        merge_field(&mut self.sqft_max, &other.sqft_max);
        merge_field(&mut self.budget_max, &other.budget_max);
        merge_field(&mut self.lease_term_months, &other.lease_term_months);
        merge_set(&mut self.amenities, &other.amenities);
        merge_set(&mut self.culture, &other.culture);
    }

    /// Requested sqft bounds, ordered low to high when both are present
    pub fn sqft_bounds(&self) -> (Option<u32>, Option<u32>) {
        let min = self.sqft_min.as_ref().map(|f| f.value);
        let max = self.sqft_max.as_ref().map(|f| f.value);
        match (min, max) {
            (Some(lo), Some(hi)) if lo > hi => (Some(hi), Some(lo)),
            bounds => bounds,
        }
    }
}

fn merge_field<T: Clone>(slot: &mut Option<Extracted<T>>, incoming: &Option<Extracted<T>>) {
    if let Some(new) = incoming {
        match slot {
            Some(current) if current.confidence >= new.confidence => {}
            _ => *slot = Some(new.clone()),
        }
    }
}

fn merge_set(slot: &mut Option<Extracted<BTreeSet<String>>>, incoming: &Option<Extracted<BTreeSet<String>>>) {
    let Some(incoming) = incoming.as_ref().filter(|i| !i.value.is_empty()) else {
        return;
    };
    match slot {
        Some(current) => {
            current.value.extend(incoming.value.iter().cloned());
            current.confidence = current.confidence.max(incoming.confidence);
        }
        None => *slot = Some(incoming.clone()),
    }
}

/// Listing particulars shown with a recommendation. Not scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite: Option<String>,
    /// Quoted yearly rent per square foot
    #[serde(rename = "rentPerSfYear", default, skip_serializing_if = "Option::is_none")]
    pub rent_per_sf_year: Option<f64>,
    #[serde(rename = "contactName", default, skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(rename = "contactEmail", default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
}

/// One listing from the property catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: String,
    pub location: String,
    pub sqft: u32,
    /// Monthly rent
    pub price: f64,
    #[serde(default)]
    pub amenities: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub available: bool,
    /// Style descriptors matched against culture keywords
    #[serde(default)]
    pub culture: BTreeSet<String>,
    #[serde(flatten)]
    pub details: ListingDetails,
}

impl Default for PropertyRecord {
    fn default() -> Self {
        Self {
            id: String::new(),
            location: String::new(),
            sqft: 0,
            price: 0.0,
            amenities: BTreeSet::new(),
            available: true,
            culture: BTreeSet::new(),
            details: ListingDetails::default(),
        }
    }
}

fn default_true() -> bool { true }

/// Dialogue status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    New,
    Collecting,
    Ready,
    Finalized,
}

/// Cumulative state of one conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub requirements: RequirementVector,
    #[serde(rename = "emotionHistory")]
    pub emotion_history: Vec<EmotionProfile>,
    pub status: SessionStatus,
    #[serde(rename = "turnCount")]
    pub turn_count: u32,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            requirements: RequirementVector::default(),
            emotion_history: Vec::new(),
            status: SessionStatus::New,
            turn_count: 0,
            last_updated: Utc::now(),
        }
    }
}

/// Scored and explained candidate property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "propertyId")]
    pub property_id: String,
    pub score: f64,
    pub rationale: Vec<String>,
    pub location: String,
    pub sqft: u32,
    pub price: f64,
    #[serde(rename = "annualRent")]
    pub annual_rent: f64,
    #[serde(flatten)]
    pub details: ListingDetails,
}

/// Per-field weights for the match score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub location: f64,
    pub sqft: f64,
    pub budget: f64,
    pub amenities: f64,
    pub culture: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            location: 0.35,
            sqft: 0.25,
            budget: 0.25,
            amenities: 0.15,
            culture: 0.10,
        }
    }
}

/// How far a property may miss the requested size or budget before its fit reaches zero.
/// Both are fractions of the requested bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    pub budget_overage: f64,
    pub sqft_range: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            budget_overage: 0.20,
            sqft_range: 0.25,
        }
    }
}
