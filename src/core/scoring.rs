use crate::core::vocabulary::{normalize, CompiledVocabulary};
use crate::models::{PropertyRecord, RequirementVector, ScoringWeights, Tolerances};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Scorer tables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoringWeights,
    /// Tolerances before any emotion adjustment
    #[serde(default)]
    pub tolerances: Tolerances,
    /// Credit for a property in the same broader region as the requested location
    #[serde(default = "default_region_credit")]
    pub region_credit: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            tolerances: Tolerances::default(),
            region_credit: default_region_credit(),
        }
    }
}

fn default_region_credit() -> f64 { 0.5 }

/// Fields that contribute to the match score, in rationale tie-break order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreField {
    Location,
    Sqft,
    Budget,
    Amenities,
    Culture,
}

/// Normalized fit of one requested field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFit {
    pub field: ScoreField,
    pub fit: f64,
    pub weight: f64,
    pub note: String,
}

/// Score of one property with the per-field fits behind it
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub score: f64,
    pub fits: Vec<FieldFit>,
}

impl ScoreBreakdown {
    /// Field notes, strongest fit first
    pub fn rationale(&self) -> Vec<String> {
        let mut fits: Vec<&FieldFit> = self.fits.iter().collect();
        fits.sort_by(|a, b| {
            b.fit
                .total_cmp(&a.fit)
                .then_with(|| b.weight.total_cmp(&a.weight))
                .then_with(|| a.field.cmp(&b.field))
        });
        fits.into_iter().map(|f| f.note.clone()).collect()
    }
}

/// Scores a requirement vector against one property.
///
/// Scoring formula, over the populated requirement fields only:
/// score = sum(weight_f * fit_f) / sum(weight_f)
///
/// - location: 1.0 same gazetteer entry, `region_credit` same region, else 0
/// - sqft: 1.0 inside the requested range, falling linearly to 0 at
///   `sqft_range` times the violated bound outside it
/// - budget: 1.0 at or under budget, falling linearly to 0 at
///   `budget_overage` times the budget over it
/// - amenities: Jaccard overlap of requested and offered sets
/// - culture: share of requested keywords found in the listing's culture tags
///   or address
///
/// Unset fields drop out of numerator and denominator alike. The scorer holds
/// no mutable state; identical inputs give identical breakdowns.
#[derive(Debug, Clone)]
pub struct MatchScorer {
    config: ScoringConfig,
    vocabulary: Arc<CompiledVocabulary>,
}

impl MatchScorer {
    pub fn new(config: ScoringConfig, vocabulary: Arc<CompiledVocabulary>) -> Self {
        Self { config, vocabulary }
    }

    pub fn base_tolerances(&self) -> Tolerances {
        self.config.tolerances
    }

    /// Score in [0, 1] using the base tolerances
    pub fn score(&self, requirements: &RequirementVector, property: &PropertyRecord) -> f64 {
        self.score_with(requirements, property, &self.config.tolerances).score
    }

    pub fn score_with(
        &self,
        requirements: &RequirementVector,
        property: &PropertyRecord,
        tolerances: &Tolerances,
    ) -> ScoreBreakdown {
        let weights = &self.config.weights;
        let mut fits = Vec::with_capacity(5);

        if let Some(location) = &requirements.location {
            let (fit, note) = self.calculate_location_score(&location.value, &property.location);
            fits.push(FieldFit { field: ScoreField::Location, fit, weight: weights.location, note });
        }

        let (sqft_min, sqft_max) = requirements.sqft_bounds();
        if sqft_min.is_some() || sqft_max.is_some() {
            let (fit, note) = calculate_sqft_score(property.sqft, sqft_min, sqft_max, tolerances.sqft_range);
            fits.push(FieldFit { field: ScoreField::Sqft, fit, weight: weights.sqft, note });
        }

        if let Some(budget) = &requirements.budget_max {
            let (fit, note) = calculate_budget_score(property.price, budget.value, tolerances.budget_overage);
            fits.push(FieldFit { field: ScoreField::Budget, fit, weight: weights.budget, note });
        }

        if let Some(amenities) = requirements.amenities.as_ref().filter(|a| !a.value.is_empty()) {
            let (fit, note) = self.calculate_amenity_score(&amenities.value, &property.amenities);
            fits.push(FieldFit { field: ScoreField::Amenities, fit, weight: weights.amenities, note });
        }

        if let Some(culture) = requirements.culture.as_ref().filter(|c| !c.value.is_empty()) {
            let requested: BTreeSet<String> = culture.value.iter().map(|k| self.canonical_culture(k)).collect();
            let (fit, note) = calculate_culture_score(&requested, &self.offered_culture(property));
            fits.push(FieldFit { field: ScoreField::Culture, fit, weight: weights.culture, note });
        }

        // Weighted combination
        let total_weight: f64 = fits.iter().map(|f| f.weight).sum();
        let score = if total_weight > 0.0 {
            fits.iter().map(|f| f.weight * f.fit).sum::<f64>() / total_weight
        } else {
            0.0
        };
        let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };

        ScoreBreakdown { score, fits }
    }

    fn calculate_location_score(&self, requested: &str, property_location: &str) -> (f64, String) {
        let requested = normalize(requested);
        let wanted = self.vocabulary.resolve_location(&requested);
        let actual = self.vocabulary.resolve_location(property_location);

        match (wanted, actual) {
            (Some(w), Some(a)) if w.name == a.name => (1.0, format!("location: exact match ({})", a.name)),
            (Some(w), Some(a)) if w.region == a.region => (
                self.config.region_credit.clamp(0.0, 1.0),
                format!("location: {} is in the same region as {} ({})", a.name, w.name, w.region),
            ),
            (Some(w), _) => (0.0, format!("location: outside {}", w.name)),
            (None, _) => {
                if contains_phrase(&normalize(property_location), &requested) {
                    (1.0, format!("location: matches \"{}\"", requested))
                } else {
                    (0.0, format!("location: no match for \"{}\"", requested))
                }
            }
        }
    }

    fn calculate_amenity_score(&self, requested: &BTreeSet<String>, offered: &BTreeSet<String>) -> (f64, String) {
        let canonical = |set: &BTreeSet<String>| -> BTreeSet<String> {
            set.iter()
                .map(|a| {
                    self.vocabulary
                        .canonical_amenity(a)
                        .map(str::to_string)
                        .unwrap_or_else(|| normalize(a))
                })
                .collect()
        };
        let requested = canonical(requested);
        let offered = canonical(offered);

        let (fit, shared) = jaccard(&requested, &offered);
        let missing: Vec<&str> = requested.difference(&offered).map(String::as_str).collect();

        let note = if missing.is_empty() {
            format!("amenities: all {} requested offered", requested.len())
        } else {
            format!(
                "amenities: {} of {} requested offered, missing {}",
                shared,
                requested.len(),
                missing.join(", ")
            )
        };
        (fit, note)
    }

    fn canonical_culture(&self, keyword: &str) -> String {
        self.vocabulary
            .canonical_culture(keyword)
            .map(str::to_string)
            .unwrap_or_else(|| normalize(keyword))
    }

    /// Tagged culture plus any keywords named in the address
    fn offered_culture(&self, property: &PropertyRecord) -> BTreeSet<String> {
        let mut offered: BTreeSet<String> = property.culture.iter().map(|k| self.canonical_culture(k)).collect();
        let address = normalize(&property.location);
        offered.extend(self.vocabulary.find_culture(&address).into_iter().map(|hit| hit.entry.name.clone()));
        offered
    }
}

/// Culture fit (0-1): share of the requested keywords the listing offers
#[inline]
pub fn calculate_culture_score(requested: &BTreeSet<String>, offered: &BTreeSet<String>) -> (f64, String) {
    if requested.is_empty() {
        return (1.0, "culture: no preference".to_string());
    }
    let shared: Vec<&str> = requested.intersection(offered).map(String::as_str).collect();
    let fit = shared.len() as f64 / requested.len() as f64;
    let note = if shared.is_empty() {
        format!("culture: none of {} offered", requested.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
    } else {
        format!("culture: {} of {} keywords ({})", shared.len(), requested.len(), shared.join(", "))
    };
    (fit, note)
}

/// Sqft fit (0-1) against an inclusive requested range
#[inline]
pub fn calculate_sqft_score(sqft: u32, min: Option<u32>, max: Option<u32>, tolerance: f64) -> (f64, String) {
    let size = sqft as f64;

    if let Some(lo) = min.map(f64::from).filter(|lo| size < *lo) {
        let shortfall = lo - size;
        let fit = linear_falloff(shortfall, lo * tolerance);
        return (fit, format!("sqft: {} is {:.0}% below the {:.0} minimum", sqft, shortfall / lo * 100.0, lo));
    }

    if let Some(hi) = max.map(f64::from).filter(|hi| size > *hi) {
        let excess = size - hi;
        let fit = linear_falloff(excess, hi * tolerance);
        let pct = if hi > 0.0 { excess / hi * 100.0 } else { 100.0 };
        return (fit, format!("sqft: {} is {:.0}% above the {:.0} maximum", sqft, pct, hi));
    }

    (1.0, format!("sqft: {} within requested range", sqft))
}

/// Budget fit (0-1); `budget` is the monthly ceiling
#[inline]
pub fn calculate_budget_score(price: f64, budget: f64, tolerance: f64) -> (f64, String) {
    if !price.is_finite() || !budget.is_finite() {
        return (0.0, "budget: price not comparable".to_string());
    }
    if price <= budget {
        return (1.0, format!("budget: {:.0} within {:.0}", price, budget));
    }
    if budget <= 0.0 {
        return (0.0, format!("budget: {:.0} over a zero budget", price));
    }

    let overage = (price - budget) / budget;
    let fit = linear_falloff(overage, tolerance);
    let note = if fit > 0.0 {
        format!("budget: {:.0}% over, within tolerance", overage * 100.0)
    } else {
        format!("budget: {:.0}% over, beyond tolerance", overage * 100.0)
    };
    (fit, note)
}

/// 1.0 at zero distance, 0.0 at or beyond `band`
#[inline]
fn linear_falloff(distance: f64, band: f64) -> f64 {
    if band <= 0.0 || !band.is_finite() {
        return 0.0;
    }
    (1.0 - distance / band).clamp(0.0, 1.0)
}

/// Jaccard index and intersection size
#[inline]
fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> (f64, usize) {
    let shared = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        return (1.0, 0);
    }
    (shared as f64 / union as f64, shared)
}

/// Word-aligned phrase containment
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let hay: Vec<&str> = haystack.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).collect();
    let needle: Vec<&str> = needle.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).collect();
    if needle.is_empty() || needle.len() > hay.len() {
        return false;
    }
    hay.windows(needle.len()).any(|w| w == needle.as_slice())
}

/// Orders two scores descending, treating equal values as ties
#[inline]
pub fn compare_scores(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vocabulary::Vocabulary;
    use crate::models::Extracted;

    fn scorer() -> MatchScorer {
        MatchScorer::new(ScoringConfig::default(), Arc::new(Vocabulary::default().compile().unwrap()))
    }

    fn property(id: &str, location: &str, sqft: u32, price: f64, amenities: &[&str]) -> PropertyRecord {
        PropertyRecord {
            id: id.to_string(),
            location: location.to_string(),
            sqft,
            price,
            amenities: amenities.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    fn downtown_request() -> RequirementVector {
        RequirementVector {
            location: Some(Extracted::new("downtown".to_string(), 0.9)),
            sqft_min: Some(Extracted::new(3000, 0.9)),
            budget_max: Some(Extracted::new(5000.0, 0.9)),
            amenities: Some(Extracted::new(["parking".to_string()].into_iter().collect(), 0.8)),
            ..Default::default()
        }
    }

    #[test]
    fn test_matching_property_scores_high() {
        let scorer = scorer();
        let a = property("A", "123 Main St Downtown", 3200, 4800.0, &["parking", "elevator"]);
        let score = scorer.score(&downtown_request(), &a);
        assert!(score >= 0.9, "score was {}", score);
    }

    #[test]
    fn test_wrong_location_scores_lower() {
        let scorer = scorer();
        let a = property("A", "123 Main St Downtown", 3200, 4800.0, &["parking", "elevator"]);
        let b = property("B", "9 Hill Rd Uptown", 3000, 4700.0, &[]);
        let req = downtown_request();
        assert!(scorer.score(&req, &a) - scorer.score(&req, &b) > 0.3);
    }

    #[test]
    fn test_region_credit() {
        let scorer = scorer();
        let req = RequirementVector {
            location: Some(Extracted::new("downtown".to_string(), 0.9)),
            ..Default::default()
        };
        let midtown = property("M", "456 Tech Plaza Midtown", 3000, 1.0, &[]);
        assert_eq!(scorer.score(&req, &midtown), 0.5);
    }

    #[test]
    fn test_free_text_location() {
        let scorer = scorer();
        let req = RequirementVector {
            location: Some(Extracted::new("riverside".to_string(), 0.4)),
            ..Default::default()
        };
        assert_eq!(scorer.score(&req, &property("R", "12 Riverside Walk", 1000, 1.0, &[])), 1.0);
        assert_eq!(scorer.score(&req, &property("S", "12 Riversides", 1000, 1.0, &[])), 0.0);
    }

    #[test]
    fn test_unset_fields_do_not_penalize() {
        let scorer = scorer();
        let req = RequirementVector {
            budget_max: Some(Extracted::new(5000.0, 0.9)),
            ..Default::default()
        };
        let p = property("P", "Nowhere", 10, 4000.0, &[]);
        assert_eq!(scorer.score(&req, &p), 1.0);
    }

    #[test]
    fn test_empty_requirements_score_zero() {
        let scorer = scorer();
        let breakdown = scorer.score_with(&RequirementVector::default(), &property("P", "x", 1, 1.0, &[]), &Tolerances::default());
        assert_eq!(breakdown.score, 0.0);
        assert!(breakdown.fits.is_empty());
    }

    #[test]
    fn test_sqft_score() {
        assert_eq!(calculate_sqft_score(3200, Some(3000), None, 0.25).0, 1.0);
        // 10% short against a 25% band
        let (fit, _) = calculate_sqft_score(2700, Some(3000), None, 0.25);
        assert!((fit - 0.6).abs() < 1e-9);
        assert_eq!(calculate_sqft_score(1000, Some(3000), None, 0.25).0, 0.0);
        let (fit, note) = calculate_sqft_score(5500, Some(3000), Some(5000), 0.25);
        assert!((fit - 0.6).abs() < 1e-9);
        assert!(note.contains("above"));
    }

    #[test]
    fn test_budget_score() {
        assert_eq!(calculate_budget_score(4800.0, 5000.0, 0.2).0, 1.0);
        let (fit, note) = calculate_budget_score(5500.0, 5000.0, 0.2);
        assert!((fit - 0.5).abs() < 1e-9);
        assert!(note.contains("10% over"));
        assert_eq!(calculate_budget_score(6500.0, 5000.0, 0.2).0, 0.0);
        assert_eq!(calculate_budget_score(f64::NAN, 5000.0, 0.2).0, 0.0);
    }

    #[test]
    fn test_amenity_synonyms_are_canonical() {
        let scorer = scorer();
        let req = RequirementVector {
            amenities: Some(Extracted::new(["garage".to_string()].into_iter().collect(), 0.8)),
            ..Default::default()
        };
        assert_eq!(scorer.score(&req, &property("P", "x", 1, 1.0, &["Parking"])), 1.0);
    }

    #[test]
    fn test_culture_matches_tags_and_address() {
        let scorer = scorer();
        let req = RequirementVector {
            culture: Some(Extracted::new(["modern".to_string(), "tech".to_string()].into_iter().collect(), 0.7)),
            ..Default::default()
        };
        let mut tagged = property("T", "1 Plain St", 1000, 1.0, &[]);
        tagged.culture = ["Contemporary".to_string()].into_iter().collect();
        let plaza = property("P", "456 Tech Plaza Midtown", 1000, 1.0, &[]);
        let plain = property("N", "1 Plain St", 1000, 1.0, &[]);

        assert_eq!(scorer.score(&req, &tagged), 0.5);
        assert_eq!(scorer.score(&req, &plaza), 0.5);
        assert_eq!(scorer.score(&req, &plain), 0.0);

        let breakdown = scorer.score_with(&req, &tagged, &Tolerances::default());
        assert_eq!(breakdown.rationale(), vec!["culture: 1 of 2 keywords (modern)".to_string()]);
    }

    #[test]
    fn test_culture_score() {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<BTreeSet<String>>();
        assert_eq!(calculate_culture_score(&set(&["modern"]), &set(&["modern", "tech"])).0, 1.0);
        assert_eq!(calculate_culture_score(&set(&["modern", "corporate"]), &set(&["modern"])).0, 0.5);
        assert_eq!(calculate_culture_score(&set(&[]), &set(&[])).0, 1.0);
    }

    #[test]
    fn test_rationale_order_is_stable() {
        let scorer = scorer();
        let b = property("B", "9 Hill Rd Uptown", 3000, 4700.0, &[]);
        let first = scorer.score_with(&downtown_request(), &b, &Tolerances::default()).rationale();
        let second = scorer.score_with(&downtown_request(), &b, &Tolerances::default()).rationale();
        assert_eq!(first, second);
        assert!(first[0].starts_with("sqft") || first[0].starts_with("budget"));
        assert!(first[2].starts_with("location"));
        assert!(first[3].starts_with("amenities"));
    }
}
