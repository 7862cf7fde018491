use crate::core::policy::TolerancePolicy;
use crate::core::scoring::{compare_scores, MatchScorer};
use crate::models::{EmotionProfile, Extracted, MatchResult, PropertyRecord, RequirementVector, Tolerances};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

// Confidence of culture keywords inferred from tone rather than said
const STYLE_HINT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingSettings {
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,
    #[serde(default = "default_max_top_n")]
    pub max_top_n: usize,
    /// Number of recent emotion profiles averaged before the policy runs
    #[serde(default = "default_emotion_window")]
    pub emotion_window: usize,
    /// Candidates scoring below this are dropped
    #[serde(default)]
    pub min_score: f64,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            default_top_n: default_top_n(),
            max_top_n: default_max_top_n(),
            emotion_window: default_emotion_window(),
            min_score: 0.0,
        }
    }
}

fn default_top_n() -> usize { 3 }
fn default_max_top_n() -> usize { 100 }
fn default_emotion_window() -> usize { 3 }

/// Result of one ranking pass
#[derive(Debug, Clone)]
pub struct RankedMatches {
    pub matches: Vec<MatchResult>,
    pub total_candidates: usize,
    pub tolerances: Tolerances,
}

/// Ranking aggregator
///
/// # Pipeline Stages
/// 1. Emotion policy adjusts the base tolerances and may add culture keywords
/// 2. Unavailable listings are dropped
/// 3. Every remaining listing is scored and explained
/// 4. Sort by score desc, price asc, id asc, then truncate to top N
#[derive(Clone)]
pub struct Ranker {
    scorer: MatchScorer,
    policy: Arc<dyn TolerancePolicy>,
    settings: RankingSettings,
}

impl Ranker {
    pub fn new(scorer: MatchScorer, policy: Arc<dyn TolerancePolicy>, settings: RankingSettings) -> Self {
        Self { scorer, policy, settings }
    }

    pub fn settings(&self) -> &RankingSettings {
        &self.settings
    }

    pub fn scorer(&self) -> &MatchScorer {
        &self.scorer
    }

    /// Profile the policy sees for a session: the mean of the most recent window
    pub fn session_emotion(&self, history: &[EmotionProfile]) -> Option<EmotionProfile> {
        let window = self.settings.emotion_window.max(1);
        let start = history.len().saturating_sub(window);
        EmotionProfile::mean(&history[start..])
    }

    /// Requested N, falling back to the default and capped at the maximum
    pub fn effective_top_n(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.settings.default_top_n)
            .min(self.settings.max_top_n.max(1))
    }

    pub fn rank(
        &self,
        requirements: &RequirementVector,
        emotion: Option<&EmotionProfile>,
        catalog: &[PropertyRecord],
        top_n: Option<usize>,
    ) -> RankedMatches {
        let tolerances = self.policy.adjust(self.scorer.base_tolerances(), emotion);
        let limit = self.effective_top_n(top_n);

        if catalog.is_empty() || requirements.is_empty() || limit == 0 {
            return RankedMatches { matches: Vec::new(), total_candidates: catalog.len(), tolerances };
        }

        let requirements = self.with_style_hints(requirements, emotion);

        let mut ranked: Vec<MatchResult> = catalog
            .iter()
            .filter(|property| property.available)
            .filter_map(|property| {
                let breakdown = self.scorer.score_with(&requirements, property, &tolerances);
                if breakdown.score < self.settings.min_score {
                    return None;
                }
                Some(MatchResult {
                    property_id: property.id.clone(),
                    score: breakdown.score,
                    rationale: breakdown.rationale(),
                    location: property.location.clone(),
                    sqft: property.sqft,
                    price: property.price,
                    annual_rent: property.price * 12.0,
                    details: property.details.clone(),
                })
            })
            .collect();

        ranked.sort_by(|a, b| {
            compare_scores(a.score, b.score)
                .then_with(|| a.price.total_cmp(&b.price))
                .then_with(|| a.property_id.cmp(&b.property_id))
        });
        ranked.truncate(limit);

        RankedMatches { matches: ranked, total_candidates: catalog.len(), tolerances }
    }

    /// Requirements plus the culture keywords the caller's tone suggests
    fn with_style_hints<'a>(
        &self,
        requirements: &'a RequirementVector,
        emotion: Option<&EmotionProfile>,
    ) -> Cow<'a, RequirementVector> {
        let hints = self.policy.style_hints(emotion);
        if hints.is_empty() {
            return Cow::Borrowed(requirements);
        }
        let mut hinted = requirements.clone();
        hinted.merge(&RequirementVector {
            culture: Some(Extracted::new(hints, STYLE_HINT)),
            ..Default::default()
        });
        Cow::Owned(hinted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::PolicyTable;
    use crate::core::scoring::ScoringConfig;
    use crate::core::vocabulary::Vocabulary;
    use crate::models::Extracted;

    fn ranker() -> Ranker {
        let vocabulary = Arc::new(Vocabulary::default().compile().unwrap());
        Ranker::new(
            MatchScorer::new(ScoringConfig::default(), vocabulary),
            Arc::new(PolicyTable::default()),
            RankingSettings::default(),
        )
    }

    fn property(id: &str, location: &str, sqft: u32, price: f64) -> PropertyRecord {
        PropertyRecord {
            id: id.to_string(),
            location: location.to_string(),
            sqft,
            price,
            ..Default::default()
        }
    }

    fn downtown() -> RequirementVector {
        RequirementVector { location: Some(Extracted::new("downtown".to_string(), 0.9)), ..Default::default() }
    }

    #[test]
    fn test_empty_catalog_yields_empty() {
        let result = ranker().rank(&downtown(), None, &[], Some(5));
        assert!(result.matches.is_empty());
        assert_eq!(result.total_candidates, 0);
    }

    #[test]
    fn test_empty_requirements_yield_empty() {
        let catalog = vec![property("a", "Downtown", 1000, 2000.0)];
        let result = ranker().rank(&RequirementVector::default(), None, &catalog, Some(5));
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_ties_break_by_price_then_id() {
        let catalog = vec![
            property("c", "Downtown", 1000, 3000.0),
            property("b", "Downtown", 1000, 2000.0),
            property("a", "Downtown", 1000, 3000.0),
        ];
        let result = ranker().rank(&downtown(), None, &catalog, Some(10));
        let ids: Vec<&str> = result.matches.iter().map(|m| m.property_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_sorted_by_score() {
        let catalog = vec![
            property("1", "Uptown", 1000, 1000.0),
            property("2", "Downtown", 1000, 5000.0),
        ];
        let result = ranker().rank(&downtown(), None, &catalog, Some(10));
        assert_eq!(result.matches[0].property_id, "2");
        assert!(result.matches[0].score >= result.matches[1].score);
    }

    #[test]
    fn test_respects_limit() {
        let catalog: Vec<PropertyRecord> = (0..20)
            .map(|i| property(&format!("p{:02}", i), "Downtown", 1000, 1000.0 + i as f64))
            .collect();
        assert_eq!(ranker().rank(&downtown(), None, &catalog, Some(5)).matches.len(), 5);
        assert_eq!(ranker().rank(&downtown(), None, &catalog, None).matches.len(), 3);
    }

    #[test]
    fn test_unavailable_never_ranked() {
        let mut gone = property("gone", "Downtown", 1000, 1000.0);
        gone.available = false;
        let catalog = vec![gone, property("here", "Downtown", 1000, 1000.0)];
        let result = ranker().rank(&downtown(), None, &catalog, Some(10));
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].property_id, "here");
    }

    #[test]
    fn test_uncertain_caller_widens_budget() {
        let requirements = RequirementVector {
            budget_max: Some(Extracted::new(5000.0, 0.9)),
            ..Default::default()
        };
        let catalog = vec![property("over", "Downtown", 1000, 5500.0)];
        let unsure = EmotionProfile { enthusiasm: 0.1, professionalism: 0.5, confidence: 0.1, uncertainty: 0.9, low_confidence: false };

        let plain = ranker().rank(&requirements, None, &catalog, Some(1));
        let widened = ranker().rank(&requirements, Some(&unsure), &catalog, Some(1));
        assert!(widened.tolerances.budget_overage > plain.tolerances.budget_overage);
        assert!(widened.matches[0].score > plain.matches[0].score);
    }

    #[test]
    fn test_excited_caller_prefers_modern_listings() {
        let mut modern = property("b-modern", "Downtown", 1000, 2000.0);
        modern.culture = ["modern".to_string(), "tech".to_string()].into_iter().collect();
        let plain = property("a-plain", "Downtown", 1000, 2000.0);
        let catalog = vec![plain, modern];
        let excited = EmotionProfile { enthusiasm: 0.9, professionalism: 0.3, confidence: 0.5, uncertainty: 0.1, low_confidence: false };

        let calm = ranker().rank(&downtown(), None, &catalog, Some(2));
        assert_eq!(calm.matches[0].property_id, "a-plain");
        assert_eq!(calm.matches[0].score, calm.matches[1].score);

        let hinted = ranker().rank(&downtown(), Some(&excited), &catalog, Some(2));
        assert_eq!(hinted.matches[0].property_id, "b-modern");
        assert!(hinted.matches[0].rationale.iter().any(|r| r.starts_with("culture")));
    }

    #[test]
    fn test_results_carry_listing_details() {
        let mut p = property("a", "Downtown", 2000, 4000.0);
        p.details.floor = Some("5".to_string());
        p.details.contact_email = Some("agent@example.com".to_string());
        let result = ranker().rank(&downtown(), None, &[p], Some(1));
        let top = &result.matches[0];
        assert_eq!(top.details.floor.as_deref(), Some("5"));
        assert_eq!(top.details.contact_email.as_deref(), Some("agent@example.com"));
        assert_eq!(top.annual_rent, 48000.0);
    }

    #[test]
    fn test_session_emotion_window() {
        let p = |u: f64| EmotionProfile { enthusiasm: 0.0, professionalism: 0.0, confidence: 0.0, uncertainty: u, low_confidence: false };
        let history = vec![p(1.0), p(0.0), p(0.3), p(0.6)];
        let mean = ranker().session_emotion(&history).unwrap();
        assert!((mean.uncertainty - 0.3).abs() < 1e-9);
        assert!(ranker().session_emotion(&[]).is_none());
    }
}
