use crate::models::{EmotionDimension, EmotionProfile, Tolerances};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Adjusts scoring tolerances from the caller's emotional state before scoring
pub trait TolerancePolicy: Send + Sync {
    fn adjust(&self, base: Tolerances, profile: Option<&EmotionProfile>) -> Tolerances;

    /// Culture keywords implied by the caller's tone
    fn style_hints(&self, _profile: Option<&EmotionProfile>) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Culture keywords suggested once `dimension` exceeds `threshold`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleHint {
    pub dimension: EmotionDimension,
    pub threshold: f64,
    pub keywords: Vec<String>,
}

/// One row of the policy table: when `dimension` falls in `[min, max)` the
/// deltas are added to the base tolerances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyBand {
    pub dimension: EmotionDimension,
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub budget_delta: f64,
    #[serde(default)]
    pub sqft_delta: f64,
}

impl PolicyBand {
    fn contains(&self, score: f64) -> bool {
        score >= self.min && self.max.map_or(true, |max| score < max)
    }
}

/// Emotion bands and the tolerance shifts they cause
///
/// Default table:
///
/// | dimension   | band       | budget | sqft  |
/// |-------------|------------|--------|-------|
/// | uncertainty | 0.6 - 0.8  | +0.05  | +0.05 |
/// | uncertainty | 0.8 - 1.0  | +0.10  | +0.10 |
/// | confidence  | 0.7 - 1.0  | -0.05  | -0.05 |
/// | enthusiasm  | 0.7 - 1.0  | +0.05  |  0    |
///
/// Profiles derived from the lexical fallback apply their deltas scaled by
/// `low_confidence_scale` and suggest no culture keywords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyTable {
    #[serde(default = "default_bands")]
    pub bands: Vec<PolicyBand>,
    #[serde(default = "default_low_confidence_scale")]
    pub low_confidence_scale: f64,
    #[serde(default)]
    pub min_tolerance: f64,
    #[serde(default = "default_max_tolerance")]
    pub max_tolerance: f64,
    #[serde(default = "default_style_hints")]
    pub style_hints: Vec<StyleHint>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            bands: default_bands(),
            low_confidence_scale: default_low_confidence_scale(),
            min_tolerance: 0.0,
            max_tolerance: default_max_tolerance(),
            style_hints: default_style_hints(),
        }
    }
}

fn band(dimension: EmotionDimension, min: f64, max: Option<f64>, budget_delta: f64, sqft_delta: f64) -> PolicyBand {
    PolicyBand { dimension, min, max, budget_delta, sqft_delta }
}

fn default_bands() -> Vec<PolicyBand> {
    vec![
        band(EmotionDimension::Uncertainty, 0.6, Some(0.8), 0.05, 0.05),
        band(EmotionDimension::Uncertainty, 0.8, None, 0.10, 0.10),
        band(EmotionDimension::Confidence, 0.7, None, -0.05, -0.05),
        band(EmotionDimension::Enthusiasm, 0.7, None, 0.05, 0.0),
    ]
}

fn hint(dimension: EmotionDimension, threshold: f64, keywords: &[&str]) -> StyleHint {
    StyleHint { dimension, threshold, keywords: keywords.iter().map(|k| k.to_string()).collect() }
}

fn default_style_hints() -> Vec<StyleHint> {
    vec![
        hint(EmotionDimension::Enthusiasm, 0.6, &["modern", "innovative", "tech"]),
        hint(EmotionDimension::Professionalism, 0.7, &["professional", "corporate"]),
    ]
}

fn default_low_confidence_scale() -> f64 { 0.5 }
fn default_max_tolerance() -> f64 { 1.0 }

impl TolerancePolicy for PolicyTable {
    fn adjust(&self, base: Tolerances, profile: Option<&EmotionProfile>) -> Tolerances {
        let Some(profile) = profile else {
            return base;
        };
        let scale = if profile.low_confidence { self.low_confidence_scale } else { 1.0 };

        let (budget_delta, sqft_delta) = self
            .bands
            .iter()
            .filter(|band| band.contains(profile.get(band.dimension)))
            .fold((0.0, 0.0), |(b, s), band| (b + band.budget_delta, s + band.sqft_delta));

        let clamp = |v: f64| v.clamp(self.min_tolerance, self.max_tolerance.max(self.min_tolerance));
        Tolerances {
            budget_overage: clamp(base.budget_overage + budget_delta * scale),
            sqft_range: clamp(base.sqft_range + sqft_delta * scale),
        }
    }

    fn style_hints(&self, profile: Option<&EmotionProfile>) -> BTreeSet<String> {
        let Some(profile) = profile.filter(|p| !p.low_confidence) else {
            return BTreeSet::new();
        };
        self.style_hints
            .iter()
            .filter(|hint| profile.get(hint.dimension) > hint.threshold)
            .flat_map(|hint| hint.keywords.iter().cloned())
            .collect()
    }
}
