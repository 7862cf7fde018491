use crate::models::{AcousticFeatures, EmotionProfile};
use serde::{Deserialize, Serialize};

/// Raw range of one acoustic cue; values are mapped linearly onto [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CueRange {
    pub low: f64,
    pub high: f64,
}

impl CueRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    #[inline]
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.high - self.low;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.low) / span).clamp(0.0, 1.0)
    }

    pub fn is_valid(&self) -> bool {
        self.low.is_finite() && self.high.is_finite() && self.high > self.low
    }
}

/// Expected raw ranges of the upstream features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CueRanges {
    /// Pitch standard deviation in semitones
    #[serde(default = "default_pitch_range")]
    pub pitch_variance: CueRange,
    /// RMS energy, already scaled to [0, 1] upstream
    #[serde(default = "default_energy_range")]
    pub energy: CueRange,
    /// Syllables per second
    #[serde(default = "default_rate_range")]
    pub speech_rate: CueRange,
    /// Share of the utterance spent in silence
    #[serde(default = "default_pause_range")]
    pub pause_ratio: CueRange,
}

impl Default for CueRanges {
    fn default() -> Self {
        Self {
            pitch_variance: default_pitch_range(),
            energy: default_energy_range(),
            speech_rate: default_rate_range(),
            pause_ratio: default_pause_range(),
        }
    }
}

fn default_pitch_range() -> CueRange { CueRange::new(0.0, 6.0) }
fn default_energy_range() -> CueRange { CueRange::new(0.0, 1.0) }
fn default_rate_range() -> CueRange { CueRange::new(2.0, 7.0) }
fn default_pause_range() -> CueRange { CueRange::new(0.0, 0.6) }

/// Linear combination of normalized cues for one emotion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CueWeights {
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub pitch_variance: f64,
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub speech_rate: f64,
    #[serde(default)]
    pub pause_ratio: f64,
}

impl CueWeights {
    const fn new(bias: f64, pitch_variance: f64, energy: f64, speech_rate: f64, pause_ratio: f64) -> Self {
        Self { bias, pitch_variance, energy, speech_rate, pause_ratio }
    }

    #[inline]
    fn apply(&self, cues: &NormalizedCues) -> f64 {
        let raw = self.bias
            + self.pitch_variance * cues.pitch_variance
            + self.energy * cues.energy
            + self.speech_rate * cues.speech_rate
            + self.pause_ratio * cues.pause_ratio;
        raw.clamp(0.0, 1.0)
    }
}

/// Weight table mapping acoustic cues to emotion scores
///
/// Defaults:
/// - enthusiasm rises with pitch variance, speech rate and energy
/// - professionalism favours a steady pitch and an even pace
/// - confidence rises with energy and falls with pausing
/// - uncertainty rises with pausing and falls with energy and pace
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionWeightTable {
    #[serde(default = "default_enthusiasm_weights")]
    pub enthusiasm: CueWeights,
    #[serde(default = "default_professionalism_weights")]
    pub professionalism: CueWeights,
    #[serde(default = "default_confidence_weights")]
    pub confidence: CueWeights,
    #[serde(default = "default_uncertainty_weights")]
    pub uncertainty: CueWeights,
}

impl Default for EmotionWeightTable {
    fn default() -> Self {
        Self {
            enthusiasm: default_enthusiasm_weights(),
            professionalism: default_professionalism_weights(),
            confidence: default_confidence_weights(),
            uncertainty: default_uncertainty_weights(),
        }
    }
}

fn default_enthusiasm_weights() -> CueWeights { CueWeights::new(0.0, 0.45, 0.20, 0.35, -0.15) }
fn default_professionalism_weights() -> CueWeights { CueWeights::new(0.60, -0.30, 0.15, -0.15, -0.20) }
fn default_confidence_weights() -> CueWeights { CueWeights::new(0.20, 0.0, 0.45, 0.20, -0.45) }
fn default_uncertainty_weights() -> CueWeights { CueWeights::new(0.20, 0.10, -0.35, -0.20, 0.65) }

/// Keywords for one emotion and the scale applied to their density
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconCategory {
    pub keywords: Vec<String>,
    pub scale: f64,
}

fn category(keywords: &[&str], scale: f64) -> LexiconCategory {
    LexiconCategory {
        keywords: keywords.iter().map(|k| k.to_string()).collect(),
        scale,
    }
}

/// Keyword lists for the text-only fallback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    #[serde(default = "default_enthusiasm_lexicon")]
    pub enthusiasm: LexiconCategory,
    #[serde(default = "default_professionalism_lexicon")]
    pub professionalism: LexiconCategory,
    #[serde(default = "default_confidence_lexicon")]
    pub confidence: LexiconCategory,
    #[serde(default = "default_uncertainty_lexicon")]
    pub uncertainty: LexiconCategory,
    /// A keyword right after one of these does not count
    #[serde(default = "default_negators")]
    pub negators: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            enthusiasm: default_enthusiasm_lexicon(),
            professionalism: default_professionalism_lexicon(),
            confidence: default_confidence_lexicon(),
            uncertainty: default_uncertainty_lexicon(),
            negators: default_negators(),
        }
    }
}

fn default_enthusiasm_lexicon() -> LexiconCategory {
    category(&["excited", "love", "amazing", "perfect", "great", "fantastic", "wow", "awesome"], 8.0)
}
fn default_professionalism_lexicon() -> LexiconCategory {
    category(&["need", "require", "business", "professional", "office", "company", "corporate"], 5.0)
}
fn default_confidence_lexicon() -> LexiconCategory {
    category(&["definitely", "certainly", "absolutely", "sure", "confident", "know", "clear"], 8.0)
}
fn default_uncertainty_lexicon() -> LexiconCategory {
    category(&["maybe", "perhaps", "not sure", "uncertain", "think", "might", "possibly"], 8.0)
}
fn default_negators() -> Vec<String> {
    ["not", "no", "never", "don't", "dont", "isn't", "aren't"].iter().map(|s| s.to_string()).collect()
}

/// All tables used by the profiler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionConfig {
    #[serde(default)]
    pub cue_ranges: CueRanges,
    #[serde(default)]
    pub weights: EmotionWeightTable,
    #[serde(default)]
    pub lexicon: Lexicon,
}

struct NormalizedCues {
    pitch_variance: f64,
    energy: f64,
    speech_rate: f64,
    pause_ratio: f64,
}

/// Derives an emotion profile from acoustic features, or from the words alone
/// when no usable features arrived. Deterministic for identical inputs.
#[derive(Debug, Clone, Default)]
pub struct EmotionProfiler {
    config: EmotionConfig,
}

impl EmotionProfiler {
    pub fn new(config: EmotionConfig) -> Self {
        Self { config }
    }

    pub fn profile(&self, features: Option<&AcousticFeatures>, text: &str) -> EmotionProfile {
        match features.filter(|f| f.is_usable()) {
            Some(features) => self.from_acoustics(features),
            None => self.from_lexicon(text),
        }
    }

    fn from_acoustics(&self, features: &AcousticFeatures) -> EmotionProfile {
        let ranges = &self.config.cue_ranges;
        let cues = NormalizedCues {
            pitch_variance: ranges.pitch_variance.normalize(features.pitch_variance),
            energy: ranges.energy.normalize(features.energy),
            speech_rate: ranges.speech_rate.normalize(features.speech_rate),
            pause_ratio: ranges.pause_ratio.normalize(features.pause_ratio),
        };
        let weights = &self.config.weights;

        EmotionProfile {
            enthusiasm: weights.enthusiasm.apply(&cues),
            professionalism: weights.professionalism.apply(&cues),
            confidence: weights.confidence.apply(&cues),
            uncertainty: weights.uncertainty.apply(&cues),
            low_confidence: false,
        }
    }

    /// Keyword density per category, scaled and capped at 1.0
    fn from_lexicon(&self, text: &str) -> EmotionProfile {
        let tokens = tokenize(text);
        let word_count = tokens.len().max(1) as f64;
        let lexicon = &self.config.lexicon;
        let level = |cat: &LexiconCategory| {
            let hits = count_keywords(&tokens, &cat.keywords, &lexicon.negators) as f64;
            (hits / word_count * cat.scale).clamp(0.0, 1.0)
        };

        EmotionProfile {
            enthusiasm: level(&lexicon.enthusiasm),
            professionalism: level(&lexicon.professionalism),
            confidence: level(&lexicon.confidence),
            uncertainty: level(&lexicon.uncertainty),
            low_confidence: true,
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Number of distinct keywords present, ignoring negated mentions
fn count_keywords(tokens: &[String], keywords: &[String], negators: &[String]) -> usize {
    keywords
        .iter()
        .filter(|keyword| {
            let phrase = tokenize(keyword);
            if phrase.is_empty() || phrase.len() > tokens.len() {
                return false;
            }
            let phrase_is_negated = negators.contains(&phrase[0]);
            tokens.windows(phrase.len()).enumerate().any(|(i, window)| {
                window == phrase.as_slice()
                    && (phrase_is_negated || i == 0 || !negators.contains(&tokens[i - 1]))
            })
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pitch_variance: f64, energy: f64, speech_rate: f64, pause_ratio: f64) -> AcousticFeatures {
        AcousticFeatures { pitch_variance, energy, speech_rate, pause_ratio }
    }

    #[test]
    fn test_animated_speech_is_enthusiastic() {
        let profiler = EmotionProfiler::default();
        let profile = profiler.profile(Some(&features(5.5, 0.7, 6.5, 0.1)), "");

        assert!(profile.enthusiasm > 0.7, "enthusiasm was {}", profile.enthusiasm);
        assert!(!profile.low_confidence);
    }

    #[test]
    fn test_hesitant_speech_is_uncertain() {
        let profiler = EmotionProfiler::default();
        let profile = profiler.profile(Some(&features(1.0, 0.15, 2.5, 0.5)), "");

        assert!(profile.uncertainty > 0.6);
        assert!(profile.confidence < 0.3);
    }

    #[test]
    fn test_scores_stay_in_unit_range() {
        let profiler = EmotionProfiler::default();
        for f in [features(-10.0, -1.0, 0.0, -5.0), features(100.0, 9.0, 50.0, 3.0)] {
            let p = profiler.profile(Some(&f), "");
            for v in [p.enthusiasm, p.professionalism, p.confidence, p.uncertainty] {
                assert!((0.0..=1.0).contains(&v));
            }
        }
    }

    #[test]
    fn test_missing_features_fall_back_to_text() {
        let profiler = EmotionProfiler::default();
        let profile = profiler.profile(None, "wow this is amazing");

        assert!(profile.low_confidence);
        assert_eq!(profile.enthusiasm, 1.0);
        assert_eq!(profile.uncertainty, 0.0);
    }

    #[test]
    fn test_non_finite_features_fall_back_to_text() {
        let profiler = EmotionProfiler::default();
        let profile = profiler.profile(Some(&features(f64::NAN, 0.5, 4.0, 0.1)), "maybe");
        assert!(profile.low_confidence);
        assert_eq!(profile.uncertainty, 1.0);
    }

    #[test]
    fn test_negated_confidence_is_uncertainty() {
        let profiler = EmotionProfiler::default();
        let profile = profiler.profile(None, "i'm not sure about the size");

        assert_eq!(profile.confidence, 0.0);
        assert!(profile.uncertainty > 0.0);
    }

    #[test]
    fn test_deterministic() {
        let profiler = EmotionProfiler::default();
        let f = features(3.0, 0.4, 4.5, 0.2);
        assert_eq!(profiler.profile(Some(&f), "x"), profiler.profile(Some(&f), "x"));
        assert_eq!(profiler.profile(None, "definitely downtown"), profiler.profile(None, "definitely downtown"));
    }

    #[test]
    fn test_cue_range_normalize() {
        let range = CueRange::new(2.0, 7.0);
        assert_eq!(range.normalize(2.0), 0.0);
        assert_eq!(range.normalize(4.5), 0.5);
        assert_eq!(range.normalize(10.0), 1.0);
        assert_eq!(CueRange::new(1.0, 1.0).normalize(5.0), 0.0);
    }
}
