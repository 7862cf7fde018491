// Core pipeline exports
pub mod dialogue;
pub mod emotion;
pub mod extractor;
pub mod policy;
pub mod ranking;
pub mod scoring;
pub mod vocabulary;

pub use dialogue::{DialogueCommand, DialogueConfig, DialogueTracker, TurnEffect};
pub use emotion::{EmotionConfig, EmotionProfiler};
pub use extractor::{RequirementExtractor, RuleBasedExtractor, RuleConfig};
pub use policy::{PolicyBand, PolicyTable, StyleHint, TolerancePolicy};
pub use ranking::{RankedMatches, Ranker, RankingSettings};
pub use scoring::{calculate_budget_score, calculate_culture_score, calculate_sqft_score, MatchScorer, ScoreBreakdown, ScoringConfig};
pub use vocabulary::{CompiledVocabulary, Vocabulary, VocabularyError};
