//! Space Match - voice-driven office space matching
//!
//! Turns transcribed utterances and their acoustic features into structured
//! space requirements and an emotion profile, tracks them per conversation,
//! and ranks a property catalog against them with explainable results.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use crate::core::{DialogueTracker, EmotionProfiler, MatchScorer, Ranker, RequirementExtractor, RuleBasedExtractor};
pub use models::{AcousticFeatures, ConversationState, EmotionProfile, MatchResult, PropertyRecord, RequirementVector, Utterance};
pub use services::{CatalogStore, MatchPipeline, MatchTarget};
