use crate::core::{DialogueCommand, TurnEffect};
use crate::models::{ConversationState, EmotionProfile, MatchResult, RequirementVector, Tolerances};
use crate::services::pipeline::{MatchOutcome, TurnOutcome};
use serde::{Deserialize, Serialize};

/// Response for a processed turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub state: ConversationState,
    #[serde(rename = "emotionProfile")]
    pub emotion_profile: EmotionProfile,
    /// Fields extracted from this utterance alone
    pub extracted: RequirementVector,
    pub command: DialogueCommand,
    pub effect: TurnEffect,
}

impl From<TurnOutcome> for TurnResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            state: outcome.state,
            emotion_profile: outcome.emotion,
            extracted: outcome.extracted,
            command: outcome.command,
            effect: outcome.effect,
        }
    }
}

/// Response for the match endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResponse {
    pub matches: Vec<MatchResult>,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
    #[serde(rename = "catalogVersion")]
    pub catalog_version: u64,
    pub tolerances: Tolerances,
}

impl From<MatchOutcome> for MatchResponse {
    fn from(outcome: MatchOutcome) -> Self {
        Self {
            matches: outcome.matches,
            total_candidates: outcome.total_candidates,
            catalog_version: outcome.catalog_version,
            tolerances: outcome.tolerances,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "catalogVersion")]
    pub catalog_version: u64,
    #[serde(rename = "catalogRows")]
    pub catalog_rows: usize,
    #[serde(rename = "activeSessions")]
    pub active_sessions: u64,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}
