use crate::models::{AcousticFeatures, EmotionProfile, RequirementVector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Request to process one utterance of a session
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProcessTurnRequest {
    #[validate(length(max = 10000))]
    pub text: String,
    /// Defaults to the session's current turn count
    #[serde(alias = "turn_index", rename = "turnIndex")]
    pub turn_index: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "acoustic_features", rename = "acousticFeatures")]
    pub acoustic_features: Option<AcousticFeatures>,
}

/// Request to rank the catalog for a session or an explicit requirement vector
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_match_target"))]
pub struct MatchRequest {
    #[validate(length(min = 1))]
    #[serde(default, alias = "session_id", rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub requirements: Option<RequirementVector>,
    /// Emotion used by the tolerance policy with explicit requirements
    #[serde(default)]
    pub emotion: Option<EmotionProfile>,
    #[validate(range(min = 1, max = 100))]
    #[serde(default, alias = "top_n", rename = "topN")]
    pub top_n: Option<usize>,
}

fn validate_match_target(req: &MatchRequest) -> Result<(), ValidationError> {
    match (&req.session_id, &req.requirements) {
        (Some(_), None) | (None, Some(_)) => Ok(()),
        _ => Err(ValidationError::new("exactly one of sessionId or requirements is required")),
    }
}
