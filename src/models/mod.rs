// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AcousticFeatures, ConversationState, EmotionDimension, EmotionProfile, Extracted, ListingDetails, MatchResult, PropertyRecord,
    RequirementField, RequirementVector, ScoringWeights, SessionStatus, Tolerances, Utterance,
};
pub use requests::{MatchRequest, ProcessTurnRequest};
pub use responses::{ErrorResponse, HealthResponse, MatchResponse, TurnResponse};
