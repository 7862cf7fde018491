use crate::config::Settings;
use crate::core::{
    DialogueCommand, DialogueTracker, EmotionProfiler, MatchScorer, Ranker, RequirementExtractor,
    RuleBasedExtractor, TurnEffect, VocabularyError,
};
use crate::models::{AcousticFeatures, ConversationState, EmotionProfile, MatchResult, RequirementVector, Tolerances, Utterance};
use crate::services::catalog::CatalogStore;
use crate::services::sessions::{SessionError, SessionStore};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Setup failures while assembling the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Vocabulary error: {0}")]
    Vocabulary(#[from] VocabularyError),

    #[error("Invalid phrase pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result of processing one turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub emotion: EmotionProfile,
    pub extracted: RequirementVector,
    pub command: DialogueCommand,
    pub effect: TurnEffect,
}

/// What to rank against
#[derive(Debug, Clone)]
pub enum MatchTarget {
    /// The cumulative requirements and recent emotion of a session
    Session(String),
    /// A caller-supplied vector, optionally with an emotion profile for the policy
    Requirements {
        requirements: RequirementVector,
        emotion: Option<EmotionProfile>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub matches: Vec<MatchResult>,
    pub total_candidates: usize,
    pub catalog_version: u64,
    pub tolerances: Tolerances,
}

/// The operations exposed to callers: process a turn, match properties,
/// read and reset session state.
#[derive(Clone)]
pub struct MatchPipeline {
    extractor: Arc<dyn RequirementExtractor>,
    profiler: EmotionProfiler,
    dialogue: DialogueTracker,
    ranker: Ranker,
    sessions: SessionStore,
    catalog: Arc<CatalogStore>,
}

impl MatchPipeline {
    pub fn new(
        extractor: Arc<dyn RequirementExtractor>,
        profiler: EmotionProfiler,
        dialogue: DialogueTracker,
        ranker: Ranker,
        sessions: SessionStore,
        catalog: Arc<CatalogStore>,
    ) -> Self {
        Self { extractor, profiler, dialogue, ranker, sessions, catalog }
    }

    /// Wire the rule-based extractor and the configured tables
    pub fn from_settings(settings: &Settings, catalog: Arc<CatalogStore>) -> Result<Self, PipelineError> {
        let vocabulary = Arc::new(settings.extraction.vocabulary()?.compile()?);
        let extractor = RuleBasedExtractor::new(vocabulary.clone(), settings.extraction.rules)?;
        let scorer = MatchScorer::new(settings.scoring, vocabulary);
        let ranker = Ranker::new(scorer, Arc::new(settings.policy.clone()), settings.ranking);

        Ok(Self::new(
            Arc::new(extractor),
            EmotionProfiler::new(settings.emotion.clone()),
            DialogueTracker::new(settings.dialogue.clone())?,
            ranker,
            SessionStore::new(&settings.sessions),
            catalog,
        ))
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn ranker(&self) -> &Ranker {
        &self.ranker
    }

    pub async fn open_session(&self) -> Result<ConversationState, SessionError> {
        let (_, handle) = self.sessions.create().await?;
        let state = handle.lock().await;
        Ok(state.clone())
    }

    /// Extract, profile and merge one utterance into its session
    pub async fn process_turn(
        &self,
        session_id: &str,
        utterance: &Utterance,
        features: Option<&AcousticFeatures>,
    ) -> Result<TurnOutcome, SessionError> {
        // Pure work happens before the session lock is taken
        let extracted = self.extractor.extract(utterance);
        let emotion = self.profiler.profile(features, &utterance.text);
        let command = self.dialogue.detect_command(&utterance.text);

        let handle = self.sessions.open(session_id).await?;
        let mut state = handle.lock().await;

        if utterance.turn_index < state.turn_count {
            tracing::debug!(
                "Session {} turn {} arrived after {} turns; applying in arrival order",
                session_id,
                utterance.turn_index,
                state.turn_count
            );
        }

        let effect = self.dialogue.apply_turn(&mut state, &extracted, emotion, command, Utc::now());

        tracing::debug!(
            session = session_id,
            extractor = self.extractor.name(),
            fields = ?extracted.populated_fields(),
            status = ?state.status,
            effect = ?effect,
            low_confidence_emotion = emotion.low_confidence,
            "Processed turn"
        );

        Ok(TurnOutcome {
            state: state.clone(),
            emotion,
            extracted,
            command,
            effect,
        })
    }

    /// Score and rank the current catalog snapshot
    pub async fn match_properties(&self, target: MatchTarget, top_n: Option<usize>) -> Result<MatchOutcome, SessionError> {
        let (requirements, emotion) = match target {
            MatchTarget::Session(session_id) => {
                let handle = self.sessions.open(&session_id).await?;
                let state = handle.lock().await;
                (state.requirements.clone(), self.ranker.session_emotion(&state.emotion_history))
            }
            MatchTarget::Requirements { requirements, emotion } => (requirements, emotion),
        };

        let snapshot = self.catalog.snapshot();
        let ranked = self.ranker.rank(&requirements, emotion.as_ref(), &snapshot.records, top_n);

        tracing::debug!(
            "Ranked {} of {} listings against catalog version {}",
            ranked.matches.len(),
            ranked.total_candidates,
            snapshot.version
        );

        Ok(MatchOutcome {
            matches: ranked.matches,
            total_candidates: ranked.total_candidates,
            catalog_version: snapshot.version,
            tolerances: ranked.tolerances,
        })
    }

    pub async fn get_state(&self, session_id: &str) -> Result<ConversationState, SessionError> {
        let handle = self.sessions.open(session_id).await?;
        let state = handle.lock().await;
        Ok(state.clone())
    }

    pub async fn reset_session(&self, session_id: &str) -> Result<ConversationState, SessionError> {
        let handle = self.sessions.open(session_id).await?;
        let mut state = handle.lock().await;
        self.dialogue.reset(&mut state, Utc::now());
        tracing::debug!("Session {} reset", session_id);
        Ok(state.clone())
    }
}
