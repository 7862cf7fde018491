use crate::core::vocabulary::normalize;
use crate::models::{ConversationState, EmotionProfile, RequirementVector, SessionStatus};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Dialogue tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Phrases that finalize a ready session
    #[serde(default = "default_confirm_phrases")]
    pub confirm_phrases: Vec<String>,
    /// Phrases that clear the session back to `New`
    #[serde(default = "default_reset_phrases")]
    pub reset_phrases: Vec<String>,
    /// Core groups (location, budget, size) needed before a session is ready
    #[serde(default = "default_min_core_fields")]
    pub min_core_fields: usize,
    /// Oldest emotion profiles are dropped past this length
    #[serde(default = "default_max_emotion_history")]
    pub max_emotion_history: usize,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            confirm_phrases: default_confirm_phrases(),
            reset_phrases: default_reset_phrases(),
            min_core_fields: default_min_core_fields(),
            max_emotion_history: default_max_emotion_history(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_confirm_phrases() -> Vec<String> {
    strings(&["confirm", "confirmed", "that's everything", "that is everything", "lock it in", "finalize", "finalise"])
}
fn default_reset_phrases() -> Vec<String> {
    strings(&["start over", "start again", "reset", "from scratch", "forget everything"])
}
fn default_min_core_fields() -> usize { 2 }
fn default_max_emotion_history() -> usize { 50 }

/// Explicit command carried by an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DialogueCommand {
    None,
    Confirm,
    Reset,
}

/// What a turn did to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEffect {
    Merged,
    Finalized,
    /// Confirmation arrived before the session was ready
    ConfirmDeferred,
    Reset,
    /// The session is finalized and the turn changed nothing
    Ignored,
}

/// Per-session state machine: `New -> Collecting -> Ready -> Finalized`,
/// with a reset edge from any state back to `New`.
#[derive(Debug, Clone)]
pub struct DialogueTracker {
    config: DialogueConfig,
    confirm: Option<Regex>,
    reset: Option<Regex>,
    question: Regex,
}

impl DialogueTracker {
    pub fn new(config: DialogueConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            confirm: phrase_matcher(&config.confirm_phrases)?,
            reset: phrase_matcher(&config.reset_phrases)?,
            question: Regex::new(QUESTION_OPENER)?,
            config,
        })
    }

    /// Reset wins when an utterance carries both commands. A confirm phrase
    /// inside a question ("can you confirm the rent?") is not a confirmation.
    pub fn detect_command(&self, text: &str) -> DialogueCommand {
        let text = normalize(text);
        let confirmed = |confirm: &Regex| {
            text.split_inclusive(['.', '!', '?', ';'])
                .map(str::trim)
                .any(|clause| !self.is_question(clause) && confirm.is_match(clause))
        };
        if self.reset.as_ref().is_some_and(|re| re.is_match(&text)) {
            DialogueCommand::Reset
        } else if self.confirm.as_ref().is_some_and(confirmed) {
            DialogueCommand::Confirm
        } else {
            DialogueCommand::None
        }
    }

    fn is_question(&self, clause: &str) -> bool {
        clause.ends_with('?') || self.question.is_match(clause)
    }

    /// Ready once enough core groups are present, one of them location or budget
    pub fn readiness(&self, requirements: &RequirementVector) -> SessionStatus {
        let has_location = requirements.location.is_some();
        let has_budget = requirements.budget_max.is_some();
        let has_size = requirements.sqft_min.is_some() || requirements.sqft_max.is_some();
        let groups = [has_location, has_budget, has_size].iter().filter(|g| **g).count();

        if groups >= self.config.min_core_fields.max(1) && (has_location || has_budget) {
            SessionStatus::Ready
        } else {
            SessionStatus::Collecting
        }
    }

    /// Fold one extraction into the cumulative requirements and recompute
    /// status. Idempotent: a repeated extraction changes nothing.
    pub fn merge(&self, state: &mut ConversationState, extraction: &RequirementVector) {
        if state.status == SessionStatus::Finalized {
            return;
        }
        state.requirements.merge(extraction);
        if state.turn_count > 0 || !state.requirements.is_empty() {
            state.status = self.readiness(&state.requirements);
        }
    }

    pub fn apply_turn(
        &self,
        state: &mut ConversationState,
        extraction: &RequirementVector,
        emotion: EmotionProfile,
        command: DialogueCommand,
        at: DateTime<Utc>,
    ) -> TurnEffect {
        if command == DialogueCommand::Reset {
            self.reset(state, at);
            return TurnEffect::Reset;
        }
        if state.status == SessionStatus::Finalized {
            return TurnEffect::Ignored;
        }

        state.turn_count = state.turn_count.saturating_add(1);
        self.merge(state, extraction);

        state.emotion_history.push(emotion);
        let cap = self.config.max_emotion_history.max(1);
        if state.emotion_history.len() > cap {
            let excess = state.emotion_history.len() - cap;
            state.emotion_history.drain(..excess);
        }
        state.last_updated = at;

        match command {
            DialogueCommand::Confirm if state.status == SessionStatus::Ready => {
                state.status = SessionStatus::Finalized;
                TurnEffect::Finalized
            }
            DialogueCommand::Confirm => TurnEffect::ConfirmDeferred,
            _ => TurnEffect::Merged,
        }
    }

    pub fn reset(&self, state: &mut ConversationState, at: DateTime<Utc>) {
        *state = ConversationState::new(state.session_id.clone());
        state.last_updated = at;
    }
}

// Transcripts often drop the question mark, so an interrogative opener counts too
const QUESTION_OPENER: &str = r"^(?:(?:ok|okay|so|and|but|well|hey|um|uh)\W+)*(?:can|could|would|will|should|shall|do|does|did|is|are|was|what|how|when|why|where|who|which)\b";

fn phrase_matcher(phrases: &[String]) -> Result<Option<Regex>, regex::Error> {
    let alternatives: Vec<String> = phrases
        .iter()
        .map(|p| normalize(p))
        .filter(|p| !p.is_empty())
        .map(|p| regex::escape(&p))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"\b(?:{})\b", alternatives.join("|"))).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Extracted;

    fn tracker() -> DialogueTracker {
        DialogueTracker::new(DialogueConfig::default()).unwrap()
    }

    fn calm() -> EmotionProfile {
        EmotionProfile { enthusiasm: 0.3, professionalism: 0.6, confidence: 0.5, uncertainty: 0.2, low_confidence: false }
    }

    fn location(name: &str) -> RequirementVector {
        RequirementVector { location: Some(Extracted::new(name.to_string(), 0.9)), ..Default::default() }
    }

    fn budget(amount: f64) -> RequirementVector {
        RequirementVector { budget_max: Some(Extracted::new(amount, 0.9)), ..Default::default() }
    }

    #[test]
    fn test_new_session_is_new() {
        assert_eq!(ConversationState::new("s").status, SessionStatus::New);
    }

    #[test]
    fn test_two_turns_reach_ready() {
        let tracker = tracker();
        let mut state = ConversationState::new("s");

        tracker.apply_turn(&mut state, &location("downtown"), calm(), DialogueCommand::None, Utc::now());
        assert_eq!(state.status, SessionStatus::Collecting);

        tracker.apply_turn(&mut state, &budget(5000.0), calm(), DialogueCommand::None, Utc::now());
        assert_eq!(state.status, SessionStatus::Ready);
        assert!(state.requirements.location.is_some());
        assert!(state.requirements.budget_max.is_some());
        assert_eq!(state.emotion_history.len(), 2);
        assert_eq!(state.turn_count, 2);
    }

    #[test]
    fn test_empty_turn_moves_to_collecting() {
        let tracker = tracker();
        let mut state = ConversationState::new("s");
        tracker.apply_turn(&mut state, &RequirementVector::default(), calm(), DialogueCommand::None, Utc::now());
        assert_eq!(state.status, SessionStatus::Collecting);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let tracker = tracker();
        let extraction = RequirementVector {
            sqft_min: Some(Extracted::new(3000, 0.9)),
            ..location("downtown")
        };

        let mut once = ConversationState::new("s");
        tracker.merge(&mut once, &extraction);
        let mut twice = once.clone();
        tracker.merge(&mut twice, &extraction);

        assert_eq!(once, twice);
        assert_eq!(once.status, SessionStatus::Ready);
    }

    #[test]
    fn test_confirm_requires_ready() {
        let tracker = tracker();
        let mut state = ConversationState::new("s");

        let effect = tracker.apply_turn(&mut state, &location("downtown"), calm(), DialogueCommand::Confirm, Utc::now());
        assert_eq!(effect, TurnEffect::ConfirmDeferred);
        assert_eq!(state.status, SessionStatus::Collecting);

        let effect = tracker.apply_turn(&mut state, &budget(4000.0), calm(), DialogueCommand::Confirm, Utc::now());
        assert_eq!(effect, TurnEffect::Finalized);
        assert_eq!(state.status, SessionStatus::Finalized);
    }

    #[test]
    fn test_finalized_is_terminal_until_reset() {
        let tracker = tracker();
        let mut state = ConversationState::new("s");
        tracker.apply_turn(&mut state, &location("downtown"), calm(), DialogueCommand::None, Utc::now());
        tracker.apply_turn(&mut state, &budget(4000.0), calm(), DialogueCommand::Confirm, Utc::now());
        let frozen = state.clone();

        let effect = tracker.apply_turn(&mut state, &budget(9000.0), calm(), DialogueCommand::None, Utc::now());
        assert_eq!(effect, TurnEffect::Ignored);
        assert_eq!(state, frozen);

        let effect = tracker.apply_turn(&mut state, &RequirementVector::default(), calm(), DialogueCommand::Reset, Utc::now());
        assert_eq!(effect, TurnEffect::Reset);
        assert_eq!(state.status, SessionStatus::New);
        assert!(state.requirements.is_empty());
        assert!(state.emotion_history.is_empty());
        assert_eq!(state.session_id, "s");
    }

    #[test]
    fn test_detect_command() {
        let tracker = tracker();
        assert_eq!(tracker.detect_command("OK, that's everything"), DialogueCommand::Confirm);
        assert_eq!(tracker.detect_command("let's start over"), DialogueCommand::Reset);
        assert_eq!(tracker.detect_command("reset and confirm"), DialogueCommand::Reset);
        assert_eq!(tracker.detect_command("downtown please"), DialogueCommand::None);
        // word boundaries
        assert_eq!(tracker.detect_command("a preset layout"), DialogueCommand::None);
    }

    #[test]
    fn test_confirm_inside_question_is_not_a_command() {
        let tracker = tracker();
        assert_eq!(tracker.detect_command("can you confirm the rent?"), DialogueCommand::None);
        assert_eq!(tracker.detect_command("Could you confirm the rent"), DialogueCommand::None);
        assert_eq!(tracker.detect_command("so what is left to confirm"), DialogueCommand::None);
        assert_eq!(tracker.detect_command("the rent is confirmed?"), DialogueCommand::None);

        assert_eq!(tracker.detect_command("confirm"), DialogueCommand::Confirm);
        assert_eq!(tracker.detect_command("Yes, confirm."), DialogueCommand::Confirm);
        assert_eq!(
            tracker.detect_command("Great. Can you confirm the rent? OK, lock it in"),
            DialogueCommand::Confirm
        );
        // a reset request phrased as a question still resets
        assert_eq!(tracker.detect_command("can we start over?"), DialogueCommand::Reset);
    }

    #[test]
    fn test_readiness_rule() {
        let tracker = tracker();
        let size_only = RequirementVector { sqft_min: Some(Extracted::new(1000, 0.9)), ..Default::default() };
        assert_eq!(tracker.readiness(&size_only), SessionStatus::Collecting);

        let size_and_budget = RequirementVector { sqft_max: Some(Extracted::new(1000, 0.9)), ..budget(3000.0) };
        assert_eq!(tracker.readiness(&size_and_budget), SessionStatus::Ready);
    }

    #[test]
    fn test_emotion_history_is_capped() {
        let tracker = DialogueTracker::new(DialogueConfig { max_emotion_history: 3, ..Default::default() }).unwrap();
        let mut state = ConversationState::new("s");
        for _ in 0..5 {
            tracker.apply_turn(&mut state, &RequirementVector::default(), calm(), DialogueCommand::None, Utc::now());
        }
        assert_eq!(state.emotion_history.len(), 3);
        assert_eq!(state.turn_count, 5);
    }
}
