//! SOA job state machine (spec §4.F): "each pipeline has a typed state
//! enum and a transition table that is the *sole* source of truth for
//! what phase is next."
//!
//! ```text
//! detecting_pages  ──► awaiting_page_confirmation ──► extracting
//! extracting        ──► saving ──► analyzing_merges
//! analyzing_merges  ──► awaiting_merge_confirmation ──► interpreting
//! interpreting      ──► completed
//! (any state)       ──► failed
//! ```

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoaJobState {
    DetectingPages,
    AwaitingPageConfirmation,
    Extracting,
    Saving,
    AnalyzingMerges,
    AwaitingMergeConfirmation,
    Interpreting,
    Completed,
    Failed,
}

impl SoaJobState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DetectingPages => "detecting_pages",
            Self::AwaitingPageConfirmation => "awaiting_page_confirmation",
            Self::Extracting => "extracting",
            Self::Saving => "saving",
            Self::AnalyzingMerges => "analyzing_merges",
            Self::AwaitingMergeConfirmation => "awaiting_merge_confirmation",
            Self::Interpreting => "interpreting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "detecting_pages" => Self::DetectingPages,
            "awaiting_page_confirmation" => Self::AwaitingPageConfirmation,
            "extracting" => Self::Extracting,
            "saving" => Self::Saving,
            "analyzing_merges" => Self::AnalyzingMerges,
            "awaiting_merge_confirmation" => Self::AwaitingMergeConfirmation,
            "interpreting" => Self::Interpreting,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => return None,
        })
    }

    /// `true` for states that are only left by an explicit external
    /// confirmation command, never by the pipeline worker itself (spec
    /// §4.F: "they are only left by an explicit external command that
    /// supplies the confirmed payload").
    #[must_use]
    pub const fn is_pause_state(self) -> bool {
        matches!(self, Self::AwaitingPageConfirmation | Self::AwaitingMergeConfirmation)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// States this state may transition to. `failed` is reachable from
    /// every non-terminal state, so it is appended rather than listed.
    #[must_use]
    pub fn allowed_next(self) -> Vec<Self> {
        let mut next = match self {
            Self::DetectingPages => vec![Self::AwaitingPageConfirmation],
            Self::AwaitingPageConfirmation => vec![Self::Extracting],
            Self::Extracting => vec![Self::Saving],
            Self::Saving => vec![Self::AnalyzingMerges],
            Self::AnalyzingMerges => vec![Self::AwaitingMergeConfirmation],
            Self::AwaitingMergeConfirmation => vec![Self::Interpreting],
            Self::Interpreting => vec![Self::Completed],
            Self::Completed | Self::Failed => vec![],
        };
        if !self.is_terminal() {
            next.push(Self::Failed);
        }
        next
    }

    pub fn transition_to(self, next: Self) -> Result<Self, EngineError> {
        if self.allowed_next().contains(&next) {
            Ok(next)
        } else {
            Err(EngineError::InvalidTransition {
                job_id: String::new(),
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

/// Validates and persists a single SOA job state transition (spec §4.F:
/// "Each transition writes a single row update"; "Transition persistence
/// uses a fresh connection per update").
pub fn transition(
    conn: &rusqlite::Connection,
    job_id: &str,
    from: SoaJobState,
    to: SoaJobState,
) -> Result<(), EngineError> {
    if !from.allowed_next().contains(&to) {
        return Err(EngineError::InvalidTransition {
            job_id: job_id.to_string(),
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        });
    }
    trialforge_store::jobs::set_status(conn, job_id, to.as_str(), Some(to.as_str()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_is_reachable_from_any_non_terminal_state() {
        for state in [
            SoaJobState::DetectingPages,
            SoaJobState::AwaitingPageConfirmation,
            SoaJobState::Extracting,
            SoaJobState::Saving,
            SoaJobState::AnalyzingMerges,
            SoaJobState::AwaitingMergeConfirmation,
            SoaJobState::Interpreting,
        ] {
            assert!(state.allowed_next().contains(&SoaJobState::Failed));
        }
    }

    #[test]
    fn completed_and_failed_have_no_further_transitions() {
        assert!(SoaJobState::Completed.allowed_next().is_empty());
        assert!(SoaJobState::Failed.allowed_next().is_empty());
    }

    #[test]
    fn pause_states_only_advance_on_confirmation() {
        assert!(SoaJobState::AwaitingPageConfirmation.is_pause_state());
        assert_eq!(SoaJobState::AwaitingPageConfirmation.allowed_next(), vec![SoaJobState::Extracting]);
    }

    #[test]
    fn skipping_a_state_is_rejected() {
        let err = SoaJobState::DetectingPages.transition_to(SoaJobState::Interpreting).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn round_trips_through_as_str_and_parse() {
        for state in [SoaJobState::DetectingPages, SoaJobState::Completed, SoaJobState::Failed] {
            assert_eq!(SoaJobState::parse(state.as_str()), Some(state));
        }
    }
}
