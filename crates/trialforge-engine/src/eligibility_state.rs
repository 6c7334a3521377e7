//! Eligibility job state machine (spec §4.F): `detecting_sections →
//! awaiting_section_confirmation → extracting → interpreting →
//! validating → completed | failed`.

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EligibilityJobState {
    DetectingSections,
    AwaitingSectionConfirmation,
    Extracting,
    Interpreting,
    Validating,
    Completed,
    Failed,
}

impl EligibilityJobState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DetectingSections => "detecting_sections",
            Self::AwaitingSectionConfirmation => "awaiting_section_confirmation",
            Self::Extracting => "extracting",
            Self::Interpreting => "interpreting",
            Self::Validating => "validating",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "detecting_sections" => Self::DetectingSections,
            "awaiting_section_confirmation" => Self::AwaitingSectionConfirmation,
            "extracting" => Self::Extracting,
            "interpreting" => Self::Interpreting,
            "validating" => Self::Validating,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn is_pause_state(self) -> bool {
        matches!(self, Self::AwaitingSectionConfirmation)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub fn allowed_next(self) -> Vec<Self> {
        let mut next = match self {
            Self::DetectingSections => vec![Self::AwaitingSectionConfirmation],
            Self::AwaitingSectionConfirmation => vec![Self::Extracting],
            Self::Extracting => vec![Self::Interpreting],
            Self::Interpreting => vec![Self::Validating],
            Self::Validating => vec![Self::Completed],
            Self::Completed | Self::Failed => vec![],
        };
        if !self.is_terminal() {
            next.push(Self::Failed);
        }
        next
    }
}

pub fn transition(
    conn: &rusqlite::Connection,
    job_id: &str,
    from: EligibilityJobState,
    to: EligibilityJobState,
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
    fn full_happy_path_is_allowed_step_by_step() {
        let path = [
            EligibilityJobState::DetectingSections,
            EligibilityJobState::AwaitingSectionConfirmation,
            EligibilityJobState::Extracting,
            EligibilityJobState::Interpreting,
            EligibilityJobState::Validating,
            EligibilityJobState::Completed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].allowed_next().contains(&pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn validating_cannot_skip_straight_to_failed_and_completed_both() {
        let next = EligibilityJobState::Validating.allowed_next();
        assert!(next.contains(&EligibilityJobState::Completed));
        assert!(next.contains(&EligibilityJobState::Failed));
        assert_eq!(next.len(), 2);
    }
}
