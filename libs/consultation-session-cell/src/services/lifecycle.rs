// libs/consultation-session-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::models::ConsultationStatus;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsultationLifecycle;

impl ConsultationLifecycle {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current: ConsultationStatus,
        next: ConsultationStatus,
    ) -> Result<(), SessionError> {
        if !self.valid_transitions(current).contains(&next) {
            warn!("Invalid consultation status transition: {:?} -> {:?}", current, next);
            return Err(SessionError::InvalidTransition { from: current, to: next });
        }
        debug!("Consultation status transition: {:?} -> {:?}", current, next);
        Ok(())
    }

    pub fn valid_transitions(&self, current: ConsultationStatus) -> Vec<ConsultationStatus> {
        match current {
            ConsultationStatus::Scheduled => vec![
                ConsultationStatus::InProgress,
                ConsultationStatus::Cancelled,
                ConsultationStatus::NoShow,
            ],
            ConsultationStatus::InProgress => vec![
                ConsultationStatus::Completed,
                ConsultationStatus::Cancelled,
            ],
            ConsultationStatus::Completed | ConsultationStatus::Cancelled | ConsultationStatus::NoShow => vec![],
        }
    }

    /// A session can be entered for a scheduled or running consultation.
    pub fn ensure_joinable(&self, status: ConsultationStatus) -> Result<(), SessionError> {
        if status.is_terminal() {
            return Err(SessionError::ConsultationClosed { status });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn scheduled_can_start_or_be_cancelled() {
        let lifecycle = ConsultationLifecycle::new();
        assert!(lifecycle
            .validate_status_transition(ConsultationStatus::Scheduled, ConsultationStatus::InProgress)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(ConsultationStatus::Scheduled, ConsultationStatus::NoShow)
            .is_ok());
        assert_matches!(
            lifecycle.validate_status_transition(ConsultationStatus::Scheduled, ConsultationStatus::Completed),
            Err(SessionError::InvalidTransition { .. })
        );
    }

    #[test]
    fn terminal_statuses_are_final() {
        let lifecycle = ConsultationLifecycle::new();
        for status in [ConsultationStatus::Completed, ConsultationStatus::Cancelled, ConsultationStatus::NoShow] {
            assert!(lifecycle.valid_transitions(status).is_empty());
            assert_matches!(lifecycle.ensure_joinable(status), Err(SessionError::ConsultationClosed { .. }));
        }
        assert!(lifecycle.ensure_joinable(ConsultationStatus::InProgress).is_ok());
    }
}
