// libs/access-guard-cell/src/services/guard.rs
use tracing::debug;

use shared_models::auth::{OnboardingStatus, Role};

use crate::error::GuardError;
use crate::models::*;

/// Pure route gate. Rules run top-down and the first failing one decides.
#[derive(Debug, Clone, Default)]
pub struct AccessGuard {
    routes: RouteTable,
}

impl AccessGuard {
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    pub fn route_kind(&self, path: &str) -> RouteKind {
        self.routes.classify(path)
    }

    pub fn evaluate(&self, snapshot: AccessSnapshot, path: &str) -> GuardDecision {
        let kind = self.routes.classify(path);
        if kind == RouteKind::Public {
            return GuardDecision::Allow;
        }

        let state = match snapshot {
            AccessSnapshot::Loading => return GuardDecision::Loading,
            AccessSnapshot::Resolved(state) => state,
        };

        let decision = self.evaluate_protected(state, kind, normalize(path));
        if let Some(to) = decision.redirect_target() {
            debug!("Guard redirecting {} -> {} ({:?})", path, to, state);
        }
        decision
    }

    fn evaluate_protected(&self, state: AccessState, kind: RouteKind, path: &str) -> GuardDecision {
        let role = match state {
            AccessState::Public => return GuardDecision::redirect(LOGIN_ROUTE),
            AccessState::Authenticated { .. } if kind == RouteKind::AuthOnly => {
                return GuardDecision::Allow;
            }
            AccessState::Authenticated { .. } => return GuardDecision::redirect(VERIFY_EMAIL_ROUTE),
            _ if kind == RouteKind::AuthOnly => return GuardDecision::Allow,
            AccessState::EmailVerified { role } => role,
            AccessState::Onboarded { .. } => Role::Doctor,
        };

        if role != Role::Doctor {
            return GuardDecision::Redirect {
                to: LOGIN_ROUTE.to_string(),
                error: Some(GuardError::Unauthorized),
            };
        }

        // A doctor without a profile has not started onboarding.
        let status = match state {
            AccessState::Onboarded { status } => status,
            _ => OnboardingStatus::Draft,
        };

        match status {
            OnboardingStatus::Draft | OnboardingStatus::Rejected => {
                if path == REGISTRATION_ROUTE {
                    GuardDecision::Allow
                } else {
                    GuardDecision::redirect(REGISTRATION_ROUTE)
                }
            }
            OnboardingStatus::Pending => {
                if path == APPLICATION_STATUS_ROUTE {
                    GuardDecision::Allow
                } else {
                    GuardDecision::redirect(APPLICATION_STATUS_ROUTE)
                }
            }
            OnboardingStatus::Verified => match kind {
                RouteKind::Onboarding => GuardDecision::redirect(DASHBOARD_ROUTE),
                _ => GuardDecision::Allow,
            },
        }
    }
}
