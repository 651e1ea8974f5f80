// libs/access-guard-cell/src/models.rs
use serde::{Deserialize, Serialize};

use shared_models::auth::{OnboardingStatus, Role};

use crate::error::GuardError;

pub const LOGIN_ROUTE: &str = "/login";
pub const VERIFY_EMAIL_ROUTE: &str = "/verify-email";
pub const REGISTRATION_ROUTE: &str = "/registration";
pub const APPLICATION_STATUS_ROUTE: &str = "/application-status";
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// How far a viewer has progressed through the access chain
/// `Public -> Authenticated -> EmailVerified -> Onboarded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AccessState {
    Public,
    Authenticated { role: Role },
    EmailVerified { role: Role },
    Onboarded { status: OnboardingStatus },
}

impl AccessState {
    pub fn role(&self) -> Option<Role> {
        match self {
            AccessState::Public => None,
            AccessState::Authenticated { role } | AccessState::EmailVerified { role } => Some(*role),
            AccessState::Onboarded { .. } => Some(Role::Doctor),
        }
    }
}

/// Input to the guard: either a fully resolved state or a lookup still in
/// flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSnapshot {
    Loading,
    Resolved(AccessState),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Render a neutral placeholder, never the protected content.
    Loading,
    Redirect { to: String, error: Option<GuardError> },
}

impl GuardDecision {
    pub fn redirect(to: &str) -> Self {
        GuardDecision::Redirect { to: to.to_string(), error: None }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allow)
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GuardDecision::Redirect { to, .. } => Some(to),
            _ => None,
        }
    }
}

/// What a route demands of the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Public,
    /// Signed in, nothing more.
    AuthOnly,
    /// Doctor onboarding screens.
    Onboarding,
    /// Doctor area proper; requires `Onboarded = Verified`.
    DoctorArea,
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    public: Vec<String>,
    auth_only: Vec<String>,
    onboarding: Vec<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            public: vec!["/".into(), LOGIN_ROUTE.into(), "/signup".into()],
            auth_only: vec![VERIFY_EMAIL_ROUTE.into()],
            onboarding: vec![REGISTRATION_ROUTE.into(), APPLICATION_STATUS_ROUTE.into()],
        }
    }
}

impl RouteTable {
    /// Anything not listed is doctor area, including `/consultation/*`.
    pub fn classify(&self, path: &str) -> RouteKind {
        let path = normalize(path);
        let listed = |routes: &[String]| routes.iter().any(|r| r == path);

        if listed(&self.public) {
            RouteKind::Public
        } else if listed(&self.auth_only) {
            RouteKind::AuthOnly
        } else if listed(&self.onboarding) {
            RouteKind::Onboarding
        } else {
            RouteKind::DoctorArea
        }
    }
}

/// Drops query, fragment and trailing slash.
pub fn normalize(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let trimmed = path[..end].trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_default_routes() {
        let table = RouteTable::default();
        assert_eq!(table.classify("/"), RouteKind::Public);
        assert_eq!(table.classify("/login?next=/dashboard"), RouteKind::Public);
        assert_eq!(table.classify("/verify-email"), RouteKind::AuthOnly);
        assert_eq!(table.classify("/registration/"), RouteKind::Onboarding);
        assert_eq!(table.classify("/consultation/c-1"), RouteKind::DoctorArea);
        assert_eq!(table.classify("/earnings"), RouteKind::DoctorArea);
    }
}
