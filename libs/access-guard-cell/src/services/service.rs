// libs/access-guard-cell/src/services/service.rs
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use shared_models::auth::{OnboardingStatus, User};

use crate::error::GuardError;
use crate::models::{AccessSnapshot, AccessState, GuardDecision, RouteKind};
use crate::services::guard::AccessGuard;
use crate::services::source::OnboardingStatusSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CachedStatus {
    InFlight,
    Ready(Option<OnboardingStatus>),
}

type StatusCache = Arc<RwLock<HashMap<String, CachedStatus>>>;

/// Guard backed by the onboarding-status source. `check` always asks the
/// source; `peek` answers from the last known status per doctor.
pub struct AccessGuardService {
    guard: AccessGuard,
    source: Arc<dyn OnboardingStatusSource>,
    cache: StatusCache,
}

impl AccessGuardService {
    pub fn new(source: Arc<dyn OnboardingStatusSource>) -> Self {
        Self::with_guard(AccessGuard::default(), source)
    }

    pub fn with_guard(guard: AccessGuard, source: Arc<dyn OnboardingStatusSource>) -> Self {
        Self { guard, source, cache: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }

    /// Resolves every check, awaiting a fresh status lookup.
    pub async fn check(&self, user: Option<&User>, auth_token: &str, path: &str) -> Result<GuardDecision, GuardError> {
        if self.guard.route_kind(path) == RouteKind::Public {
            return Ok(GuardDecision::Allow);
        }
        let state = self.resolve_state(user, auth_token).await?;
        Ok(self.guard.evaluate(AccessSnapshot::Resolved(state), path))
    }

    /// Never waits on the network: answers `Loading` and starts the lookup in
    /// the background when the status is not cached yet.
    pub async fn peek(&self, user: Option<&User>, auth_token: &str, path: &str) -> GuardDecision {
        let snapshot = match pre_status_state(user) {
            Some(state) => AccessSnapshot::Resolved(state),
            None => match user {
                Some(user) => self.peek_status(user, auth_token).await,
                None => AccessSnapshot::Resolved(AccessState::Public),
            },
        };
        self.guard.evaluate(snapshot, path)
    }

    pub async fn resolve_state(&self, user: Option<&User>, auth_token: &str) -> Result<AccessState, GuardError> {
        if let Some(state) = pre_status_state(user) {
            return Ok(state);
        }
        let Some(user) = user else {
            return Ok(AccessState::Public);
        };

        // Never served from the cache; the answer refreshes what `peek` sees.
        match self.source.onboarding_status(&user.id, auth_token).await {
            Ok(status) => {
                self.cache.write().await.insert(user.id.clone(), CachedStatus::Ready(status));
                Ok(onboarded(status))
            }
            Err(e) => {
                warn!("Onboarding status lookup failed for {}: {}", user.id, e);
                Err(e)
            }
        }
    }

    async fn peek_status(&self, user: &User, auth_token: &str) -> AccessSnapshot {
        let cached = self.cache.read().await.get(&user.id).copied();
        match cached {
            Some(CachedStatus::Ready(status)) => AccessSnapshot::Resolved(onboarded(status)),
            Some(CachedStatus::InFlight) => AccessSnapshot::Loading,
            None => {
                self.cache.write().await.insert(user.id.clone(), CachedStatus::InFlight);
                self.spawn_lookup(user.id.clone(), auth_token.to_string());
                AccessSnapshot::Loading
            }
        }
    }

    fn spawn_lookup(&self, user_id: String, auth_token: String) {
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            match source.onboarding_status(&user_id, &auth_token).await {
                Ok(status) => {
                    debug!("Cached onboarding status {:?} for {}", status, user_id);
                    cache.write().await.insert(user_id, CachedStatus::Ready(status));
                }
                Err(e) => {
                    warn!("Background status lookup failed for {}: {}", user_id, e);
                    cache.write().await.remove(&user_id);
                }
            }
        });
    }
}

/// The part of the access state that needs no network lookup. `None` means
/// the onboarding status decides.
fn pre_status_state(user: Option<&User>) -> Option<AccessState> {
    let user = match user {
        None => return Some(AccessState::Public),
        Some(user) => user,
    };
    let role = user.role_kind();
    if !user.email_verified {
        return Some(AccessState::Authenticated { role });
    }
    if !user.is_doctor() {
        return Some(AccessState::EmailVerified { role });
    }
    None
}

fn onboarded(status: Option<OnboardingStatus>) -> AccessState {
    AccessState::Onboarded { status: status.unwrap_or(OnboardingStatus::Draft) }
}
