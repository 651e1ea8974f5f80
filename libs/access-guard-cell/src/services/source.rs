// libs/access-guard-cell/src/services/source.rs
use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::OnboardingStatus;
use shared_rest::ApiClient;

use crate::error::GuardError;

/// Where the guard reads a doctor's onboarding status from. `None` means the
/// doctor has no profile yet.
#[async_trait]
pub trait OnboardingStatusSource: Send + Sync {
    async fn onboarding_status(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<OnboardingStatus>, GuardError>;
}

pub struct RestOnboardingStatusSource {
    client: ApiClient,
}

impl RestOnboardingStatusSource {
    pub fn new(config: &AppConfig) -> Self {
        Self { client: ApiClient::new(config) }
    }
}

#[async_trait]
impl OnboardingStatusSource for RestOnboardingStatusSource {
    async fn onboarding_status(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<OnboardingStatus>, GuardError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}&select=onboarding_status", user_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| GuardError::StatusUnavailable(e.to_string()))?;

        let Some(row) = rows.first() else {
            debug!("No doctor profile for user {}", user_id);
            return Ok(None);
        };

        match row.get("onboarding_status") {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| GuardError::StatusUnavailable(format!("unknown onboarding status: {}", e))),
        }
    }
}
