use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub role: Option<String>,
    pub app_metadata: Option<serde_json::Value>,
    pub user_metadata: Option<serde_json::Value>,
    pub aud: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn role_kind(&self) -> Role {
        self.role.as_deref().map(Role::from_claim).unwrap_or(Role::Unknown)
    }

    pub fn is_doctor(&self) -> bool {
        self.role_kind() == Role::Doctor
    }
}

/// Portal roles. Anything the token carries that is not recognised maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Patient,
    Admin,
    Unknown,
}

impl Role {
    pub fn from_claim(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "doctor" => Role::Doctor,
            "patient" => Role::Patient,
            "admin" => Role::Admin,
            _ => Role::Unknown,
        }
    }
}

/// Onboarding status of a doctor account. Owned by the profile service;
/// the portal only ever reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnboardingStatus {
    Draft,
    Pending,
    Verified,
    Rejected,
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OnboardingStatus::Draft => "DRAFT",
            OnboardingStatus::Pending => "PENDING",
            OnboardingStatus::Verified => "VERIFIED",
            OnboardingStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub user_id: String,
    pub email: Option<String>,
    pub role: Option<String>,
}
