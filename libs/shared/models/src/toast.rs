use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

/// A short user-facing notice. Retry-able failures set `retryable` so the UI
/// can offer the same action again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
    #[serde(default)]
    pub retryable: bool,
}

impl Toast {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: ToastLevel::Info, message: message.into(), retryable: false }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self { level: ToastLevel::Success, message: message.into(), retryable: false }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: ToastLevel::Error, message: message.into(), retryable: false }
    }

    pub fn retryable_error(message: impl Into<String>) -> Self {
        Self { level: ToastLevel::Error, message: message.into(), retryable: true }
    }
}
