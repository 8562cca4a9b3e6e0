use serde::{Deserialize, Serialize};
use sqlsquid_scanner::FormMethod;
use std::fmt;

/// Placeholder used in result columns that have no value.
pub const NONE_MARKER: &str = "-";
pub const NETWORK_ERROR: &str = "Network Error";

/// One `(form, payload)` request, fully built and ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionAttempt {
    pub payload: String,
    pub form_action: String,
    pub method: FormMethod,
    pub submitted_fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatusOrError {
    Status(u16),
    Error(String),
}

impl fmt::Display for StatusOrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusOrError::Status(code) => write!(f, "{}", code),
            StatusOrError::Error(msg) => f.write_str(msg),
        }
    }
}

/// A single row of the result log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub payload: String,
    pub action_url: String,
    pub vulnerable: bool,
    pub error_category: String,
    pub sqli_type: String,
    pub status_or_error: StatusOrError,
    pub db_guess: String,
}

impl ScanResult {
    pub fn network_error(attempt: &InjectionAttempt, error: String) -> Self {
        Self {
            payload: attempt.payload.clone(),
            action_url: attempt.form_action.clone(),
            vulnerable: false,
            error_category: NETWORK_ERROR.to_string(),
            sqli_type: NONE_MARKER.to_string(),
            status_or_error: StatusOrError::Error(error),
            db_guess: NONE_MARKER.to_string(),
        }
    }

    pub fn vulnerable_label(&self) -> &'static str {
        if self.vulnerable { "Yes" } else { "No" }
    }

    /// `(payload, action, Yes/No, category, type, status/error, db)`
    pub fn as_row(&self) -> [String; 7] {
        [
            self.payload.clone(),
            self.action_url.clone(),
            self.vulnerable_label().to_string(),
            self.error_category.clone(),
            self.sqli_type.clone(),
            self.status_or_error.to_string(),
            self.db_guess.clone(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    Idle,
    Crawling,
    Probing,
    Completed,
    Cancelled,
}

impl ScanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Crawling => "crawling",
            ScanState::Probing => "probing",
            ScanState::Completed => "completed",
            ScanState::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: String,
    pub pages_crawled: usize,
    /// Size of the payload list, which is what the scan reports as "tested".
    pub payloads_tested: usize,
    pub attempts: usize,
    pub progress_total: usize,
    pub vulnerability_count: usize,
    pub cancelled: bool,
}
